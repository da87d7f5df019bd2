use crate::core::config::Config;
use crate::core::io::{NativeStorage, Storage};
use crate::core::state::{CharacterMode, Scene};
use crate::core::style::{find_style, STYLES};
use crate::core::wizard::{Action, Step, STEP_COUNT};
use crate::services::ai::AiServices;
use crate::services::export::{export_panel, export_panels};
use crate::services::gallery::{create_record_store, share_url};
use crate::services::storyboard::Storyboard;
use crate::utils::data_url::{mime_for_path, DataUrl};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, Select, Text};
use log::warn;
use std::future::Future;
use std::sync::Arc;

const CHARACTER_MODES: &[(&str, CharacterMode)] = &[
    ("Upload a reference image", CharacterMode::Upload),
    ("Describe the character in text", CharacterMode::Text),
    ("Skip (generic character)", CharacterMode::Skip),
    ("Let the AI decide", CharacterMode::Auto),
];

const REMOVE_IMAGE: &str = "Remove the reference image";

/// Interactive terminal wizard over a [`Storyboard`].
pub struct WizardUi {
    config: Config,
    board: Storyboard,
    storage: Arc<dyn Storage>,
    client: reqwest::Client,
}

impl WizardUi {
    pub fn new(config: Config, services: AiServices) -> Self {
        Self {
            config,
            board: Storyboard::new(services),
            storage: Arc::new(NativeStorage::new()),
            client: reqwest::Client::new(),
        }
    }

    pub async fn run(&self) -> Result<()> {
        loop {
            let step = self.board.snapshot().step;
            println!("\n== Step {}/{}: {:?} ==", step.index() + 1, STEP_COUNT, step);
            let keep_going = match step {
                Step::Hero => self.hero().await?,
                Step::Character => self.character().await?,
                Step::Story => self.story().await?,
                Step::Style => self.style().await?,
                Step::Result => self.result().await?,
            };
            if !keep_going {
                return Ok(());
            }
        }
    }

    async fn act(&self, action: Action) {
        if let Err(e) = self.board.dispatch(action).await {
            println!("{}", e);
        }
    }

    async fn hero(&self) -> Result<bool> {
        println!("StoryBoard AI: turn a story into comic panels.");
        if !self.config.unattended && !Confirm::new("Start a new storyboard?").with_default(true).prompt()? {
            return Ok(false);
        }
        self.act(Action::Next).await;
        Ok(true)
    }

    async fn character(&self) -> Result<bool> {
        let has_image = self.board.snapshot().character.image.is_some();
        let mut labels: Vec<&str> = CHARACTER_MODES.iter().map(|(label, _)| *label).collect();
        if has_image {
            println!("A reference image is attached.");
            labels.push(REMOVE_IMAGE);
        }

        let choice = Select::new("Who is the main character?", labels).raw_prompt()?;
        let Some(&(_, mode)) = CHARACTER_MODES.get(choice.index) else {
            self.act(Action::RemoveCharacterImage).await;
            println!("Reference image removed.");
            return Ok(true);
        };
        self.act(Action::SetCharacterMode(mode)).await;

        if has_image
            && mode != CharacterMode::Upload
            && Confirm::new("Drop the attached reference image?").with_default(true).prompt()?
        {
            self.act(Action::RemoveCharacterImage).await;
        }

        match mode {
            CharacterMode::Upload => {
                let path = Text::new("Path to the reference image:").prompt()?;
                match self.storage.read(path.trim()).await {
                    Ok(bytes) => {
                        let image = DataUrl::from_bytes(mime_for_path(path.trim()), &bytes);
                        self.act(Action::SetCharacterImage(image.to_string())).await;
                    }
                    Err(e) => {
                        println!("Could not read image: {:#}", e);
                        return Ok(true);
                    }
                }
                let extra = Text::new("Anything to add about the character? (optional)").prompt()?;
                self.act(Action::SetCharacterDescription(extra)).await;
            }
            CharacterMode::Text => {
                let description = Text::new("Describe the character:").prompt()?;
                self.act(Action::SetCharacterDescription(description)).await;
            }
            CharacterMode::Skip | CharacterMode::Auto => {}
        }

        self.act(Action::Next).await;
        Ok(true)
    }

    async fn story(&self) -> Result<bool> {
        if self.board.snapshot().raw_story.trim().is_empty() {
            let input = Text::new("Your story (or @path to read it from a file):").prompt()?;
            let story = match input.trim().strip_prefix('@') {
                Some(path) => match self.storage.read_to_string(path).await {
                    Ok(text) => text,
                    Err(e) => {
                        println!("Could not read story: {:#}", e);
                        return Ok(true);
                    }
                },
                None => input,
            };
            self.act(Action::SetRawStory(story)).await;
            if !self.board.snapshot().raw_story.trim().is_empty() {
                println!("Splitting the story into scenes...");
                self.split().await;
            }
        }

        loop {
            print_scenes(&self.board.snapshot().scenes);
            let options = vec![
                "Continue",
                "Auto-split the story again",
                "Edit a scene",
                "Add a scene",
                "Remove a scene",
                "Clear all scenes",
                "Replace the story",
                "Back",
            ];
            match Select::new("Scenes:", options).prompt()? {
                "Continue" => {
                    self.act(Action::Next).await;
                    return Ok(true);
                }
                "Auto-split the story again" => self.split().await,
                "Edit a scene" => {
                    if let Some(scene) = pick_scene(&self.board.snapshot().scenes, "Edit which scene?")? {
                        let description = Text::new("Description:")
                            .with_initial_value(&scene.description)
                            .prompt()?;
                        self.act(Action::UpdateScene {
                            id: scene.id,
                            description,
                        })
                        .await;
                    }
                }
                "Add a scene" => {
                    let description = Text::new("Description:").prompt()?;
                    self.act(Action::AddScene).await;
                    if let Some(scene) = self.board.snapshot().scenes.last() {
                        self.act(Action::UpdateScene {
                            id: scene.id.clone(),
                            description,
                        })
                        .await;
                    }
                }
                "Remove a scene" => {
                    if let Some(scene) = pick_scene(&self.board.snapshot().scenes, "Remove which scene?")? {
                        self.act(Action::RemoveScene(scene.id)).await;
                    }
                }
                "Clear all scenes" => self.act(Action::ClearScenes).await,
                "Replace the story" => {
                    self.act(Action::SetRawStory(String::new())).await;
                    return Ok(true);
                }
                _ => {
                    self.act(Action::Back).await;
                    return Ok(true);
                }
            }
        }
    }

    async fn split(&self) {
        match self.board.auto_split().await {
            Ok(count) => println!("{} scenes ready.", count),
            Err(e) => println!("{}", e),
        }
    }

    async fn style(&self) -> Result<bool> {
        let mut options: Vec<String> = STYLES
            .iter()
            .map(|s| format!("{} - {}", s.name, s.description))
            .collect();
        options.push("Back".to_string());

        let choice = Select::new("Pick an art style:", options).raw_prompt()?;
        let Some(style) = STYLES.get(choice.index) else {
            self.act(Action::Back).await;
            return Ok(true);
        };

        self.act(Action::SelectStyle(style.id.to_string())).await;
        if let Err(e) = self.with_progress(self.board.dispatch(Action::Next)).await? {
            println!("{}", e);
        }
        Ok(true)
    }

    async fn result(&self) -> Result<bool> {
        let session = self.board.snapshot();
        let style = session.selected_style.as_deref().and_then(find_style);
        println!(
            "\nStoryboard ({}):",
            style.map(|s| s.name).unwrap_or("no style")
        );
        print_scenes(&session.scenes);

        if self.config.unattended {
            self.export(&session.scenes).await;
            return Ok(false);
        }

        let options = vec![
            "Regenerate a panel",
            "Regenerate all panels",
            "Export all panels",
            "Export a panel",
            "Share a panel",
            "Back to styles",
            "Start over",
            "Quit",
        ];
        match Select::new("What next?", options).prompt()? {
            "Regenerate a panel" => {
                if let Some(index) = pick_index(&session.scenes, "Regenerate which panel?")? {
                    println!("Regenerating panel {}...", index + 1);
                    if !self.board.regenerate(index).await {
                        println!("Panel {} is already being generated.", index + 1);
                    }
                }
            }
            "Regenerate all panels" => {
                if let Err(e) = self.with_progress(self.board.dispatch(Action::RegenerateAll)).await? {
                    println!("{}", e);
                }
            }
            "Export all panels" => self.export(&session.scenes).await,
            "Export a panel" => {
                if let Some(index) = pick_index(&session.scenes, "Export which panel?")? {
                    self.export_one(&session.scenes[index], index).await;
                }
            }
            "Share a panel" => self.share(&session.scenes).await?,
            "Back to styles" => self.act(Action::Back).await,
            "Start over" => self.act(Action::Restart).await,
            _ => return Ok(false),
        }
        Ok(true)
    }

    async fn export(&self, scenes: &[Scene]) {
        let summary = export_panels(scenes, &self.config.output_folder, self.storage.as_ref(), &self.client).await;
        if summary.written.is_empty() && summary.failed.is_empty() {
            println!("No panels to export.");
        }
        for path in &summary.written {
            println!("Saved {}", path);
        }
        for (index, e) in &summary.failed {
            println!("Panel {} failed: {:#}", index + 1, e);
        }
    }

    async fn export_one(&self, scene: &Scene, index: usize) {
        let Some(image_url) = scene.image_url.as_deref() else {
            println!("Panel {} has no image yet.", index + 1);
            return;
        };
        match export_panel(image_url, index, &self.config.output_folder, self.storage.as_ref(), &self.client).await {
            Ok(path) => println!("Saved {}", path),
            Err(e) => println!("Export failed: {:#}", e),
        }
    }

    async fn share(&self, scenes: &[Scene]) -> Result<()> {
        let store = match create_record_store(&self.config) {
            Ok(store) => store,
            Err(e) => {
                println!("Sharing is not configured: {:#}", e);
                return Ok(());
            }
        };
        let Some(index) = pick_index(scenes, "Share which panel?")? else {
            return Ok(());
        };
        let scene = &scenes[index];
        let Some(image_url) = scene.image_url.as_deref() else {
            println!("Panel {} has no image yet.", index + 1);
            return Ok(());
        };

        match store.save(image_url, &scene.description).await {
            Ok(record) => match self.config.gallery.as_ref().and_then(|g| g.public_base_url.as_deref()) {
                Some(base) => println!("Shared: {}", share_url(base, &record.id)),
                None => println!("Shared as record {}", record.id),
            },
            Err(e) => {
                warn!("Share failed: {:#}", e);
                println!("Share failed: {:#}", e);
            }
        }
        Ok(())
    }

    /// Drives `fut` while a progress bar follows the number of finished panels.
    async fn with_progress<F: Future>(&self, fut: F) -> Result<F::Output> {
        let mut rx = self.board.subscribe();
        let pb = ProgressBar::new(rx.borrow().scenes.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} panels")?
                .progress_chars("#>-"),
        );

        tokio::pin!(fut);
        loop {
            tokio::select! {
                out = &mut fut => {
                    pb.finish_with_message("Generation complete");
                    return Ok(out);
                }
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Ok((&mut fut).await);
                    }
                    let session = rx.borrow_and_update();
                    pb.set_length(session.scenes.len() as u64);
                    pb.set_position(session.scenes.iter().filter(|s| !s.is_generating).count() as u64);
                }
            }
        }
    }
}

fn print_scenes(scenes: &[Scene]) {
    if scenes.is_empty() {
        println!("  (no scenes)");
    }
    for (i, scene) in scenes.iter().enumerate() {
        let description = if scene.has_script() { scene.description.as_str() } else { "<empty>" };
        println!("  {}. {}", i + 1, description);
        if let Some(url) = &scene.image_url {
            match DataUrl::parse(url) {
                Ok(data) => println!("     image: inline {} ({} KB)", data.mime_type, data.data.len() * 3 / 4 / 1024),
                Err(_) => println!("     image: {}", url),
            }
        }
        if let Some(error) = &scene.error {
            println!("     error: {}", error);
        }
    }
}

fn pick_index(scenes: &[Scene], prompt: &str) -> Result<Option<usize>> {
    if scenes.is_empty() {
        println!("There are no scenes yet.");
        return Ok(None);
    }
    let labels: Vec<String> = scenes
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s.description))
        .collect();
    Ok(Some(Select::new(prompt, labels).raw_prompt()?.index))
}

fn pick_scene(scenes: &[Scene], prompt: &str) -> Result<Option<Scene>> {
    Ok(pick_index(scenes, prompt)?.map(|i| scenes[i].clone()))
}
