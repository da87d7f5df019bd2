use crate::core::wizard::{reduce, Action, Effect, Session, Step, WizardError};
use crate::services::ai::{AiServices, StorySegmenter};
use crate::services::orchestrator::Generator;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;

/// Owns the session for one storyboard and runs the work its transitions ask for.
pub struct Storyboard {
    session: watch::Sender<Session>,
    segmenter: Arc<dyn StorySegmenter>,
    generator: Generator,
}

impl Storyboard {
    pub fn new(services: AiServices) -> Self {
        let (session, _) = watch::channel(Session::default());
        Self {
            session,
            segmenter: services.segmenter,
            generator: Generator::new(services.traits, services.synthesizer),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    pub fn snapshot(&self) -> Session {
        self.session.borrow().clone()
    }

    /// Applies `action`, publishes the result, then runs any follow-up work.
    /// A rejected action leaves the session untouched.
    pub async fn dispatch(&self, action: Action) -> Result<(), WizardError> {
        let current = self.snapshot();
        let (next, effect) = reduce(&current, action)?;
        self.session.send_replace(next);

        if let Some(Effect::GenerateAll) = effect {
            self.generator.generate_all(&self.session).await;
        }
        Ok(())
    }

    /// Splits the raw story into scenes, replacing the current list. Falls back
    /// to a single scene holding the whole story when segmentation fails.
    /// Returns the number of scenes now in the session.
    pub async fn auto_split(&self) -> Result<usize, WizardError> {
        let current = self.snapshot();
        if current.step != Step::Story {
            return Err(WizardError::WrongStep {
                action: "AutoSplit",
                step: current.step,
            });
        }
        let story = current.raw_story;
        if story.trim().is_empty() {
            return Ok(current.scenes.len());
        }

        let descriptions = match self.segmenter.segment(&story).await {
            Ok(descriptions) if !descriptions.is_empty() => {
                info!("Story split into {} scenes", descriptions.len());
                descriptions
            }
            Ok(_) => {
                warn!("Segmentation returned no scenes, keeping the story as one scene");
                vec![story]
            }
            Err(e) => {
                warn!("Segmentation failed, keeping the story as one scene: {:#}", e);
                vec![story]
            }
        };

        let count = descriptions.len();
        self.dispatch(Action::ReplaceScenes(descriptions)).await?;
        Ok(count)
    }

    /// Regenerates one panel. `false` means the request was rejected.
    pub async fn regenerate(&self, index: usize) -> bool {
        if self.session.borrow().step != Step::Result {
            return false;
        }
        self.generator.regenerate_one(&self.session, index).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::CharacterMode;
    use crate::services::orchestrator::tests::{MockSynth, MockTraits};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockSegmenter {
        reply: Option<Vec<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockSegmenter {
        fn new(reply: Option<&[&str]>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(|r| r.iter().map(|s| s.to_string()).collect()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl StorySegmenter for MockSegmenter {
        async fn segment(&self, story: &str) -> Result<Vec<String>> {
            self.calls.lock().unwrap().push(story.to_string());
            self.reply.clone().ok_or_else(|| anyhow!("Mock segmentation error"))
        }
    }

    fn storyboard(segmenter: Arc<MockSegmenter>, synth: Arc<MockSynth>) -> Storyboard {
        Storyboard::new(AiServices {
            segmenter,
            traits: MockTraits::new(false),
            synthesizer: synth,
        })
    }

    async fn to_story(board: &Storyboard, story: &str) {
        board.dispatch(Action::Next).await.unwrap();
        board.dispatch(Action::Next).await.unwrap();
        board.dispatch(Action::SetRawStory(story.to_string())).await.unwrap();
    }

    const STORY: &str = "Sarah logs in. She clicks settings. She gets confused.";

    #[tokio::test]
    async fn test_auto_split_replaces_scenes() {
        let segmenter = MockSegmenter::new(Some(&["Sarah logs in", "She clicks settings", "She gets confused"]));
        let board = storyboard(segmenter.clone(), MockSynth::new(&[]));
        to_story(&board, STORY).await;
        board.dispatch(Action::AddScene).await.unwrap();

        assert_eq!(board.auto_split().await.unwrap(), 3);

        let s = board.snapshot();
        let descriptions: Vec<&str> = s.scenes.iter().map(|sc| sc.description.as_str()).collect();
        assert_eq!(descriptions, vec!["Sarah logs in", "She clicks settings", "She gets confused"]);
        assert_eq!(s.raw_story, STORY, "raw story is kept for re-analysis");
        assert_eq!(segmenter.calls.lock().unwrap().clone(), vec![STORY.to_string()]);
    }

    #[tokio::test]
    async fn test_auto_split_falls_back_to_whole_story() {
        let board = storyboard(MockSegmenter::new(None), MockSynth::new(&[]));
        to_story(&board, STORY).await;

        assert_eq!(board.auto_split().await.unwrap(), 1);

        let s = board.snapshot();
        assert_eq!(s.scenes.len(), 1);
        assert_eq!(s.scenes[0].description, STORY);
    }

    #[tokio::test]
    async fn test_auto_split_empty_reply_falls_back() {
        let board = storyboard(MockSegmenter::new(Some(&[])), MockSynth::new(&[]));
        to_story(&board, STORY).await;

        board.auto_split().await.unwrap();
        assert_eq!(board.snapshot().scenes[0].description, STORY);
    }

    #[tokio::test]
    async fn test_auto_split_blank_story_is_a_no_op() {
        let segmenter = MockSegmenter::new(Some(&["x"]));
        let board = storyboard(segmenter.clone(), MockSynth::new(&[]));
        to_story(&board, "   ").await;

        assert_eq!(board.auto_split().await.unwrap(), 0);
        assert!(segmenter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_auto_split_outside_story_step() {
        let board = storyboard(MockSegmenter::new(Some(&["x"])), MockSynth::new(&[]));
        assert!(board.auto_split().await.is_err());
    }

    #[tokio::test]
    async fn test_full_flow_generates_every_panel() {
        let synth = MockSynth::new(&[true, true, false]);
        let board = storyboard(
            MockSegmenter::new(Some(&["Sarah logs in", "She clicks settings", "She gets confused"])),
            synth.clone(),
        );
        to_story(&board, STORY).await;
        board.auto_split().await.unwrap();
        board.dispatch(Action::Next).await.unwrap();
        board.dispatch(Action::SelectStyle("doodle".to_string())).await.unwrap();

        board.dispatch(Action::Next).await.unwrap();

        let s = board.snapshot();
        assert_eq!(s.step, Step::Result);
        assert!(!s.is_generating);
        assert_eq!(synth.call_count(), 3);
        let with_images = s.scenes.iter().filter(|sc| sc.image_url.is_some()).count();
        assert_eq!(with_images, 2);
        assert!(s.scenes[2].error.is_some());

        assert!(board.regenerate(2).await);
        assert!(board.snapshot().scenes[2].image_url.is_some());

        board.dispatch(Action::RegenerateAll).await.unwrap();
        assert_eq!(synth.call_count(), 7);

        board.dispatch(Action::Back).await.unwrap();
        let s = board.snapshot();
        assert_eq!(s.step, Step::Style);
        assert!(s.scenes.iter().all(|sc| sc.image_url.is_none()));
    }

    async fn generate_with_character(board: &Storyboard, edits: Vec<Action>) {
        board.dispatch(Action::Next).await.unwrap();
        for action in edits {
            board.dispatch(action).await.unwrap();
        }
        board.dispatch(Action::Next).await.unwrap();
        board.dispatch(Action::SetRawStory(STORY.to_string())).await.unwrap();
        board.auto_split().await.unwrap();
        board.dispatch(Action::Next).await.unwrap();
        board.dispatch(Action::SelectStyle("comic".to_string())).await.unwrap();
        board.dispatch(Action::Next).await.unwrap();
    }

    const PHOTO: &str = "data:image/png;base64,aGVybw==";

    #[tokio::test]
    async fn test_removed_reference_image_falls_back_to_text_profile() {
        let traits = MockTraits::new(false);
        let synth = MockSynth::new(&[]);
        let board = Storyboard::new(AiServices {
            segmenter: MockSegmenter::new(Some(&["Sarah logs in", "She gets confused"])),
            traits: traits.clone(),
            synthesizer: synth.clone(),
        });

        generate_with_character(
            &board,
            vec![
                Action::SetCharacterMode(CharacterMode::Upload),
                Action::SetCharacterImage(PHOTO.to_string()),
                Action::SetCharacterMode(CharacterMode::Text),
                Action::RemoveCharacterImage,
                Action::SetCharacterDescription("Sarah, red scarf".to_string()),
            ],
        )
        .await;

        assert_eq!(board.snapshot().character.image, None);
        assert_eq!(*traits.calls.lock().unwrap(), 0);
        assert!(synth.references.lock().unwrap().iter().all(Option::is_none));
        let prompts = synth.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 2);
        for prompt in prompts {
            assert!(!prompt.contains("VISUAL ANCHOR"));
            assert!(prompt.contains("**MAIN CHARACTER PROFILE**: Sarah, red scarf."));
        }
    }

    #[tokio::test]
    async fn test_removed_reference_image_without_description_is_generic() {
        let synth = MockSynth::new(&[]);
        let board = storyboard(MockSegmenter::new(Some(&["Sarah logs in"])), synth.clone());

        generate_with_character(
            &board,
            vec![
                Action::SetCharacterImage(PHOTO.to_string()),
                Action::SetCharacterMode(CharacterMode::Skip),
                Action::RemoveCharacterImage,
            ],
        )
        .await;

        let prompts = synth.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("**MAIN CHARACTER**: A generic user persona"));
        assert_eq!(synth.references.lock().unwrap().clone(), vec![None]);
    }

    #[tokio::test]
    async fn test_rejected_transition_keeps_session() {
        let board = storyboard(MockSegmenter::new(None), MockSynth::new(&[]));
        to_story(&board, STORY).await;
        board.dispatch(Action::AddScene).await.unwrap();
        let before = board.snapshot();

        assert_eq!(
            board.dispatch(Action::Next).await.unwrap_err(),
            WizardError::IncompleteScenes
        );
        assert_eq!(board.snapshot(), before);
    }

    #[tokio::test]
    async fn test_regenerate_outside_result_is_rejected() {
        let synth = MockSynth::new(&[]);
        let board = storyboard(MockSegmenter::new(None), synth.clone());
        to_story(&board, STORY).await;
        board.auto_split().await.unwrap();

        assert!(!board.regenerate(0).await);
        assert_eq!(synth.call_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_see_restart() {
        let board = storyboard(MockSegmenter::new(None), MockSynth::new(&[]));
        let mut rx = board.subscribe();
        to_story(&board, STORY).await;

        board.dispatch(Action::Restart).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Session::default());
    }
}
