use crate::core::state::{self, CharacterDefinition};
use crate::core::style::find_style;
use crate::core::wizard::Session;
use crate::services::ai::{ImageSynthesizer, TraitExtractor};
use crate::services::prompt::build_panel_prompt;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::watch;

pub const GENERATION_FAILED: &str = "Generation failed. Please try again.";
pub const REGENERATION_FAILED: &str = "Failed to regenerate";

/// Drives panel generation and writes every state change back through the
/// session channel as a new snapshot.
pub struct Generator {
    traits: Arc<dyn TraitExtractor>,
    synthesizer: Arc<dyn ImageSynthesizer>,
}

impl Generator {
    pub fn new(traits: Arc<dyn TraitExtractor>, synthesizer: Arc<dyn ImageSynthesizer>) -> Self {
        Self { traits, synthesizer }
    }

    /// Generates every panel in order, one synthesis call at a time.
    pub async fn generate_all(&self, session: &watch::Sender<Session>) {
        session.send_modify(|s| {
            *s = Session {
                scenes: s.scenes.iter().map(|sc| sc.pending(false)).collect(),
                is_generating: true,
                ..s.clone()
            };
        });

        let snapshot = session.borrow().clone();
        let reference = snapshot.character.reference_image().map(str::to_string);
        let traits = self.traits_for(&snapshot.character).await;
        let style = snapshot.selected_style.as_deref().and_then(find_style);
        let total = snapshot.scenes.len();
        info!("Generating {} panels", total);

        for (i, scene) in snapshot.scenes.iter().enumerate() {
            let prompt = build_panel_prompt(&snapshot.character, &traits, &scene.description, style, i);

            let result = self
                .synthesizer
                .synthesize(&prompt.instruction, reference.as_deref())
                .await;

            session.send_modify(|s| {
                let scenes = match &result {
                    Ok(url) => state::map_scene(&s.scenes, &scene.id, |sc| sc.succeeded(url.clone())),
                    Err(e) => {
                        error!("Failed to generate panel {}: {:#}", i + 1, e);
                        state::map_scene(&s.scenes, &scene.id, |sc| sc.failed(GENERATION_FAILED, false))
                    }
                };
                *s = s.with_scenes(scenes);
            });
            info!("Panel {}/{} done", i + 1, total);
        }

        session.send_modify(|s| {
            *s = Session {
                is_generating: false,
                ..s.clone()
            };
        });
    }

    /// Regenerates a single panel. Returns `false` without issuing any call
    /// when the index is out of range or that panel is already in flight.
    pub async fn regenerate_one(&self, session: &watch::Sender<Session>, index: usize) -> bool {
        let mut target = None;
        session.send_if_modified(|s| match s.scenes.get(index) {
            Some(scene) if !scene.is_generating => {
                let id = scene.id.clone();
                *s = s.with_scenes(state::map_scene(&s.scenes, &id, |sc| sc.pending(true)));
                target = Some(id);
                true
            }
            _ => false,
        });
        let Some(id) = target else {
            warn!("Panel {} is missing or already generating", index + 1);
            return false;
        };

        let snapshot = session.borrow().clone();
        let reference = snapshot.character.reference_image().map(str::to_string);
        let traits = self.traits_for(&snapshot.character).await;
        let style = snapshot.selected_style.as_deref().and_then(find_style);
        let description = snapshot
            .scenes
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.description.clone())
            .unwrap_or_default();

        let prompt = build_panel_prompt(&snapshot.character, &traits, &description, style, index);
        let result = self
            .synthesizer
            .synthesize(&prompt.instruction, reference.as_deref())
            .await;

        session.send_modify(|s| {
            let scenes = match &result {
                Ok(url) => state::map_scene(&s.scenes, &id, |sc| sc.succeeded(url.clone())),
                Err(e) => {
                    error!("Failed to regenerate panel {}: {:#}", index + 1, e);
                    state::map_scene(&s.scenes, &id, |sc| sc.failed(REGENERATION_FAILED, true))
                }
            };
            *s = s.with_scenes(scenes);
        });
        true
    }

    /// Trait summary for the reference image, or empty when there is no image
    /// or the extraction fails.
    async fn traits_for(&self, character: &CharacterDefinition) -> String {
        let Some(image) = character.reference_image() else {
            return String::new();
        };
        match self.traits.extract_traits(image).await {
            Ok(traits) => traits.trim().to_string(),
            Err(e) => {
                warn!("Character analysis failed, continuing without traits: {:#}", e);
                String::new()
            }
        }
    }
}
