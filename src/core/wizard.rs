//! The linear wizard: HERO → CHARACTER → STORY → STYLE → RESULT.
//!
//! [`reduce`] never mutates its input; callers publish the returned session.

use crate::core::state::{self, CharacterDefinition, CharacterMode, Scene};
use crate::core::style::find_style;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Hero,
    Character,
    Story,
    Style,
    Result,
}

pub const STEP_COUNT: usize = 5;

impl Step {
    /// 0-based position in the wizard.
    pub fn index(self) -> usize {
        match self {
            Step::Hero => 0,
            Step::Character => 1,
            Step::Story => 2,
            Step::Style => 3,
            Step::Result => 4,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub step: Step,
    pub character: CharacterDefinition,
    pub raw_story: String,
    pub scenes: Vec<Scene>,
    pub selected_style: Option<String>,
    pub is_generating: bool,
}

impl Session {
    pub fn with_scenes(&self, scenes: Vec<Scene>) -> Self {
        Self {
            scenes,
            ..self.clone()
        }
    }

    pub fn scenes_ready(&self) -> bool {
        !self.scenes.is_empty() && self.scenes.iter().all(Scene::has_script)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Next,
    Back,
    Restart,
    SetCharacterMode(CharacterMode),
    SetCharacterImage(String),
    RemoveCharacterImage,
    SetCharacterDescription(String),
    SetRawStory(String),
    AddScene,
    UpdateScene { id: String, description: String },
    RemoveScene(String),
    ReplaceScenes(Vec<String>),
    ClearScenes,
    SelectStyle(String),
    RegenerateAll,
}

/// Work the caller must run after publishing the new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    GenerateAll,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("every scene needs a description before choosing a style")]
    IncompleteScenes,
    #[error("no style selected")]
    NoStyleSelected,
    #[error("unknown style: {0}")]
    UnknownStyle(String),
    #[error("{action} is not available on the {step:?} step")]
    WrongStep { action: &'static str, step: Step },
    #[error("already on the last step")]
    NoNextStep,
}

pub type Transition = (Session, Option<Effect>);

pub fn reduce(session: &Session, action: Action) -> Result<Transition, WizardError> {
    let step = session.step;
    let require = |expected: Step, name: &'static str| {
        if step == expected {
            Ok(())
        } else {
            Err(WizardError::WrongStep { action: name, step })
        }
    };

    let next = match action {
        Action::Next => return next_step(session),
        Action::Back => back_step(session),
        Action::Restart => Session::default(),

        Action::SetCharacterMode(mode) => {
            require(Step::Character, "SetCharacterMode")?;
            with_character(session, |c| c.mode = Some(mode))
        }
        Action::SetCharacterImage(image) => {
            require(Step::Character, "SetCharacterImage")?;
            with_character(session, move |c| c.image = Some(image))
        }
        Action::RemoveCharacterImage => {
            require(Step::Character, "RemoveCharacterImage")?;
            with_character(session, |c| c.image = None)
        }
        Action::SetCharacterDescription(description) => {
            require(Step::Character, "SetCharacterDescription")?;
            with_character(session, move |c| c.description = description)
        }

        Action::SetRawStory(text) => {
            require(Step::Story, "SetRawStory")?;
            Session {
                raw_story: text,
                ..session.clone()
            }
        }
        Action::AddScene => {
            require(Step::Story, "AddScene")?;
            session.with_scenes(state::append_scene(&session.scenes))
        }
        Action::UpdateScene { id, description } => {
            require(Step::Story, "UpdateScene")?;
            session.with_scenes(state::update_description(&session.scenes, &id, &description))
        }
        Action::RemoveScene(id) => {
            require(Step::Story, "RemoveScene")?;
            session.with_scenes(state::remove_scene(&session.scenes, &id))
        }
        Action::ReplaceScenes(descriptions) => {
            require(Step::Story, "ReplaceScenes")?;
            session.with_scenes(state::replace_all(&descriptions))
        }
        Action::ClearScenes => {
            require(Step::Story, "ClearScenes")?;
            session.with_scenes(Vec::new())
        }

        Action::SelectStyle(id) => {
            require(Step::Style, "SelectStyle")?;
            if find_style(&id).is_none() {
                return Err(WizardError::UnknownStyle(id));
            }
            Session {
                selected_style: Some(id),
                ..session.clone()
            }
        }

        Action::RegenerateAll => {
            require(Step::Result, "RegenerateAll")?;
            return Ok((session.clone(), Some(Effect::GenerateAll)));
        }
    };

    Ok((next, None))
}

fn with_character(session: &Session, edit: impl FnOnce(&mut CharacterDefinition)) -> Session {
    let mut character = session.character.clone();
    edit(&mut character);
    Session {
        character,
        ..session.clone()
    }
}

fn at(session: &Session, step: Step) -> Session {
    Session {
        step,
        ..session.clone()
    }
}

fn next_step(session: &Session) -> Result<Transition, WizardError> {
    match session.step {
        Step::Hero => Ok((at(session, Step::Character), None)),
        Step::Character => Ok((at(session, Step::Story), None)),
        Step::Story => {
            if !session.scenes_ready() {
                return Err(WizardError::IncompleteScenes);
            }
            Ok((at(session, Step::Style), None))
        }
        Step::Style => {
            let id = session
                .selected_style
                .as_deref()
                .ok_or(WizardError::NoStyleSelected)?;
            if find_style(id).is_none() {
                return Err(WizardError::UnknownStyle(id.to_string()));
            }
            Ok((at(session, Step::Result), Some(Effect::GenerateAll)))
        }
        Step::Result => Err(WizardError::NoNextStep),
    }
}

fn back_step(session: &Session) -> Session {
    match session.step {
        Step::Hero => session.clone(),
        Step::Character => at(session, Step::Hero),
        Step::Story => at(session, Step::Character),
        Step::Style => at(session, Step::Story),
        Step::Result => Session {
            step: Step::Style,
            scenes: state::clear_generated(&session.scenes),
            is_generating: false,
            ..session.clone()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(session: &Session, action: Action) -> Session {
        reduce(session, action).unwrap().0
    }

    fn on_story(descriptions: &[&str]) -> Session {
        let s = apply(&Session::default(), Action::Next);
        let s = apply(&s, Action::Next);
        apply(&s, Action::ReplaceScenes(descriptions.iter().map(|d| d.to_string()).collect()))
    }

    #[test]
    fn test_step_index_follows_forward_path() {
        let mut s = on_story(&["Sarah logs in."]);
        assert_eq!(Step::Hero.index(), 0);
        assert_eq!(s.step.index(), 2);

        s = apply(&s, Action::Next);
        s = apply(&s, Action::SelectStyle("comic".to_string()));
        s = apply(&s, Action::Next);
        assert_eq!(s.step.index() + 1, STEP_COUNT);
    }

    #[test]
    fn test_forward_path_to_result_triggers_generation() {
        let s = on_story(&["Sarah logs in."]);
        assert_eq!(s.step, Step::Story);

        let s = apply(&s, Action::Next);
        assert_eq!(s.step, Step::Style);

        let s = apply(&s, Action::SelectStyle("doodle".to_string()));
        let (s, effect) = reduce(&s, Action::Next).unwrap();
        assert_eq!(s.step, Step::Result);
        assert_eq!(effect, Some(Effect::GenerateAll));

        assert_eq!(reduce(&s, Action::Next).unwrap_err(), WizardError::NoNextStep);
    }

    #[test]
    fn test_story_guard_rejects_blank_descriptions() {
        let s = on_story(&["Sarah logs in.", "   "]);
        assert_eq!(reduce(&s, Action::Next).unwrap_err(), WizardError::IncompleteScenes);
        assert_eq!(s.step, Step::Story);

        let empty = on_story(&[]);
        assert_eq!(reduce(&empty, Action::Next).unwrap_err(), WizardError::IncompleteScenes);
    }

    #[test]
    fn test_style_guard() {
        let s = apply(&on_story(&["a"]), Action::Next);
        assert_eq!(reduce(&s, Action::Next).unwrap_err(), WizardError::NoStyleSelected);
        assert_eq!(
            reduce(&s, Action::SelectStyle("oil".to_string())).unwrap_err(),
            WizardError::UnknownStyle("oil".to_string())
        );
    }

    #[test]
    fn test_leaving_result_clears_generated_state() {
        let s = apply(&on_story(&["a", "b"]), Action::Next);
        let s = apply(&s, Action::SelectStyle("comic".to_string()));
        let s = apply(&s, Action::Next);

        let generated = s.with_scenes(vec![
            s.scenes[0].succeeded("data:image/png;base64,AA".to_string()),
            s.scenes[1].pending(false).failed("boom", false),
        ]);

        let back = apply(&generated, Action::Back);
        assert_eq!(back.step, Step::Style);
        assert!(back
            .scenes
            .iter()
            .all(|sc| sc.image_url.is_none() && sc.error.is_none() && !sc.is_generating));
        assert_eq!(back.scenes[0].id, generated.scenes[0].id);
        assert_eq!(back.selected_style.as_deref(), Some("comic"));
    }

    #[test]
    fn test_back_is_always_permitted() {
        let s = on_story(&["a"]);
        let s = apply(&s, Action::Back);
        assert_eq!(s.step, Step::Character);
        let s = apply(&s, Action::Back);
        assert_eq!(s.step, Step::Hero);
        let s = apply(&s, Action::Back);
        assert_eq!(s.step, Step::Hero);
    }

    #[test]
    fn test_restart_resets_everything() {
        let s = apply(&Session::default(), Action::Next);
        let s = apply(&s, Action::SetCharacterDescription("red hoodie".to_string()));
        let s = apply(&s, Action::Next);
        let s = apply(&s, Action::SetRawStory("story".to_string()));

        let restarted = apply(&s, Action::Restart);
        assert_eq!(restarted, Session::default());
    }

    #[test]
    fn test_character_edits() {
        let s = apply(&Session::default(), Action::Next);
        let s = apply(&s, Action::SetCharacterMode(CharacterMode::Upload));
        let s = apply(&s, Action::SetCharacterImage("data:image/png;base64,AA".to_string()));
        let s = apply(&s, Action::SetCharacterDescription("glasses".to_string()));
        assert_eq!(s.character.mode, Some(CharacterMode::Upload));
        assert!(s.character.reference_image().is_some());

        let s = apply(&s, Action::RemoveCharacterImage);
        assert!(s.character.image.is_none());
        assert_eq!(s.character.description, "glasses");

        // The character persists unchanged through later stages.
        let later = apply(&s, Action::Next);
        assert_eq!(later.character, s.character);
    }

    #[test]
    fn test_edits_rejected_on_wrong_step() {
        let s = Session::default();
        assert!(matches!(
            reduce(&s, Action::SetCharacterDescription("x".to_string())),
            Err(WizardError::WrongStep { step: Step::Hero, .. })
        ));
        assert!(matches!(
            reduce(&s, Action::AddScene),
            Err(WizardError::WrongStep { .. })
        ));
        assert!(matches!(
            reduce(&s, Action::RegenerateAll),
            Err(WizardError::WrongStep { .. })
        ));
    }

    #[test]
    fn test_scene_editing_on_story_step() {
        let s = on_story(&["one"]);
        let s = apply(&s, Action::AddScene);
        assert_eq!(s.scenes.len(), 2);
        let id = s.scenes[1].id.clone();

        let s = apply(
            &s,
            Action::UpdateScene {
                id: id.clone(),
                description: "two".to_string(),
            },
        );
        assert_eq!(s.scenes[1].description, "two");

        let s = apply(&s, Action::RemoveScene(s.scenes[0].id.clone()));
        assert_eq!(s.scenes.len(), 1);
        assert_eq!(s.scenes[0].id, id);

        let s = apply(&s, Action::ClearScenes);
        assert!(s.scenes.is_empty());
    }

    #[test]
    fn test_reduce_does_not_mutate_input() {
        let s = on_story(&["a"]);
        let before = s.clone();
        let _ = reduce(&s, Action::AddScene).unwrap();
        assert_eq!(s, before);
    }
}
