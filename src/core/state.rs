use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CharacterMode {
    Upload,
    Text,
    Skip,
    Auto,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
pub struct CharacterDefinition {
    pub mode: Option<CharacterMode>,
    /// Reference image as a `data:` URL.
    pub image: Option<String>,
    pub description: String,
}

impl CharacterDefinition {
    pub fn reference_image(&self) -> Option<&str> {
        self.image.as_deref().filter(|i| !i.is_empty())
    }

    /// Description with surrounding whitespace removed; blank counts as absent.
    pub fn trimmed_description(&self) -> Option<&str> {
        let d = self.description.trim();
        if d.is_empty() {
            None
        } else {
            Some(d)
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Scene {
    pub id: String,
    pub description: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_generating: bool,
    pub error: Option<String>,
}

impl Scene {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            image_url: None,
            is_generating: false,
            error: None,
        }
    }

    pub fn has_script(&self) -> bool {
        !self.description.trim().is_empty()
    }

    /// Idle with no result and no error.
    pub fn cleared(&self) -> Self {
        Self {
            image_url: None,
            is_generating: false,
            error: None,
            ..self.clone()
        }
    }

    pub fn pending(&self, keep_image: bool) -> Self {
        Self {
            image_url: if keep_image { self.image_url.clone() } else { None },
            is_generating: true,
            error: None,
            ..self.clone()
        }
    }

    pub fn succeeded(&self, image_url: String) -> Self {
        Self {
            image_url: Some(image_url),
            is_generating: false,
            error: None,
            ..self.clone()
        }
    }

    pub fn failed(&self, message: &str, keep_image: bool) -> Self {
        Self {
            image_url: if keep_image { self.image_url.clone() } else { None },
            is_generating: false,
            error: Some(message.to_string()),
            ..self.clone()
        }
    }
}

// Scene list edits. Each returns a fresh list and leaves the input untouched.

pub fn append_scene(scenes: &[Scene]) -> Vec<Scene> {
    let mut next = scenes.to_vec();
    next.push(Scene::new(""));
    next
}

pub fn update_description(scenes: &[Scene], id: &str, description: &str) -> Vec<Scene> {
    scenes
        .iter()
        .map(|s| {
            if s.id == id {
                Scene {
                    description: description.to_string(),
                    ..s.clone()
                }
            } else {
                s.clone()
            }
        })
        .collect()
}

pub fn remove_scene(scenes: &[Scene], id: &str) -> Vec<Scene> {
    scenes.iter().filter(|s| s.id != id).cloned().collect()
}

pub fn replace_all<S: AsRef<str>>(descriptions: &[S]) -> Vec<Scene> {
    descriptions.iter().map(|d| Scene::new(d.as_ref())).collect()
}

/// Applies `f` to the scene with `id`, leaving the others as they are.
pub fn map_scene(scenes: &[Scene], id: &str, f: impl Fn(&Scene) -> Scene) -> Vec<Scene> {
    scenes
        .iter()
        .map(|s| if s.id == id { f(s) } else { s.clone() })
        .collect()
}

pub fn clear_generated(scenes: &[Scene]) -> Vec<Scene> {
    scenes.iter().map(Scene::cleared).collect()
}
