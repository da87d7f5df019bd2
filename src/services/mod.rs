pub mod ai;
pub mod export;
pub mod gallery;
pub mod gemini;
pub mod orchestrator;
pub mod preview;
pub mod prompt;
pub mod storyboard;
