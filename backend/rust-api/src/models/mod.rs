pub mod assessment;
pub mod content;
pub mod content_generation;
pub mod knowledge;
pub mod learning_path;
pub mod preferences;
pub mod recommendation;
