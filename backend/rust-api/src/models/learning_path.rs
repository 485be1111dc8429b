use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathContentItem {
    pub content_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub priority: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathModule {
    pub module_id: String,
    pub title: String,
    #[serde(default)]
    pub content_items: Vec<PathContentItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusArea {
    pub topic: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPath {
    pub recommended_sequence: Vec<PathModule>,
    #[serde(default)]
    pub focus_areas: Vec<FocusArea>,
    #[serde(default)]
    pub estimated_completion_time: String,
    #[serde(default)]
    pub learning_strategy: String,
}
