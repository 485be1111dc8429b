use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Preferences = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningStyleKind {
    Visual,
    Auditory,
    Reading,
    Kinesthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacePreference {
    Slow,
    Moderate,
    Fast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStyle {
    pub primary_style: LearningStyleKind,
    pub secondary_style: LearningStyleKind,
    pub pace_preference: PacePreference,
}

impl Default for LearningStyle {
    fn default() -> Self {
        LearningStyle {
            primary_style: LearningStyleKind::Visual,
            secondary_style: LearningStyleKind::Reading,
            pace_preference: PacePreference::Moderate,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLearningStyleRequest {
    pub primary_style: LearningStyleKind,
    #[serde(default)]
    pub secondary_style: Option<LearningStyleKind>,
    #[serde(default)]
    pub pace_preference: Option<PacePreference>,
}
