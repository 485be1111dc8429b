use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::content::{ContentItem, QuizSubmission};

pub const RECOMMENDATION_TYPE_PERSONALIZED: &str = "personalized";
pub const RECOMMENDATION_STATUS_ACTIVE: &str = "active";

/// Persisted recommendation row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub recommendation_id: String,
    pub user_id: String,
    pub content_id: String,
    pub recommendation_type: String,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
    pub status: String,
}

/// Ranked entry produced by the generation stage, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationCandidate {
    pub content_id: String,
    #[serde(default)]
    pub title: String,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserData {
    pub user_id: String,
    pub learning_preferences: Map<String, Value>,
    pub completed_content: Vec<String>,
    pub quiz_results: Vec<QuizSubmission>,
    pub content_interactions: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleOutline {
    pub title: String,
    pub sequence_number: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseOutline {
    pub title: String,
    pub modules: BTreeMap<String, ModuleOutline>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentData {
    pub available_content: Vec<ContentItem>,
    pub course_structure: BTreeMap<String, CourseOutline>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningStyleInsights {
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub challenges: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentPreferences {
    #[serde(default)]
    pub preferred_formats: Vec<String>,
    #[serde(default)]
    pub engagement_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningAnalysis {
    #[serde(default)]
    pub learning_style_insights: LearningStyleInsights,
    #[serde(default)]
    pub content_preferences: ContentPreferences,
    #[serde(default)]
    pub knowledge_gaps: Vec<String>,
    #[serde(default)]
    pub recommended_learning_strategies: Vec<String>,
}

/// Shared state threaded through the recommendation pipeline.
///
/// `errors` is append-only; once non-empty every later stage is a no-op.
#[derive(Debug, Clone, Default)]
pub struct RecommendationState {
    pub user_data: UserData,
    pub content_data: ContentData,
    pub analysis: Option<LearningAnalysis>,
    pub recommendations: Vec<RecommendationCandidate>,
    pub errors: Vec<String>,
}

impl RecommendationState {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        RecommendationState {
            user_data: UserData {
                user_id: user_id.into(),
                ..UserData::default()
            },
            ..RecommendationState::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
