use serde::{Deserialize, Serialize};
use validator::Validate;

use super::knowledge::Difficulty;

fn default_count() -> u32 {
    5
}

fn default_summary_length() -> u32 {
    500
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuizQuestionsRequest {
    #[validate(length(min = 1, message = "Topic is required"))]
    pub topic: String,
    pub difficulty: Difficulty,
    #[serde(default = "default_count")]
    #[validate(range(min = 1, max = 20, message = "Number of questions must be between 1 and 20"))]
    pub num_questions: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ContentSummaryRequest {
    #[validate(length(min = 1, message = "Content text is required"))]
    pub content_text: String,
    #[serde(default = "default_summary_length")]
    #[validate(range(
        min = 100,
        max = 2000,
        message = "Max length must be between 100 and 2000 characters"
    ))]
    pub max_length: u32,
}

/// Audience level for a course, distinct from per-question difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl CourseLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseLevel::Beginner => "beginner",
            CourseLevel::Intermediate => "intermediate",
            CourseLevel::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LearningObjectivesRequest {
    #[validate(length(min = 1, message = "Topic is required"))]
    pub topic: String,
    pub difficulty: CourseLevel,
    #[serde(default = "default_count")]
    #[validate(range(min = 1, max = 10, message = "Number of objectives must be between 1 and 10"))]
    pub num_objectives: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ContentOutlineRequest {
    #[validate(length(min = 1, message = "Topic is required"))]
    pub topic: String,
    #[serde(default = "default_count")]
    #[validate(range(min = 1, max = 10, message = "Number of sections must be between 1 and 10"))]
    pub num_sections: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSummary {
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningObjectives {
    pub objectives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineSection {
    pub title: String,
    #[serde(default)]
    pub subsections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentOutline {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub sections: Vec<OutlineSection>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quiz_request_defaults_and_bounds() {
        let request: QuizQuestionsRequest =
            serde_json::from_value(json!({"topic": "Ownership", "difficulty": "hard"})).unwrap();
        assert_eq!(request.num_questions, 5);
        assert_eq!(request.difficulty, Difficulty::Hard);
        assert!(request.validate().is_ok());

        let too_many: QuizQuestionsRequest = serde_json::from_value(
            json!({"topic": "Ownership", "difficulty": "easy", "num_questions": 21}),
        )
        .unwrap();
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn objectives_use_course_levels_not_question_difficulty() {
        let parsed = serde_json::from_value::<LearningObjectivesRequest>(
            json!({"topic": "Traits", "difficulty": "medium"}),
        );
        assert!(parsed.is_err());

        let request: LearningObjectivesRequest =
            serde_json::from_value(json!({"topic": "Traits", "difficulty": "advanced"})).unwrap();
        assert_eq!(request.difficulty, CourseLevel::Advanced);
    }

    #[test]
    fn summary_length_is_bounded() {
        let request: ContentSummaryRequest =
            serde_json::from_value(json!({"content_text": "text", "max_length": 50})).unwrap();
        assert!(request.validate().is_err());
    }
}
