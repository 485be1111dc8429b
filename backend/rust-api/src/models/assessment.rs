use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use super::knowledge::Difficulty;

pub const DEFAULT_NUM_QUESTIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
}

/// Question as returned by the question-generation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub text: String,
    #[serde(rename = "type", default = "default_question_type")]
    pub question_type: String,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    pub correct_answer: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

fn default_question_type() -> String {
    "multiple-choice".to_string()
}

/// Stored question, answer key included.
///
/// `question_id` is internal; callers only ever see `public_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    pub public_id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub options: Vec<QuestionOption>,
    pub correct_answer: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

impl From<GeneratedQuestion> for Question {
    fn from(generated: GeneratedQuestion) -> Self {
        Question {
            question_id: Uuid::new_v4().to_string(),
            public_id: Uuid::new_v4().to_string(),
            text: generated.text,
            question_type: generated.question_type,
            options: generated.options,
            correct_answer: generated.correct_answer,
            explanation: generated.explanation,
            topic: generated.topic,
            difficulty: generated.difficulty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub assessment_id: String,
    pub user_id: String,
    pub course_id: String,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: AssessmentStatus,
}

impl Assessment {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn find_question(&self, public_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.public_id == public_id)
    }

    /// Caller-facing copy without answer keys or explanations.
    pub fn redacted(&self) -> AssessmentView {
        AssessmentView {
            assessment_id: self.assessment_id.clone(),
            questions: self
                .questions
                .iter()
                .map(|q| QuestionView {
                    question_id: q.public_id.clone(),
                    text: q.text.clone(),
                    question_type: q.question_type.clone(),
                    options: q.options.clone(),
                })
                .collect(),
            expires_at: self.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub question_id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub options: Vec<QuestionOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentView {
    pub assessment_id: String,
    pub questions: Vec<QuestionView>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssessmentQuery {
    #[serde(default = "default_num_questions")]
    #[validate(range(min = 5, max = 30, message = "Number of questions must be between 5 and 30"))]
    pub num_questions: u32,
}

fn default_num_questions() -> u32 {
    DEFAULT_NUM_QUESTIONS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: String,
    pub answer_data: Value,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAssessmentRequest {
    pub assessment_id: String,
    #[validate(length(min = 1, message = "No answers provided"))]
    pub answers: Vec<AnswerSubmission>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub is_correct: bool,
    pub correct_answer: Value,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub result_id: String,
    pub assessment_id: String,
    pub user_id: String,
    pub score: f64,
    pub question_results: Vec<QuestionResult>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub message: String,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResponse {
    pub result_id: String,
    pub score: f64,
    pub question_results: Vec<QuestionResult>,
    pub feedback: Feedback,
}
