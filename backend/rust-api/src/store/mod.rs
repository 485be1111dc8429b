//! Datastore collaborator.
//!
//! The service only ever talks to [`LearningStore`]; `MongoStore` backs
//! production deployments and `MemoryStore` backs tests and local demos.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    assessment::{Assessment, AssessmentResult},
    content::{ContentItem, Course, Module, Quiz, QuizSubmission, UserProgress},
    preferences::Preferences,
    recommendation::Recommendation,
};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

pub const USERS: &str = "users";
pub const USER_PROGRESS: &str = "user_progress";
pub const QUIZ_SUBMISSIONS: &str = "quiz_submissions";
pub const QUIZZES: &str = "quizzes";
pub const CONTENT_ITEMS: &str = "content_items";
pub const MODULES: &str = "modules";
pub const COURSES: &str = "courses";
pub const ADAPTIVE_ASSESSMENTS: &str = "adaptive_assessments";
pub const ASSESSMENT_RESULTS: &str = "assessment_results";
pub const AI_RECOMMENDATIONS: &str = "ai_recommendations";

#[async_trait]
pub trait LearningStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    // users
    async fn user_preferences(&self, user_id: &str) -> Result<Option<Preferences>>;
    async fn set_user_preferences(&self, user_id: &str, preferences: &Preferences) -> Result<()>;

    // learner activity
    async fn user_progress(&self, user_id: &str) -> Result<Vec<UserProgress>>;
    async fn quiz_submissions(&self, user_id: &str) -> Result<Vec<QuizSubmission>>;

    // catalog
    async fn course(&self, course_id: &str) -> Result<Option<Course>>;
    async fn courses(&self) -> Result<Vec<Course>>;
    async fn module(&self, module_id: &str) -> Result<Option<Module>>;
    async fn modules(&self) -> Result<Vec<Module>>;
    async fn modules_for_course(&self, course_id: &str) -> Result<Vec<Module>>;
    async fn quiz(&self, quiz_id: &str) -> Result<Option<Quiz>>;
    async fn content_item(&self, content_id: &str) -> Result<Option<ContentItem>>;
    async fn content_items(&self) -> Result<Vec<ContentItem>>;
    async fn content_for_module(&self, module_id: &str) -> Result<Vec<ContentItem>>;

    // adaptive assessments
    async fn insert_assessment(&self, assessment: &Assessment) -> Result<()>;
    async fn assessment(&self, assessment_id: &str) -> Result<Option<Assessment>>;
    /// Flips an active assessment to completed. Returns `false` when no
    /// active assessment matched, i.e. another submission got there first.
    async fn mark_assessment_completed(&self, assessment_id: &str) -> Result<bool>;
    async fn insert_assessment_result(&self, result: &AssessmentResult) -> Result<()>;

    // recommendations
    async fn recommendations(&self, user_id: &str) -> Result<Vec<Recommendation>>;
    async fn delete_recommendations(&self, user_id: &str) -> Result<u64>;
    async fn insert_recommendation(&self, recommendation: &Recommendation) -> Result<()>;
}
