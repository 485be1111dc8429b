use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::*;
use crate::models::assessment::AssessmentStatus;

#[derive(Default)]
struct Tables {
    preferences: HashMap<String, Preferences>,
    progress: Vec<UserProgress>,
    submissions: Vec<QuizSubmission>,
    courses: Vec<Course>,
    modules: Vec<Module>,
    quizzes: Vec<Quiz>,
    content: Vec<ContentItem>,
    assessments: Vec<Assessment>,
    results: Vec<AssessmentResult>,
    recommendations: Vec<Recommendation>,
}

/// In-process datastore with the same table semantics as `MongoStore`.
///
/// Operations can be forced to fail by name (the trait method name) and
/// every write is counted, which is what the service tests lean on.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failing: Mutex<HashSet<String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|p| p.into_inner())
    }

    fn check(&self, operation: &str) -> Result<()> {
        let failing = self.failing.lock().unwrap_or_else(|p| p.into_inner());
        if failing.contains(operation) {
            bail!("injected failure in {}", operation);
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    /// Makes every later call to `operation` return an error.
    pub fn fail_on(&self, operation: &str) {
        self.failing
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(operation.to_string());
    }

    /// Number of writes performed through the `LearningStore` interface.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn seed_course(&self, course: Course) {
        self.write().courses.push(course);
    }

    pub fn seed_module(&self, module: Module) {
        self.write().modules.push(module);
    }

    pub fn seed_content(&self, item: ContentItem) {
        self.write().content.push(item);
    }

    pub fn seed_quiz(&self, quiz: Quiz) {
        self.write().quizzes.push(quiz);
    }

    pub fn seed_submission(&self, submission: QuizSubmission) {
        self.write().submissions.push(submission);
    }

    pub fn seed_progress(&self, progress: UserProgress) {
        self.write().progress.push(progress);
    }

    pub fn seed_preferences(&self, user_id: &str, preferences: Preferences) {
        self.write()
            .preferences
            .insert(user_id.to_string(), preferences);
    }

    pub fn seed_assessment(&self, assessment: Assessment) {
        self.write().assessments.push(assessment);
    }

    pub fn seed_recommendation(&self, recommendation: Recommendation) {
        self.write().recommendations.push(recommendation);
    }

    pub fn assessment_results(&self) -> Vec<AssessmentResult> {
        self.read().results.clone()
    }
}

#[async_trait]
impl LearningStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.check("ping")
    }

    async fn user_preferences(&self, user_id: &str) -> Result<Option<Preferences>> {
        self.check("user_preferences")?;
        Ok(self.read().preferences.get(user_id).cloned())
    }

    async fn set_user_preferences(&self, user_id: &str, preferences: &Preferences) -> Result<()> {
        self.check("set_user_preferences")?;
        self.write()
            .preferences
            .insert(user_id.to_string(), preferences.clone());
        self.record_write();
        Ok(())
    }

    async fn user_progress(&self, user_id: &str) -> Result<Vec<UserProgress>> {
        self.check("user_progress")?;
        Ok(self
            .read()
            .progress
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn quiz_submissions(&self, user_id: &str) -> Result<Vec<QuizSubmission>> {
        self.check("quiz_submissions")?;
        Ok(self
            .read()
            .submissions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn course(&self, course_id: &str) -> Result<Option<Course>> {
        self.check("course")?;
        Ok(self
            .read()
            .courses
            .iter()
            .find(|c| c.course_id == course_id)
            .cloned())
    }

    async fn courses(&self) -> Result<Vec<Course>> {
        self.check("courses")?;
        Ok(self.read().courses.clone())
    }

    async fn module(&self, module_id: &str) -> Result<Option<Module>> {
        self.check("module")?;
        Ok(self
            .read()
            .modules
            .iter()
            .find(|m| m.module_id == module_id)
            .cloned())
    }

    async fn modules(&self) -> Result<Vec<Module>> {
        self.check("modules")?;
        let mut modules = self.read().modules.clone();
        modules.sort_by_key(|m| m.sequence_number);
        Ok(modules)
    }

    async fn modules_for_course(&self, course_id: &str) -> Result<Vec<Module>> {
        self.check("modules_for_course")?;
        let mut modules: Vec<Module> = self
            .read()
            .modules
            .iter()
            .filter(|m| m.course_id == course_id)
            .cloned()
            .collect();
        modules.sort_by_key(|m| m.sequence_number);
        Ok(modules)
    }

    async fn quiz(&self, quiz_id: &str) -> Result<Option<Quiz>> {
        self.check("quiz")?;
        Ok(self
            .read()
            .quizzes
            .iter()
            .find(|q| q.quiz_id == quiz_id)
            .cloned())
    }

    async fn content_item(&self, content_id: &str) -> Result<Option<ContentItem>> {
        self.check("content_item")?;
        Ok(self
            .read()
            .content
            .iter()
            .find(|c| c.content_id == content_id)
            .cloned())
    }

    async fn content_items(&self) -> Result<Vec<ContentItem>> {
        self.check("content_items")?;
        Ok(self.read().content.clone())
    }

    async fn content_for_module(&self, module_id: &str) -> Result<Vec<ContentItem>> {
        self.check("content_for_module")?;
        Ok(self
            .read()
            .content
            .iter()
            .filter(|c| c.module_id == module_id)
            .cloned()
            .collect())
    }

    async fn insert_assessment(&self, assessment: &Assessment) -> Result<()> {
        self.check("insert_assessment")?;
        self.write().assessments.push(assessment.clone());
        self.record_write();
        Ok(())
    }

    async fn assessment(&self, assessment_id: &str) -> Result<Option<Assessment>> {
        self.check("assessment")?;
        Ok(self
            .read()
            .assessments
            .iter()
            .find(|a| a.assessment_id == assessment_id)
            .cloned())
    }

    async fn mark_assessment_completed(&self, assessment_id: &str) -> Result<bool> {
        self.check("mark_assessment_completed")?;
        let mut tables = self.write();
        let claimed = match tables
            .assessments
            .iter_mut()
            .find(|a| a.assessment_id == assessment_id && a.status == AssessmentStatus::Active)
        {
            Some(assessment) => {
                assessment.status = AssessmentStatus::Completed;
                true
            }
            None => false,
        };
        self.record_write();
        Ok(claimed)
    }

    async fn insert_assessment_result(&self, result: &AssessmentResult) -> Result<()> {
        self.check("insert_assessment_result")?;
        self.write().results.push(result.clone());
        self.record_write();
        Ok(())
    }

    async fn recommendations(&self, user_id: &str) -> Result<Vec<Recommendation>> {
        self.check("recommendations")?;
        Ok(self
            .read()
            .recommendations
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_recommendations(&self, user_id: &str) -> Result<u64> {
        self.check("delete_recommendations")?;
        let mut tables = self.write();
        let before = tables.recommendations.len();
        tables.recommendations.retain(|r| r.user_id != user_id);
        let removed = (before - tables.recommendations.len()) as u64;
        self.record_write();
        Ok(removed)
    }

    async fn insert_recommendation(&self, recommendation: &Recommendation) -> Result<()> {
        self.check("insert_recommendation")?;
        self.write().recommendations.push(recommendation.clone());
        self.record_write();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn recommendation(user_id: &str, content_id: &str) -> Recommendation {
        Recommendation {
            recommendation_id: format!("rec-{}", content_id),
            user_id: user_id.to_string(),
            content_id: content_id.to_string(),
            recommendation_type: "personalized".to_string(),
            reasoning: "because".to_string(),
            created_at: Utc::now(),
            status: "active".to_string(),
        }
    }

    #[tokio::test]
    async fn delete_recommendations_only_touches_one_user() {
        let store = MemoryStore::new();
        store.seed_recommendation(recommendation("u1", "c1"));
        store.seed_recommendation(recommendation("u1", "c2"));
        store.seed_recommendation(recommendation("u2", "c1"));

        let removed = store.delete_recommendations("u1").await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.recommendations("u1").await.unwrap().is_empty());
        assert_eq!(store.recommendations("u2").await.unwrap().len(), 1);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn assessment_completion_is_claimed_once() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.seed_assessment(Assessment {
            assessment_id: "a1".to_string(),
            user_id: "u1".to_string(),
            course_id: "c1".to_string(),
            questions: Vec::new(),
            created_at: now,
            expires_at: now + chrono::Duration::hours(1),
            status: AssessmentStatus::Active,
        });

        assert!(store.mark_assessment_completed("a1").await.unwrap());
        assert!(!store.mark_assessment_completed("a1").await.unwrap());
        assert!(!store.mark_assessment_completed("missing").await.unwrap());
        assert_eq!(
            store.assessment("a1").await.unwrap().unwrap().status,
            AssessmentStatus::Completed
        );
    }

    #[tokio::test]
    async fn injected_failures_surface_as_errors() {
        let store = MemoryStore::new();
        store.fail_on("courses");

        assert!(store.courses().await.is_err());
        assert!(store.modules().await.is_ok());
    }

    #[tokio::test]
    async fn modules_for_course_are_ordered_by_sequence() {
        let store = MemoryStore::new();
        for (id, seq) in [("m2", 2), ("m1", 1), ("other", 0)] {
            store.seed_module(Module {
                module_id: id.to_string(),
                course_id: if id == "other" { "c2" } else { "c1" }.to_string(),
                title: id.to_uppercase(),
                sequence_number: seq,
            });
        }

        let modules = store.modules_for_course("c1").await.unwrap();
        let ids: Vec<_> = modules.iter().map(|m| m.module_id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }
}
