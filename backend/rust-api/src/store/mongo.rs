use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    Database,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::*;
use crate::metrics::track_db_operation;

#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    user_id: String,
    #[serde(default)]
    learning_preferences: Option<Preferences>,
}

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn find_one<T>(&self, collection: &'static str, filter: Document) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + Sync + Unpin,
    {
        track_db_operation("find_one", collection, async {
            self.db
                .collection::<T>(collection)
                .find_one(filter)
                .await
                .with_context(|| format!("Failed to query {}", collection))
        })
        .await
    }

    async fn find_many<T>(
        &self,
        collection: &'static str,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + Sync + Unpin,
    {
        track_db_operation("find", collection, async {
            let coll = self.db.collection::<T>(collection);
            let cursor = match sort {
                Some(sort) => coll.find(filter).sort(sort).await,
                None => coll.find(filter).await,
            }
            .with_context(|| format!("Failed to query {}", collection))?;

            cursor
                .try_collect()
                .await
                .with_context(|| format!("{} cursor error", collection))
        })
        .await
    }

    async fn insert<T>(&self, collection: &'static str, record: &T) -> Result<()>
    where
        T: Serialize + Send + Sync,
    {
        track_db_operation("insert_one", collection, async {
            self.db
                .collection::<T>(collection)
                .insert_one(record)
                .await
                .with_context(|| format!("Failed to insert into {}", collection))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl LearningStore for MongoStore {
    async fn ping(&self) -> Result<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }

    async fn user_preferences(&self, user_id: &str) -> Result<Option<Preferences>> {
        let user: Option<UserDocument> = self.find_one(USERS, doc! { "user_id": user_id }).await?;
        Ok(user.and_then(|u| u.learning_preferences))
    }

    async fn set_user_preferences(&self, user_id: &str, preferences: &Preferences) -> Result<()> {
        let value = mongodb::bson::to_bson(preferences)
            .context("Failed to encode learning preferences")?;

        track_db_operation("update_one", USERS, async {
            self.db
                .collection::<Document>(USERS)
                .update_one(
                    doc! { "user_id": user_id },
                    doc! { "$set": { "learning_preferences": value } },
                )
                .upsert(true)
                .await
                .context("Failed to update learning preferences")?;
            Ok(())
        })
        .await
    }

    async fn user_progress(&self, user_id: &str) -> Result<Vec<UserProgress>> {
        self.find_many(USER_PROGRESS, doc! { "user_id": user_id }, None)
            .await
    }

    async fn quiz_submissions(&self, user_id: &str) -> Result<Vec<QuizSubmission>> {
        self.find_many(
            QUIZ_SUBMISSIONS,
            doc! { "user_id": user_id },
            Some(doc! { "submitted_at": 1 }),
        )
        .await
    }

    async fn course(&self, course_id: &str) -> Result<Option<Course>> {
        self.find_one(COURSES, doc! { "course_id": course_id }).await
    }

    async fn courses(&self) -> Result<Vec<Course>> {
        self.find_many(COURSES, doc! {}, None).await
    }

    async fn module(&self, module_id: &str) -> Result<Option<Module>> {
        self.find_one(MODULES, doc! { "module_id": module_id }).await
    }

    async fn modules(&self) -> Result<Vec<Module>> {
        self.find_many(MODULES, doc! {}, Some(doc! { "sequence_number": 1 }))
            .await
    }

    async fn modules_for_course(&self, course_id: &str) -> Result<Vec<Module>> {
        self.find_many(
            MODULES,
            doc! { "course_id": course_id },
            Some(doc! { "sequence_number": 1 }),
        )
        .await
    }

    async fn quiz(&self, quiz_id: &str) -> Result<Option<Quiz>> {
        self.find_one(QUIZZES, doc! { "quiz_id": quiz_id }).await
    }

    async fn content_item(&self, content_id: &str) -> Result<Option<ContentItem>> {
        self.find_one(CONTENT_ITEMS, doc! { "content_id": content_id })
            .await
    }

    async fn content_items(&self) -> Result<Vec<ContentItem>> {
        self.find_many(CONTENT_ITEMS, doc! {}, None).await
    }

    async fn content_for_module(&self, module_id: &str) -> Result<Vec<ContentItem>> {
        self.find_many(CONTENT_ITEMS, doc! { "module_id": module_id }, None)
            .await
    }

    async fn insert_assessment(&self, assessment: &Assessment) -> Result<()> {
        self.insert(ADAPTIVE_ASSESSMENTS, assessment).await
    }

    async fn assessment(&self, assessment_id: &str) -> Result<Option<Assessment>> {
        self.find_one(ADAPTIVE_ASSESSMENTS, doc! { "assessment_id": assessment_id })
            .await
    }

    async fn mark_assessment_completed(&self, assessment_id: &str) -> Result<bool> {
        track_db_operation("update_one", ADAPTIVE_ASSESSMENTS, async {
            let outcome = self
                .db
                .collection::<Document>(ADAPTIVE_ASSESSMENTS)
                .update_one(
                    doc! { "assessment_id": assessment_id, "status": "active" },
                    doc! { "$set": { "status": "completed" } },
                )
                .await
                .context("Failed to update assessment status")?;
            Ok(outcome.matched_count > 0)
        })
        .await
    }

    async fn insert_assessment_result(&self, result: &AssessmentResult) -> Result<()> {
        self.insert(ASSESSMENT_RESULTS, result).await
    }

    async fn recommendations(&self, user_id: &str) -> Result<Vec<Recommendation>> {
        self.find_many(
            AI_RECOMMENDATIONS,
            doc! { "user_id": user_id },
            Some(doc! { "created_at": 1 }),
        )
        .await
    }

    async fn delete_recommendations(&self, user_id: &str) -> Result<u64> {
        track_db_operation("delete_many", AI_RECOMMENDATIONS, async {
            let result = self
                .db
                .collection::<Document>(AI_RECOMMENDATIONS)
                .delete_many(doc! { "user_id": user_id })
                .await
                .context("Failed to delete recommendations")?;
            Ok(result.deleted_count)
        })
        .await
    }

    async fn insert_recommendation(&self, recommendation: &Recommendation) -> Result<()> {
        self.insert(AI_RECOMMENDATIONS, recommendation).await
    }
}
