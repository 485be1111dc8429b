use anyhow::{Context, Result};
use std::sync::Arc;

use crate::llm::CompletionClient;
use crate::models::recommendation::Recommendation;
use crate::services::recommendation_pipeline::RecommendationPipeline;
use crate::store::LearningStore;

pub struct RecommendationService {
    store: Arc<dyn LearningStore>,
    pipeline: RecommendationPipeline,
}

impl RecommendationService {
    pub fn new(store: Arc<dyn LearningStore>, completion: Arc<dyn CompletionClient>) -> Self {
        Self {
            pipeline: RecommendationPipeline::new(store.clone(), completion),
            store,
        }
    }

    /// Stored recommendations, generating a fresh set on first access.
    pub async fn recommendations(&self, user_id: &str) -> Result<Vec<Recommendation>> {
        let stored = self.stored(user_id).await?;
        if !stored.is_empty() {
            return Ok(stored);
        }

        tracing::info!("No stored recommendations for user {}, running workflow", user_id);
        self.refresh(user_id).await
    }

    /// Regenerates the user's recommendations and returns what was stored.
    pub async fn refresh(&self, user_id: &str) -> Result<Vec<Recommendation>> {
        let generated = self.pipeline.run(user_id).await;
        if generated.is_empty() {
            return Ok(Vec::new());
        }
        self.stored(user_id).await
    }

    async fn stored(&self, user_id: &str) -> Result<Vec<Recommendation>> {
        self.store
            .recommendations(user_id)
            .await
            .context("Failed to load recommendations")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CollaboratorError, GenerationParams};
    use crate::models::content::{ContentBody, ContentItem};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;

    struct Offline;

    #[async_trait]
    impl CompletionClient for Offline {
        async fn complete(
            &self,
            _prompt: &str,
            _params: GenerationParams,
        ) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::Transport("offline".to_string()))
        }
    }

    fn store_with_content() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.seed_content(ContentItem {
            content_id: "intro".to_string(),
            module_id: "m1".to_string(),
            title: "Intro".to_string(),
            body: ContentBody::Video {
                url: "https://videos.example/intro.mp4".to_string(),
                transcript: None,
            },
        });
        store
    }

    #[tokio::test]
    async fn existing_recommendations_are_returned_without_regenerating() {
        let store = store_with_content();
        store.seed_recommendation(Recommendation {
            recommendation_id: "r1".to_string(),
            user_id: "u1".to_string(),
            content_id: "older".to_string(),
            recommendation_type: "personalized".to_string(),
            reasoning: "earlier run".to_string(),
            created_at: Utc::now(),
            status: "active".to_string(),
        });

        let service = RecommendationService::new(store.clone(), Arc::new(Offline));
        let recs = service.recommendations("u1").await.unwrap();

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].content_id, "older");
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn first_access_generates_and_stores() {
        let store = store_with_content();
        let service = RecommendationService::new(store.clone(), Arc::new(Offline));

        let recs = service.recommendations("u1").await.unwrap();

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].content_id, "intro");
        assert_eq!(store.recommendations("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_workflow_yields_empty_list() {
        let store = store_with_content();
        store.fail_on("content_items");
        let service = RecommendationService::new(store.clone(), Arc::new(Offline));

        assert!(service.refresh("u1").await.unwrap().is_empty());
    }
}
