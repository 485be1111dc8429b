use std::sync::Arc;

use crate::cache::{MemoryCache, RedisCache, ResponseCache};
use crate::config::{Config, StoreBackend};
use crate::llm::{CompletionClient, HostedCompletionClient};
use crate::store::{LearningStore, MemoryStore, MongoStore};

pub mod adaptive_assessment_service;
pub mod content_generation_service;
pub mod knowledge_state;
pub mod learning_path_service;
pub mod preferences_service;
pub mod question_allocator;
pub mod question_generator;
pub mod recommendation_pipeline;
pub mod recommendation_service;

use question_generator::{LlmQuestionGenerator, QuestionGenerator};

/// Collaborators shared by every request. Services are built per request
/// from these handles.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn LearningStore>,
    pub completion: Arc<dyn CompletionClient>,
    pub questions: Arc<dyn QuestionGenerator>,
    pub cache: Arc<dyn ResponseCache>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn LearningStore> = match config.store_backend {
            StoreBackend::Mongo => {
                let client = mongodb::Client::with_uri_str(&config.mongo_uri).await?;
                tracing::info!("MongoDB connected");
                Arc::new(MongoStore::new(client.database(&config.mongo_database)))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory datastore; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let cache: Arc<dyn ResponseCache> = match &config.redis_uri {
            Some(uri) => Arc::new(RedisCache::connect(uri).await?),
            None => {
                tracing::info!("No Redis URI configured, using in-process cache");
                Arc::new(MemoryCache::new())
            }
        };

        let completion: Arc<dyn CompletionClient> =
            Arc::new(HostedCompletionClient::new(&config.llm)?);
        tracing::info!(
            "Completion endpoint configured: {} ({})",
            config.llm.api_url,
            config.llm.model
        );

        Ok(Self::from_parts(config, store, completion, cache))
    }

    pub fn from_parts(
        config: Config,
        store: Arc<dyn LearningStore>,
        completion: Arc<dyn CompletionClient>,
        cache: Arc<dyn ResponseCache>,
    ) -> Self {
        let questions: Arc<dyn QuestionGenerator> =
            Arc::new(LlmQuestionGenerator::new(completion.clone()));
        Self {
            config,
            store,
            completion,
            questions,
            cache,
        }
    }
}
