#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use learning_platform_api::{
    cache::MemoryCache,
    config::Config,
    create_router,
    llm::{CollaboratorError, CompletionClient, GenerationParams},
    middlewares::auth::{JwtClaims, JwtService},
    models::content::{ContentBody, ContentItem, Course, Module},
    services::AppState,
    store::MemoryStore,
};

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

/// Completion client that answers prompts containing a registered marker
/// and fails every other call with a transport error.
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<Vec<(String, String)>>,
    calls: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn reply_when(&self, marker: &str, reply: &str) {
        self.replies
            .lock()
            .unwrap()
            .push((marker.to_string(), reply.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(
        &self,
        prompt: &str,
        _params: GenerationParams,
    ) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, reply)| reply.clone())
            .ok_or_else(|| CollaboratorError::Transport("model offline".to_string()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub completion: Arc<ScriptedCompletion>,
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        user_id: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.send(method, uri, user_id.map(token_for), body).await
    }

    /// Same as `request`, but the token carries `role` instead of learner.
    pub async fn request_as(
        &self,
        method: &str,
        uri: &str,
        user_id: &str,
        role: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.send(method, uri, Some(token_with_role(user_id, role)), body)
            .await
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<String>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }
}

pub fn token_for(user_id: &str) -> String {
    token_with_role(user_id, "learner")
}

pub fn token_with_role(user_id: &str, role: &str) -> String {
    JwtService::new(TEST_JWT_SECRET)
        .generate_token(&JwtClaims::new(user_id, role, 3600))
        .unwrap()
}

pub fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(MemoryStore::new());
    let completion = Arc::new(ScriptedCompletion::default());
    let state = AppState::from_parts(
        Config::for_memory(TEST_JWT_SECRET),
        store.clone(),
        completion.clone(),
        Arc::new(MemoryCache::new()),
    );

    TestApp {
        router: create_router(Arc::new(state)),
        store,
        completion,
    }
}

/// Course `rust` with two modules and one video lesson in each.
pub fn seed_rust_course(store: &MemoryStore) {
    store.seed_course(Course {
        course_id: "rust".to_string(),
        title: "Rust".to_string(),
        description: Some("Systems programming".to_string()),
    });
    for (module_id, title, sequence) in [("m1", "Ownership", 1), ("m2", "Traits", 2)] {
        store.seed_module(Module {
            module_id: module_id.to_string(),
            course_id: "rust".to_string(),
            title: title.to_string(),
            sequence_number: sequence,
        });
        store.seed_content(ContentItem {
            content_id: format!("{}-video", module_id),
            module_id: module_id.to_string(),
            title: format!("{} walkthrough", title),
            body: ContentBody::Video {
                url: format!("https://videos.example/{}.mp4", module_id),
                transcript: None,
            },
        });
    }
}
