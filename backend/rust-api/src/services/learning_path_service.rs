use anyhow::Context;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::ResponseCache;
use crate::llm::{complete_json, recover, CompletionClient, GenerationParams};
use crate::metrics::{record_cache_hit, record_cache_miss};
use crate::models::content::{most_recent, ContentItem, Course, Module};
use crate::models::learning_path::{FocusArea, LearningPath, PathContentItem, PathModule};
use crate::store::LearningStore;

const PATH_PARAMS: GenerationParams = GenerationParams::new(0.7, 1000);
const CACHE_TTL: u64 = 300; // 5 minutes
const PROMPT_ITEMS_PER_MODULE: usize = 5;
const PROMPT_HISTORY: usize = 10;
const HOURS_PER_MODULE: usize = 2;

#[derive(Debug, Error)]
pub enum LearningPathError {
    #[error("Course not found")]
    CourseNotFound,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub struct LearningPathService {
    store: Arc<dyn LearningStore>,
    completion: Arc<dyn CompletionClient>,
    cache: Arc<dyn ResponseCache>,
}

struct CourseOutline {
    course: Course,
    modules: Vec<Module>,
    content: BTreeMap<String, Vec<ContentItem>>,
}

impl LearningPathService {
    pub fn new(
        store: Arc<dyn LearningStore>,
        completion: Arc<dyn CompletionClient>,
        cache: Arc<dyn ResponseCache>,
    ) -> Self {
        Self {
            store,
            completion,
            cache,
        }
    }

    /// Personalised path through a course (cache → completion → fallback).
    pub async fn learning_path(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<LearningPath, LearningPathError> {
        let cache_key = format!("learning_path:{}:{}", user_id, course_id);
        if let Some(path) = self.cached(&cache_key).await {
            return Ok(path);
        }

        let preferences = self
            .store
            .user_preferences(user_id)
            .await
            .context("Failed to load learning preferences")?
            .unwrap_or_default();
        let progress = self
            .store
            .user_progress(user_id)
            .await
            .context("Failed to load progress")?;

        let course = self
            .store
            .course(course_id)
            .await
            .context("Failed to load course")?
            .ok_or(LearningPathError::CourseNotFound)?;
        let outline = self.outline(course).await?;

        let quiz_results = self
            .store
            .quiz_submissions(user_id)
            .await
            .context("Failed to load quiz results")?;

        // Progress rows carry no timestamp; the last stored are the latest
        let recent_progress: Vec<_> = progress.iter().rev().take(PROMPT_HISTORY).collect();
        let recent_quizzes = most_recent(&quiz_results, PROMPT_HISTORY);
        let prompt = path_prompt(
            &json!(preferences),
            &json!(recent_progress),
            &outline,
            &json!(recent_quizzes),
        );
        let result =
            complete_json::<LearningPath>(self.completion.as_ref(), &prompt, PATH_PARAMS).await;
        let path = recover(result, "learning_path", |_| fallback_path(&outline));

        self.store_in_cache(&cache_key, &path).await;

        tracing::info!(
            "Learning path generated for user={} course={} ({} modules)",
            user_id,
            course_id,
            path.recommended_sequence.len()
        );
        Ok(path)
    }

    async fn outline(&self, course: Course) -> anyhow::Result<CourseOutline> {
        let modules = self
            .store
            .modules_for_course(&course.course_id)
            .await
            .context("Failed to load course modules")?;

        let mut content = BTreeMap::new();
        for module in &modules {
            let items = self
                .store
                .content_for_module(&module.module_id)
                .await
                .context("Failed to load module content")?;
            content.insert(module.module_id.clone(), items);
        }

        Ok(CourseOutline {
            course,
            modules,
            content,
        })
    }

    async fn cached(&self, key: &str) -> Option<LearningPath> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(path) => {
                    record_cache_hit();
                    tracing::debug!("Learning path cache hit: {}", key);
                    Some(path)
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable cached learning path {}: {}", key, e);
                    record_cache_miss();
                    None
                }
            },
            Ok(None) => {
                record_cache_miss();
                None
            }
            Err(e) => {
                tracing::warn!("Learning path cache read failed: {:#}", e);
                None
            }
        }
    }

    async fn store_in_cache(&self, key: &str, path: &LearningPath) {
        let raw = match serde_json::to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to serialize learning path for cache: {}", e);
                return;
            }
        };
        if let Err(e) = self.cache.set_ex(key, &raw, CACHE_TTL).await {
            tracing::warn!("Failed to cache learning path: {:#}", e);
        }
    }
}

fn path_prompt(
    preferences: &Value,
    progress: &Value,
    outline: &CourseOutline,
    quiz_results: &Value,
) -> String {
    let module_content: BTreeMap<&str, Vec<&ContentItem>> = outline
        .content
        .iter()
        .map(|(id, items)| {
            let shown = items.iter().take(PROMPT_ITEMS_PER_MODULE).collect();
            (id.as_str(), shown)
        })
        .collect();

    format!(
        r#"Based on the user's learning preferences: {preferences}
Their progress data: {progress}
The course details: {course}
The course modules: {modules}
The content in each module: {content}
And their quiz results: {quiz_results}

Generate a personalized learning path for the user in JSON format with the following structure:
{{
  "recommended_sequence": [
    {{
      "module_id": "id of the module",
      "title": "title of the module",
      "content_items": [
        {{
          "content_id": "id of the content item",
          "title": "title of the content item",
          "type": "type of content",
          "priority": "high|medium|low",
          "reason": "reason for recommendation"
        }}
      ]
    }}
  ],
  "focus_areas": [
    {{
      "topic": "topic name",
      "reason": "reason this is a focus area"
    }}
  ],
  "estimated_completion_time": "estimated time to complete in hours",
  "learning_strategy": "recommended learning strategy based on preferences"
}}

Consider:
1. The user's learning style and preferences
2. Their current progress in the course
3. Areas where they've struggled (based on quiz results)
4. A logical sequence through the course modules
5. Prioritizing content that matches their preferred learning format

Respond with ONLY the JSON object, no additional text."#,
        course = json!(outline.course),
        modules = json!(outline.modules),
        content = json!(module_content),
    )
}

fn fallback_path(outline: &CourseOutline) -> LearningPath {
    let mut modules: Vec<&Module> = outline.modules.iter().collect();
    modules.sort_by_key(|m| m.sequence_number);

    let recommended_sequence = modules
        .into_iter()
        .map(|module| PathModule {
            module_id: module.module_id.clone(),
            title: module.title.clone(),
            content_items: outline
                .content
                .get(&module.module_id)
                .map(|items| {
                    items
                        .iter()
                        .map(|item| PathContentItem {
                            content_id: item.content_id.clone(),
                            title: item.title.clone(),
                            content_type: item.content_type().to_string(),
                            priority: "medium".to_string(),
                            reason: "Part of the standard course sequence".to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect();

    LearningPath {
        recommended_sequence,
        focus_areas: vec![FocusArea {
            topic: "Course fundamentals".to_string(),
            reason: "Building a strong foundation is essential".to_string(),
        }],
        estimated_completion_time: format!("{} hours", outline.modules.len() * HOURS_PER_MODULE),
        learning_strategy: "Follow the course modules in sequence".to_string(),
    }
}
