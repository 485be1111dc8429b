//! Five-stage recommendation workflow over a shared [`RecommendationState`].
//!
//! Stages run in a fixed order. A stage that fails records an error in the
//! state instead of returning it, and every stage is skipped once an error
//! has been recorded, so nothing partial is ever persisted.

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::llm::{complete_json, recover, CompletionClient, GenerationParams};
use crate::metrics::RECOMMENDATION_PIPELINE_RUNS_TOTAL;
use crate::models::content::{most_recent, ContentItem, ProgressStatus};
use crate::models::recommendation::{
    ContentData, ContentPreferences, CourseOutline, LearningAnalysis, LearningStyleInsights,
    ModuleOutline, Recommendation, RecommendationCandidate, RecommendationState,
    RECOMMENDATION_STATUS_ACTIVE, RECOMMENDATION_TYPE_PERSONALIZED,
};
use crate::store::LearningStore;

const ANALYSIS_PARAMS: GenerationParams = GenerationParams::new(0.7, 500);
const RECOMMENDATION_PARAMS: GenerationParams = GenerationParams::new(0.7, 1000);

pub const MAX_RECOMMENDATIONS: usize = 5;
const PROMPT_QUIZ_RESULTS: usize = 5;
const PROMPT_INTERACTIONS: usize = 5;
const PROMPT_CONTENT_ITEMS: usize = 10;
const FALLBACK_REASONING: &str = "This content matches your learning preferences";
const FALLBACK_RELEVANCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchUserData,
    FetchContentData,
    AnalyzeLearningPatterns,
    GenerateRecommendations,
    SaveRecommendations,
}

pub const STAGES: [Stage; 5] = [
    Stage::FetchUserData,
    Stage::FetchContentData,
    Stage::AnalyzeLearningPatterns,
    Stage::GenerateRecommendations,
    Stage::SaveRecommendations,
];

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::FetchUserData => "fetch_user_data",
            Stage::FetchContentData => "fetch_content_data",
            Stage::AnalyzeLearningPatterns => "analyze_learning_patterns",
            Stage::GenerateRecommendations => "generate_recommendations",
            Stage::SaveRecommendations => "save_recommendations",
        }
    }

    fn failure_prefix(&self) -> &'static str {
        match self {
            Stage::FetchUserData => "Error fetching user data",
            Stage::FetchContentData => "Error fetching content data",
            Stage::AnalyzeLearningPatterns => "Error analyzing learning patterns",
            Stage::GenerateRecommendations => "Error generating recommendations",
            Stage::SaveRecommendations => "Error saving recommendations",
        }
    }
}

pub struct RecommendationPipeline {
    store: Arc<dyn LearningStore>,
    completion: Arc<dyn CompletionClient>,
}

impl RecommendationPipeline {
    pub fn new(store: Arc<dyn LearningStore>, completion: Arc<dyn CompletionClient>) -> Self {
        Self { store, completion }
    }

    /// Runs the workflow and returns the generated recommendations, or an
    /// empty list if any stage failed. Error details are only logged.
    pub async fn run(&self, user_id: &str) -> Vec<RecommendationCandidate> {
        let state = self.execute(RecommendationState::for_user(user_id)).await;

        if state.has_errors() {
            tracing::error!(
                "Errors during recommendation workflow for user {}: {:?}",
                user_id,
                state.errors
            );
            RECOMMENDATION_PIPELINE_RUNS_TOTAL
                .with_label_values(&["failed"])
                .inc();
            return Vec::new();
        }

        RECOMMENDATION_PIPELINE_RUNS_TOTAL
            .with_label_values(&["succeeded"])
            .inc();
        state.recommendations
    }

    /// Drives `state` through every stage in order.
    pub async fn execute(&self, mut state: RecommendationState) -> RecommendationState {
        for stage in STAGES {
            if state.has_errors() {
                tracing::debug!("Skipping stage {} after earlier error", stage.name());
                continue;
            }
            if let Err(e) = self.run_stage(stage, &mut state).await {
                state
                    .errors
                    .push(format!("{}: {:#}", stage.failure_prefix(), e));
            }
        }
        state
    }

    async fn run_stage(&self, stage: Stage, state: &mut RecommendationState) -> Result<()> {
        match stage {
            Stage::FetchUserData => self.fetch_user_data(state).await,
            Stage::FetchContentData => self.fetch_content_data(state).await,
            Stage::AnalyzeLearningPatterns => self.analyze_learning_patterns(state).await,
            Stage::GenerateRecommendations => self.generate_recommendations(state).await,
            Stage::SaveRecommendations => self.save_recommendations(state).await,
        }
    }

    async fn fetch_user_data(&self, state: &mut RecommendationState) -> Result<()> {
        let user_id = state.user_data.user_id.clone();

        let preferences = self
            .store
            .user_preferences(&user_id)
            .await
            .context("loading learning preferences")?;
        let progress = self
            .store
            .user_progress(&user_id)
            .await
            .context("loading progress")?;
        let quiz_results = self
            .store
            .quiz_submissions(&user_id)
            .await
            .context("loading quiz results")?;

        let data = &mut state.user_data;
        data.learning_preferences = preferences.unwrap_or_default();
        data.completed_content = progress
            .into_iter()
            .filter(|p| p.status == ProgressStatus::Completed)
            .map(|p| p.content_id)
            .collect();
        data.quiz_results = quiz_results;
        // No interaction tracking table exists yet.
        data.content_interactions = Vec::new();
        Ok(())
    }

    async fn fetch_content_data(&self, state: &mut RecommendationState) -> Result<()> {
        let available_content = self
            .store
            .content_items()
            .await
            .context("loading content items")?;
        let courses = self.store.courses().await.context("loading courses")?;
        let modules = self.store.modules().await.context("loading modules")?;

        let mut course_structure: BTreeMap<String, CourseOutline> = courses
            .into_iter()
            .map(|c| {
                (
                    c.course_id,
                    CourseOutline {
                        title: c.title,
                        modules: BTreeMap::new(),
                    },
                )
            })
            .collect();

        for module in modules {
            if let Some(course) = course_structure.get_mut(&module.course_id) {
                course.modules.insert(
                    module.module_id,
                    ModuleOutline {
                        title: module.title,
                        sequence_number: module.sequence_number,
                    },
                );
            }
        }

        state.content_data = ContentData {
            available_content,
            course_structure,
        };
        Ok(())
    }

    async fn analyze_learning_patterns(&self, state: &mut RecommendationState) -> Result<()> {
        if state.user_data.learning_preferences.is_empty() {
            return Ok(());
        }

        let prompt = analysis_prompt(state)?;
        let result = complete_json::<LearningAnalysis>(
            self.completion.as_ref(),
            &prompt,
            ANALYSIS_PARAMS,
        )
        .await;
        state.analysis = Some(recover(result, "learning_analysis", |_| fallback_analysis()));
        Ok(())
    }

    async fn generate_recommendations(&self, state: &mut RecommendationState) -> Result<()> {
        let completed: HashSet<&str> = state
            .user_data
            .completed_content
            .iter()
            .map(String::as_str)
            .collect();
        let available: Vec<&ContentItem> = state
            .content_data
            .available_content
            .iter()
            .filter(|item| !completed.contains(item.content_id.as_str()))
            .collect();

        if available.is_empty() {
            state.recommendations = Vec::new();
            return Ok(());
        }

        let prompt = recommendation_prompt(state, &available)?;
        let result = complete_json::<Vec<Value>>(
            self.completion.as_ref(),
            &prompt,
            RECOMMENDATION_PARAMS,
        )
        .await
        .map(validate_candidates);

        let recommendations = recover(result, "recommendations", |_| {
            fallback_recommendations(&available)
        });
        state.recommendations = recommendations;
        Ok(())
    }

    async fn save_recommendations(&self, state: &mut RecommendationState) -> Result<()> {
        if state.recommendations.is_empty() {
            return Ok(());
        }

        let user_id = &state.user_data.user_id;
        let removed = self
            .store
            .delete_recommendations(user_id)
            .await
            .context("clearing previous recommendations")?;

        let now = Utc::now();
        for candidate in &state.recommendations {
            let recommendation = Recommendation {
                recommendation_id: Uuid::new_v4().to_string(),
                user_id: user_id.clone(),
                content_id: candidate.content_id.clone(),
                recommendation_type: RECOMMENDATION_TYPE_PERSONALIZED.to_string(),
                reasoning: candidate.reasoning.clone(),
                created_at: now,
                status: RECOMMENDATION_STATUS_ACTIVE.to_string(),
            };
            self.store
                .insert_recommendation(&recommendation)
                .await
                .context("storing recommendation")?;
        }

        tracing::info!(
            "Recommendations replaced for user {}: removed {}, stored {}",
            user_id,
            removed,
            state.recommendations.len()
        );
        Ok(())
    }
}

fn analysis_prompt(state: &RecommendationState) -> Result<String> {
    let data = &state.user_data;
    let quiz_results = most_recent(&data.quiz_results, PROMPT_QUIZ_RESULTS);
    let interactions: Vec<_> = data
        .content_interactions
        .iter()
        .take(PROMPT_INTERACTIONS)
        .collect();

    Ok(format!(
        r#"Based on the user's learning preferences: {preferences}
Their quiz results: {quiz_results}
And their content interactions: {interactions}

Analyze their learning patterns and provide insights in JSON format with the following structure:
{{
  "learning_style_insights": {{
    "strengths": ["strength1", "strength2"],
    "challenges": ["challenge1", "challenge2"]
  }},
  "content_preferences": {{
    "preferred_formats": ["format1", "format2"],
    "engagement_patterns": ["pattern1", "pattern2"]
  }},
  "knowledge_gaps": ["gap1", "gap2"],
  "recommended_learning_strategies": ["strategy1", "strategy2"]
}}

Respond with ONLY the JSON object, no additional text."#,
        preferences = serde_json::to_string(&data.learning_preferences)?,
        quiz_results = serde_json::to_string(&quiz_results)?,
        interactions = serde_json::to_string(&interactions)?,
    ))
}

fn recommendation_prompt(state: &RecommendationState, available: &[&ContentItem]) -> Result<String> {
    let shown: Vec<_> = available.iter().take(PROMPT_CONTENT_ITEMS).collect();

    Ok(format!(
        r#"Based on the user's learning analysis: {analysis}
And the available content: {content}
Within this course structure: {structure}

Generate 5 personalized content recommendations in JSON format with the following structure:
[
  {{
    "content_id": "id of the recommended content",
    "title": "title of the content",
    "reasoning": "explanation of why this content is recommended",
    "relevance_score": a number between 0 and 1 indicating relevance
  }}
]

Prioritize content that:
1. Matches the user's preferred learning formats
2. Addresses knowledge gaps
3. Follows a logical progression in the course structure
4. Aligns with the user's learning style

Respond with ONLY the JSON array, no additional text."#,
        analysis = serde_json::to_string(&state.analysis)?,
        content = serde_json::to_string(&shown)?,
        structure = serde_json::to_string(&state.content_data.course_structure)?,
    ))
}

/// Keeps the first five entries, dropping any without `content_id` and
/// `reasoning`.
fn validate_candidates(raw: Vec<Value>) -> Vec<RecommendationCandidate> {
    raw.into_iter()
        .take(MAX_RECOMMENDATIONS)
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect()
}

pub fn fallback_analysis() -> LearningAnalysis {
    LearningAnalysis {
        learning_style_insights: LearningStyleInsights {
            strengths: vec!["visual learning".to_string()],
            challenges: vec!["time management".to_string()],
        },
        content_preferences: ContentPreferences {
            preferred_formats: vec!["video".to_string(), "interactive".to_string()],
            engagement_patterns: vec!["short sessions".to_string()],
        },
        knowledge_gaps: Vec::new(),
        recommended_learning_strategies: vec!["spaced repetition".to_string()],
    }
}

fn fallback_recommendations(available: &[&ContentItem]) -> Vec<RecommendationCandidate> {
    available
        .iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|item| RecommendationCandidate {
            content_id: item.content_id.clone(),
            title: item.title.clone(),
            reasoning: FALLBACK_REASONING.to_string(),
            relevance_score: Some(FALLBACK_RELEVANCE),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CollaboratorError;
    use crate::models::content::{ContentBody, Course, Module, QuizSubmission, UserProgress};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies with each scripted output in turn, then fails.
    struct Script {
        replies: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl Script {
        fn new(replies: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                replies,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionClient for Script {
        async fn complete(
            &self,
            _prompt: &str,
            _params: GenerationParams,
        ) -> Result<String, CollaboratorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .get(n)
                .map(|r| r.to_string())
                .ok_or(CollaboratorError::EmptyResponse)
        }
    }

    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.seed_course(Course {
            course_id: "rust".to_string(),
            title: "Rust".to_string(),
            description: None,
        });
        store.seed_module(Module {
            module_id: "m1".to_string(),
            course_id: "rust".to_string(),
            title: "Ownership".to_string(),
            sequence_number: 1,
        });
        for n in 1..=7 {
            store.seed_content(ContentItem {
                content_id: format!("c{}", n),
                module_id: "m1".to_string(),
                title: format!("Lesson {}", n),
                body: ContentBody::Text {
                    body: format!("Lesson body {}", n),
                },
            });
        }
        store.seed_progress(UserProgress {
            user_id: "u1".to_string(),
            course_id: Some("rust".to_string()),
            content_id: "c1".to_string(),
            status: ProgressStatus::Completed,
        });
        let mut prefs = serde_json::Map::new();
        prefs.insert("format".to_string(), json!("video"));
        store.seed_preferences("u1", prefs);
        store
    }

    #[test]
    fn analysis_prompt_shows_the_latest_quiz_results() {
        let mut state = RecommendationState::for_user("u1");
        let start = Utc::now();
        state.user_data.quiz_results = (0..7)
            .map(|n| QuizSubmission {
                submission_id: format!("sub-{}", n),
                user_id: "u1".to_string(),
                quiz_id: "q1".to_string(),
                score: 50.0,
                answers: Vec::new(),
                submitted_at: start + chrono::Duration::minutes(n),
            })
            .collect();

        let prompt = analysis_prompt(&state).unwrap();

        assert!(prompt.contains("sub-6"));
        assert!(prompt.contains("sub-2"));
        assert!(!prompt.contains("sub-1"));
        assert!(!prompt.contains("sub-0"));
    }

    #[tokio::test]
    async fn failed_user_fetch_short_circuits_without_writes() {
        let store = seeded_store();
        store.fail_on("user_preferences");
        let llm = Script::new(vec![]);

        let pipeline = RecommendationPipeline::new(store.clone(), llm.clone());
        let state = pipeline
            .execute(RecommendationState::for_user("u1"))
            .await;

        assert_eq!(state.errors.len(), 1);
        assert!(state.errors[0].starts_with("Error fetching user data"));
        assert!(state.content_data.available_content.is_empty());
        assert_eq!(llm.calls(), 0);
        assert_eq!(store.writes(), 0);

        assert!(pipeline.run("u1").await.is_empty());
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn failed_content_fetch_skips_remaining_stages() {
        let store = seeded_store();
        store.fail_on("modules");
        let llm = Script::new(vec![]);

        let recommendations = RecommendationPipeline::new(store.clone(), llm.clone())
            .run("u1")
            .await;

        assert!(recommendations.is_empty());
        assert_eq!(llm.calls(), 0);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn valid_output_is_filtered_and_persisted() {
        let store = seeded_store();
        let llm = Script::new(vec![
            r#"{"knowledge_gaps": ["borrowing"]}"#,
            r#"[
                {"content_id": "c2", "title": "Lesson 2", "reasoning": "Next step", "relevance_score": 0.9},
                {"content_id": "c3", "title": "No reasoning"},
                {"content_id": "c4", "reasoning": "Gap"}
            ]"#,
        ]);

        let recommendations = RecommendationPipeline::new(store.clone(), llm.clone())
            .run("u1")
            .await;

        let ids: Vec<_> = recommendations.iter().map(|r| r.content_id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c4"]);

        let stored = store.recommendations("u1").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored
            .iter()
            .all(|r| r.recommendation_type == "personalized" && r.status == "active"));
    }

    #[tokio::test]
    async fn broken_completion_falls_back_to_first_uncompleted_items() {
        let store = seeded_store();
        let llm = Script::new(vec![]);

        let pipeline = RecommendationPipeline::new(store.clone(), llm.clone());
        let state = pipeline
            .execute(RecommendationState::for_user("u1"))
            .await;

        assert!(state.errors.is_empty());
        assert_eq!(state.analysis, Some(fallback_analysis()));
        let ids: Vec<_> = state
            .recommendations
            .iter()
            .map(|r| r.content_id.as_str())
            .collect();
        assert_eq!(ids, vec!["c2", "c3", "c4", "c5", "c6"]);
        assert!(state
            .recommendations
            .iter()
            .all(|r| r.reasoning == FALLBACK_REASONING && r.relevance_score == Some(0.8)));
    }

    #[tokio::test]
    async fn rerun_replaces_previous_recommendations() {
        let store = seeded_store();
        let pipeline = RecommendationPipeline::new(store.clone(), Script::new(vec![]));

        pipeline.run("u1").await;
        pipeline.run("u1").await;

        assert_eq!(store.recommendations("u1").await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn analysis_is_skipped_without_preferences() {
        let store = seeded_store();
        store.seed_preferences("u1", serde_json::Map::new());
        let llm = Script::new(vec![r#"[{"content_id": "c5", "reasoning": "fits"}]"#]);

        let state = RecommendationPipeline::new(store.clone(), llm.clone())
            .execute(RecommendationState::for_user("u1"))
            .await;

        assert_eq!(state.analysis, None);
        assert_eq!(llm.calls(), 1);
        assert_eq!(state.recommendations.len(), 1);
    }

    #[tokio::test]
    async fn nothing_left_to_recommend_saves_nothing() {
        let store = Arc::new(MemoryStore::new());
        let llm = Script::new(vec![]);

        let recommendations = RecommendationPipeline::new(store.clone(), llm.clone())
            .run("u1")
            .await;

        assert!(recommendations.is_empty());
        assert_eq!(store.writes(), 0);
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn stages_run_in_fixed_order() {
        let names: Vec<_> = STAGES.iter().map(Stage::name).collect();
        assert_eq!(
            names,
            vec![
                "fetch_user_data",
                "fetch_content_data",
                "analyze_learning_patterns",
                "generate_recommendations",
                "save_recommendations"
            ]
        );
    }
}
