use axum::{extract::State, Extension, Json};
use std::sync::Arc;
use validator::Validate;

use super::ApiError;
use crate::extractors::AppJson;
use crate::middlewares::auth::{JwtClaims, AUTHOR_ROLES};
use crate::models::assessment::GeneratedQuestion;
use crate::models::content_generation::{
    ContentOutline, ContentOutlineRequest, ContentSummary, ContentSummaryRequest,
    LearningObjectives, LearningObjectivesRequest, QuizQuestionsRequest,
};
use crate::services::content_generation_service::ContentGenerationService;
use crate::services::AppState;

fn generation_service(state: &AppState) -> ContentGenerationService {
    ContentGenerationService::new(state.completion.clone(), state.questions.clone())
}

/// POST /api/v1/content-generation/quiz-questions
pub async fn quiz_questions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(request): AppJson<QuizQuestionsRequest>,
) -> Result<Json<Vec<GeneratedQuestion>>, ApiError> {
    claims.require_role(AUTHOR_ROLES)?;
    request.validate()?;

    let questions = generation_service(&state)
        .quiz_questions(&request.topic, request.difficulty, request.num_questions)
        .await;
    Ok(Json(questions))
}

/// POST /api/v1/content-generation/content-summary
pub async fn content_summary(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(request): AppJson<ContentSummaryRequest>,
) -> Result<Json<ContentSummary>, ApiError> {
    claims.require_role(AUTHOR_ROLES)?;
    request.validate()?;

    let summary = generation_service(&state)
        .summary(&request.content_text, request.max_length)
        .await;
    Ok(Json(ContentSummary { summary }))
}

/// POST /api/v1/content-generation/learning-objectives
pub async fn learning_objectives(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(request): AppJson<LearningObjectivesRequest>,
) -> Result<Json<LearningObjectives>, ApiError> {
    claims.require_role(AUTHOR_ROLES)?;
    request.validate()?;

    let objectives = generation_service(&state)
        .learning_objectives(&request.topic, request.difficulty, request.num_objectives)
        .await;
    Ok(Json(LearningObjectives { objectives }))
}

/// POST /api/v1/content-generation/content-outline
pub async fn content_outline(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(request): AppJson<ContentOutlineRequest>,
) -> Result<Json<ContentOutline>, ApiError> {
    claims.require_role(AUTHOR_ROLES)?;
    request.validate()?;

    let outline = generation_service(&state)
        .outline(&request.topic, request.num_sections)
        .await;
    Ok(Json(outline))
}
