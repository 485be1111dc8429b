use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Extension, Json,
};
use std::sync::Arc;
use validator::Validate;

use super::ApiError;
use crate::extractors::AppJson;
use crate::middlewares::auth::JwtClaims;
use crate::models::assessment::{
    AssessmentView, CreateAssessmentQuery, EvaluationResponse, SubmitAssessmentRequest,
};
use crate::services::adaptive_assessment_service::AdaptiveAssessmentService;
use crate::services::AppState;

fn assessment_service(state: &AppState) -> AdaptiveAssessmentService {
    AdaptiveAssessmentService::new(
        state.store.clone(),
        state.questions.clone(),
        state.completion.clone(),
        state.config.assessment_ttl_hours,
    )
}

/// POST /api/v1/adaptive-assessment/create/{course_id}?num_questions=N
pub async fn create_assessment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    query: Result<Query<CreateAssessmentQuery>, QueryRejection>,
) -> Result<Json<AssessmentView>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    query.validate()?;

    let view = assessment_service(&state)
        .generate(&claims.sub, &course_id, query.num_questions)
        .await?;
    Ok(Json(view))
}

/// POST /api/v1/adaptive-assessment/submit
pub async fn submit_assessment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(payload): AppJson<SubmitAssessmentRequest>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    payload.validate()?;

    let response = assessment_service(&state)
        .evaluate(&claims.sub, &payload.assessment_id, &payload.answers)
        .await?;
    Ok(Json(response))
}
