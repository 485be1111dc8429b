use axum::{extract::State, Extension, Json};
use std::sync::Arc;

use super::ApiError;
use crate::middlewares::auth::JwtClaims;
use crate::models::recommendation::Recommendation;
use crate::services::recommendation_service::RecommendationService;
use crate::services::AppState;

pub async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    let service = RecommendationService::new(state.store.clone(), state.completion.clone());
    let recommendations = service.recommendations(&claims.sub).await?;
    Ok(Json(recommendations))
}

pub async fn refresh_recommendations(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    let service = RecommendationService::new(state.store.clone(), state.completion.clone());
    let recommendations = service.refresh(&claims.sub).await?;
    Ok(Json(recommendations))
}
