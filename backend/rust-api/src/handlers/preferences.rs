use axum::{extract::State, Extension, Json};
use std::sync::Arc;

use super::ApiError;
use crate::extractors::AppJson;
use crate::middlewares::auth::JwtClaims;
use crate::models::preferences::{LearningStyle, Preferences, UpdateLearningStyleRequest};
use crate::services::preferences_service::PreferencesService;
use crate::services::AppState;

pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Preferences>, ApiError> {
    let service = PreferencesService::new(state.store.clone());
    Ok(Json(service.preferences(&claims.sub).await?))
}

pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(update): AppJson<Preferences>,
) -> Result<Json<Preferences>, ApiError> {
    let service = PreferencesService::new(state.store.clone());
    let merged = service.update_preferences(&claims.sub, update).await?;
    Ok(Json(merged))
}

pub async fn get_learning_style(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<LearningStyle>, ApiError> {
    let service = PreferencesService::new(state.store.clone());
    Ok(Json(service.learning_style(&claims.sub).await?))
}

pub async fn update_learning_style(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(request): AppJson<UpdateLearningStyleRequest>,
) -> Result<Json<LearningStyle>, ApiError> {
    let service = PreferencesService::new(state.store.clone());
    let style = service.update_learning_style(&claims.sub, request).await?;
    Ok(Json(style))
}
