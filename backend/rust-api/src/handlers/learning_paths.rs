use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;

use super::ApiError;
use crate::middlewares::auth::JwtClaims;
use crate::models::learning_path::LearningPath;
use crate::services::learning_path_service::LearningPathService;
use crate::services::AppState;

pub async fn get_learning_path(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<Json<LearningPath>, ApiError> {
    let service = LearningPathService::new(
        state.store.clone(),
        state.completion.clone(),
        state.cache.clone(),
    );
    let path = service.learning_path(&claims.sub, &course_id).await?;
    Ok(Json(path))
}
