use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::models::preferences::{LearningStyle, Preferences, UpdateLearningStyleRequest};
use crate::store::LearningStore;

const PRIMARY_STYLE: &str = "primary_style";
const SECONDARY_STYLE: &str = "secondary_style";
const PACE_PREFERENCE: &str = "pace_preference";

pub struct PreferencesService {
    store: Arc<dyn LearningStore>,
}

impl PreferencesService {
    pub fn new(store: Arc<dyn LearningStore>) -> Self {
        Self { store }
    }

    pub async fn preferences(&self, user_id: &str) -> Result<Preferences> {
        Ok(self
            .store
            .user_preferences(user_id)
            .await
            .context("Failed to load preferences")?
            .unwrap_or_default())
    }

    /// Shallow merge: keys in `update` overwrite stored keys, the rest stay.
    pub async fn update_preferences(
        &self,
        user_id: &str,
        update: Preferences,
    ) -> Result<Preferences> {
        let mut merged = self.preferences(user_id).await?;
        merged.extend(update);

        self.store
            .set_user_preferences(user_id, &merged)
            .await
            .context("Failed to update preferences")?;

        tracing::info!("Preferences updated for user {}", user_id);
        Ok(merged)
    }

    /// Learning style with defaults for missing or unreadable keys.
    pub async fn learning_style(&self, user_id: &str) -> Result<LearningStyle> {
        let preferences = self.preferences(user_id).await?;
        Ok(learning_style_from(&preferences))
    }

    pub async fn update_learning_style(
        &self,
        user_id: &str,
        request: UpdateLearningStyleRequest,
    ) -> Result<LearningStyle> {
        let mut update = Preferences::new();
        update.insert(
            PRIMARY_STYLE.to_string(),
            serde_json::to_value(request.primary_style)?,
        );
        if let Some(secondary) = request.secondary_style {
            update.insert(SECONDARY_STYLE.to_string(), serde_json::to_value(secondary)?);
        }
        if let Some(pace) = request.pace_preference {
            update.insert(PACE_PREFERENCE.to_string(), serde_json::to_value(pace)?);
        }

        let merged = self.update_preferences(user_id, update).await?;
        Ok(learning_style_from(&merged))
    }
}

fn field_or<T: DeserializeOwned>(preferences: &Preferences, key: &str, default: T) -> T {
    preferences
        .get(key)
        .cloned()
        .and_then(|v: Value| serde_json::from_value(v).ok())
        .unwrap_or(default)
}

pub fn learning_style_from(preferences: &Preferences) -> LearningStyle {
    let defaults = LearningStyle::default();
    LearningStyle {
        primary_style: field_or(preferences, PRIMARY_STYLE, defaults.primary_style),
        secondary_style: field_or(preferences, SECONDARY_STYLE, defaults.secondary_style),
        pace_preference: field_or(preferences, PACE_PREFERENCE, defaults.pace_preference),
    }
}
