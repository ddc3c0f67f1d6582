//! Endpoints de letras y administración de su caché.

use crate::api::AppState;
use crate::error::ApiError;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Duración por defecto cuando el cliente no la conoce (3 minutos).
const DEFAULT_DURATION: f64 = 180.0;

#[derive(Debug, Deserialize)]
pub struct LyricsQuery {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
    title: Option<String>,
    artist: Option<String>,
    duration: Option<f64>,
}

pub async fn lyrics(
    State(state): State<AppState>,
    Query(query): Query<LyricsQuery>,
) -> Result<Json<Value>, ApiError> {
    let video_id = query
        .video_id
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("videoId is required".to_string()))?;

    let title = query.title.unwrap_or_else(|| "Unknown".to_string());
    let artist = query.artist.unwrap_or_else(|| "Unknown".to_string());
    let duration = query.duration.unwrap_or(DEFAULT_DURATION);

    info!("🎤 Letras pedidas: {} de {} ({})", title, artist, video_id);

    let result = state
        .lyrics
        .get_synced_lyrics(&video_id, &title, &artist, duration)
        .await
        .map_err(|e| {
            warn!("Resolución de letras falló: {}", e);
            ApiError::Internal("Failed to fetch lyrics".to_string())
        })?;

    match result {
        Some(doc) => Ok(Json(json!({ "success": true, "lyrics": doc }))),
        None => Ok(Json(json!({
            "success": false,
            "message": "No lyrics available for this track",
            "lyrics": null,
        }))),
    }
}

pub async fn cache_stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = state
        .lyrics
        .cache()
        .stats()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({ "success": true, "stats": stats })))
}

pub async fn cache_clear(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let removed = state
        .lyrics
        .cache()
        .clear_all()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Lyrics cache cleared",
        "filesDeleted": removed,
    })))
}

pub async fn cache_clean(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let removed = state
        .lyrics
        .cache()
        .clean_expired()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Expired cache entries cleaned",
        "deletedCount": removed,
    })))
}
