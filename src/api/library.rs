//! Endpoints de biblioteca: historial, favoritos y playlists.

use crate::api::AppState;
use crate::error::ApiError;
use crate::sources::TrackDescriptor;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

/// El historial expone sólo las 20 reproducciones más recientes.
const HISTORY_VIEW_LIMIT: usize = 20;

pub async fn history(State(state): State<AppState>) -> Json<Value> {
    let storage = state.storage.lock().await;
    Json(json!({ "history": storage.history(HISTORY_VIEW_LIMIT) }))
}

pub async fn track_play(
    State(state): State<AppState>,
    Json(track): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let track: TrackDescriptor = serde_json::from_value(track)
        .map_err(|_| ApiError::BadRequest("Invalid track data".to_string()))?;

    if track.video_id.is_empty() {
        return Err(ApiError::BadRequest("Invalid track data".to_string()));
    }

    info!("📜 Historial: {}", track.title);
    let mut storage = state.storage.lock().await;
    storage
        .add_to_history(track)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({ "success": true })))
}

pub async fn favorites(State(state): State<AppState>) -> Json<Value> {
    let storage = state.storage.lock().await;
    Json(json!({ "favorites": storage.favorites() }))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    Json(track): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let track: TrackDescriptor = serde_json::from_value(track)
        .map_err(|_| ApiError::BadRequest("Invalid track".to_string()))?;

    if track.video_id.is_empty() {
        return Err(ApiError::BadRequest("Invalid track".to_string()));
    }

    let mut storage = state.storage.lock().await;
    let is_favorite = storage
        .toggle_favorite(track)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "isFavorite": is_favorite,
        "favorites": storage.favorites(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreatePlaylistBody {
    name: Option<String>,
}

pub async fn playlists(State(state): State<AppState>) -> Json<Value> {
    let storage = state.storage.lock().await;
    Json(json!({ "playlists": storage.playlists() }))
}

pub async fn create_playlist(
    State(state): State<AppState>,
    Json(body): Json<CreatePlaylistBody>,
) -> Result<Json<Value>, ApiError> {
    let name = body
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Name required".to_string()))?;

    let mut storage = state.storage.lock().await;
    let playlist = storage
        .create_playlist(name)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({ "success": true, "playlist": playlist })))
}

pub async fn add_to_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
    Json(track): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let track: TrackDescriptor = serde_json::from_value(track)
        .map_err(|_| ApiError::BadRequest("Invalid track".to_string()))?;

    let mut storage = state.storage.lock().await;
    let playlist = storage
        .add_to_playlist(&playlist_id, track)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Playlist not found".to_string()))?;

    Ok(Json(json!({ "success": true, "playlist": playlist })))
}

pub async fn remove_from_playlist(
    State(state): State<AppState>,
    Path((playlist_id, video_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let mut storage = state.storage.lock().await;
    let playlist = storage
        .remove_from_playlist(&playlist_id, &video_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Playlist not found".to_string()))?;

    Ok(Json(json!({ "success": true, "playlist": playlist })))
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut storage = state.storage.lock().await;
    storage
        .delete_playlist(&playlist_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({ "success": true })))
}
