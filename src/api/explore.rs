//! Endpoints de búsqueda, metadatos y navegación.

use crate::api::AppState;
use crate::cache::explore::{find_curated, ExploreCache, CURATED_SHELVES};
use crate::error::ApiError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExploreQuery {
    category: Option<String>,
}

pub async fn metadata(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<Value>, ApiError> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing URL".to_string()))?;

    if url::Url::parse(&url).is_err() {
        return Err(ApiError::BadRequest("Invalid URL".to_string()));
    }

    info!("📋 Metadatos para: {}", url);
    let meta = state.ytdlp.fetch_metadata(&url).await.map_err(|e| {
        warn!("Metadatos fallaron para {}: {}", url, e);
        ApiError::Internal("Metadata fetch failed".to_string())
    })?;

    Ok(Json(json!(meta)))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, ApiError> {
    let q = query
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or(ApiError::MissingQuery)?;

    info!("🔍 Buscando: {}", q);
    let results = state
        .ytdlp
        .search(&q, state.config.search_limit)
        .await
        .map_err(|e| {
            warn!("Búsqueda falló para \"{}\": {}", q, e);
            ApiError::Internal("Search failed".to_string())
        })?;

    info!("🔍 {} resultados para: {}", results.len(), q);
    Ok(Json(json!({ "results": results })))
}

pub async fn trending(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    explore_category(&state, "trending").await
}

pub async fn explore(
    State(state): State<AppState>,
    Query(query): Query<ExploreQuery>,
) -> Result<Json<Value>, ApiError> {
    let category = query.category.unwrap_or_else(|| "trending".to_string());
    explore_category(&state, &category).await
}

async fn explore_category(state: &AppState, category: &str) -> Result<Json<Value>, ApiError> {
    if let Some(cached) = state.explore_cache.get(category) {
        info!("📦 Explore \"{}\" servido desde caché", category);
        return Ok(Json(json!({ "results": cached })));
    }

    let query = ExploreCache::query_for(category);
    info!("📦 Explore \"{}\" sin caché, buscando: {}", category, query);

    let results = state.ytdlp.search(query, 25).await.map_err(|e| {
        warn!("Explore \"{}\" falló: {}", category, e);
        ApiError::Internal("Server error".to_string())
    })?;

    state.explore_cache.insert(category, results.clone());
    Ok(Json(json!({ "results": results })))
}

/// Catálogo estático de playlists curadas.
pub async fn curated_playlists() -> Json<Value> {
    let mut shelves = serde_json::Map::new();
    for shelf in CURATED_SHELVES {
        shelves.insert(shelf.id.to_string(), json!(shelf.playlists));
    }

    Json(json!({ "success": true, "playlists": shelves }))
}

/// Pistas de una playlist curada, vía búsqueda cacheada.
pub async fn curated_playlist_tracks(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if let Some(cached) = state.explore_cache.get_curated(&playlist_id) {
        return Ok(Json(json!({ "success": true, "tracks": cached })));
    }

    let playlist = find_curated(&playlist_id)
        .ok_or_else(|| ApiError::NotFound("Playlist not found".to_string()))?;

    let tracks = state
        .ytdlp
        .search(playlist.query, playlist.songs as usize)
        .await
        .map_err(|e| {
            warn!("Playlist curada \"{}\" falló: {}", playlist_id, e);
            ApiError::Internal("Playlist fetch failed".to_string())
        })?;

    state.explore_cache.insert_curated(&playlist_id, tracks.clone());
    Ok(Json(json!({ "success": true, "tracks": tracks })))
}
