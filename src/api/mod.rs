//! Superficie HTTP del backend.

pub mod explore;
pub mod library;
pub mod lyrics;
pub mod stream;

use crate::cache::{AudioCache, ExploreCache};
use crate::config::Config;
use crate::lyrics::LyricsResolver;
use crate::sources::YtDlpClient;
use crate::storage::JsonStorage;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

/// Estado compartido inyectado en todos los handlers.
///
/// Todas las cachés son servicios construidos una vez al arranque y
/// pasados por referencia, nunca estado ambiente a nivel de módulo.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ytdlp: Arc<YtDlpClient>,
    pub audio_cache: Arc<AudioCache>,
    pub explore_cache: Arc<ExploreCache>,
    pub lyrics: Arc<LyricsResolver>,
    pub storage: Arc<Mutex<JsonStorage>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // Streaming y extracción
        .route("/stream", get(stream::stream))
        .route("/metadata", get(explore::metadata))
        .route("/search", get(explore::search))
        // Navegación
        .route("/trending", get(explore::trending))
        .route("/explore", get(explore::explore))
        .route("/youtube-music/playlists", get(explore::curated_playlists))
        .route(
            "/youtube-music/playlist/:id",
            get(explore::curated_playlist_tracks),
        )
        // Biblioteca
        .route("/history", get(library::history))
        .route("/play", post(library::track_play))
        .route(
            "/favorites",
            get(library::favorites).post(library::toggle_favorite),
        )
        .route(
            "/playlists",
            get(library::playlists).post(library::create_playlist),
        )
        .route("/playlists/:id/add", post(library::add_to_playlist))
        .route(
            "/playlists/:id/tracks/:video_id",
            delete(library::remove_from_playlist),
        )
        .route("/playlists/:id", delete(library::delete_playlist))
        // Letras
        .route("/lyrics", get(lyrics::lyrics))
        .route("/lyrics/cache/stats", get(lyrics::cache_stats))
        .route("/lyrics/cache/clear", post(lyrics::cache_clear))
        .route("/lyrics/cache/clean", post(lyrics::cache_clean))
        // Salud
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
