//! Endpoint de streaming híbrido.
//!
//! Cache hit: sirve el blob desde disco con soporte de Range (200/206).
//! Cache miss: resuelve una URL directa con la escalera de formatos,
//! redirige al cliente (302, el reproductor sigue la redirección y hace
//! seeking contra el upstream) y lanza en paralelo una descarga de fondo
//! que puebla la caché para la siguiente petición.

use crate::api::AppState;
use crate::cache::audio::AudioCache;
use crate::error::ApiError;
use crate::sources::ExtractError;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    url: Option<String>,
}

pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or(ApiError::MissingUrl)?;

    if url::Url::parse(&url).is_err() {
        return Err(ApiError::BadRequest("Invalid URL".to_string()));
    }

    let key = AudioCache::cache_key(&url);

    // 1. Servir desde caché con soporte de seeking
    if let Some(stat) = state.audio_cache.stat(&key).await {
        let range = headers
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_range_header);

        info!("🎵 Sirviendo desde caché: {} ({} bytes)", key, stat.size);
        return serve_from_cache(&state, &key, range).await;
    }

    // 2. Stream en vivo: redirección + caché de fondo
    info!("🔎 Sin caché, resolviendo URL directa para: {}", url);
    let resolved = state.ytdlp.resolve_direct_url(&url).await.map_err(|e| match e {
        ExtractError::AllFormatsExhausted(_) => {
            error!("Todos los formatos fallaron para: {}", url);
            ApiError::NoAvailableFormats
        }
        other => ApiError::Internal(other.to_string()),
    })?;

    spawn_background_fill(&state, &key, &url, &resolved.format_used);

    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, resolved.direct_url)
        .body(Body::empty())
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn serve_from_cache(
    state: &AppState,
    key: &str,
    range: Option<(u64, u64)>,
) -> Result<Response, ApiError> {
    let read = state
        .audio_cache
        .open_read(key, range)
        .await
        .map_err(|e| match e {
            crate::cache::CacheError::InvalidRange => ApiError::RangeNotSatisfiable,
            other => ApiError::Internal(other.to_string()),
        })?;

    let len = read.end - read.start + 1;
    let body = Body::from_stream(ReaderStream::new(read.reader));

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "audio/webm")
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, len);

    builder = if range.is_some() {
        builder.status(StatusCode::PARTIAL_CONTENT).header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", read.start, read.end, read.total),
        )
    } else {
        builder.status(StatusCode::OK)
    };

    builder
        .body(body)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Lanza la descarga de fondo como tarea independiente.
///
/// Su fallo se registra y borra el artefacto parcial, pero jamás toca la
/// respuesta ya emitida al cliente. El marcador in-flight evita descargas
/// duplicadas de la misma clave ante primeras reproducciones simultáneas.
fn spawn_background_fill(state: &AppState, key: &str, url: &str, format: &str) {
    if !state.audio_cache.try_begin_fill(key) {
        info!("⏳ Descarga ya en curso para {}, no se duplica", key);
        return;
    }

    let cache = Arc::clone(&state.audio_cache);
    let ytdlp = Arc::clone(&state.ytdlp);
    let key = key.to_string();
    let url = url.to_string();
    let format = format.to_string();

    tokio::spawn(async move {
        info!("⬇️ Iniciando descarga de fondo: {}", key);
        let part = cache.part_path(&key);

        match ytdlp.download(&url, &format, &part).await {
            Ok(()) => match cache.commit(&key).await {
                Ok(()) => info!("✅ Caché de fondo completa: {}", key),
                Err(e) => {
                    warn!("Descarga de {} no promocionable: {}", key, e);
                    cache.discard(&key).await;
                }
            },
            Err(e) => {
                warn!("Descarga de fondo falló para {}: {}", key, e);
                cache.discard(&key).await;
            }
        }

        cache.finish_fill(&key);
    });
}

/// Parsea `Range: bytes=A-B` a un par inclusivo. `B` ausente significa
/// hasta el final (el lector acota contra el tamaño real).
fn parse_range_header(value: &str) -> Option<(u64, u64)> {
    let ranges = value.strip_prefix("bytes=")?;
    let (start, end) = ranges.split_once('-')?;

    let start: u64 = start.trim().parse().ok()?;
    let end: u64 = match end.trim() {
        "" => u64::MAX,
        e => e.parse().ok()?,
    };

    if end < start {
        return None;
    }
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::lyrics::LyricsResolver;
    use crate::sources::YtDlpClient;
    use crate::storage::JsonStorage;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    #[test]
    fn test_parse_range_header_closed() {
        assert_eq!(parse_range_header("bytes=0-1023"), Some((0, 1023)));
        assert_eq!(parse_range_header("bytes=500-999"), Some((500, 999)));
    }

    #[test]
    fn test_parse_range_header_open_ended() {
        assert_eq!(parse_range_header("bytes=100-"), Some((100, u64::MAX)));
    }

    #[test]
    fn test_parse_range_header_rejects_garbage() {
        assert_eq!(parse_range_header("bytes=abc-def"), None);
        assert_eq!(parse_range_header("items=0-10"), None);
        assert_eq!(parse_range_header("bytes=900-100"), None);
    }

    // --- Handler completo contra una caché real en disco ---

    /// Estado con un yt-dlp inexistente: cualquier camino que intente
    /// extraer acaba agotando la escalera de formatos.
    async fn test_state(dir: &tempfile::TempDir) -> AppState {
        let config = Arc::new(Config {
            data_dir: dir.path().join("data"),
            cache_dir: dir.path().join("cache"),
            ytdlp_path: dir.path().join("no-such-binary"),
            extract_timeout: 1,
            ..Config::default()
        });
        std::fs::create_dir_all(&config.cache_dir).unwrap();

        let ytdlp = Arc::new(YtDlpClient::new(
            config.ytdlp_path.clone(),
            config.extract_timeout,
        ));

        AppState {
            ytdlp: Arc::clone(&ytdlp),
            audio_cache: Arc::new(AudioCache::new(config.cache_dir.clone())),
            explore_cache: Arc::new(crate::cache::ExploreCache::new()),
            lyrics: Arc::new(LyricsResolver::new(
                ytdlp,
                dir.path().join("lyrics"),
                None,
                None,
            )),
            storage: Arc::new(tokio::sync::Mutex::new(
                JsonStorage::new(config.data_dir.clone()).await.unwrap(),
            )),
            config,
        }
    }

    async fn get(state: AppState, uri: &str, range: Option<&str>) -> axum::http::Response<Body> {
        let app = crate::api::router(state);
        let mut builder = Request::builder().uri(uri);
        if let Some(range) = range {
            builder = builder.header(header::RANGE, range);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_bytes(response: axum::http::Response<Body>) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    const TRACK_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[tokio::test]
    async fn test_missing_url_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let response = get(test_state(&dir).await, "/stream", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_url_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let response = get(test_state(&dir).await, "/stream?url=not-a-url", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cached_entry_served_with_range() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let key = AudioCache::cache_key(TRACK_URL);
        tokio::fs::write(state.audio_cache.entry_path(&key), b"0123456789")
            .await
            .unwrap();

        let uri = format!("/stream?url={}", TRACK_URL);
        let response = get(state, &uri, Some("bytes=2-5")).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers()[header::CONTENT_RANGE],
            "bytes 2-5/10"
        );
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "4");
        assert_eq!(body_bytes(response).await, b"2345");
    }

    #[tokio::test]
    async fn test_cached_entry_served_full_without_range() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let key = AudioCache::cache_key(TRACK_URL);
        tokio::fs::write(state.audio_cache.entry_path(&key), b"0123456789")
            .await
            .unwrap();

        let uri = format!("/stream?url={}", TRACK_URL);
        let response = get(state, &uri, None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/webm");
        assert_eq!(body_bytes(response).await, b"0123456789");
    }

    #[tokio::test]
    async fn test_zero_byte_entry_falls_through_and_exhausts_formats() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let key = AudioCache::cache_key(TRACK_URL);
        let entry = state.audio_cache.entry_path(&key);
        tokio::fs::write(&entry, b"").await.unwrap();

        let uri = format!("/stream?url={}", TRACK_URL);
        let response = get(state, &uri, None).await;

        // La entrada corrupta se auto-elimina y, sin extractor, la
        // escalera se agota con el mensaje distintivo
        assert!(!entry.exists());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_bytes(response).await,
            b"Streaming failed - no available formats"
        );
    }

    /// Escenario completo: primer /stream redirige y puebla la caché de
    /// fondo; el segundo se sirve desde disco sin volver a extraer.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_first_play_redirects_then_serves_from_cache() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");

        // Extractor falso: "-g" resuelve la URL directa; el modo descarga
        // escribe bytes en el path que sigue a "-o"
        let script = dir.path().join("fake-ytdlp");
        let body = format!(
            "#!/bin/sh\n\
             if [ \"$1\" = \"-g\" ]; then echo resolve >> {log}; echo 'https://cdn.example.com/audio'; exit 0; fi\n\
             out=\"\"; prev=\"\"\n\
             for a in \"$@\"; do if [ \"$prev\" = \"-o\" ]; then out=\"$a\"; fi; prev=\"$a\"; done\n\
             printf 'webmdata' > \"$out\"\n\
             exit 0\n",
            log = log.display()
        );
        std::fs::write(&script, body).unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let mut state = test_state(&dir).await;
        let ytdlp = Arc::new(YtDlpClient::new(script, 10));
        state.ytdlp = Arc::clone(&ytdlp);

        // Primera petición: redirección a la URL directa
        let uri = format!("/stream?url={}", TRACK_URL);
        let response = get(state.clone(), &uri, None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://cdn.example.com/audio"
        );

        // Esperar a que la descarga de fondo promocione la entrada
        let key = AudioCache::cache_key(TRACK_URL);
        let entry = state.audio_cache.entry_path(&key);
        for _ in 0..100 {
            if entry.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(entry.exists(), "la descarga de fondo no completó");

        // Segunda petición: desde disco, sin invocar de nuevo al extractor
        let response = get(state, &uri, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"webmdata");

        let resolve_calls = std::fs::read_to_string(&log).unwrap();
        assert_eq!(resolve_calls.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_in_progress_part_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;

        let key = AudioCache::cache_key(TRACK_URL);
        tokio::fs::write(state.audio_cache.part_path(&key), b"partial")
            .await
            .unwrap();

        let uri = format!("/stream?url={}", TRACK_URL);
        let response = get(state, &uri, None).await;

        // Nunca se sirve un blob a medio escribir: camino en vivo
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
