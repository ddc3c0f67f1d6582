use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

mod api;
mod cache;
mod config;
mod error;
mod lyrics;
mod sources;
mod storage;

use crate::api::AppState;
use crate::cache::{AudioCache, ExploreCache, EXPLORE_CATEGORIES};
use crate::config::Config;
use crate::lyrics::LyricsResolver;
use crate::sources::YtDlpClient;
use crate::storage::JsonStorage;

/// Cada cuánto se barren las entradas de letras expiradas.
const LYRICS_SWEEP_INTERVAL: std::time::Duration =
    std::time::Duration::from_secs(24 * 60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_stream=debug".parse()?),
        )
        .init();

    info!("🎵 Iniciando Open Stream v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    // Construir servicios (estado inyectado, nada a nivel de módulo)
    let ytdlp = Arc::new(YtDlpClient::new(
        config.ytdlp_path.clone(),
        config.extract_timeout,
    ));
    if let Err(e) = ytdlp.verify().await {
        error!("❌ {}", e);
        anyhow::bail!("yt-dlp es imprescindible para arrancar");
    }

    let audio_cache = Arc::new(AudioCache::new(config.cache_dir.clone()));
    let explore_cache = Arc::new(ExploreCache::new());
    let lyrics = Arc::new(LyricsResolver::new(
        Arc::clone(&ytdlp),
        config.lyrics_cache_dir(),
        config.genius_api_token.clone(),
        config.openai_api_key.clone(),
    ));
    let storage = Arc::new(tokio::sync::Mutex::new(
        JsonStorage::new(config.data_dir.clone()).await?,
    ));

    let state = AppState {
        config: Arc::clone(&config),
        ytdlp: Arc::clone(&ytdlp),
        audio_cache,
        explore_cache: Arc::clone(&explore_cache),
        lyrics: Arc::clone(&lyrics),
        storage,
    };

    // Pre-carga de Explore en segundo plano
    if config.explore_prefetch {
        tokio::spawn(prefetch_explore(Arc::clone(&ytdlp), explore_cache));
    }

    // Limpieza de letras expiradas: una al arrancar y luego cada 24h
    tokio::spawn(lyrics_sweep_loop(Arc::clone(&lyrics)));

    // Arrancar servidor
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ No se pudo enlazar el puerto {}: {}", config.port, e);
        e
    })?;

    info!("🚀 Servidor escuchando en http://localhost:{}", config.port);
    info!("   GET  /stream?url=<youtube_url>");
    info!("   GET  /metadata?url=<youtube_url>");
    info!("   GET  /search?q=<search_query>");
    info!("   GET  /lyrics?videoId&title&artist&duration");
    info!("   GET  /health");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Error al registrar Ctrl+C: {}", e);
        return;
    }
    info!("⚠️ Señal de shutdown recibida, cerrando...");
}

/// Rellena la caché de Explore categoría a categoría.
///
/// Los fallos por categoría se registran y no detienen el resto: la
/// primera petición real rellenará lo que falte.
async fn prefetch_explore(ytdlp: Arc<YtDlpClient>, cache: Arc<ExploreCache>) {
    info!("📦 Pre-cargando categorías de Explore...");

    for category in EXPLORE_CATEGORIES {
        match ytdlp.search(category.query, 25).await {
            Ok(results) => {
                info!(
                    "📦 Cacheadas {} pistas para \"{}\"",
                    results.len(),
                    category.id
                );
                cache.insert(category.id, results);
            }
            Err(e) => warn!("Pre-carga de \"{}\" falló: {}", category.id, e),
        }
    }

    info!("📦 Pre-carga de Explore completa ({} categorías)", cache.len());
}

async fn lyrics_sweep_loop(lyrics: Arc<LyricsResolver>) {
    let mut interval = tokio::time::interval(LYRICS_SWEEP_INTERVAL);

    loop {
        interval.tick().await;
        match lyrics.cache().clean_expired().await {
            Ok(removed) => {
                info!("🗑️ Barrido de letras: {} entradas expiradas eliminadas", removed)
            }
            Err(e) => warn!("Barrido de caché de letras falló: {}", e),
        }
    }
}

async fn health_check(config: &Config) -> Result<()> {
    let ytdlp = YtDlpClient::new(config.ytdlp_path.clone(), config.extract_timeout);
    ytdlp.verify().await?;
    info!("✅ Health check OK");
    Ok(())
}
