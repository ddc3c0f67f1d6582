//! Resolución de letras sincronizadas.
//!
//! Cadena de proveedores con prioridad fija, en orden descendente de
//! confianza en los timestamps: subtítulos automáticos de YouTube, base de
//! datos de letras sincronizadas (LRCLIB) y, como último recurso, letra
//! plana de Genius con timestamps sintetizados. Cada fallo avanza al
//! siguiente proveedor sin propagar; "no hay letra" no es un error.

pub mod cache;
pub mod captions;
pub mod genius;
pub mod lrclib;
pub mod timestamps;

use crate::sources::YtDlpClient;
use async_trait::async_trait;
use cache::LyricsCache;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Una línea de letra con su instante en segundos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    pub time: f64,
    pub text: String,
}

/// Proveedor que produjo el documento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LyricsSource {
    YoutubeCaptions,
    Lrclib,
    GeniusGenerated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsMetadata {
    pub title: String,
    pub artist: String,
    #[serde(rename = "videoId")]
    pub video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Documento normalizado que consume el cliente.
///
/// `lines` está ordenado por tiempo no-decreciente sea cual sea el
/// proveedor de origen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsDocument {
    pub lines: Vec<LyricLine>,
    pub source: LyricsSource,
    pub synced: bool,
    pub metadata: LyricsMetadata,
}

/// Petición normalizada que recibe cada proveedor.
#[derive(Debug, Clone)]
pub struct LyricsRequest {
    pub video_id: String,
    pub title: String,
    pub artist: String,
    pub duration: f64,
}

/// Contrato común de la cadena de proveedores.
///
/// `fetch` devuelve `None` ante cualquier fallo o resultado vacío; el
/// resolver simplemente avanza al siguiente proveedor.
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    fn source(&self) -> LyricsSource;

    fn note(&self) -> Option<&'static str> {
        None
    }

    async fn fetch(&self, request: &LyricsRequest) -> Option<Vec<LyricLine>>;
}

pub struct LyricsResolver {
    providers: Vec<Box<dyn LyricsProvider>>,
    cache: LyricsCache,
}

impl LyricsResolver {
    pub fn new(
        ytdlp: Arc<YtDlpClient>,
        cache_dir: PathBuf,
        genius_token: Option<String>,
        openai_key: Option<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("open-stream/1.0")
            .build()
            .expect("Failed to create HTTP client");

        let mut providers: Vec<Box<dyn LyricsProvider>> = vec![
            Box::new(captions::CaptionsProvider::new(ytdlp)),
            Box::new(lrclib::LrclibProvider::new(http.clone())),
        ];

        match genius_token {
            Some(token) => {
                providers.push(Box::new(genius::GeniusProvider::new(
                    http, token, openai_key,
                )));
            }
            None => debug!("GENIUS_API_TOKEN no configurado, Genius deshabilitado"),
        }

        Self {
            providers,
            cache: LyricsCache::new(cache_dir),
        }
    }

    #[cfg(test)]
    fn with_providers(providers: Vec<Box<dyn LyricsProvider>>, cache_dir: PathBuf) -> Self {
        Self {
            providers,
            cache: LyricsCache::new(cache_dir),
        }
    }

    pub fn cache(&self) -> &LyricsCache {
        &self.cache
    }

    /// Resuelve letras para una pista.
    ///
    /// `Ok(None)` significa "ningún proveedor tiene letra para esto", que
    /// el endpoint reporta como resultado negativo normal, no como error.
    pub async fn get_synced_lyrics(
        &self,
        video_id: &str,
        title: &str,
        artist: &str,
        duration: f64,
    ) -> anyhow::Result<Option<LyricsDocument>> {
        info!("🎵 Buscando letras: {} - {}", title, artist);

        if let Some(cached) = self.cache.get(title, artist, duration).await {
            return Ok(Some(cached));
        }

        let request = LyricsRequest {
            video_id: video_id.to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            duration,
        };

        for provider in &self.providers {
            match provider.fetch(&request).await {
                Some(lines) if !lines.is_empty() => {
                    info!(
                        "✅ Letras de {:?}: {} líneas",
                        provider.source(),
                        lines.len()
                    );

                    let doc = LyricsDocument {
                        lines,
                        source: provider.source(),
                        synced: true,
                        metadata: LyricsMetadata {
                            title: title.to_string(),
                            artist: artist.to_string(),
                            video_id: video_id.to_string(),
                            note: provider.note().map(String::from),
                        },
                    };

                    self.cache.save(title, artist, duration, &doc).await;
                    return Ok(Some(doc));
                }
                _ => debug!("Proveedor {:?} sin resultado", provider.source()),
            }
        }

        info!("❌ Ninguna fuente tiene letras para: {}", title);
        Ok(None)
    }
}

/// Limpia calificadores de títulos de YouTube: "(Lyrics)", "(Official
/// Video)", "(Audio)", corchetes, sufijo "- Topic".
pub(crate) fn clean_title(title: &str) -> anyhow::Result<String> {
    use regex::Regex;

    let mut cleaned = title.to_string();
    for pattern in [
        r"(?i)\(lyrics\)",
        r"(?i)\(official .*?\)",
        r"(?i)\(audio\)",
        r"(?i)\(video\)",
        r"(?i)\(.*?music video\)",
        r"\[.*?\]",
        r"(?i)\s+-\s+Topic$",
    ] {
        let re = Regex::new(pattern)?;
        cleaned = re.replace_all(&cleaned, "").to_string();
    }

    Ok(cleaned.trim().to_string())
}

/// Limpia convenciones de nombre de canal: "by Canal", sufijo "- Topic".
pub(crate) fn clean_artist(artist: &str) -> anyhow::Result<String> {
    use regex::Regex;

    let mut cleaned = artist.to_string();
    for pattern in [r"(?i)\s+by\s+.*$", r"(?i)\s+-\s+Topic$"] {
        let re = Regex::new(pattern)?;
        cleaned = re.replace_all(&cleaned, "").to_string();
    }

    Ok(cleaned.trim().to_string())
}

/// Separa patrones "Artista - Título" frecuentes en títulos de YouTube.
///
/// Devuelve `(artista, título)`; si no hay separador devuelve los valores
/// de entrada tal cual.
pub(crate) fn split_artist_title(title: &str, artist: &str) -> (String, String) {
    if title.contains(" - ") {
        let parts: Vec<&str> = title.split(" - ").collect();
        if parts.len() == 2 {
            return (parts[0].trim().to_string(), parts[1].trim().to_string());
        }
    }
    (artist.to_string(), title.to_string())
}
