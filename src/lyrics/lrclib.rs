//! Proveedor 2: LRCLIB, base de datos de letras sincronizadas.
//!
//! Consulta por (artista, título, duración redondeada) y parsea el formato
//! LRC (`[mm:ss.xx]texto`). Un 404 es un negativo normal; cualquier otro
//! fallo se registra como warning. En ambos casos se avanza al siguiente
//! proveedor.

use super::{LyricLine, LyricsProvider, LyricsRequest, LyricsSource};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

const LRCLIB_API: &str = "https://lrclib.net/api/get";

pub struct LrclibProvider {
    http: reqwest::Client,
}

impl LrclibProvider {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
struct LrclibResponse {
    #[serde(rename = "syncedLyrics")]
    synced_lyrics: Option<String>,
}

#[async_trait]
impl LyricsProvider for LrclibProvider {
    fn source(&self) -> LyricsSource {
        LyricsSource::Lrclib
    }

    async fn fetch(&self, request: &LyricsRequest) -> Option<Vec<LyricLine>> {
        let clean_title = super::clean_title(&request.title).ok()?;
        let (derived_artist, _) = super::split_artist_title(&clean_title, &request.artist);
        let clean_artist = super::clean_artist(&derived_artist).ok()?;

        debug!(
            "🎵 Buscando en LRCLIB: \"{}\" de \"{}\"",
            clean_title, clean_artist
        );

        let duration_rounded = request.duration.round() as i64;
        let response = match self
            .http
            .get(LRCLIB_API)
            .query(&[
                ("artist_name", clean_artist.as_str()),
                ("track_name", clean_title.as_str()),
                ("duration", &duration_rounded.to_string()),
            ])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Error de red con LRCLIB: {}", e);
                return None;
            }
        };

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("Pista no encontrada en LRCLIB");
            return None;
        }
        if !response.status().is_success() {
            warn!("LRCLIB respondió {}", response.status());
            return None;
        }

        let data: LrclibResponse = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                warn!("Respuesta de LRCLIB no parseable: {}", e);
                return None;
            }
        };

        let lrc = data.synced_lyrics?;
        match parse_lrc(&lrc) {
            Ok(lines) if !lines.is_empty() => Some(lines),
            Ok(_) => None,
            Err(e) => {
                warn!("Error parseando LRC: {}", e);
                None
            }
        }
    }
}

/// Parsea letras LRC a líneas ordenadas por tiempo ascendente.
///
/// Se saltan líneas vacías y las de sólo-metadatos (`[ar:...]`, etc.).
pub fn parse_lrc(content: &str) -> anyhow::Result<Vec<LyricLine>> {
    let line_re = Regex::new(r"\[(\d+):(\d+)\.?(\d+)?\](.*)")?;

    let mut lines: Vec<LyricLine> = Vec::new();

    for raw in content.lines() {
        let Some(caps) = line_re.captures(raw) else {
            continue;
        };

        let minutes: f64 = caps[1].parse().unwrap_or(0.0);
        let seconds: f64 = caps[2].parse().unwrap_or(0.0);
        let centiseconds: f64 = caps
            .get(3)
            .map(|m| m.as_str().parse().unwrap_or(0.0))
            .unwrap_or(0.0);
        let text = caps[4].trim();

        if text.is_empty() {
            continue;
        }
        // Metadatos embebidos tipo [ar:Artista]
        if text.starts_with('[') && text.ends_with(']') {
            continue;
        }

        let time = minutes * 60.0 + seconds + centiseconds / 100.0;
        lines.push(LyricLine {
            time: (time * 100.0).round() / 100.0,
            text: text.to_string(),
        });
    }

    lines.sort_by(|a, b| a.time.total_cmp(&b.time));
    Ok(lines)
}
