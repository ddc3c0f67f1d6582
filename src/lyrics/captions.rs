//! Proveedor 1: subtítulos automáticos de YouTube.
//!
//! Los subtítulos llegan en WebVTT vía yt-dlp; se parsean a líneas
//! ordenadas limpiando marcado, anotaciones entre corchetes ("[Music]") y
//! notas musicales, y colapsando repeticiones consecutivas idénticas.

use super::{LyricLine, LyricsProvider, LyricsRequest, LyricsSource};
use crate::sources::YtDlpClient;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct CaptionsProvider {
    ytdlp: Arc<YtDlpClient>,
}

impl CaptionsProvider {
    pub fn new(ytdlp: Arc<YtDlpClient>) -> Self {
        Self { ytdlp }
    }
}

#[async_trait]
impl LyricsProvider for CaptionsProvider {
    fn source(&self) -> LyricsSource {
        LyricsSource::YoutubeCaptions
    }

    async fn fetch(&self, request: &LyricsRequest) -> Option<Vec<LyricLine>> {
        debug!("🎵 Buscando subtítulos de YouTube para: {}", request.video_id);

        let vtt = self.ytdlp.fetch_captions(&request.video_id).await?;

        match parse_vtt(&vtt) {
            Ok(lines) if !lines.is_empty() => Some(lines),
            Ok(_) => None,
            Err(e) => {
                warn!("Error parseando VTT de {}: {}", request.video_id, e);
                None
            }
        }
    }
}

/// Convierte un timestamp WebVTT ("00:01:23.456" o "01:23.456") a segundos.
pub(crate) fn parse_timestamp(timestamp: &str) -> f64 {
    let parts: Vec<&str> = timestamp.split(':').collect();
    match parts.len() {
        3 => {
            let hours: f64 = parts[0].parse().unwrap_or(0.0);
            let minutes: f64 = parts[1].parse().unwrap_or(0.0);
            let seconds: f64 = parts[2].parse().unwrap_or(0.0);
            hours * 3600.0 + minutes * 60.0 + seconds
        }
        2 => {
            let minutes: f64 = parts[0].parse().unwrap_or(0.0);
            let seconds: f64 = parts[1].parse().unwrap_or(0.0);
            minutes * 60.0 + seconds
        }
        _ => timestamp.parse().unwrap_or(0.0),
    }
}

/// Parsea contenido VTT completo a líneas de letra.
pub fn parse_vtt(content: &str) -> anyhow::Result<Vec<LyricLine>> {
    let tag_re = Regex::new(r"<[^>]*>")?;
    let bracket_re = Regex::new(r"\[.*?\]")?;

    let clean = |text: &str| -> String {
        let text = tag_re.replace_all(text, "");
        let text = bracket_re.replace_all(&text, "");
        text.replace('♪', "").trim().to_string()
    };

    let mut lines: Vec<LyricLine> = Vec::new();

    for block in content.split("\n\n") {
        let block_lines: Vec<&str> = block.lines().collect();

        let Some(ts_index) = block_lines.iter().position(|l| l.contains("-->")) else {
            continue;
        };

        let start = block_lines[ts_index]
            .split("-->")
            .next()
            .unwrap_or("")
            .trim();
        let time = parse_timestamp(start);

        let text = clean(&block_lines[ts_index + 1..].join(" "));
        if !text.is_empty() {
            lines.push(LyricLine { time, text });
        }
    }

    // Los subtítulos automáticos repiten la línea activa en bloques
    // consecutivos; colapsar duplicados contiguos
    let mut merged: Vec<LyricLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if merged.last().map(|prev| prev.text != line.text).unwrap_or(true) {
            merged.push(line);
        }
    }

    Ok(merged)
}
