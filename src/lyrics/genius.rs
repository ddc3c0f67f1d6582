//! Proveedor 3: letra plana de Genius con timestamps sintetizados.
//!
//! Busca la canción por la API oficial y extrae la letra del HTML de la
//! página (Genius no sirve letra por API). El resultado es texto plano;
//! [`super::timestamps`] le genera el timing antes de devolverlo.

use super::{timestamps, LyricLine, LyricsProvider, LyricsRequest, LyricsSource};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

const GENIUS_SEARCH_API: &str = "https://api.genius.com/search";
const MIN_LYRICS_LEN: usize = 20;

/// Títulos que delatan traducciones o versiones alternativas; se filtran
/// para quedarnos con la letra original.
const TRANSLATION_KEYWORDS: &[&str] = &[
    "türkçe", "çeviri", "traducción", "español", "traduction", "française", "tradução",
    "português", "übersetzung", "deutsche", "traduzione", "italiana", "翻訳", "日本語", "中文",
    "翻译", "перевод", "русский", "translation", "remix", "cover", "acoustic", "live",
];

pub struct GeniusProvider {
    http: reqwest::Client,
    token: String,
    openai_key: Option<String>,
}

impl GeniusProvider {
    pub fn new(http: reqwest::Client, token: String, openai_key: Option<String>) -> Self {
        Self {
            http,
            token,
            openai_key,
        }
    }

    /// Devuelve la letra plana de la canción más relevante.
    async fn fetch_plain(&self, title: &str, artist: &str) -> Option<String> {
        let clean_title = super::clean_title(title).ok()?;
        let (clean_artist, clean_title) = super::split_artist_title(&clean_title, artist);
        let clean_artist = super::clean_artist(&clean_artist).ok()?;

        debug!(
            "🔍 Buscando en Genius: \"{}\" de \"{}\"",
            clean_title, clean_artist
        );

        let song_url = self.search_song(&clean_title, &clean_artist).await?;

        let page = match self.http.get(&song_url).send().await {
            Ok(resp) if resp.status().is_success() => resp.text().await.ok()?,
            Ok(resp) => {
                warn!("Página de Genius respondió {}", resp.status());
                return None;
            }
            Err(e) => {
                warn!("Error de red con Genius: {}", e);
                return None;
            }
        };

        let raw = extract_lyrics(&page)?;
        let lyrics = filter_boilerplate(&raw).ok()?;

        if lyrics.len() < MIN_LYRICS_LEN {
            debug!("Letra demasiado corta tras el filtrado, descartada");
            return None;
        }

        debug!("✅ Letra de Genius: {} líneas", lyrics.lines().count());
        Some(lyrics)
    }

    /// Devuelve la URL de la página de la canción más relevante.
    async fn search_song(&self, title: &str, artist: &str) -> Option<String> {
        let query = format!("{} {}", title, artist);
        let response = match self
            .http
            .get(GENIUS_SEARCH_API)
            .query(&[("q", query.as_str())])
            .bearer_auth(&self.token)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!("API de Genius respondió {}", resp.status());
                return None;
            }
            Err(e) => {
                warn!("Error de red con la API de Genius: {}", e);
                return None;
            }
        };

        let data: Value = response.json().await.ok()?;
        let hits = data
            .get("response")?
            .get("hits")?
            .as_array()
            .filter(|h| !h.is_empty())?;

        let original_hits: Vec<&Value> = hits
            .iter()
            .filter(|hit| {
                hit.pointer("/result/full_title")
                    .and_then(|t| t.as_str())
                    .map(|t| {
                        let lower = t.to_lowercase();
                        !TRANSLATION_KEYWORDS.iter().any(|kw| lower.contains(kw))
                    })
                    .unwrap_or(false)
            })
            .collect();

        // Con todo filtrado, mejor un hit dudoso que ninguno
        let chosen = original_hits.first().copied().or_else(|| hits.first())?;

        chosen
            .pointer("/result/url")
            .and_then(|u| u.as_str())
            .map(String::from)
    }
}

#[async_trait]
impl LyricsProvider for GeniusProvider {
    fn source(&self) -> LyricsSource {
        LyricsSource::GeniusGenerated
    }

    fn note(&self) -> Option<&'static str> {
        Some("Timestamps generated automatically")
    }

    async fn fetch(&self, request: &LyricsRequest) -> Option<Vec<LyricLine>> {
        let plain = self.fetch_plain(&request.title, &request.artist).await?;

        let lines = timestamps::generate(
            &self.http,
            self.openai_key.as_deref(),
            &plain,
            request.duration,
            &request.title,
            &request.artist,
        )
        .await;

        if lines.is_empty() {
            return None;
        }
        Some(lines)
    }
}

/// Extrae los bloques de letra del HTML de la página.
pub(crate) fn extract_lyrics(html: &str) -> Option<String> {
    // Estructura actual y estructura clásica de Genius
    let container_re = Regex::new(
        r#"(?s)<div[^>]*(?:data-lyrics-container="true"|class="[^"]*Lyrics__Container[^"]*")[^>]*>(.*?)</div>"#,
    )
    .ok()?;
    let br_re = Regex::new(r"(?i)<br\s*/?>").ok()?;
    let tag_re = Regex::new(r"<[^>]*>").ok()?;

    let mut lyrics = String::new();
    for caps in container_re.captures_iter(html) {
        let block = br_re.replace_all(&caps[1], "\n");
        let block = tag_re.replace_all(&block, "");
        lyrics.push_str(block.trim());
        lyrics.push_str("\n\n");
    }

    if lyrics.trim().is_empty() {
        return None;
    }

    Some(decode_entities(&lyrics))
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

/// Elimina boilerplate de contribuidores/traducciones y marcadores de
/// sección, dejando sólo la letra.
pub(crate) fn filter_boilerplate(raw: &str) -> anyhow::Result<String> {
    let contributors_re = Regex::new(r"(?i)^\d+\s+Contributors?$")?;
    let read_more_re = Regex::new(r"(?i)^Read More\.\.\.$")?;
    let translation_header_re = Regex::new(r"(?i)Türkçe|Çeviri|Traducción|Traduction")?;
    let section_re = Regex::new(r"\[.*?\]\n?")?;

    let filtered: Vec<&str> = raw
        .lines()
        .map(|l| l.trim())
        .filter(|line| {
            if line.is_empty() {
                return false;
            }
            if contributors_re.is_match(line) || read_more_re.is_match(line) {
                return false;
            }
            if matches!(
                line.to_lowercase().as_str(),
                "translations" | "translation" | "romanization" | "english"
            ) {
                return false;
            }
            // "... Lyrics" suelto es el encabezado de la página
            if line.to_lowercase().ends_with("lyrics") && line.len() < 15 {
                return false;
            }
            if translation_header_re.is_match(line) {
                return false;
            }
            true
        })
        .collect();

    let joined = filtered.join("\n");
    let without_sections = section_re.replace_all(&joined, "");

    let collapse_re = Regex::new(r"\n{3,}")?;
    Ok(collapse_re
        .replace_all(&without_sections, "\n\n")
        .trim()
        .to_string())
}
