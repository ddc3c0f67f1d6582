//! Adaptador del extractor yt-dlp.
//!
//! Todo contacto con la herramienta externa pasa por aquí: lista de
//! argumentos, contrato de exit-code y parseo de stdout quedan aislados del
//! resto del sistema. stderr se registra como warning pero nunca es fatal
//! por sí solo; sólo un exit-status distinto de cero descarta un intento.

use crate::sources::{TrackDescriptor, VideoMetadata};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Escalera de preferencia de formatos, en orden de intento.
pub const FORMAT_LADDER: &[&str] = &[
    "bestaudio[ext=m4a]/bestaudio[ext=webm]/bestaudio",
    "bestaudio/best",
    "worst",
];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("all format options failed for {0}")]
    AllFormatsExhausted(String),

    #[error("yt-dlp exited with status {status}: {stderr}")]
    ToolFailed { status: i32, stderr: String },

    #[error("yt-dlp produced no output")]
    EmptyOutput,

    #[error("yt-dlp timed out after {0}s")]
    Timeout(u64),

    #[error("failed to parse yt-dlp output: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// URL directa resuelta más el formato que la produjo.
#[derive(Debug, Clone)]
pub struct ResolvedStream {
    pub direct_url: String,
    pub format_used: String,
}

pub struct YtDlpClient {
    binary: PathBuf,
    timeout: Duration,
}

impl YtDlpClient {
    pub fn new(binary: PathBuf, timeout_secs: u64) -> Self {
        Self {
            binary,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Verifica que yt-dlp esté disponible y pueda ejecutarse.
    pub async fn verify(&self) -> anyhow::Result<()> {
        let output = Command::new(&self.binary).arg("--version").output().await;

        match output {
            Ok(out) if out.status.success() => {
                let version = String::from_utf8_lossy(&out.stdout);
                info!("✅ yt-dlp versión: {}", version.trim());
                Ok(())
            }
            _ => {
                anyhow::bail!("yt-dlp no disponible en {}", self.binary.display())
            }
        }
    }

    /// Ejecuta yt-dlp con timeout y captura stdout/stderr.
    async fn run(&self, args: &[&str]) -> Result<Output, ExtractError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ExtractError::Timeout(self.timeout.as_secs())),
        }
    }

    /// Resuelve una URL directa recorriendo la escalera de formatos.
    ///
    /// Cada candidato supone una invocación propia con su timeout; exit
    /// distinto de cero o stdout vacío avanza al siguiente sin propagar
    /// error. Sólo agotar la escalera es un fallo para el caller.
    pub async fn resolve_direct_url(&self, url: &str) -> Result<ResolvedStream, ExtractError> {
        for format in FORMAT_LADDER {
            debug!("🔎 Probando formato: {}", format);
            match self.try_format(url, format).await {
                Ok(direct_url) => {
                    info!("✅ URL directa obtenida con formato: {}", format);
                    return Ok(ResolvedStream {
                        direct_url,
                        format_used: format.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Formato {} falló: {}", format, e);
                }
            }
        }

        Err(ExtractError::AllFormatsExhausted(url.to_string()))
    }

    async fn try_format(&self, url: &str, format: &str) -> Result<String, ExtractError> {
        let output = self
            .run(&[
                "-g",
                "-f",
                format,
                "--extractor-args",
                "youtube:player_client=android,ios",
                "--geo-bypass",
                "--no-check-certificate",
                "--prefer-insecure",
                "--no-warnings",
                "--socket-timeout",
                "30",
                url,
            ])
            .await?;

        if !output.status.success() {
            return Err(tool_failed(&output));
        }

        let direct_url = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .to_string();

        if direct_url.is_empty() {
            return Err(ExtractError::EmptyOutput);
        }

        Ok(direct_url)
    }

    /// Descarga la pista al path dado (el `.part` de la caché de audio).
    ///
    /// Sin timeout de proceso: una descarga completa puede tardar más que
    /// cualquier intento de extracción; yt-dlp ya limita por socket.
    pub async fn download(
        &self,
        url: &str,
        format: &str,
        dest: &Path,
    ) -> Result<(), ExtractError> {
        let dest_str = dest.to_string_lossy();
        let output = Command::new(&self.binary)
            .args([
                "-f",
                format,
                "-o",
                dest_str.as_ref(),
                "--no-playlist",
                "--quiet",
                "--no-warnings",
                "--extractor-args",
                "youtube:player_client=android,ios",
                "--geo-bypass",
                "--no-check-certificate",
                "--retries",
                "10",
                "--fragment-retries",
                "10",
                url,
            ])
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(tool_failed(&output));
        }

        Ok(())
    }

    /// Metadatos completos de un video (`--dump-json`).
    pub async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, ExtractError> {
        let output = self
            .run(&[
                "--dump-json",
                "--no-playlist",
                "--no-warnings",
                "--extractor-args",
                "youtube:player_client=android",
                url,
            ])
            .await?;

        if !output.status.success() {
            return Err(tool_failed(&output));
        }

        let data: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ExtractError::Parse(e.to_string()))?;

        parse_metadata(&data, url).ok_or_else(|| {
            ExtractError::Parse("metadata JSON missing required fields".to_string())
        })
    }

    /// Búsqueda por texto (`ytsearch<N>:`), un objeto JSON por línea.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackDescriptor>, ExtractError> {
        let search_query = format!("ytsearch{}:{}", limit, query);
        let output = self
            .run(&[
                "--dump-json",
                "--flat-playlist",
                "--skip-download",
                "--no-warnings",
                "--no-check-certificate",
                "--prefer-insecure",
                "--socket-timeout",
                "10",
                "--extractor-args",
                "youtube:player_client=android",
                &search_query,
            ])
            .await?;

        if !output.status.success() {
            return Err(tool_failed(&output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let results: Vec<TrackDescriptor> = stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(parse_search_line)
            .collect();

        Ok(results)
    }

    /// Subtítulos automáticos en VTT, o `None` si el video no los tiene.
    ///
    /// Sonda `--list-subs` primero para no descargar a ciegas; el archivo
    /// temporal vive en un tempdir que se limpia solo.
    pub async fn fetch_captions(&self, video_id: &str) -> Option<String> {
        let video_url = format!("https://www.youtube.com/watch?v={}", video_id);

        let probe = self
            .run(&["--list-subs", "--skip-download", &video_url])
            .await
            .ok()?;
        let listing = String::from_utf8_lossy(&probe.stdout);
        if !listing.contains("Available subtitles")
            && !listing.contains("Available automatic captions")
        {
            debug!("Sin subtítulos disponibles para {}", video_id);
            return None;
        }

        let scratch = tempfile::tempdir().ok()?;
        let template = scratch.path().join("subs");
        let template_str = template.to_string_lossy();

        let output = self
            .run(&[
                "--write-auto-sub",
                "--sub-lang",
                "en",
                "--sub-format",
                "vtt",
                "--skip-download",
                "--output",
                template_str.as_ref(),
                &video_url,
            ])
            .await
            .ok()?;

        if !output.status.success() {
            warn!(
                "Descarga de subtítulos falló para {}: {}",
                video_id,
                String::from_utf8_lossy(&output.stderr)
            );
            return None;
        }

        let vtt_path = scratch.path().join("subs.en.vtt");
        tokio::fs::read_to_string(&vtt_path).await.ok()
    }

    /// Verifica si la URL es válida para YouTube.
    pub fn is_youtube_url(url: &str) -> bool {
        url.contains("youtube.com") || url.contains("youtu.be") || url.contains("music.youtube.com")
    }
}

fn tool_failed(output: &Output) -> ExtractError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    ExtractError::ToolFailed {
        status: output.status.code().unwrap_or(-1),
        stderr: stderr.chars().take(200).collect(),
    }
}

fn parse_metadata(data: &Value, url: &str) -> Option<VideoMetadata> {
    let title = data.get("title")?.as_str()?.to_string();
    let video_id = data.get("id")?.as_str()?.to_string();

    let uploader = data
        .get("uploader")
        .or_else(|| data.get("channel"))
        .and_then(|u| u.as_str())
        .unwrap_or("Unknown")
        .to_string();

    Some(VideoMetadata {
        title,
        uploader,
        thumbnail: data
            .get("thumbnail")
            .and_then(|t| t.as_str())
            .map(String::from),
        duration: data.get("duration").and_then(|d| d.as_f64()).unwrap_or(0.0),
        view_count: data.get("view_count").and_then(|v| v.as_u64()),
        video_id,
        url: url.to_string(),
    })
}

/// Parsea una línea de resultado de búsqueda; líneas corruptas se omiten.
fn parse_search_line(line: &str) -> Option<TrackDescriptor> {
    let data: Value = serde_json::from_str(line).ok()?;

    let id = data.get("id")?.as_str()?.to_string();
    let title = data.get("title")?.as_str()?.to_string();

    let uploader = data
        .get("uploader")
        .or_else(|| data.get("channel"))
        .and_then(|u| u.as_str())
        .unwrap_or("Unknown")
        .to_string();

    let thumbnail = data
        .get("thumbnail")
        .and_then(|t| t.as_str())
        .map(String::from)
        .unwrap_or_else(|| format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id));

    Some(TrackDescriptor {
        url: format!("https://www.youtube.com/watch?v={}", id),
        duration: data.get("duration").and_then(|d| d.as_f64()).unwrap_or(0.0),
        video_id: id,
        title,
        uploader,
        thumbnail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_youtube_url_detection() {
        assert!(YtDlpClient::is_youtube_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YtDlpClient::is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(YtDlpClient::is_youtube_url(
            "https://music.youtube.com/watch?v=test"
        ));
        assert!(!YtDlpClient::is_youtube_url("https://example.com/video"));
    }

    #[test]
    fn test_format_ladder_order() {
        // El orden es contrato: m4a/webm primero, luego cualquier audio,
        // y "worst" como último recurso
        assert_eq!(FORMAT_LADDER.len(), 3);
        assert!(FORMAT_LADDER[0].contains("m4a"));
        assert_eq!(FORMAT_LADDER[1], "bestaudio/best");
        assert_eq!(FORMAT_LADDER[2], "worst");
    }

    #[test]
    fn test_parse_search_line_full() {
        let line = r#"{"id":"dQw4w9WgXcQ","title":"Song","uploader":"Channel","thumbnail":"https://example.com/t.jpg","duration":212.5}"#;
        let track = parse_search_line(line).unwrap();

        assert_eq!(track.video_id, "dQw4w9WgXcQ");
        assert_eq!(track.uploader, "Channel");
        assert_eq!(track.duration, 212.5);
        assert_eq!(track.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn test_parse_search_line_fills_fallbacks() {
        let line = r#"{"id":"abc123def45","title":"Song"}"#;
        let track = parse_search_line(line).unwrap();

        assert_eq!(track.uploader, "Unknown");
        assert_eq!(
            track.thumbnail,
            "https://i.ytimg.com/vi/abc123def45/hqdefault.jpg"
        );
        assert_eq!(track.duration, 0.0);
    }

    #[test]
    fn test_parse_search_line_prefers_channel_when_no_uploader() {
        let line = r#"{"id":"abc123def45","title":"Song","channel":"The Channel"}"#;
        let track = parse_search_line(line).unwrap();
        assert_eq!(track.uploader, "The Channel");
    }

    #[test]
    fn test_parse_search_line_rejects_garbage() {
        assert!(parse_search_line("not json").is_none());
        assert!(parse_search_line(r#"{"title":"no id"}"#).is_none());
    }

    #[cfg(unix)]
    fn fake_ytdlp(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.path().join("fake-ytdlp");
        std::fs::write(&script, body).unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ladder_tries_candidates_in_order_until_success() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        // Sólo el último candidato ("worst") produce URL
        let script = fake_ytdlp(
            &dir,
            &format!(
                "#!/bin/sh\necho \"$3\" >> {}\nif [ \"$3\" = \"worst\" ]; then echo 'https://cdn.example.com/audio'; exit 0; fi\nexit 1\n",
                log.display()
            ),
        );

        let client = YtDlpClient::new(script, 10);
        let resolved = client
            .resolve_direct_url("https://www.youtube.com/watch?v=abc")
            .await
            .unwrap();

        assert_eq!(resolved.format_used, "worst");
        assert_eq!(resolved.direct_url, "https://cdn.example.com/audio");

        // Exactamente tres invocaciones, en el orden declarado
        let calls = std::fs::read_to_string(&log).unwrap();
        let formats: Vec<&str> = calls.lines().collect();
        assert_eq!(formats, FORMAT_LADDER.to_vec());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ladder_stops_at_first_success() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let script = fake_ytdlp(
            &dir,
            &format!(
                "#!/bin/sh\necho \"$3\" >> {}\necho 'https://cdn.example.com/audio'\nexit 0\n",
                log.display()
            ),
        );

        let client = YtDlpClient::new(script, 10);
        let resolved = client
            .resolve_direct_url("https://www.youtube.com/watch?v=abc")
            .await
            .unwrap();

        assert_eq!(resolved.format_used, FORMAT_LADDER[0]);
        assert_eq!(std::fs::read_to_string(&log).unwrap().lines().count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exhausted_ladder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_ytdlp(&dir, "#!/bin/sh\nexit 1\n");

        let client = YtDlpClient::new(script, 10);
        let result = client
            .resolve_direct_url("https://www.youtube.com/watch?v=abc")
            .await;

        assert!(matches!(result, Err(ExtractError::AllFormatsExhausted(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_stdout_with_zero_exit_advances_ladder() {
        let dir = tempfile::tempdir().unwrap();
        // Exit 0 pero sin URL: debe agotar la escalera igualmente
        let script = fake_ytdlp(&dir, "#!/bin/sh\nexit 0\n");

        let client = YtDlpClient::new(script, 10);
        let result = client
            .resolve_direct_url("https://www.youtube.com/watch?v=abc")
            .await;

        assert!(matches!(result, Err(ExtractError::AllFormatsExhausted(_))));
    }

    #[test]
    fn test_parse_metadata() {
        let data: Value = serde_json::from_str(
            r#"{"id":"dQw4w9WgXcQ","title":"Song","channel":"Channel","thumbnail":"https://example.com/t.jpg","duration":212,"view_count":1000}"#,
        )
        .unwrap();
        let meta = parse_metadata(&data, "https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();

        assert_eq!(meta.uploader, "Channel");
        assert_eq!(meta.view_count, Some(1000));
        assert_eq!(meta.duration, 212.0);
    }
}
