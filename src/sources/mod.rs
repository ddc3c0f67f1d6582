pub mod ytdlp;

use serde::{Deserialize, Serialize};

pub use ytdlp::{ExtractError, ResolvedStream, YtDlpClient, FORMAT_LADDER};

/// Representa un item reproducible tal y como lo consume el cliente.
///
/// Inmutable una vez obtenido del extractor; `videoId` + duración sirven de
/// clave de búsqueda para letras y desambiguan re-ediciones y covers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackDescriptor {
    pub video_id: String,
    pub title: String,
    #[serde(default = "default_uploader")]
    pub uploader: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub url: String,
}

fn default_uploader() -> String {
    "Unknown".to_string()
}

/// Metadatos completos de un video individual.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub title: String,
    pub uploader: String,
    pub thumbnail: Option<String>,
    pub duration: f64,
    pub view_count: Option<u64>,
    pub video_id: String,
    pub url: String,
}
