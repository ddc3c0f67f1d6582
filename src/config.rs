use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Servidor
    pub port: u16,

    // Paths
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,

    // Herramienta de extracción
    pub ytdlp_path: PathBuf,
    pub extract_timeout: u64, // En segundos, por intento

    // Búsqueda y explore
    pub search_limit: usize,
    pub explore_prefetch: bool,

    // APIs (Opcionales)
    pub genius_api_token: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Servidor
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,

            // Paths
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
            cache_dir: std::env::var("CACHE_DIR")
                .unwrap_or_else(|_| "./cache".to_string())
                .into(),

            // Extracción
            ytdlp_path: std::env::var("YTDLP_PATH")
                .unwrap_or_else(|_| "yt-dlp".to_string())
                .into(),
            extract_timeout: std::env::var("EXTRACT_TIMEOUT")
                .unwrap_or_else(|_| "45".to_string())
                .parse()?,

            // Búsqueda
            search_limit: std::env::var("SEARCH_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            explore_prefetch: std::env::var("EXPLORE_PREFETCH")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,

            // APIs opcionales
            genius_api_token: std::env::var("GENIUS_API_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|t| !t.trim().is_empty()),
        };

        // Create directories if they don't exist
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(&config.cache_dir)?;
        std::fs::create_dir_all(config.lyrics_cache_dir())?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Directorio de caché de letras (un JSON por clave).
    pub fn lyrics_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("lyrics")
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port must be greater than 0");
        }

        if self.extract_timeout == 0 {
            anyhow::bail!("Extract timeout must be greater than 0");
        }

        if self.search_limit == 0 || self.search_limit > 100 {
            anyhow::bail!(
                "Search limit must be between 1 and 100, got: {}",
                self.search_limit
            );
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes sensitive values like API tokens.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Server: port {}\n  \
            Paths: data={}, cache={}\n  \
            Extractor: {} ({}s timeout)\n  \
            Search: {} results, prefetch={}\n  \
            Lyrics: genius={}, llm={}",
            self.port,
            self.data_dir.display(),
            self.cache_dir.display(),
            self.ytdlp_path.display(),
            self.extract_timeout,
            self.search_limit,
            self.explore_prefetch,
            self.genius_api_token.is_some(),
            self.openai_api_key.is_some(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            data_dir: "./data".into(),
            cache_dir: "./cache".into(),
            ytdlp_path: "yt-dlp".into(),
            extract_timeout: 45,
            search_limit: 50,
            explore_prefetch: true,
            genius_api_token: None,
            openai_api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_excessive_search_limit() {
        let config = Config {
            search_limit: 500,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lyrics_cache_dir_under_cache_dir() {
        let config = Config::default();
        assert!(config.lyrics_cache_dir().starts_with(&config.cache_dir));
    }
}
