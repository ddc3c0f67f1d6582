use crate::sources::TrackDescriptor;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

const HISTORY_FILE: &str = "play-history.json";
const FAVORITES_FILE: &str = "favorites.json";
const PLAYLISTS_FILE: &str = "playlists.json";

/// El historial retiene como máximo las 50 reproducciones más recientes.
const HISTORY_LIMIT: usize = 50;

/// Entrada del historial de reproducción.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub track: TrackDescriptor,
    #[serde(rename = "playedAt")]
    pub played_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub tracks: Vec<TrackDescriptor>,
    pub created_at: String,
}

/// Manager de almacenamiento basado en archivos JSON.
///
/// Historial, favoritos y playlists viven en memoria y se vuelcan a disco
/// en cada mutación, con el mismo layout de archivos que consume el
/// cliente de escritorio.
pub struct JsonStorage {
    data_dir: PathBuf,
    history: Vec<HistoryEntry>,
    favorites: Vec<TrackDescriptor>,
    playlists: Vec<Playlist>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir).await?;

        let history = load_or_default(&data_dir.join(HISTORY_FILE)).await;
        let favorites = load_or_default(&data_dir.join(FAVORITES_FILE)).await;
        let playlists = load_or_default(&data_dir.join(PLAYLISTS_FILE)).await;

        info!("📁 Storage inicializado en: {}", data_dir.display());

        Ok(Self {
            data_dir,
            history,
            favorites,
            playlists,
        })
    }

    // --- Historial ---

    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.history.iter().take(limit).cloned().collect()
    }

    /// Añade una pista al frente del historial, deduplicando por videoId y
    /// recortando al límite.
    pub async fn add_to_history(&mut self, track: TrackDescriptor) -> Result<()> {
        self.history.retain(|e| e.track.video_id != track.video_id);
        self.history.insert(
            0,
            HistoryEntry {
                track,
                played_at: chrono::Utc::now().to_rfc3339(),
            },
        );
        self.history.truncate(HISTORY_LIMIT);

        self.save_file(HISTORY_FILE, &self.history).await
    }

    // --- Favoritos ---

    pub fn favorites(&self) -> &[TrackDescriptor] {
        &self.favorites
    }

    /// Toggle: si la pista ya es favorita se quita; si no, se añade al
    /// frente. Devuelve `true` si quedó marcada como favorita.
    pub async fn toggle_favorite(&mut self, track: TrackDescriptor) -> Result<bool> {
        let existing = self
            .favorites
            .iter()
            .position(|t| t.video_id == track.video_id);

        let is_favorite = match existing {
            Some(index) => {
                self.favorites.remove(index);
                false
            }
            None => {
                self.favorites.insert(0, track);
                true
            }
        };

        self.save_file(FAVORITES_FILE, &self.favorites).await?;
        Ok(is_favorite)
    }

    // --- Playlists ---

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub async fn create_playlist(&mut self, name: String) -> Result<Playlist> {
        let playlist = Playlist {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            tracks: Vec::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        self.playlists.push(playlist.clone());
        self.save_file(PLAYLISTS_FILE, &self.playlists).await?;

        info!("📝 Playlist creada: {}", playlist.name);
        Ok(playlist)
    }

    /// Añade una pista a la playlist, ignorando duplicados por videoId.
    /// `Ok(None)` si la playlist no existe.
    pub async fn add_to_playlist(
        &mut self,
        playlist_id: &str,
        track: TrackDescriptor,
    ) -> Result<Option<Playlist>> {
        let Some(playlist) = self.playlists.iter_mut().find(|p| p.id == playlist_id) else {
            return Ok(None);
        };

        if !playlist.tracks.iter().any(|t| t.video_id == track.video_id) {
            playlist.tracks.push(track);
            let snapshot = playlist.clone();
            self.save_file(PLAYLISTS_FILE, &self.playlists).await?;
            return Ok(Some(snapshot));
        }

        Ok(Some(playlist.clone()))
    }

    pub async fn remove_from_playlist(
        &mut self,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<Option<Playlist>> {
        let Some(playlist) = self.playlists.iter_mut().find(|p| p.id == playlist_id) else {
            return Ok(None);
        };

        playlist.tracks.retain(|t| t.video_id != video_id);
        let snapshot = playlist.clone();
        self.save_file(PLAYLISTS_FILE, &self.playlists).await?;

        Ok(Some(snapshot))
    }

    pub async fn delete_playlist(&mut self, playlist_id: &str) -> Result<()> {
        self.playlists.retain(|p| p.id != playlist_id);
        self.save_file(PLAYLISTS_FILE, &self.playlists).await
    }

    // --- Privados ---

    async fn save_file<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let content = serde_json::to_string_pretty(value)?;
        fs::write(self.data_dir.join(name), content).await?;
        Ok(())
    }
}

/// Carga un JSON de disco; un archivo ausente o corrupto arranca vacío.
async fn load_or_default<T: for<'de> Deserialize<'de> + Default>(path: &PathBuf) -> T {
    match fs::read_to_string(path).await {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!("Archivo {} corrupto, arrancando vacío: {}", path.display(), e);
                T::default()
            }
        },
        Err(_) => T::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(id: &str) -> TrackDescriptor {
        TrackDescriptor {
            video_id: id.to_string(),
            title: format!("Track {}", id),
            uploader: "Unknown".to_string(),
            thumbnail: String::new(),
            duration: 180.0,
            url: format!("https://www.youtube.com/watch?v={}", id),
        }
    }

    async fn storage_in(dir: &tempfile::TempDir) -> JsonStorage {
        JsonStorage::new(dir.path().to_path_buf()).await.unwrap()
    }

    #[tokio::test]
    async fn test_history_dedup_and_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage_in(&dir).await;

        storage.add_to_history(track("a")).await.unwrap();
        storage.add_to_history(track("b")).await.unwrap();
        storage.add_to_history(track("a")).await.unwrap();

        let history = storage.history(20);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].track.video_id, "a");
        assert_eq!(history[1].track.video_id, "b");
    }

    #[tokio::test]
    async fn test_history_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage_in(&dir).await;

        for i in 0..60 {
            storage.add_to_history(track(&format!("v{}", i))).await.unwrap();
        }

        assert_eq!(storage.history(100).len(), HISTORY_LIMIT);
        // La más reciente sobrevive, la más antigua no
        assert_eq!(storage.history(1)[0].track.video_id, "v59");
        assert!(!storage
            .history(100)
            .iter()
            .any(|e| e.track.video_id == "v0"));
    }

    #[tokio::test]
    async fn test_favorites_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage_in(&dir).await;

        assert!(storage.toggle_favorite(track("a")).await.unwrap());
        assert_eq!(storage.favorites().len(), 1);

        assert!(!storage.toggle_favorite(track("a")).await.unwrap());
        assert!(storage.favorites().is_empty());
    }

    #[tokio::test]
    async fn test_playlist_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage_in(&dir).await;

        let playlist = storage.create_playlist("Mix".to_string()).await.unwrap();

        // Añadir dos veces la misma pista no duplica
        storage
            .add_to_playlist(&playlist.id, track("a"))
            .await
            .unwrap();
        let after = storage
            .add_to_playlist(&playlist.id, track("a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.tracks.len(), 1);

        let after = storage
            .remove_from_playlist(&playlist.id, "a")
            .await
            .unwrap()
            .unwrap();
        assert!(after.tracks.is_empty());

        storage.delete_playlist(&playlist.id).await.unwrap();
        assert!(storage.playlists().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_playlist_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage_in(&dir).await;

        let result = storage.add_to_playlist("missing", track("a")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut storage = storage_in(&dir).await;
            storage.toggle_favorite(track("a")).await.unwrap();
            storage.add_to_history(track("b")).await.unwrap();
            storage.create_playlist("Mix".to_string()).await.unwrap();
        }

        let storage = storage_in(&dir).await;
        assert_eq!(storage.favorites().len(), 1);
        assert_eq!(storage.history(10).len(), 1);
        assert_eq!(storage.playlists().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(FAVORITES_FILE), "{{{not json")
            .await
            .unwrap();

        let storage = storage_in(&dir).await;
        assert!(storage.favorites().is_empty());
    }
}
