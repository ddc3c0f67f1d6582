//! Caché de letras en dos niveles.
//!
//! Nivel disco: un JSON por clave bajo `<cache>/lyrics/`, con el mtime del
//! archivo como reloj de expiración (TTL 30 días). Nivel memoria: mapa
//! acotado en orden de inserción (se desaloja el más antiguo); los hits de
//! disco se promocionan a memoria.

use super::LyricsDocument;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

pub const CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
const MAX_MEMORY_ENTRIES: usize = 200;

/// Clave estable bajo variación de mayúsculas, espacios y decimales de
/// duración: md5 de `titulo|artista|duracion_en_segundos`.
pub fn cache_key(title: &str, artist: &str, duration: f64) -> String {
    let normalized_title = title.trim().to_lowercase();
    let normalized_artist = artist.trim().to_lowercase();
    let normalized_duration = duration.max(0.0) as u64;

    let data = format!(
        "{}|{}|{}",
        normalized_title, normalized_artist, normalized_duration
    );
    format!("{:x}", md5::compute(data.as_bytes()))
}

fn is_expired(modified: SystemTime, now: SystemTime) -> bool {
    now.duration_since(modified)
        .map(|age| age > CACHE_TTL)
        .unwrap_or(false)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsCacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub memory_cache_size: usize,
    pub total_size_bytes: u64,
    pub cache_ttl_days: u64,
}

struct MemoryEntry {
    doc: LyricsDocument,
    stored_at: SystemTime,
}

/// Nivel de memoria acotado; el orden de inserción decide el desalojo.
struct MemoryTier {
    capacity: usize,
    entries: HashMap<String, MemoryEntry>,
    order: VecDeque<String>,
}

impl MemoryTier {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&mut self, key: &str, now: SystemTime) -> Option<LyricsDocument> {
        match self.entries.get(key) {
            Some(entry) if !is_expired(entry.stored_at, now) => Some(entry.doc.clone()),
            Some(_) => {
                self.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert(&mut self, key: String, doc: LyricsDocument, stored_at: SystemTime) {
        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.capacity {
                match self.order.pop_front() {
                    Some(oldest) => {
                        self.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            self.order.push_back(key.clone());
        }
        self.entries.insert(key, MemoryEntry { doc, stored_at });
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct LyricsCache {
    dir: PathBuf,
    memory: Mutex<MemoryTier>,
}

impl LyricsCache {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            memory: Mutex::new(MemoryTier::with_capacity(MAX_MEMORY_ENTRIES)),
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    pub async fn get(&self, title: &str, artist: &str, duration: f64) -> Option<LyricsDocument> {
        let key = cache_key(title, artist, duration);
        let now = SystemTime::now();

        if let Some(doc) = self.memory.lock().get(&key, now) {
            debug!("💾 Letras servidas desde memoria: {}", title);
            return Some(doc);
        }

        let path = self.entry_path(&key);
        let meta = fs::metadata(&path).await.ok()?;
        let modified = meta.modified().ok()?;

        if is_expired(modified, now) {
            info!("🗑️ Caché de letras expirada para: {}", title);
            fs::remove_file(&path).await.ok();
            return None;
        }

        let content = fs::read_to_string(&path).await.ok()?;
        let doc: LyricsDocument = match serde_json::from_str(&content) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Entrada de caché corrupta {}: {}", key, e);
                fs::remove_file(&path).await.ok();
                return None;
            }
        };

        self.memory.lock().insert(key, doc.clone(), modified);
        debug!("💾 Letras servidas desde disco: {}", title);
        Some(doc)
    }

    /// Persiste en ambos niveles. Un fallo de disco se registra y se
    /// tolera: la respuesta al cliente nunca depende de poder cachear.
    pub async fn save(&self, title: &str, artist: &str, duration: f64, doc: &LyricsDocument) {
        let key = cache_key(title, artist, duration);

        match serde_json::to_string_pretty(doc) {
            Ok(content) => {
                if let Err(e) = fs::write(self.entry_path(&key), content).await {
                    warn!("No se pudo escribir caché de letras {}: {}", key, e);
                }
            }
            Err(e) => warn!("No se pudo serializar letras {}: {}", key, e),
        }

        self.memory
            .lock()
            .insert(key, doc.clone(), SystemTime::now());
        debug!("💾 Letras cacheadas para: {}", title);
    }

    pub async fn clear_all(&self) -> anyhow::Result<usize> {
        self.memory.lock().clear();

        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().map_or(false, |ext| ext == "json") {
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }

        info!("🗑️ Caché de letras vaciada ({} archivos)", removed);
        Ok(removed)
    }

    /// Barrido de expirados por mtime.
    pub async fn clean_expired(&self) -> anyhow::Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().map_or(false, |ext| ext == "json") {
                continue;
            }

            let meta = entry.metadata().await?;
            if let Ok(modified) = meta.modified() {
                if is_expired(modified, now) {
                    fs::remove_file(&path).await?;
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            info!("🗑️ Limpiadas {} entradas de letras expiradas", removed);
        }
        Ok(removed)
    }

    pub async fn stats(&self) -> anyhow::Result<LyricsCacheStats> {
        let now = SystemTime::now();
        let mut total = 0;
        let mut valid = 0;
        let mut expired = 0;
        let mut size_bytes = 0;

        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().map_or(false, |ext| ext == "json") {
                continue;
            }

            let meta = entry.metadata().await?;
            total += 1;
            size_bytes += meta.len();

            match meta.modified() {
                Ok(modified) if is_expired(modified, now) => expired += 1,
                _ => valid += 1,
            }
        }

        Ok(LyricsCacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: expired,
            memory_cache_size: self.memory.lock().len(),
            total_size_bytes: size_bytes,
            cache_ttl_days: CACHE_TTL.as_secs() / (24 * 60 * 60),
        })
    }
}
