//! Caché de audio en disco.
//!
//! Cada pista cacheada vive en un blob `<md5(url)>.webm` bajo el directorio
//! de caché. Las descargas en curso escriben a `<clave>.webm.part` y sólo se
//! renombran al nombre final cuando el descargador termina con éxito: una
//! entrada visible es siempre una entrada completa, y una petición que llega
//! a mitad de descarga se trata como miss (el servidor redirige al upstream
//! en vez de leer un blob parcial).

use dashmap::DashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncSeekExt, Take};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache entry not found: {0}")]
    NotFound(String),

    #[error("Invalid byte range")]
    InvalidRange,

    #[error("Empty download for key {0}")]
    EmptyDownload(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Estado de una entrada completa.
#[derive(Debug, Clone, Copy)]
pub struct EntryStat {
    pub size: u64,
    pub complete: bool,
}

/// Lectura (posiblemente parcial) de una entrada.
pub struct RangeRead {
    pub reader: Take<File>,
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

pub struct AudioCache {
    cache_dir: PathBuf,
    // Claves con descarga de fondo en curso, para no lanzar duplicadas
    in_flight: DashMap<String, ()>,
}

impl AudioCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            in_flight: DashMap::new(),
        }
    }

    /// Clave determinista derivada del locator canónico.
    pub fn cache_key(url: &str) -> String {
        format!("{:x}", md5::compute(url.as_bytes()))
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.webm", key))
    }

    pub fn part_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.webm.part", key))
    }

    /// Consulta una entrada completa. Los `.part` en curso no son visibles.
    ///
    /// Un blob de cero bytes es una descarga fallida: se borra aquí mismo y
    /// se reporta como ausente para que el caller caiga al camino en vivo.
    pub async fn stat(&self, key: &str) -> Option<EntryStat> {
        let path = self.entry_path(key);
        let meta = fs::metadata(&path).await.ok()?;

        if meta.len() == 0 {
            warn!("🗑️ Entrada vacía en caché, eliminando: {}", key);
            if let Err(e) = fs::remove_file(&path).await {
                warn!("No se pudo eliminar entrada vacía {}: {}", key, e);
            }
            return None;
        }

        Some(EntryStat {
            size: meta.len(),
            complete: true,
        })
    }

    /// Abre una entrada para lectura, opcionalmente acotada a un rango
    /// inclusivo `(inicio, fin)`.
    pub async fn open_read(
        &self,
        key: &str,
        range: Option<(u64, u64)>,
    ) -> Result<RangeRead, CacheError> {
        let stat = self
            .stat(key)
            .await
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;

        let (start, end) = match range {
            Some((start, end)) => {
                if start >= stat.size {
                    return Err(CacheError::InvalidRange);
                }
                (start, end.min(stat.size - 1))
            }
            None => (0, stat.size - 1),
        };

        if start > end {
            return Err(CacheError::InvalidRange);
        }

        let mut file = File::open(self.entry_path(key)).await?;
        file.seek(SeekFrom::Start(start)).await?;
        let len = end - start + 1;

        Ok(RangeRead {
            reader: tokio::io::AsyncReadExt::take(file, len),
            start,
            end,
            total: stat.size,
        })
    }

    /// Marca una clave como "descarga en curso". Devuelve `false` si ya hay
    /// una descarga activa para la misma clave.
    pub fn try_begin_fill(&self, key: &str) -> bool {
        use dashmap::mapref::entry::Entry;
        match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(());
                true
            }
        }
    }

    pub fn finish_fill(&self, key: &str) {
        self.in_flight.remove(key);
    }

    /// Promociona el `.part` a entrada definitiva tras una descarga exitosa.
    ///
    /// Rechaza descargas de cero bytes: no deben quedar visibles como
    /// entradas "completas".
    pub async fn commit(&self, key: &str) -> Result<(), CacheError> {
        let part = self.part_path(key);
        let meta = fs::metadata(&part).await?;

        if meta.len() == 0 {
            fs::remove_file(&part).await.ok();
            return Err(CacheError::EmptyDownload(key.to_string()));
        }

        fs::rename(&part, self.entry_path(key)).await?;
        debug!("💾 Entrada de caché completa: {} ({} bytes)", key, meta.len());
        Ok(())
    }

    /// Elimina cualquier artefacto (parcial o final) de una clave.
    pub async fn discard(&self, key: &str) {
        remove_if_exists(&self.part_path(key)).await;
        remove_if_exists(&self.entry_path(key)).await;
    }
}

async fn remove_if_exists(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("No se pudo eliminar {}: {}", path.display(), e),
    }
}
