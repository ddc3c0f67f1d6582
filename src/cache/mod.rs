//! # Cache Module
//!
//! Capa de caché del backend: blobs de audio en disco con semántica de
//! escritura-en-curso (ver [`audio`]) y resultados de navegación en memoria
//! (ver [`explore`]).

pub mod audio;
pub mod explore;

pub use audio::{AudioCache, CacheError, EntryStat};
pub use explore::{ExploreCache, EXPLORE_CATEGORIES};
