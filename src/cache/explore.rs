//! Caché en memoria de las vistas de navegación (Explore).
//!
//! Sin TTL: se invalida reiniciando el proceso. Las categorías se
//! pre-cargan al arranque y se rellenan en el primer miss.

use crate::sources::TrackDescriptor;
use dashmap::DashMap;
use serde::Serialize;

/// Categoría de Explore con su búsqueda asociada.
pub struct ExploreCategory {
    pub id: &'static str,
    pub query: &'static str,
}

pub const EXPLORE_CATEGORIES: &[ExploreCategory] = &[
    ExploreCategory { id: "trending", query: "popular music 2024" },
    ExploreCategory { id: "top-charts", query: "top 50 global hits" },
    ExploreCategory { id: "new-releases", query: "new music releases 2024" },
    ExploreCategory { id: "lo-fi", query: "lofi hip hop radio" },
    ExploreCategory { id: "pop", query: "pop music hits" },
    ExploreCategory { id: "rock", query: "rock music hits" },
    ExploreCategory { id: "hip-hop", query: "hip hop hits" },
];

const DEFAULT_QUERY: &str = "popular music 2024";

/// Playlist curada del catálogo estático.
#[derive(Debug, Clone, Serialize)]
pub struct CuratedPlaylist {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub songs: u32,
    pub query: &'static str,
}

pub struct CuratedShelf {
    pub id: &'static str,
    pub playlists: &'static [CuratedPlaylist],
}

pub const CURATED_SHELVES: &[CuratedShelf] = &[
    CuratedShelf {
        id: "newTrending",
        playlists: &[
            CuratedPlaylist {
                id: "new-releases-2024",
                name: "RELEASED",
                description: "The hottest new songs this week, served up fresh to you every Friday.",
                songs: 20,
                query: "new music 2024",
            },
            CuratedPlaylist {
                id: "viral-hits",
                name: "Hashtag Hits",
                description: "Check out all the tracks that are buzzing right now on socials.",
                songs: 20,
                query: "viral songs 2024",
            },
        ],
    },
    CuratedShelf {
        id: "biggestHits",
        playlists: &[
            CuratedPlaylist {
                id: "hit-list-us",
                name: "The Hit List",
                description: "Today's biggest hits and hottest tracks from across the US pop landscape.",
                songs: 20,
                query: "top hits 2024",
            },
            CuratedPlaylist {
                id: "hip-hop-hits",
                name: "On Everything: Today's Hip-Hop Hits",
                description: "The hottest US hip-hop tracks out now... and that's on everything.",
                songs: 20,
                query: "hip hop hits 2024",
            },
        ],
    },
    CuratedShelf {
        id: "moodVibes",
        playlists: &[
            CuratedPlaylist {
                id: "pump-up-pop",
                name: "Pump-Up Pop",
                description: "Elevate your mood (and your heart rate) with these pop anthems.",
                songs: 20,
                query: "upbeat pop songs",
            },
            CuratedPlaylist {
                id: "lofi-loft",
                name: "Lofi Loft",
                description: "Kick back and coast to these chillhop and lofi beats.",
                songs: 20,
                query: "lofi hip hop beats",
            },
        ],
    },
    CuratedShelf {
        id: "throwbacks",
        playlists: &[
            CuratedPlaylist {
                id: "hits-10s",
                name: "The Hits: '10s",
                description: "Relive some of the biggest tracks of the 2010s.",
                songs: 20,
                query: "2010s hits",
            },
            CuratedPlaylist {
                id: "classic-rock",
                name: "Classic Rock's Greatest Hits",
                description: "The most empowering hits from the classic rock era.",
                songs: 20,
                query: "classic rock greatest hits",
            },
        ],
    },
];

pub fn find_curated(id: &str) -> Option<&'static CuratedPlaylist> {
    CURATED_SHELVES
        .iter()
        .flat_map(|shelf| shelf.playlists.iter())
        .find(|p| p.id == id)
}

/// Caché compartida de resultados pre-buscados.
#[derive(Default)]
pub struct ExploreCache {
    categories: DashMap<String, Vec<TrackDescriptor>>,
    curated: DashMap<String, Vec<TrackDescriptor>>,
}

impl ExploreCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: &str) -> Option<Vec<TrackDescriptor>> {
        self.categories.get(category).map(|e| e.value().clone())
    }

    pub fn insert(&self, category: &str, results: Vec<TrackDescriptor>) {
        self.categories.insert(category.to_string(), results);
    }

    pub fn get_curated(&self, playlist_id: &str) -> Option<Vec<TrackDescriptor>> {
        self.curated.get(playlist_id).map(|e| e.value().clone())
    }

    pub fn insert_curated(&self, playlist_id: &str, results: Vec<TrackDescriptor>) {
        self.curated.insert(playlist_id.to_string(), results);
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Búsqueda asociada a una categoría, con fallback a trending.
    pub fn query_for(category: &str) -> &'static str {
        EXPLORE_CATEGORIES
            .iter()
            .find(|c| c.id == category)
            .map(|c| c.query)
            .unwrap_or(DEFAULT_QUERY)
    }
}
