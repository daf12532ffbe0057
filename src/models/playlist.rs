use serde::{Deserialize, Serialize};

/// Owner of a playlist as returned by catalog search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistOwner {
    pub id: String,
}

/// A playlist as returned by catalog search. Several playlists may share a
/// display name, so source selection matches on name AND owner id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub owner: PlaylistOwner,
}
