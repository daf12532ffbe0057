use serde::{Deserialize, Serialize};

/// Kind tag of an item inside a playlist, as reported by the Spotify API
/// `type` field. The Daily Drive mixes songs with podcast episodes; only
/// `Track` items are eligible for copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Track,
    Episode,
    #[serde(other)]
    Other,
}

/// One entry of a playlist: the URI used for add/remove calls plus its kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub uri: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
}

impl PlaylistItem {
    pub fn is_music(&self) -> bool {
        self.kind == ItemKind::Track
    }
}
