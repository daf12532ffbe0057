pub mod playlist;
pub mod track;
pub mod user;

pub use playlist::{PlaylistOwner, PlaylistSummary};
pub use track::{ItemKind, PlaylistItem};
pub use user::{Credential, User, TOKEN_EXPIRY_SKEW_SECONDS};
