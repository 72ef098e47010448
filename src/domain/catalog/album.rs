//! Album metadata.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AlbumId, ValidationError};

/// A stored album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub name: String,
    /// Release kind, e.g. "LP", "EP", "single".
    pub kind: String,
}

/// An album that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlbum {
    pub name: String,
    pub kind: String,
}

impl NewAlbum {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::empty_field("name"));
        }
        Ok(Self {
            name,
            kind: kind.into(),
        })
    }
}
