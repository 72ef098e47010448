//! Track metadata.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{TrackId, ValidationError};

/// Stored metadata of a track, with its genre resolved to a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMeta {
    pub id: TrackId,
    /// Object-storage locator of the audio file.
    pub source: String,
    pub name: String,
    pub genre: String,
}

/// A track that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrack {
    pub source: String,
    pub name: String,
    pub genre: String,
}

impl NewTrack {
    pub fn new(
        source: impl Into<String>,
        name: impl Into<String>,
        genre: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let track = Self {
            source: source.into(),
            name: name.into(),
            genre: genre.into(),
        };
        validate_fields(&track.source, &track.name)?;
        Ok(track)
    }

    /// Attaches the storage-assigned id.
    pub fn into_meta(self, id: TrackId) -> TrackMeta {
        TrackMeta {
            id,
            source: self.source,
            name: self.name,
            genre: self.genre,
        }
    }
}

impl TrackMeta {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.source, &self.name)
    }
}

fn validate_fields(source: &str, name: &str) -> Result<(), ValidationError> {
    if source.trim().is_empty() {
        return Err(ValidationError::empty_field("source"));
    }
    if name.trim().is_empty() {
        return Err(ValidationError::empty_field("name"));
    }
    Ok(())
}
