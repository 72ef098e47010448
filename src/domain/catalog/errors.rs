//! Catalog-specific error types.

use crate::domain::foundation::{AlbumId, DomainError, ErrorCode, TrackId, ValidationError};

/// Errors returned by catalog mutations.
///
/// Any failure aborts the enclosing storage transaction, so an error here
/// means neither the catalog change nor its outbox record was committed.
#[derive(Debug, Clone)]
pub enum CatalogError {
    /// Track was not found.
    TrackNotFound(TrackId),
    /// Album was not found.
    AlbumNotFound(AlbumId),
    /// Track references a genre that does not exist.
    InvalidGenre(String),
    /// Input failed validation.
    Validation(ValidationError),
    /// Storage or outbox failure.
    Infrastructure(DomainError),
}

impl CatalogError {
    pub fn invalid_genre(genre: impl Into<String>) -> Self {
        CatalogError::InvalidGenre(genre.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            CatalogError::TrackNotFound(_) => ErrorCode::TrackNotFound,
            CatalogError::AlbumNotFound(_) => ErrorCode::AlbumNotFound,
            CatalogError::InvalidGenre(_) => ErrorCode::GenreNotFound,
            CatalogError::Validation(_) => ErrorCode::ValidationFailed,
            CatalogError::Infrastructure(err) => err.code,
        }
    }

    pub fn message(&self) -> String {
        match self {
            CatalogError::TrackNotFound(id) => format!("Track not found: {}", id),
            CatalogError::AlbumNotFound(id) => format!("Album not found: {}", id),
            CatalogError::InvalidGenre(genre) => format!("Unknown genre: {}", genre),
            CatalogError::Validation(err) => err.to_string(),
            CatalogError::Infrastructure(err) => err.to_string(),
        }
    }
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for CatalogError {}

impl From<DomainError> for CatalogError {
    fn from(err: DomainError) -> Self {
        CatalogError::Infrastructure(err)
    }
}

impl From<ValidationError> for CatalogError {
    fn from(err: ValidationError) -> Self {
        CatalogError::Validation(err)
    }
}
