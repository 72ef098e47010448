//! Strongly-typed identifier value objects.
//!
//! Catalog identifiers are assigned by storage (`BIGSERIAL` columns) and
//! travel on the wire as unsigned integers. PostgreSQL has no unsigned
//! 64-bit type, so every id converts to and from `i64` at the adapter edge.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! storage_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates an id from its raw value.
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Creates an id from a database column value.
            pub fn from_i64(value: i64) -> Self {
                Self(value as u64)
            }

            /// Returns the raw value.
            pub fn value(&self) -> u64 {
                self.0
            }

            /// Returns the value as bound into database queries.
            pub fn as_i64(&self) -> i64 {
                self.0 as i64
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

storage_id!(
    /// Position of a record in the outbox table.
    ///
    /// Monotonically increasing; defines oldest-first retrieval order.
    OutboxId
);

storage_id!(
    /// Identifier of a track, the subject of every outbox event.
    TrackId
);

storage_id!(
    /// Identifier of an album.
    AlbumId
);

storage_id!(
    /// Identifier of a genre referenced by tracks.
    GenreId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_ids_order_by_value() {
        assert!(OutboxId::new(1) < OutboxId::new(2));
        assert!(OutboxId::new(10) > OutboxId::new(9));
    }

    #[test]
    fn track_id_roundtrips_through_database_representation() {
        let id = TrackId::new(42);
        assert_eq!(TrackId::from_i64(id.as_i64()), id);
    }

    #[test]
    fn track_id_serializes_as_bare_number() {
        let json = serde_json::to_string(&TrackId::new(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn album_id_parses_from_string() {
        let id: AlbumId = "15".parse().unwrap();
        assert_eq!(id.value(), 15);
        assert!("abc".parse::<AlbumId>().is_err());
    }

    #[test]
    fn genre_id_displays_raw_value() {
        assert_eq!(GenreId::new(3).to_string(), "3");
    }
}
