// accidents2pg-core - Platform-agnostic core logic
//
// This crate contains the PURE reshape logic for turning the semicolon
// delimited accident CSV into normalized records. No I/O, no async, no
// runtime dependencies.
//
// - Essence: CSV text → Vec<NormalizedRecord>
// - Accident: HTTP, object storage, Postgres, Lambda (other crates)

pub mod error;
pub mod record;
pub mod reshape;

// Re-export commonly used types
pub use error::{Result, TransformError};
pub use record::{NormalizedRecord, Vehicle};
pub use reshape::{
    reshape, reshape_bytes, reshape_with_stats, ReshapeOutput, ReshapeStats, DEATHS_COLUMN,
    DELIMITER, FIXED_COLUMNS,
};
