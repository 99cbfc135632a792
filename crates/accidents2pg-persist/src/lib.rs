// accidents2pg-persist - Append normalized records to a relational table
//
// `RecordSink` is the seam between the loader and the database. `PgSink` is
// the production implementation; `MemorySink` keeps records in process for
// dry runs and tests.

use accidents2pg_config::{is_plain_identifier, MAX_IDENTIFIER_LEN};
use accidents2pg_core::NormalizedRecord;
use async_trait::async_trait;

mod error;
mod memory;
mod postgres;

pub use error::{PersistError, Result};
pub use memory::MemorySink;
pub use postgres::{PgSink, SinkOptions};

/// Append-only destination for normalized records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Append `records` to `table` and return the number of rows written.
    /// Never deduplicates: appending the same records twice stores them twice.
    async fn append(&self, table: &str, records: &[NormalizedRecord]) -> Result<u64>;
}

/// Double-quote an identifier for interpolation into SQL text.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Reject anything config validation would reject as a schema or table name.
pub(crate) fn validate_ident(ident: &str) -> Result<()> {
    if is_plain_identifier(ident) && ident.len() <= MAX_IDENTIFIER_LEN {
        Ok(())
    } else {
        Err(PersistError::InvalidIdentifier(ident.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("traffic_accidents"), "\"traffic_accidents\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_validate_ident() {
        assert!(validate_ident("traffic_accidents").is_ok());
        assert!(validate_ident("_t1").is_ok());
        assert!(validate_ident("1t").is_err());
        assert!(validate_ident("t; drop table x").is_err());
        assert!(validate_ident("").is_err());
        assert!(validate_ident(&"t".repeat(MAX_IDENTIFIER_LEN + 1)).is_err());
    }
}
