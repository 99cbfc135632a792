use std::fmt;

use accidents2pg_core::TransformError;
use accidents2pg_fetch::DownloadError;
use accidents2pg_persist::PersistError;
use accidents2pg_storage::StorageError;

/// Failure classification for one invocation of either stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    // 400-level: Client errors
    MissingField {
        field: String,
        location: &'static str,
    },
    InvalidRequest {
        message: String,
    },

    // 500-level: Server errors
    Download {
        message: String,
    },
    Storage {
        message: String,
    },
    MalformedInput {
        message: String,
    },
    TypeConversion {
        message: String,
    },
    Persistence {
        message: String,
    },
    Internal {
        message: String,
    },
}

impl PipelineError {
    pub fn missing_field(field: impl Into<String>, location: &'static str) -> Self {
        Self::MissingField {
            field: field.into(),
            location,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingField { .. } | Self::InvalidRequest { .. } => 400,
            Self::Download { .. }
            | Self::Storage { .. }
            | Self::MalformedInput { .. }
            | Self::TypeConversion { .. }
            | Self::Persistence { .. }
            | Self::Internal { .. } => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// Error type string for logs
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "MissingField",
            Self::InvalidRequest { .. } => "InvalidRequest",
            Self::Download { .. } => "DownloadError",
            Self::Storage { .. } => "StorageError",
            Self::MalformedInput { .. } => "MalformedInputError",
            Self::TypeConversion { .. } => "TypeConversionError",
            Self::Persistence { .. } => "PersistenceError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// Plain-text message returned to the caller
    pub fn message(&self) -> String {
        match self {
            Self::MissingField { field, location } => {
                format!("Key error: '{}' key is missing in the {}", field, location)
            }
            Self::InvalidRequest { message } => format!("Invalid request: {}", message),
            Self::Download { message }
            | Self::Storage { message }
            | Self::MalformedInput { message }
            | Self::TypeConversion { message }
            | Self::Persistence { message }
            | Self::Internal { message } => message.clone(),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for PipelineError {}

impl From<DownloadError> for PipelineError {
    fn from(err: DownloadError) -> Self {
        if err.is_client_error() {
            Self::InvalidRequest {
                message: err.to_string(),
            }
        } else {
            Self::Download {
                message: err.to_string(),
            }
        }
    }
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

impl From<TransformError> for PipelineError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::MalformedInput { .. } => Self::MalformedInput {
                message: err.to_string(),
            },
            TransformError::TypeConversion { .. } => Self::TypeConversion {
                message: err.to_string(),
            },
        }
    }
}

impl From<PersistError> for PipelineError {
    fn from(err: PersistError) -> Self {
        match err {
            // Never reached the database; the deployment named a bad table.
            PersistError::InvalidIdentifier(_) => Self::Internal {
                message: err.to_string(),
            },
            PersistError::Connection(_) | PersistError::Query(_) => Self::Persistence {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(PipelineError::missing_field("csv_url", "body").status_code(), 400);
        assert_eq!(PipelineError::invalid_request("bad").status_code(), 400);

        let server_errors = [
            PipelineError::Download {
                message: "x".into(),
            },
            PipelineError::Storage {
                message: "x".into(),
            },
            PipelineError::MalformedInput {
                message: "x".into(),
            },
            PipelineError::TypeConversion {
                message: "x".into(),
            },
            PipelineError::Persistence {
                message: "x".into(),
            },
            PipelineError::Internal {
                message: "x".into(),
            },
        ];
        for err in server_errors {
            assert_eq!(err.status_code(), 500, "{}", err.error_type());
            assert!(!err.is_client_error());
        }
    }

    #[test]
    fn test_missing_field_message() {
        let err = PipelineError::missing_field("csv_url", "body");
        assert_eq!(err.message(), "Key error: 'csv_url' key is missing in the body");
        assert!(err.message().starts_with("Key error: "));
    }

    #[test]
    fn test_transform_errors_keep_their_class() {
        let err: PipelineError = TransformError::malformed("no header").into();
        assert_eq!(err.error_type(), "MalformedInputError");
        assert!(err.message().contains("no header"));

        let err: PipelineError = accidents2pg_core::reshape("data;horario;trecho;mortos;automovel;bicicleta;caminhao;moto;onibus\n01/01/2023;14:30;BR-116;x;1;0;0;0;0")
            .unwrap_err()
            .into();
        assert_eq!(err.error_type(), "TypeConversionError");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_storage_and_persist_conversions() {
        let err: PipelineError = StorageError::NotFound {
            key: "a.csv".into(),
        }
        .into();
        assert_eq!(err.error_type(), "StorageError");
        assert!(err.message().contains("a.csv"));

        let err: PipelineError = PersistError::Query("relation does not exist".into()).into();
        assert_eq!(err.status_code(), 500);
        assert!(err.message().starts_with("Error saving to database"));
    }

    #[test]
    fn test_bad_table_name_is_internal() {
        let err: PipelineError = PersistError::InvalidIdentifier("bad table".into()).into();
        assert!(matches!(err, PipelineError::Internal { .. }));
        assert_eq!(err.error_type(), "InternalError");
        assert_eq!(err.status_code(), 500);
    }
}
