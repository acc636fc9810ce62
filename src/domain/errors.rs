use thiserror::Error;

/// Errors raised while turning a raw wire frame into metrics or events
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed {format} frame: {reason}")]
    Malformed {
        format: &'static str,
        reason: String,
    },

    #[error("unsupported {format} field value {field}={value}")]
    Unsupported {
        format: &'static str,
        field: &'static str,
        value: String,
    },
}

impl DecodeError {
    pub fn malformed(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            format,
            reason: reason.into(),
        }
    }

    pub fn unsupported(format: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        Self::Unsupported {
            format,
            field,
            value: value.into(),
        }
    }
}
