use std::fmt;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AppError {
    /// Required input was empty; raised before any request is issued.
    Validation(String),
    /// The backend answered with a non-2xx status.
    RequestFailed {
        status: u16,
        reason: String,
        details: Option<String>,
    },
    /// Network failure, unreachable backend, or an unparseable body.
    TransportFailed(String),
    /// A persisted value could not be deserialized.
    StorageCorrupt { key: String, message: String },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        AppError::TransportFailed(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(message) => f.write_str(message),
            AppError::RequestFailed {
                status,
                reason,
                details,
            } => {
                write!(f, "backend request failed: {status} {reason}")?;
                if let Some(details) = details.as_deref().filter(|d| !d.is_empty()) {
                    write!(f, " ({details})")?;
                }
                Ok(())
            }
            AppError::TransportFailed(message) => write!(f, "backend unreachable: {message}"),
            AppError::StorageCorrupt { key, message } => {
                write!(f, "stored value for {key:?} is corrupt: {message}")
            }
        }
    }
}

impl std::error::Error for AppError {}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        AppError::TransportFailed(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failed_mentions_status_and_details() {
        let err = AppError::RequestFailed {
            status: 500,
            reason: "Internal Server Error".into(),
            details: Some("model timeout".into()),
        };
        assert_eq!(
            err.to_string(),
            "backend request failed: 500 Internal Server Error (model timeout)"
        );
    }

    #[test]
    fn validation_displays_message_verbatim() {
        let err = AppError::validation("Please enter a search term.");
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Please enter a search term.");
    }
}
