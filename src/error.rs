use thiserror::Error;

use crate::protocol::ServiceError;

#[derive(Error, Debug)]
pub enum TermStoreError {
    #[error("Remote error: {0}")]
    Remote(ServiceError),

    #[error("Round trip timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Object was not loaded in this round trip: {object}")]
    NotLoaded { object: String },

    #[error("Unexpected object shape: {object} is not a {expected}")]
    UnexpectedObject {
        object: String,
        expected: &'static str,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl From<ServiceError> for TermStoreError {
    fn from(err: ServiceError) -> Self {
        TermStoreError::Remote(err)
    }
}

impl TermStoreError {
    /// The service payload, when the failure came from a round trip.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            TermStoreError::Remote(err) => Some(err),
            _ => None,
        }
    }
}

pub type TermStoreResult<T> = Result<T, TermStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formats() {
        let err = TermStoreError::Remote(ServiceError::new(-2146232832, "Term not found"));
        assert!(err.to_string().contains("Term not found"));

        let err = TermStoreError::Timeout { elapsed_ms: 1500 };
        assert!(err.to_string().contains("1500ms"));

        let err = TermStoreError::UnexpectedObject {
            object: "term(a)".into(),
            expected: "label collection",
        };
        assert_eq!(
            err.to_string(),
            "Unexpected object shape: term(a) is not a label collection"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TermStoreError>();
    }

    #[test]
    fn service_error_converts_verbatim() {
        let payload = ServiceError::new(403, "Access denied").with_correlation_id("c0ffee");
        let err: TermStoreError = payload.clone().into();
        assert_eq!(err.service_error(), Some(&payload));
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: TermStoreError = json_err.into();
        assert!(matches!(err, TermStoreError::Serialization(_)));
        assert!(err.service_error().is_none());
    }
}
