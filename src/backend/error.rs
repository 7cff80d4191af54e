/// Errors surfaced by the backend capability traits.
///
/// The `Network` kind is kept distinct so the UI can offer a retry action
/// instead of a generic failure notice. A lookup that matches zero rows is
/// never an error; those surface as `Option::None` from the query helpers.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The transport failed before the backend could answer. Safe to retry
    /// with the same input.
    #[error("network failure: {0}")]
    Network(String),
    /// The backend answered with a failure.
    #[error("backend error: {0}")]
    Api(String),
    /// A row or event payload could not be decoded into a domain record.
    #[error("could not decode record: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BackendError {
    /// Whether this failure should be presented with a retry affordance.
    pub fn is_network(&self) -> bool {
        matches!(self, BackendError::Network(_))
    }
}
