use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Malformed service {key:?}: {reason}")]
    MalformedService { key: String, reason: String },

    #[error("Consumer {consumer} failed: {source:#}")]
    ConsumerFailed {
        consumer: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl RegistryError {
    pub(crate) fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        RegistryError::MalformedService {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
