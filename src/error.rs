use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure taxonomy shared by the store and the service layer.
#[derive(Debug, Error)]
pub enum AlarmError {
    /// Malformed schedule string or out-of-range time component.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An alarm record violates one of its invariants.
    #[error("invalid alarm: {0}")]
    InvalidAlarm(String),

    /// Cancel target is not among the active alarms.
    #[error("alarm not found: {0}")]
    NotFound(String),

    /// Reading, writing or moving bucket data failed.
    #[error("storage failure: {context}")]
    StorageFailure {
        context: String,
        #[source]
        source: BoxedSource,
    },
}

pub type AlarmResult<T> = Result<T, AlarmError>;

impl AlarmError {
    pub fn storage<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxedSource>,
    {
        AlarmError::StorageFailure {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AlarmError::NotFound(_))
    }
}

/// Attach a description to storage-level errors, mirroring `anyhow::Context`.
pub trait StorageContext<T> {
    fn storage_context<F, C>(self, context: F) -> AlarmResult<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E> StorageContext<T> for Result<T, E>
where
    E: Into<BoxedSource>,
{
    fn storage_context<F, C>(self, context: F) -> AlarmResult<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|err| AlarmError::storage(context(), err))
    }
}
