//! Errors that abort a reconcile run.

use thiserror::Error;

/// A failed step, naming the operation and the entity it was applied to.
#[derive(Debug, Error)]
pub enum Error {
    /// The desired state could not be loaded
    #[error("load desired {what}: {source}")]
    Load {
        what: &'static str,
        #[source]
        source: desired::Error,
    },

    /// A query or mutation on the host failed
    #[error("{operation} {entity}: {source}")]
    Host {
        operation: &'static str,
        entity: String,
        #[source]
        source: sambakit::Error,
    },

    /// Learned IDs could not be persisted
    #[error("{operation} {entity}: {source}")]
    Store {
        operation: &'static str,
        entity: String,
        #[source]
        source: desired::Error,
    },
}

impl Error {
    /// Whether the failure happened while writing to the store.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Store { .. })
    }

    /// Whether a system command timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Host { source, .. } if source.category() == sambakit::ErrorCategory::Timeout
        )
    }
}

/// Result type for reconcile operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Attach operation and entity context to host and store results.
pub(crate) trait Context<T> {
    fn context(self, operation: &'static str, entity: impl Into<String>) -> Result<T>;
}

impl<T> Context<T> for sambakit::Result<T> {
    fn context(self, operation: &'static str, entity: impl Into<String>) -> Result<T> {
        self.map_err(|source| Error::Host {
            operation,
            entity: entity.into(),
            source,
        })
    }
}

impl<T> Context<T> for desired::Result<T> {
    fn context(self, operation: &'static str, entity: impl Into<String>) -> Result<T> {
        self.map_err(|source| Error::Store {
            operation,
            entity: entity.into(),
            source,
        })
    }
}
