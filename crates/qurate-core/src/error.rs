use thiserror::Error;

/// One failed sub-mutation within a multi-document apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    pub document_id: String,
    pub message: String,
}

impl std::fmt::Display for ApplyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.document_id, self.message)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The storage or similarity backend could not be reached. Transient;
    /// retried a bounded number of times before surfacing.
    #[error("{source_name} unavailable: {message}")]
    ProviderUnavailable {
        source_name: &'static str,
        message: String,
    },

    /// The backend rejected a request (bad token, malformed command, ...).
    /// Not transient; never retried.
    #[error("{source_name} request failed (status {status}): {message}")]
    Api {
        source_name: &'static str,
        status: u16,
        message: String,
    },

    /// An empty or singleton cluster was given to the resolution engine.
    #[error("invalid cluster: {0}")]
    InvalidCluster(String),

    /// A manual resolution referenced an id outside the cluster.
    #[error("invalid choice: {choice} is not a member of the cluster")]
    InvalidChoice { choice: String },

    /// Some sub-mutations of a multi-document decision failed. The applied
    /// portion is recorded under `operation_id`; `failures` carries per-id
    /// detail for repair.
    #[error("operation {operation_id} partially applied: {} of {attempted} mutations failed", failures.len())]
    PartialApply {
        operation_id: String,
        attempted: usize,
        failures: Vec<ApplyFailure>,
    },

    /// The current stored state of a document no longer matches the
    /// after-state recorded in the entry being undone.
    #[error("stale undo: document {document_id} in operation {operation_id} no longer matches its recorded after-state")]
    StaleUndo {
        operation_id: String,
        document_id: String,
    },

    #[error("ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn provider(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            source_name,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
