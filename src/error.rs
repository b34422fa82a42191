use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request to {path} failed: {source}")]
    Network {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Backend returned {status} for {path}: {body}")]
    Status {
        path: String,
        status: StatusCode,
        body: String,
    },

    #[error("Failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read upload file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN))
    }
}

/// Result of a fire-and-forget write. Callers update their own state before
/// the write completes and never roll back; this only reports what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    Failed(String),
}

impl WriteOutcome {
    pub fn from_result<T>(action: &str, result: Result<T, ApiError>) -> Self {
        match result {
            Ok(_) => WriteOutcome::Applied,
            Err(e) => {
                tracing::warn!(action, error = %e, "Write failed, keeping local state");
                WriteOutcome::Failed(e.to_string())
            }
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied)
    }
}
