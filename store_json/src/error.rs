use thiserror::Error;

#[derive(Debug, Error)]
pub enum JsonStoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt transaction log at line {line}: {reason}")]
    CorruptLog { line: usize, reason: String },
}

impl JsonStoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl From<JsonStoreError> for sanka_store::StoreError {
    fn from(e: JsonStoreError) -> Self {
        match e {
            JsonStoreError::Serialization(e) => sanka_store::StoreError::Serialization(e.to_string()),
            JsonStoreError::CorruptLog { .. } => sanka_store::StoreError::Corruption(e.to_string()),
            JsonStoreError::Io { .. } => sanka_store::StoreError::Backend(e.to_string()),
        }
    }
}
