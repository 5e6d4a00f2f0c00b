use thiserror::Error;

/// Failures inside the catalog client. Never leaves the client's public functions.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),

    #[error("unexpected response shape: {0}")]
    DataShape(String),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Failures writing or reading durable storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
