use std::path::PathBuf;

/// The rule source could not be read or is missing one of its required
/// lists. Fatal for session startup.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read rule source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed JSON rule source: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Malformed YAML rule source: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// An assessment could not be handed to a collaborator.
#[derive(Debug, thiserror::Error)]
pub enum DispatchFailure {
    #[error("No listener attached to {0}")]
    ChannelClosed(String),
    #[error("Failed to encode outbound message: {0}")]
    Encode(String),
}
