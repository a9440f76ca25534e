use thiserror::Error;

/// Every failure the sandbox can report. None of these halt the frame loop:
/// callers log them and turn the failed operation into a no-op.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("could not read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("animation clips missing from model: {}", .0.join(", "))]
    MissingClips(Vec<String>),

    #[error("item with id {0} not found")]
    UnknownItem(u32),

    #[error("item with name \"{0}\" not found")]
    UnknownItemName(String),

    #[error("item with id {0} not found in inventory")]
    NotInInventory(u32),

    #[error("unknown asset \"{0}\"")]
    UnknownAsset(String),

    #[error("gpu init failed: {0}")]
    Gpu(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
