use std::path::PathBuf;

/// Everything that can stop a transcription run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad argument or missing configuration. The message already carries
    /// the remediation text and is shown to the user verbatim.
    #[error("{0}")]
    UserInput(String),

    #[error("Latest command execution failed: Exit status = {}", display_status(.status))]
    ExternalCommand {
        purpose: String,
        status: Option<i32>,
    },

    #[error("failed to start `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected transcription response: {0}")]
    InvalidResponse(String),

    #[error("failed to parse config file {}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn display_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "null".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
