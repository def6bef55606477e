use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Local files that sit next to the input MP3 and share its base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub input: PathBuf,
    pub base_name: String,
    pub wav: PathBuf,
    pub opus: PathBuf,
    pub json: PathBuf,
}

/// Object URIs in the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObjects {
    pub opus: String,
    pub json: String,
}

/// Validate the positional argument and return the canonical input path.
///
/// Touches the filesystem only to check existence and resolve symlinks; no
/// external tool runs before this succeeds.
pub fn validate_input(arg: Option<&Path>) -> Result<PathBuf> {
    let arg = arg.ok_or_else(|| {
        Error::UserInput(
            "FAIL: No input file specified. Please specify an input file.".to_string(),
        )
    })?;

    if !arg.is_file() {
        return Err(Error::UserInput(
            "FAIL: The input file does not exist.".to_string(),
        ));
    }

    let canonical = std::fs::canonicalize(arg)?;
    if canonical.extension().map(|e| e != "mp3").unwrap_or(true) {
        return Err(Error::UserInput(
            "FAIL: Expected an input file to be .mp3 file.".to_string(),
        ));
    }

    Ok(canonical)
}

impl ArtifactPaths {
    pub fn derive(input: &Path) -> Result<Self> {
        let stem = input
            .file_stem()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::UserInput(format!(
                    "FAIL: Cannot determine a base name for {}",
                    input.display()
                ))
            })?;

        // Local siblings keep the exact OS name; only object names go lossy.
        Ok(Self {
            input: input.to_path_buf(),
            base_name: stem.to_string_lossy().to_string(),
            wav: input.with_extension("wav"),
            opus: input.with_extension("opus"),
            json: input.with_extension("json"),
        })
    }

    pub fn remote(&self, bucket: &str) -> RemoteObjects {
        RemoteObjects {
            opus: format!("gs://{}/{}.opus", bucket, self.base_name),
            json: format!("gs://{}/{}.json", bucket, self.base_name),
        }
    }
}
