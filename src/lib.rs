//! Turn a local MP3 into a Google Cloud Speech-to-Text transcript.
//!
//! The pipeline shells out to `sox` and `opusenc` for the audio conversion and
//! to `gsutil` and `gcloud` for storage and recognition:
//!
//! ```text
//! show1.mp3 -> show1.wav -> show1.opus -> gs://bucket/show1.opus
//!          -> recognize-long-running --async -> operations wait -> show1.json
//!          -> gs://bucket/show1.json
//! ```

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod paths;
pub mod pipeline;
pub mod toolchain;

pub use command::{CommandOutcome, CommandRunner, ExternalCommand, StdoutMode, SystemRunner};
pub use config::{Config, PipelineConfig};
pub use error::{Error, Result};
pub use paths::{ArtifactPaths, RemoteObjects};
pub use pipeline::Pipeline;

use std::path::Path;

/// Validate the input, resolve configuration, then run the pipeline.
///
/// Both checks happen before the runner sees a single command.
pub fn run<R: CommandRunner>(input: Option<&Path>, config: &Config, runner: R) -> Result<()> {
    let input = paths::validate_input(input)?;
    let pipeline_config = config.resolve()?;
    let paths = ArtifactPaths::derive(&input)?;

    Pipeline::new(pipeline_config, paths, runner).run()
}
