use crate::command::{CommandRunner, ExternalCommand};
use crate::error::Result;

/// Cloud CLIs that must already be installed.
pub const CLOUD_TOOLS: &[&str] = &["gcloud", "gsutil"];

/// Local audio tools, as (display name, binary).
pub const AUDIO_TOOLS: &[(&str, &str)] = &[("SoX", "sox"), ("opusenc", "opusenc")];

/// apt packages that provide the audio tools, including MP3 support for SoX.
pub const AUDIO_PACKAGES: &[&str] = &["sox", "libsox-fmt-mp3", "opus-tools"];

fn which(purpose: String, binary: &str) -> ExternalCommand {
    ExternalCommand::new(purpose, "which").arg(binary)
}

pub fn install_command() -> ExternalCommand {
    ExternalCommand::new("Install required dependencies", "sudo")
        .args(["apt-get", "install", "-y"])
        .args(AUDIO_PACKAGES)
}

/// Make sure every external binary the pipeline invokes is on PATH.
///
/// Missing cloud CLIs are fatal. Missing audio tools trigger a single install
/// attempt followed by a required re-check.
pub fn verify<R: CommandRunner>(runner: &mut R) -> Result<()> {
    for tool in CLOUD_TOOLS {
        runner.run_required(&which(format!("Verify that {tool} is installed"), tool))?;
    }

    // Stops probing at the first missing tool.
    let audio_ready = AUDIO_TOOLS.iter().all(|(name, binary)| {
        runner.run_best_effort(&which(format!("Check if {name} is installed"), binary))
    });

    if audio_ready {
        return Ok(());
    }

    tracing::info!("Audio tools missing, installing {}", AUDIO_PACKAGES.join(" "));
    runner.run_required(&install_command())?;
    for (name, binary) in AUDIO_TOOLS {
        runner.run_required(&which(format!("Verify that {name} is installed"), binary))?;
    }

    Ok(())
}
