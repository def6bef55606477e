use serde::Deserialize;

use crate::command::{CommandRunner, ExternalCommand, StdoutMode};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::paths::{ArtifactPaths, RemoteObjects};
use crate::toolchain;

/// Sample rate used for both the WAV intermediate and the recognition request.
pub const SAMPLE_RATE_HZ: u32 = 48_000;
pub const SPEECH_ENCODING: &str = "ogg-opus";

/// The Cloud SDK is partly Python; keep its stdout UTF-8 regardless of locale.
const CLOUD_CLI_ENV: (&str, &str) = ("PYTHONIOENCODING", "UTF-8");

/// Reply to `recognize-long-running --async`.
#[derive(Debug, Deserialize)]
struct OperationHandle {
    name: String,
}

pub struct Pipeline<R: CommandRunner> {
    config: PipelineConfig,
    paths: ArtifactPaths,
    remote: RemoteObjects,
    runner: R,
}

impl<R: CommandRunner> Pipeline<R> {
    pub fn new(config: PipelineConfig, paths: ArtifactPaths, runner: R) -> Self {
        let remote = paths.remote(&config.bucket);
        Self {
            config,
            paths,
            remote,
            runner,
        }
    }

    /// Run every step in order, stopping at the first fatal failure.
    pub fn run(&mut self) -> Result<()> {
        tracing::info!(
            input = %self.paths.input.display(),
            project = %self.config.project,
            bucket = %self.config.bucket,
            language = %self.config.language_code,
            "Starting transcription pipeline"
        );

        toolchain::verify(&mut self.runner)?;
        self.transcode()?;

        let upload = self.upload_opus_command();
        self.runner.run_required(&upload)?;

        let operation = self.request_transcription()?;
        println!("=> Operation {operation}");

        let wait = self.wait_command(&operation);
        self.runner.run_required(&wait)?;
        tracing::info!(path = %self.paths.json.display(), "Transcript saved");

        let upload = self.upload_json_command();
        self.runner.run_required(&upload)?;

        let export = self.export_command();
        if !self.runner.run_best_effort(&export) {
            tracing::info!("Cloud Shell download unavailable, transcript kept locally");
        }

        tracing::info!(remote = %self.remote.json, "Transcription pipeline finished");
        Ok(())
    }

    /// MP3 -> mono WAV -> Opus, unless the Opus file is already there.
    fn transcode(&mut self) -> Result<()> {
        // Presence alone counts as done; the file is not inspected.
        if self.paths.opus.exists() {
            tracing::warn!(
                path = %self.paths.opus.display(),
                "Opus file already exists, skipping conversion"
            );
            return Ok(());
        }

        let wav = self.wav_command();
        self.runner.run_required(&wav)?;
        let opus = self.opus_command();
        self.runner.run_required(&opus)?;
        Ok(())
    }

    fn request_transcription(&mut self) -> Result<String> {
        let request = self.recognize_command();
        let outcome = self.runner.run_required(&request)?;
        let stdout = outcome.stdout.unwrap_or_default();
        parse_operation_name(&stdout)
    }

    pub fn wav_command(&self) -> ExternalCommand {
        ExternalCommand::new("Convert .mp3 to .wav", "sox")
            .arg(&self.paths.input)
            .arg("--channels=1")
            .arg(format!("--rate={SAMPLE_RATE_HZ}"))
            .arg(&self.paths.wav)
    }

    pub fn opus_command(&self) -> ExternalCommand {
        ExternalCommand::new("Convert .wav to .opus", "opusenc")
            .arg(&self.paths.wav)
            .arg(&self.paths.opus)
    }

    pub fn upload_opus_command(&self) -> ExternalCommand {
        cloud_cli("Upload .opus file to storage", "gsutil")
            .arg("cp")
            .arg(&self.paths.opus)
            .arg(&self.remote.opus)
    }

    pub fn recognize_command(&self) -> ExternalCommand {
        cloud_cli("Request a transcription", "gcloud")
            .args(["ml", "speech", "recognize-long-running"])
            .arg(&self.remote.opus)
            .arg(format!("--language-code={}", self.config.language_code))
            .arg("--include-word-time-offsets")
            .arg(format!("--encoding={SPEECH_ENCODING}"))
            .arg(format!("--sample-rate={SAMPLE_RATE_HZ}"))
            .arg("--async")
            .stdout(StdoutMode::Capture)
    }

    pub fn wait_command(&self, operation: &str) -> ExternalCommand {
        cloud_cli("Retrieve result", "gcloud")
            .args(["ml", "speech", "operations", "wait", operation])
            .stdout(StdoutMode::Tee(self.paths.json.clone()))
    }

    pub fn upload_json_command(&self) -> ExternalCommand {
        cloud_cli("Upload .json file to storage", "gsutil")
            .arg("cp")
            .arg(&self.paths.json)
            .arg(&self.remote.json)
    }

    pub fn export_command(&self) -> ExternalCommand {
        ExternalCommand::new("Download file from Cloud Shell", "cloudshell")
            .arg("dl")
            .arg(&self.paths.json)
    }
}

fn cloud_cli(purpose: &str, program: &str) -> ExternalCommand {
    ExternalCommand::new(purpose, program).env(CLOUD_CLI_ENV.0, CLOUD_CLI_ENV.1)
}

/// Pull the operation name out of the async recognition response.
pub fn parse_operation_name(stdout: &str) -> Result<String> {
    let handle: OperationHandle = serde_json::from_str(stdout.trim()).map_err(|e| {
        Error::InvalidResponse(format!("expected an operation object with a name: {e}"))
    })?;
    if handle.name.trim().is_empty() {
        return Err(Error::InvalidResponse("operation name is empty".to_string()));
    }
    Ok(handle.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    struct Never;

    impl CommandRunner for Never {
        fn run(&mut self, command: &ExternalCommand) -> Result<crate::command::CommandOutcome> {
            panic!("unexpected command: {}", command.command_line());
        }
    }

    fn pipeline() -> Pipeline<Never> {
        let config = PipelineConfig {
            project: "acme".into(),
            bucket: "mybucket".into(),
            language_code: "th".into(),
        };
        let paths = ArtifactPaths::derive(Path::new("/audio/show1.mp3")).unwrap();
        Pipeline::new(config, paths, Never)
    }

    fn args(cmd: &ExternalCommand) -> Vec<String> {
        cmd.args
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_wav_command() {
        let cmd = pipeline().wav_command();
        assert_eq!(cmd.program, "sox");
        assert_eq!(
            args(&cmd),
            vec![
                "/audio/show1.mp3",
                "--channels=1",
                "--rate=48000",
                "/audio/show1.wav"
            ]
        );
        assert!(cmd.env.is_empty());
    }

    #[test]
    fn test_opus_command() {
        let cmd = pipeline().opus_command();
        assert_eq!(cmd.program, "opusenc");
        assert_eq!(args(&cmd), vec!["/audio/show1.wav", "/audio/show1.opus"]);
    }

    #[test]
    fn test_upload_commands_target_bucket() {
        let p = pipeline();
        assert_eq!(
            args(&p.upload_opus_command()),
            vec!["cp", "/audio/show1.opus", "gs://mybucket/show1.opus"]
        );
        assert_eq!(
            args(&p.upload_json_command()),
            vec!["cp", "/audio/show1.json", "gs://mybucket/show1.json"]
        );
    }

    #[test]
    fn test_recognize_command_fixed_parameters() {
        let cmd = pipeline().recognize_command();
        assert_eq!(cmd.program, "gcloud");
        assert_eq!(
            args(&cmd),
            vec![
                "ml",
                "speech",
                "recognize-long-running",
                "gs://mybucket/show1.opus",
                "--language-code=th",
                "--include-word-time-offsets",
                "--encoding=ogg-opus",
                "--sample-rate=48000",
                "--async",
            ]
        );
        assert_eq!(cmd.stdout, StdoutMode::Capture);
        assert!(cmd
            .env
            .contains(&("PYTHONIOENCODING".to_string(), "UTF-8".to_string())));
    }

    #[test]
    fn test_wait_command_tees_into_json() {
        let cmd = pipeline().wait_command("8912345");
        assert_eq!(
            args(&cmd),
            vec!["ml", "speech", "operations", "wait", "8912345"]
        );
        assert_eq!(
            cmd.stdout,
            StdoutMode::Tee(PathBuf::from("/audio/show1.json"))
        );
    }

    #[test]
    fn test_export_command() {
        let cmd = pipeline().export_command();
        assert_eq!(cmd.program, "cloudshell");
        assert_eq!(args(&cmd), vec!["dl", "/audio/show1.json"]);
    }

    #[test]
    fn test_parse_operation_name() {
        let stdout = "{\n  \"name\": \"3278415699620853875\"\n}\n";
        assert_eq!(parse_operation_name(stdout).unwrap(), "3278415699620853875");
    }

    #[test]
    fn test_parse_operation_name_ignores_extra_fields() {
        let stdout = r#"{"name": "op-1", "metadata": {"progressPercent": 0}}"#;
        assert_eq!(parse_operation_name(stdout).unwrap(), "op-1");
    }

    #[test]
    fn test_parse_operation_name_rejects_garbage() {
        assert!(matches!(
            parse_operation_name("Waiting for operation...").unwrap_err(),
            Error::InvalidResponse(_)
        ));
        assert!(parse_operation_name("{}").is_err());
        assert!(parse_operation_name(r#"{"name": ""}"#).is_err());
    }
}
