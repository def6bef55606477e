use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "transcribe-mp3",
    version,
    about = "Transcribe an MP3 file with Google Cloud Speech-to-Text",
    after_help = "Environment:\n  \
        GOOGLE_CLOUD_PROJECT   Cloud project id (required)\n  \
        GS_BUCKET              Storage bucket for audio and transcripts (required)\n  \
        GCLOUD_ML_SPEECH_LANG  Recognition language code (default: th)\n  \
        TRANSCRIBE_MP3_CONFIG  Path to a TOML config file"
)]
pub struct Cli {
    /// Path to the .mp3 file to transcribe
    #[arg(allow_hyphen_values = true)]
    pub input: Option<PathBuf>,

    /// Anything after the input is ignored.
    #[arg(hide = true, num_args = 0.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub ignored: Vec<OsString>,
}

impl Cli {
    /// Parse argv, exiting with status 1 on usage errors and 0 for
    /// `--help`/`--version`.
    pub fn parse_or_exit() -> Self {
        Self::try_parse().unwrap_or_else(|e| {
            let code = exit_code(&e);
            let _ = e.print();
            std::process::exit(code)
        })
    }
}

/// Usage errors share the exit status of every other failure.
pub fn exit_code(e: &clap::Error) -> i32 {
    if e.use_stderr() {
        1
    } else {
        0
    }
}
