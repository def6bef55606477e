use transcribe_mp3::cli::Cli;
use transcribe_mp3::config::{Config, CONFIG_PATH_ENV};
use transcribe_mp3::SystemRunner;

fn main() {
    if let Err(e) = run() {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("transcribe_mp3=info".parse()?),
        )
        .init();

    let cli = Cli::parse_or_exit();

    let config_path = std::env::var_os(CONFIG_PATH_ENV).map(std::path::PathBuf::from);
    let (mut config, resolved) = Config::load_with_path(config_path.as_deref())?;
    if let Some(path) = resolved {
        tracing::debug!("Loaded config from {}", path.display());
    }
    config.apply_env(|key| std::env::var(key).ok());

    transcribe_mp3::run(cli.input.as_deref(), &config, SystemRunner)?;
    Ok(())
}
