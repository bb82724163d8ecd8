use anyhow::{bail, Context, Result};
use clap::Parser;
use quire::build::{BuildOutcome, Site};
use quire::config::{Config, Mode};
use std::path::PathBuf;
use tracing::info;

/// Builds a static blog from Markdown posts.
#[derive(Parser)]
#[command(name = "quire", author, version, about, long_about = None)]
struct Cli {
    /// The project directory, or any directory below it.
    #[arg(default_value = ".")]
    project: PathBuf,

    /// Where to write the site. Defaults to `_site` beside `quire.yaml`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep running and rebuild whenever posts, templates or styles change.
    #[arg(short, long)]
    watch: bool,

    /// How to compile stylesheets.
    #[arg(long, value_enum, env = "QUIRE_MODE", default_value_t = Mode::Development)]
    mode: Mode,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let project = cli
        .project
        .canonicalize()
        .with_context(|| format!("Resolving project directory `{}`", cli.project.display()))?;
    let config = Config::from_directory(&project, cli.output.as_deref())?;
    info!("building `{}` in {:?} mode", config.title, cli.mode);
    let site = Site::new(config, cli.mode);

    if cli.watch {
        quire::watch::watch(&site)?;
        return Ok(());
    }

    match site.build()? {
        BuildOutcome::Completed(_) => Ok(()),
        BuildOutcome::Skipped => bail!("another build is already running"),
    }
}
