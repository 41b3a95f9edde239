use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use ghlaunch::{
    build::PyInstaller,
    config::{InstallConfig, REQUIRED_FIELDS},
    git::GitSync,
    install::Installation,
    orchestrator::{Orchestrator, Outcome, UpdateDecision},
    remote::{validate_repo_url, HttpFetcher},
    resolve,
};

#[derive(Parser)]
#[command(
    name = "ghlaunch",
    about = "Keep a GitHub-hosted application up to date and launch it"
)]
struct Cli {
    /// Installation root directory (default: ~/.ghlaunch/app)
    #[arg(long, global = true, value_name = "DIR")]
    install_root: Option<PathBuf>,

    /// Repository URL to use when none is configured locally
    #[arg(long, global = true, value_name = "URL")]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update the installation if needed, build it, and launch it
    Run {
        /// Print the executable path instead of launching it
        #[arg(long)]
        no_launch: bool,

        /// Permit discarding an unrecognizable install root and cloning
        /// from scratch
        #[arg(long)]
        force_reset: bool,
    },

    /// Print the update decision without syncing or building
    Check,

    /// Print the resolved executable path for the current configuration
    Path,

    /// Inspect the local metadata document
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current metadata document
    Show,
    /// Print the metadata file path
    Path,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ghlaunch=info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Some(url) = &cli.url {
        if !validate_repo_url(url) {
            bail!("invalid repository URL {url:?}; expected https://github.com/<owner>/<project>");
        }
    }

    let install = Installation::new(install_root(cli.install_root)?);

    match cli.command {
        Commands::Run {
            no_launch,
            force_reset,
        } => cmd_run(install, cli.url, no_launch, force_reset),

        Commands::Check => cmd_check(install, cli.url),

        Commands::Path => cmd_path(&install),

        Commands::Config { action } => cmd_config(&install, action),
    }
}

fn install_root(overridden: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = overridden {
        return Ok(dir);
    }
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".ghlaunch").join("app"))
}

fn cmd_run(
    install: Installation,
    url: Option<String>,
    no_launch: bool,
    force_reset: bool,
) -> Result<()> {
    let fetcher = HttpFetcher::new();
    let orchestrator = Orchestrator::new(install, &fetcher, &GitSync, &PyInstaller)
        .with_url(url)
        .with_wipe(force_reset);

    match orchestrator.run()? {
        Outcome::Ready(path) => {
            if no_launch {
                println!("{}", path.display());
            } else {
                eprintln!("Launching {}", path.display());
                launch(&path)?;
            }
            Ok(())
        }
        Outcome::NeedsRepoUrl(reason) => {
            eprintln!("A fresh clone is needed because {}.", reason.describe());
            eprintln!("Re-run with: ghlaunch run --url https://github.com/<owner>/<project>");
            std::process::exit(2);
        }
    }
}

/// Hand the built executable off to the OS as an independent process. The
/// launcher does not wait for it.
fn launch(path: &Path) -> Result<()> {
    let mut command = std::process::Command::new(path);
    if let Some(dir) = path.parent() {
        command.current_dir(dir);
    }
    command
        .spawn()
        .with_context(|| format!("failed to launch {}", path.display()))?;
    Ok(())
}

fn cmd_check(install: Installation, url: Option<String>) -> Result<()> {
    let fetcher = HttpFetcher::new();
    let orchestrator =
        Orchestrator::new(install, &fetcher, &GitSync, &PyInstaller).with_url(url);
    let (decision, ctx) = orchestrator.check()?;

    match decision {
        UpdateDecision::FreshClone(reason) => {
            println!("fresh clone needed: {}", reason.describe());
        }
        UpdateDecision::Refresh => println!("update available"),
        UpdateDecision::UpToDate => println!("up to date"),
    }
    for (key, value) in ctx.display_fields() {
        println!("{key} = {value}");
    }
    Ok(())
}

fn cmd_path(install: &Installation) -> Result<()> {
    let Some(config) = InstallConfig::load(install.root()) else {
        bail!("no readable config.json at {}", install.config_path().display());
    };
    let Some(app_file) = config.app_file else {
        bail!("local config.json has no app_file field");
    };
    println!(
        "{}",
        resolve::executable_path(install.root(), &app_file).display()
    );
    Ok(())
}

fn cmd_config(install: &Installation, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => println!("{}", install.config_path().display()),
        ConfigAction::Show => {
            let Some(config) = InstallConfig::load(install.root()) else {
                bail!("no readable config.json at {}", install.config_path().display());
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
            if !config.is_complete(REQUIRED_FIELDS) {
                eprintln!("warning: config is missing required fields");
            }
        }
    }
    Ok(())
}
