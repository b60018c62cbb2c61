use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;

use gitrelease::config;
use gitrelease::download::HttpDownloader;
use gitrelease::github::client::{GitHubClient, ReleaseSource};
use gitrelease::inventory::{ArtifactInfo, ArtifactInspector, Installer, ManifestInventory};
use gitrelease::reconcile::{ReconcileEngine, RepoState, TrackStatus};
use gitrelease::repos::{AddOutcome, RemoveOutcome, RepoManager, TokenOutcome, parse_repo_input};
use gitrelease::store::Store;
use gitrelease::track::{TrackKind, resolve_tracks};
use gitrelease::update::{UpdateOrchestrator, UpdateOutcome};

#[derive(Parser)]
#[command(name = "gitrelease")]
#[command(version, about = "Track GitHub releases and compare them against installed packages")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile every tracked repository and print the result
    Check,
    /// List tracked repositories
    List,
    /// Track a new repository ('owner/repo' or a GitHub URL)
    Add { repo: String },
    /// Stop tracking a repository
    Remove { repo: String },
    /// Download a track's artifact and decide whether to install it
    Update {
        repo: String,
        /// 'release' or 'pre-release'
        #[arg(default_value = "release")]
        track: String,
    },
    /// Manage stored access tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Delete previously downloaded artifacts
    ClearDownloads,
}

#[derive(Subcommand)]
enum TokenAction {
    /// Validate a token against the API and store it
    Add { token: String },
    /// Forget a stored token
    Remove { token: String },
    /// List stored tokens by account
    List,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = init_logging()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}

fn init_logging() -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(config::data_dir())?;

    let appender = tracing_appender::rolling::never(config::data_dir(), config::LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gitrelease=debug".parse()?),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}

/// Inspector used by the CLI. Desktop builds cannot parse Android packages,
/// so every artifact falls back to the raw-install path.
struct NoopInspector;

impl ArtifactInspector for NoopInspector {
    fn inspect(&self, file: &Path) -> Option<ArtifactInfo> {
        debug!("No artifact inspector on this platform, skipping {:?}", file);
        None
    }
}

/// Installer used by the CLI: prints what the user should do with the file.
struct ConsoleInstaller;

impl Installer for ConsoleInstaller {
    fn launch_install(&self, file: &Path) {
        println!("Downloaded to {}", file.display());
        println!("Install it with your platform's package installer.");
    }

    fn request_uninstall(&self, package_id: &str) {
        println!("The downloaded artifact is older than the installed {package_id}.");
        println!("Uninstall it first if you really want to roll back.");
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = Arc::new(Store::new(&config::db_path())?);
    let source: Arc<dyn ReleaseSource> = Arc::new(GitHubClient::default());
    let inventory = Arc::new(ManifestInventory::new(config::manifest_path()));
    let downloader = Arc::new(HttpDownloader::new(config::download_dir()));

    match cli.command {
        Command::Check => {
            let engine = ReconcileEngine::new(store, Arc::clone(&source), inventory);
            match engine.try_refresh().await? {
                Some(states) => print_states(&states),
                None => println!("A check is already running."),
            }
        }
        Command::List => {
            for repo in store.all_repositories()? {
                let auth = if repo.access_token.is_some() {
                    " (authenticated)"
                } else {
                    ""
                };
                println!("{}{}", repo.full_path(), auth);
            }
        }
        Command::Add { repo } => {
            let manager = RepoManager::new(store, Arc::clone(&source));
            match manager.add_repository(&repo).await? {
                AddOutcome::Added(repo) => println!("Now tracking {}", repo.full_path()),
                AddOutcome::Rejected(reason) => anyhow::bail!("{reason}"),
            }
        }
        Command::Remove { repo } => {
            let Some((owner, name)) = parse_repo_input(&repo) else {
                anyhow::bail!("invalid repository format, use 'owner/repo' or a GitHub URL");
            };
            let Some(tracked) = store.find_repository(&owner, &name)? else {
                anyhow::bail!("{owner}/{name} is not tracked");
            };

            let manager = RepoManager::new(store, Arc::clone(&source));
            match manager.remove_repository(&tracked)? {
                RemoveOutcome::Removed => println!("Removed {}", tracked.full_path()),
                RemoveOutcome::Protected => {
                    anyhow::bail!("{} is the default repository and cannot be removed", tracked.full_path())
                }
            }
        }
        Command::Update { repo, track } => {
            let kind: TrackKind = track.parse().map_err(anyhow::Error::msg)?;

            let Some((owner, name)) = parse_repo_input(&repo) else {
                anyhow::bail!("invalid repository format, use 'owner/repo' or a GitHub URL");
            };
            let Some(tracked) = store.find_repository(&owner, &name)? else {
                anyhow::bail!("{owner}/{name} is not tracked");
            };

            let releases = source
                .fetch_releases(&tracked.owner, &tracked.name, tracked.access_token.as_deref())
                .await?;
            let Some(track) = resolve_tracks(&releases).into_iter().find(|t| t.kind == kind)
            else {
                anyhow::bail!("{} has no {} track", tracked.full_path(), kind.as_str());
            };

            let orchestrator = UpdateOrchestrator::new(
                store,
                downloader,
                inventory,
                Arc::new(NoopInspector),
                Arc::new(ConsoleInstaller),
            );
            // ProgressFn is 'static, so the callback owns what it prints.
            let version = track.version.clone();
            let outcome = orchestrator
                .run(&tracked, &track, &move |percent| {
                    print!("\rDownloading {version}: {percent}%");
                    let _ = std::io::stdout().flush();
                })
                .await?;
            println!();

            match outcome {
                UpdateOutcome::Installing { file, .. } => {
                    println!("Ready: {}", file.display());
                }
                UpdateOutcome::DowngradeBlocked {
                    package_id,
                    installed_code,
                    artifact_code,
                    ..
                } => {
                    println!(
                        "Blocked: {package_id} is at code {installed_code}, artifact is {artifact_code}"
                    );
                }
            }
        }
        Command::Token { action } => match action {
            TokenAction::Add { token } => {
                let manager = RepoManager::new(store, Arc::clone(&source));
                match manager.add_credential(&token).await? {
                    TokenOutcome::Added(credential) => {
                        println!("Stored token for {}", credential.username)
                    }
                    TokenOutcome::Rejected(reason) => anyhow::bail!("{reason}"),
                }
            }
            TokenAction::Remove { token } => {
                let manager = RepoManager::new(store, Arc::clone(&source));
                if manager.remove_credential(&token)? {
                    println!("Token removed");
                } else {
                    anyhow::bail!("no such token");
                }
            }
            TokenAction::List => {
                for credential in store.all_credentials()? {
                    let email = credential.email.as_deref().unwrap_or("-");
                    println!("{} ({})", credential.username, email);
                }
            }
        },
        Command::ClearDownloads => {
            let deleted = downloader.clear_downloads().await?;
            println!("Deleted {deleted} downloaded artifact(s)");
        }
    }

    Ok(())
}

fn print_states(states: &[RepoState]) {
    for state in states {
        println!("{}", state.repo.full_path());

        if let Some(error) = &state.error {
            println!("  error: {error}");
            continue;
        }

        for installed in &state.installed {
            let code = installed
                .version_code
                .map(|c| format!(" ({c})"))
                .unwrap_or_default();
            println!("  installed: {} {}{code}", installed.package_id, installed.version_name);
        }

        if state.tracks.is_empty() {
            println!("  no releases");
            continue;
        }

        for track_state in &state.tracks {
            let status = match track_state.status {
                TrackStatus::Installed => "installed",
                TrackStatus::Update => "update available",
                TrackStatus::Old => "older than installed",
                TrackStatus::Unknown => "unknown package",
            };
            println!(
                "  {}: {} [{status}]",
                track_state.track.kind.as_str(),
                track_state.track.version
            );
        }

        if state.is_up_to_date {
            println!("  up to date");
        }
    }
}
