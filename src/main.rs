use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use blocklaunch_lib::commands::{self, LaunchOptions};
use blocklaunch_lib::core::error::LauncherResult;
use blocklaunch_lib::core::sinks::{ConsoleLogSink, ConsoleProgress};
use blocklaunch_lib::core::state::AppState;
use blocklaunch_lib::core::version::VersionType;

/// Command-line front end for the BlockLaunch core.
#[derive(Parser)]
#[command(name = "blocklaunch")]
#[command(about = "Install, verify and launch vanilla Minecraft versions", long_about = None)]
#[command(version)]
struct Cli {
    /// Launcher data directory (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List versions from the manifest
    Versions {
        /// release, snapshot, old_beta or old_alpha
        #[arg(short = 't', long = "type")]
        version_type: Option<String>,
    },
    /// Show the latest release and snapshot
    Latest,
    /// Re-download the version manifest
    Refresh,
    /// Download a version and everything it needs
    Install {
        id: String,
        #[arg(long)]
        skip_assets: bool,
    },
    /// List locally installed versions
    Installed,
    /// Re-verify every installed version
    Validate,
    /// Launch an installed version
    Launch {
        id: String,
        #[arg(short, long)]
        player: Option<String>,
        /// Maximum heap in MB
        #[arg(short, long)]
        memory: Option<u32>,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// JDK home or java binary
        #[arg(long)]
        java: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    blocklaunch_lib::init_tracing();
    let cli = Cli::parse();

    let state = match AppState::new(cli.data_dir.clone()) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    match run(&state, cli.command, cli.json).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// Returns the process exit code.
async fn run(state: &AppState, command: Commands, json: bool) -> LauncherResult<i32> {
    match command {
        Commands::Versions { version_type } => {
            commands::check_for_updates(state).await;
            let filter = version_type.as_deref().map(VersionType::from_label);
            let versions = commands::list_versions(state, filter).await?;
            print_or(json, &versions, || {
                for v in &versions {
                    println!("{:<24} {:<10} {}", v.id, v.version_type, v.release_time);
                }
            })?;
        }
        Commands::Latest => {
            commands::check_for_updates(state).await;
            let latest = commands::latest_versions(state).await?;
            print_or(json, &latest, || {
                let name = |v: &Option<commands::VersionInfo>| {
                    v.as_ref().map(|v| v.id.clone()).unwrap_or_else(|| "-".into())
                };
                println!("release:  {}", name(&latest.release));
                println!("snapshot: {}", name(&latest.snapshot));
            })?;
        }
        Commands::Refresh => {
            let count = commands::refresh_versions(state).await?;
            println!("Manifest refreshed, {count} versions cached");
        }
        Commands::Install { id, skip_assets } => {
            let progress = ConsoleProgress::new();
            let result = commands::install_version(state, &id, !skip_assets, Some(&progress)).await;
            progress.finish();
            let report = result?;
            print_or(json, &report, || {
                println!(
                    "{}: {} classpath entries",
                    report.version_id, report.classpath_entries
                );
                for failure in &report.failures {
                    println!("  not verified: {failure}");
                }
            })?;
        }
        Commands::Installed => {
            let installed = commands::list_installed(state)?;
            print_or(json, &installed, || {
                for v in &installed {
                    println!("{:<28} {}", v.display_name, v.status);
                }
            })?;
        }
        Commands::Validate => {
            let reports = commands::validate_all_installed(state).await?;
            let all_ok = reports.iter().all(|r| r.is_ok());
            print_or(json, &reports, || {
                for r in &reports {
                    match &r.error {
                        Some(e) => println!("{:<24} FAILED: {e}", r.version_id),
                        None if r.failures.is_empty() => println!("{:<24} OK", r.version_id),
                        None => println!("{:<24} {} not verified", r.version_id, r.failures.len()),
                    }
                }
            })?;
            return Ok(if all_ok { 0 } else { 1 });
        }
        Commands::Launch {
            id,
            player,
            memory,
            width,
            height,
            java,
        } => {
            let options = LaunchOptions {
                version_id: id,
                player_name: player,
                memory_mb: memory,
                width,
                height,
                java_path: java,
            };
            let progress = ConsoleProgress::new();
            let launched =
                commands::launch_version(state, &options, Arc::new(ConsoleLogSink), Some(&progress))
                    .await;
            progress.finish();
            let mut instance = launched?;
            let exit = instance.wait().await;
            return Ok(exit.exit_code().unwrap_or(1));
        }
    }
    Ok(0)
}

fn print_or<T: Serialize>(json: bool, value: &T, plain: impl FnOnce()) -> LauncherResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        plain();
    }
    Ok(())
}
