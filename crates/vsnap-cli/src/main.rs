//! # vsnap CLI
//!
//! Command-line interface for the vsnap local snapshot repository.

mod output;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use vsnap_config::logging::{init_logging, LogLevel};
use vsnap_config::path::normalize_root;
use vsnap_config::{log_cli_debug, Config};
use vsnap_repo::{CommitId, Repository};

/// vsnap - whole-tree snapshots of a local directory
#[derive(Parser)]
#[command(name = "vsnap")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Repository root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR", env = "VSNAP_REPO")]
    repo: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the repository metadata (no-op if it already exists)
    Init,

    /// Snapshot the entire working tree
    Commit {
        /// Commit message
        #[arg(short, long, default_value = "")]
        message: String,
    },

    /// List commits, newest first
    Log {
        /// Show only the newest N commits
        #[arg(short = 'n', long = "max-count", value_name = "N")]
        max_count: Option<usize>,
    },

    /// Make the working tree match a commit
    Checkout {
        #[arg(value_name = "ID")]
        id: CommitId,

        /// Print the planned writes and deletes without touching any file
        #[arg(long)]
        dry_run: bool,
    },

    /// List the files recorded in a commit
    Show {
        #[arg(value_name = "ID")]
        id: CommitId,
    },

    /// Write a stored blob to stdout
    CatBlob {
        #[arg(value_name = "HASH")]
        hash: String,
    },

    /// Write the current content of a working file to stdout
    Cat {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Display repository statistics
    Stats,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file locations
    Path,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(LogLevel::from_verbosity(cli.verbose));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = match &cli.repo {
        Some(dir) => normalize_root(dir)?,
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            normalize_root(cwd)?
        }
    };
    let json = cli.json;
    let root_display = root.display().to_string();
    log_cli_debug!("Resolved repository root", root = root_display.as_str());

    match cli.command {
        Commands::Init => {
            let repo = Repository::create(&root)?;
            if json {
                output::json(&serde_json::json!({ "root": repo.root() }))
            } else {
                println!(
                    "Initialized vsnap repository in {}",
                    repo.metadata_dir().display()
                );
                Ok(())
            }
        }
        Commands::Commit { message } => {
            let result = open(&root)?.commit(&message)?;
            if json {
                output::json(&result)
            } else {
                output::commit(&result);
                Ok(())
            }
        }
        Commands::Log { max_count } => {
            let repo = open(&root)?;
            let entries = match max_count {
                Some(n) => repo.log_limited(n)?,
                None => repo.log()?,
            };
            if json {
                output::json(&entries)
            } else {
                output::log(&entries);
                Ok(())
            }
        }
        Commands::Checkout { id, dry_run } => {
            let repo = open(&root)?;
            if dry_run {
                let plan = repo.plan_checkout(id)?;
                if json {
                    return output::json(&plan);
                }
                output::plan(&plan);
                return Ok(());
            }
            let result = repo.checkout(id)?;
            if json {
                output::json(&result)
            } else {
                output::checkout(&result);
                Ok(())
            }
        }
        Commands::Show { id } => {
            let files = open(&root)?.commit_files(id)?;
            if json {
                output::json(&files)
            } else {
                output::files(&files);
                Ok(())
            }
        }
        Commands::CatBlob { hash } => {
            let content = open(&root)?.blob_content(&hash)?;
            write_raw(&content)
        }
        Commands::Cat { path } => {
            let content = open(&root)?.working_file_content(&path)?;
            if json {
                return output::json(&content);
            }
            if !content.exists {
                eprintln!("{}", style(format!("{} does not exist", path)).dim());
            }
            write_raw(&content.content)
        }
        Commands::Stats => {
            let stats = open(&root)?.stats()?;
            if json {
                output::json(&stats)
            } else {
                output::stats(&stats);
                Ok(())
            }
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = Config::load(Some(root.as_path())).context("Failed to load configuration")?;
                if json {
                    return output::json(&config);
                }
                print!("{}", config.to_toml()?);
                Ok(())
            }
            ConfigCommands::Path => {
                let global = Config::global_config_path();
                let project = Config::project_config_path(&root);
                if json {
                    return output::json(&serde_json::json!({
                        "global": global,
                        "project": project,
                    }));
                }
                match global {
                    Some(path) => println!("Global:  {}", path.display()),
                    None => println!("Global:  (no home directory)"),
                }
                println!("Project: {}", project.display());
                Ok(())
            }
        },
    }
}

fn open(root: &std::path::Path) -> Result<Repository> {
    Repository::open(root).with_context(|| format!("Cannot open repository at {}", root.display()))
}

fn write_raw(bytes: &[u8]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(bytes)?;
    stdout.flush()?;
    Ok(())
}
