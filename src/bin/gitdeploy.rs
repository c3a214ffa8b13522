//! CLI for gitdeploy.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gitdeploy::fs;
use gitdeploy::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gitdeploy")]
#[command(author, version, about = "Deploy working trees with git", long_about = None)]
struct Cli {
    /// Config file (defaults to $GITDEPLOY_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the deploy root
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone a remote into <root>/<project>
    Clone { url: String, project: String },

    /// Pull a branch from a remote
    Pull {
        url: String,
        project: String,
        branch: String,
    },

    /// Commit all changes on a branch and push them
    Push {
        url: String,
        project: String,
        branch: String,

        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Print the commit HEAD (or a branch) points at
    Head {
        project: String,

        /// Resolve this branch instead of HEAD
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// List commits on a branch that touched a file
    Log {
        project: String,
        branch: String,
        file: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Check that an SSH remote answers
    Probe { url: String },

    /// Run a shell script with a deadline
    Script {
        file: PathBuf,

        /// Deadline in seconds (default 60)
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// GitLab API queries
    #[command(subcommand)]
    Gitlab(GitLabCommands),
}

#[derive(Subcommand)]
enum GitLabCommands {
    /// Show a project by id, path, or name within a namespace
    Project {
        project: String,

        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Show a branch and its tip commit
    Branch { project: String, branch: String },

    /// Fetch a file's raw content
    File {
        project: String,
        branch: String,
        path: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => DeployConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?
            .with_env_overrides(),
        None => DeployConfig::discover().context("Failed to load config")?,
    };
    if let Some(root) = cli.root {
        config.deploy_root = root;
    }

    match cli.command {
        Commands::Clone { url, project } => {
            let deployer = GitDeployer::new(config)?;
            report(deployer.clone_project(&url, &project)?)
        }
        Commands::Pull {
            url,
            project,
            branch,
        } => {
            let deployer = GitDeployer::new(config)?;
            report(deployer.pull(&url, &project, &branch)?)
        }
        Commands::Push {
            url,
            project,
            branch,
            message,
        } => {
            let deployer = GitDeployer::new(config)?;
            report(deployer.push(&url, &project, &branch, &message)?)
        }
        Commands::Head { project, branch } => {
            let deployer = GitDeployer::new(config)?;
            let id = match branch {
                Some(branch) => deployer.branch_commit(&project, &branch)?,
                None => deployer.head_commit(&project)?,
            };
            println!("{}", id);
            Ok(())
        }
        Commands::Log {
            project,
            branch,
            file,
            json,
        } => cmd_log(config, &project, &branch, &file, json),
        Commands::Probe { url } => cmd_probe(config, &url),
        Commands::Script { file, timeout } => cmd_script(config, file, timeout),
        Commands::Gitlab(command) => cmd_gitlab(config, command),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "gitdeploy=debug"
    } else {
        "gitdeploy=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints whatever the pipeline produced, then fails if a step did.
fn report(outcome: PipelineOutcome) -> Result<()> {
    print!("{}", outcome.output);
    if let Some(failure) = &outcome.failure {
        eprintln!(
            "step {}/{} ({}) failed",
            failure.index + 1,
            outcome.total,
            failure.name
        );
    }
    outcome.into_result()?;
    Ok(())
}

fn cmd_log(config: DeployConfig, project: &str, branch: &str, file: &str, json: bool) -> Result<()> {
    let deployer = GitDeployer::new(config)?;
    let commits = deployer.file_commits(project, branch, file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&commits)?);
    } else {
        for commit in commits {
            println!("{} {}", commit.id, commit.message);
        }
    }
    Ok(())
}

fn cmd_probe(config: DeployConfig, url: &str) -> Result<()> {
    let Some(target) = SshTarget::from_remote_url(url) else {
        println!("{} is not an SSH remote, nothing to probe", url);
        return Ok(());
    };
    let prober = Prober::new(SystemRunner, &config.ssh, config.probe);
    prober.probe(&target)?;
    println!("{} is reachable", target.host);
    Ok(())
}

fn cmd_script(config: DeployConfig, file: PathBuf, timeout: Option<u64>) -> Result<()> {
    let script = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read script {}", file.display()))?;

    let runner = ScriptRunner::new(SystemRunner, &config.shell);
    let result = runner.run(&script, timeout.map(Duration::from_secs))?;
    print!("{}", result.combined_output());
    result.check("script.run")?;
    Ok(())
}

fn cmd_gitlab(config: DeployConfig, command: GitLabCommands) -> Result<()> {
    let client = GitLabClient::from_config(&config.gitlab)?;

    match command {
        GitLabCommands::Project { project, namespace } => {
            let project = match namespace {
                Some(namespace) => client.project_by_name(&namespace, &project)?,
                None => client.project(&project)?,
            };
            println!("{}", serde_json::to_string_pretty(&project)?);
        }
        GitLabCommands::Branch { project, branch } => {
            let branch = client.branch(&project, &branch)?;
            println!("{}", serde_json::to_string_pretty(&branch)?);
        }
        GitLabCommands::File {
            project,
            branch,
            path,
            output,
        } => {
            let content = client.raw_file(&project, &branch, &path)?;
            match output {
                Some(out) => {
                    fs::write_file(&out, content.as_bytes(), None)?;
                    tracing::info!(path = %out.display(), bytes = content.len(), "file written");
                }
                None => print!("{}", content),
            }
        }
    }
    Ok(())
}
