use clap::{Args, Parser, Subcommand};

/// Promotes service configuration between GitOps environment repositories.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Location of the repository cache.
    /// Defaults to $HOME/.promotion/cache
    #[clap(long, global = true)]
    pub cache_dir: Option<String>,
    /// Log at debug level unless RUST_LOG is set
    #[clap(long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    ///Copies a service's configuration into a new branch of another environment and pushes it
    Promote(PromoteArgs),
    ///Removes every cached repository
    ClearCache,
}

#[derive(Debug, Args)]
pub struct PromoteArgs {
    /// Repository to promote from
    #[clap(long)]
    pub from: String,
    /// Repository to promote to
    #[clap(long)]
    pub to: String,
    /// Service whose configuration is promoted
    #[clap(long)]
    pub service: String,
    #[clap(long, default_value = "master")]
    pub from_branch: String,
    #[clap(long, default_value = "master")]
    pub to_branch: String,
    /// Environment folder to promote from.
    /// Discovered from the repository when omitted
    #[clap(long)]
    pub from_environment: Option<String>,
    /// Environment folder to promote to.
    /// Discovered from the repository when omitted
    #[clap(long)]
    pub to_environment: Option<String>,
    /// Name of the branch to create.
    /// Defaults to the service name followed by a timestamp
    #[clap(long, default_value = "")]
    pub branch_name: String,
    /// Commit message
    #[clap(long, default_value = "")]
    pub msg: String,
    /// Commit author name, defaults to user.name from the git configuration
    #[clap(long)]
    pub name: Option<String>,
    /// Commit author email, defaults to user.email from the git configuration
    #[clap(long)]
    pub email: Option<String>,
    #[clap(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,
    /// Accept any TLS certificate or SSH host key
    #[clap(long)]
    pub insecure_skip_verify: bool,
    /// Keep the cloned repositories after a successful promotion
    #[clap(long)]
    pub keep_cache: bool,
    /// Clone the source repository with a depth of one
    #[clap(long)]
    pub shallow: bool,
}
