use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "apex", version, about = "Security test orchestration and finding validation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server and the job dispatcher
    Serve(ServeArgs),
    /// Generate a test plan for a project file
    Plan(PlanArgs),
    /// List the test case catalog
    Catalog(CatalogArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
    /// Query a job on a running server
    Status(StatusArgs),
}

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Listen port (overrides config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Listen address (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Directory for JSONL audit logs (overrides config)
    #[arg(long)]
    pub audit_dir: Option<String>,
}

#[derive(Args, Clone)]
pub struct PlanArgs {
    /// Project YAML file (project, targets, credentials)
    pub project: String,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Only plan these test case ids (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub test_cases: Option<Vec<String>>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct CatalogArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Only show one category, by code (INPV) or name
    #[arg(long)]
    pub category: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: String,
}

#[derive(Args, Clone)]
pub struct StatusArgs {
    /// Job ID to query
    pub job_id: String,

    /// Server base URL
    #[arg(long, default_value = "http://localhost:8080")]
    pub server: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Continuously poll until the job is terminal
    #[arg(long)]
    pub follow: bool,

    /// Poll interval in seconds
    #[arg(long, default_value = "5")]
    pub interval: u64,
}
