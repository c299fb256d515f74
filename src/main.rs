use apex::{cli, config, errors};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(!cli.no_color)
            .init();
    }
    if cli.no_color {
        console::set_colors_enabled(false);
    }

    let result = match cli.command {
        cli::Commands::Serve(args) => cli::serve::handle_serve(args).await,
        cli::Commands::Plan(args) => cli::plan::handle_plan(args).await,
        cli::Commands::Catalog(args) => cli::catalog::handle_catalog(args).await,
        cli::Commands::Validate(args) => handle_validate(args).await,
        cli::Commands::Status(args) => cli::status::handle_status(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let exit_code = match &e {
            errors::ApexError::Config(_) | errors::ApexError::Yaml(_) => 2,
            errors::ApexError::Network(_) => 3,
            errors::ApexError::InvalidScope(_) | errors::ApexError::MissingCredential(_) => 4,
            e if e.is_validation() => 5,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}

async fn handle_validate(args: cli::commands::ValidateArgs) -> Result<(), errors::ApexError> {
    let path = std::path::PathBuf::from(&args.config);
    let config = config::parse_config(&path).await?;
    println!("Configuration is valid: {}", args.config);
    println!(
        "  retries: {} (ceiling {}), consensus: T={} Q={}",
        config.retry.max_retries,
        config.retry.max_retries_ceiling,
        config.consensus.accept_threshold,
        config.consensus.quorum,
    );
    Ok(())
}
