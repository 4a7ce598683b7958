use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use grainsql::{commands, config, constants};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = constants::CONFIG_FILENAME, global = true)]
    config_file: String,

    /// Enable verbose output (info level)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress all non-essential output (error level only)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Enable debug output (debug level)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct GenerateArgs {
    #[command(flatten)]
    model_args: config::ModelArgs,

    #[command(flatten)]
    target_args: config::TargetArgs,

    #[command(flatten)]
    output_args: config::OutputArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the creation script of the model for one dialect
    Generate(GenerateArgs),

    /// Load and validate the model
    Check {
        #[command(flatten)]
        model_args: config::ModelArgs,
    },

    /// Print the checksum of every materialized view
    Checksum {
        #[command(flatten)]
        model_args: config::ModelArgs,
    },
}

fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    initialize_logging(&cli);
    run_main(cli)
}

fn initialize_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn" // default level
    };

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_main(cli: Cli) -> Result<()> {
    let (file_config, root_dir) = config::load_config(&cli.config_file)?;

    let cli_config = match &cli.command {
        Commands::Generate(args) => config::ConfigInput::from_args(
            args.model_args.clone(),
            args.target_args.clone(),
            Some(args.output_args.clone()),
        ),
        Commands::Check { model_args } | Commands::Checksum { model_args } => {
            config::ConfigInput::from_args(model_args.clone(), config::TargetArgs::default(), None)
        }
    };

    // paths in the config file are relative to the file itself
    let config = config::ConfigBuilder::new()
        .with_file(file_config.rooted_at(&root_dir))
        .with_cli_args(cli_config)
        .resolve()?;

    match &cli.command {
        Commands::Generate(_) => {
            info!("Generating {} script", config.dialect);
            commands::cmd_generate(&config)
        }
        Commands::Check { .. } => commands::cmd_check(&config),
        Commands::Checksum { .. } => commands::cmd_checksum(&config),
    }
}
