use clap::Parser;
use netweave::cli::{
    handle_completions, handle_config_init, handle_pools, handle_validate, Cli, Commands,
    ConfigCommands,
};
use netweave::config::NetweaveConfig;

fn main() {
    let cli = Cli::parse();

    // The command's own config file drives logging; NETWEAVE_LOG_* and RUST_LOG still win
    let logging = NetweaveConfig {
        logging: cli.command.logging_config(),
        ..NetweaveConfig::default()
    }
    .with_env_overrides()
    .logging;
    if let Err(e) = netweave::logging::init_tracing(&logging) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let result = match cli.command {
        Commands::Pools(args) => handle_pools(&args),
        Commands::Validate(args) => handle_validate(&args),
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(String::new())
        }
    };

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
