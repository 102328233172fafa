use clap::Parser;
use log::LevelFilter;

mod cli;
mod command;
mod config;
mod demo;

use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    let config_path = cli.config.clone().or_else(config::get_config_path);
    let app_config = config::load_config(config_path.as_deref());

    match cli.command {
        Commands::Eval { file, plug, context } => command::eval(&file, &plug, &context, &app_config),
        Commands::Hash { file, plug, context } => command::hash(&file, &plug, &context, &app_config),
        Commands::Dirty { file, plug } => command::dirty(&file, &plug, &app_config),
        Commands::Tree { file } => command::tree(&file, &app_config),
        Commands::Demo { out, iterations } => command::demo(out.as_deref(), iterations),
        Commands::Config { init } => {
            if let Some(path) = config_path.as_deref().filter(|p| init && !p.exists()) {
                config::save_config(&app_config, path)?;
            }
            command::show_config(&app_config, config_path.as_deref())
        }
    }
}
