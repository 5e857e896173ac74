use std::{error::Error, path::PathBuf};

use clap::Parser;
use log::error;

use promotion::{
    cli::{
        args::{CliArgs, Command, PromoteArgs},
        command_handlers::do_promote,
    },
    config::PromotionConfig,
    Promotion, PromotionBuilder,
};

fn main() {
    let cli_args = CliArgs::parse();
    let default_filter = if cli_args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli_args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli_args: CliArgs) -> Result<(), Box<dyn Error>> {
    let config = PromotionConfig::load()?;

    let mut builder = Promotion::builder();
    if let Some(cache_dir) = cli_args.cache_dir.map(PathBuf::from).or(config.cache_dir) {
        builder = builder.cache_directory(cache_dir);
    }

    match cli_args.cmd {
        Command::Promote(args) => {
            let builder = with_author(builder, &args, config.name, config.email, config.token)
                .insecure_skip_verify(args.insecure_skip_verify)
                .shallow(args.shallow);
            let promotion = builder.try_build()?;
            do_promote(&promotion, &args)
        }
        Command::ClearCache => builder.clear_cache(),
    }
}

fn with_author(
    mut builder: PromotionBuilder,
    args: &PromoteArgs,
    name: Option<String>,
    email: Option<String>,
    token: Option<String>,
) -> PromotionBuilder {
    if let Some(name) = args.name.clone().or(name) {
        builder = builder.name(name);
    }
    if let Some(email) = args.email.clone().or(email) {
        builder = builder.email(email);
    }
    if let Some(token) = args.github_token.clone().or(token) {
        builder = builder.token(token);
    }
    builder
}
