use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use ovl_engine::{telemetry, EngineConfig};
use std::path::PathBuf;

mod demo;

fn cli() -> Command {
    Command::new("ovl")
        .version(ovl_engine::VERSION)
        .about("Overlay/delta resolution engine for request examples")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Path to a TOML engine configuration"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .help("Log filter directive, e.g. `debug` or `info,ovl_engine=trace`"),
        )
        .subcommand(
            Command::new("demo")
                .about("Run the overlay walkthrough against an in-memory store")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(Command::new("config").about("Print the effective configuration"))
}

fn load_config(matches: &clap::ArgMatches) -> Result<EngineConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(filter) = matches.get_one::<String>("log-level") {
        config = config.with_log_filter(filter.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    telemetry::init(&config.log)?;

    match matches.subcommand() {
        Some(("demo", args)) => {
            let report = demo::run(&config).await?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render_text());
            }
        }
        Some(("config", _)) => {
            print!("{}", config.to_toml_string()?);
        }
        _ => {
            cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
