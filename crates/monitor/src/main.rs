use std::{env, fs, path::Path};

use anyhow::{Context, Result};
use clap::{crate_version, App, Arg, SubCommand};
use ms_config::Config;
use ms_monitor::runner;
use ms_telemetry::trace;

const COMMAND_RUN: &str = "run";
const COMMAND_EXAMPLE_CONFIG: &str = "generate-example-config";
const ARG_OUTPUT_PATH: &str = "output-path";
const ARG_CONFIG: &str = "config";

fn read_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read(&path)
        .with_context(|| format!("read config file from {}", path.as_ref().to_string_lossy()))?;
    let config = toml::from_slice(&content).with_context(|| "parse config file")?;
    Ok(config)
}

fn generate_example_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let mut config = Config::default();
    config.wallet.privkey_path = "./privkey".into();
    config.store.path = "./db".into();
    config.transport.listen = Some("127.0.0.1:5002".to_string());
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;
    Ok(())
}

async fn run_cli() -> Result<()> {
    let app = App::new("Monitoring Service")
        .about("Watches payment channel closes on behalf of an offline participant.")
        .version(crate_version!())
        .subcommand(
            SubCommand::with_name(COMMAND_RUN)
                .about("Run the monitoring service")
                .arg(
                    Arg::with_name(ARG_CONFIG)
                        .short("c")
                        .takes_value(true)
                        .required(true)
                        .default_value("./config.toml")
                        .help("The config file path"),
                )
                .display_order(0),
        )
        .subcommand(
            SubCommand::with_name(COMMAND_EXAMPLE_CONFIG)
                .about("Generate an example config file")
                .arg(
                    Arg::with_name(ARG_OUTPUT_PATH)
                        .short("o")
                        .takes_value(true)
                        .required(true)
                        .default_value("./config.example.toml")
                        .help("The path of the example config file"),
                )
                .display_order(1),
        );

    // handle subcommands
    let matches = app.get_matches();
    match matches.subcommand() {
        (COMMAND_RUN, Some(m)) => {
            let config_path = m.value_of(ARG_CONFIG).unwrap_or("./config.toml");
            let config = read_config(config_path)?;
            let _guard = trace::init()?;
            runner::run(config).await?;
        }
        (COMMAND_EXAMPLE_CONFIG, Some(m)) => {
            let path = m.value_of(ARG_OUTPUT_PATH).unwrap_or("./config.example.toml");
            generate_example_config(path)?;
        }
        _ => {
            // default command: start the service
            let config = read_config("./config.toml")?;
            let _guard = trace::init()?;
            runner::run(config).await?;
        }
    };
    Ok(())
}

fn main() -> Result<()> {
    let threads = match env::var("MS_THREADS") {
        Err(env::VarError::NotPresent) => num_cpus::get(),
        Err(e) => return Err(e.into()),
        Ok(v) => v.parse()?,
    };
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(threads)
        .enable_all()
        .build()?;

    rt.block_on(run_cli())
}
