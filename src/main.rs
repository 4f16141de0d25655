//! lineserver - serve individual lines of a large text file over HTTP
//!
//! The file is indexed once at startup; each request reads only a bounded window of it.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use lineserver::config::Config;
use lineserver::logging::init_logging;
use lineserver::Application;
use std::path::PathBuf;

fn cli() -> Command {
    let command = Command::new("lineserver")
        .version(lineserver::VERSION)
        .about("Serve individual lines of a large text file over HTTP")
        .long_about(
            "lineserver indexes a text file once at startup and answers GET /lines/<n> \
             requests by reading only the indexed window that contains line n.",
        )
        .arg(
            Arg::new("file")
                .help("Path to the text file to serve")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .index(1),
        )
        .arg(
            Arg::new("port")
                .help("Port to listen on [default: 3000]")
                .value_parser(value_parser!(u16))
                .index(2),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .help("Address to bind [default: 127.0.0.1]"),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .help("Lines between sparse index samples [default: 5000]")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (-v debug, -vv trace)")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only log errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        );

    #[cfg(feature = "config")]
    let command = command.arg(
        Arg::new("config")
            .long("config")
            .help("Path to a TOML configuration file")
            .value_parser(value_parser!(PathBuf)),
    );

    command
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    #[cfg(feature = "config")]
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    #[cfg(not(feature = "config"))]
    let mut config = Config::default();

    // Command-line flags override file values
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }
    if let Some(host) = matches.get_one::<String>("host") {
        config.server.hostname = host.clone();
    }
    if let Some(interval) = matches.get_one::<u64>("interval") {
        config.engine.index_line_interval = *interval;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_count("verbose"), matches.get_flag("quiet"));

    let config = load_config(&matches)?;
    let file_path = matches
        .get_one::<PathBuf>("file")
        .context("Missing file argument")?;

    let app = Application::new(file_path, config)
        .await
        .with_context(|| format!("Failed to open {}", file_path.display()))?;
    app.run().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert!(!lineserver::VERSION.is_empty());
    }

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_cli_overrides() {
        let matches = cli()
            .try_get_matches_from(["lineserver", "data.txt", "8080", "--interval", "100", "--host", "0.0.0.0"])
            .unwrap();
        assert_eq!(matches.get_one::<u16>("port"), Some(&8080));
        assert_eq!(matches.get_one::<u64>("interval"), Some(&100));
        assert_eq!(matches.get_one::<String>("host").map(String::as_str), Some("0.0.0.0"));
    }

    #[test]
    fn test_cli_requires_file() {
        assert!(cli().try_get_matches_from(["lineserver"]).is_err());
    }
}
