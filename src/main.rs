mod cli;

use std::fs::File;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use daemonize::Daemonize;
use log::{LevelFilter, error};
use syslog::{BasicLogger, Facility, Formatter3164};

use cli::Cli;
use ledtrigd::{application::Application, config::Config, error::is_configuration_failure};

const DAEMON_LOG: &str = "/var/tmp/ledtrigd.log";

fn init_log(level: LevelFilter) -> Result<()> {
    let logger = syslog::unix(Formatter3164 {
        facility: Facility::LOG_USER,
        hostname: None,
        process: "ledtrigd".into(),
        pid: 0,
    })
    .map_err(|e| anyhow!("Failed to connect to syslog: {e}"))?;

    log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
        .map_err(|e| anyhow!("Failed to install logger: {e}"))?;
    log::set_max_level(level);
    Ok(())
}

fn into_daemon(log_path: &str) -> Result<()> {
    let stdout =
        File::create(log_path).with_context(|| format!("Failed to create {log_path}"))?;
    let stderr = stdout.try_clone()?;
    Daemonize::new()
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .map_err(|e| anyhow!("Failed to daemonize: {e}"))
}

fn run(config: Config) -> Result<()> {
    let app = Application::builder().with_config(config).build()?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(app.run())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_log(if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    })?;
    // Fork before any runtime or loop thread exists.
    if cli.daemonize {
        into_daemon(DAEMON_LOG)?;
    }

    let config = Config::load(cli.config)?;
    match run(config) {
        // An unclaimable device is reported, not turned into an exit status.
        Err(e) if is_configuration_failure(&e) => {
            error!("An error occurred in main thread: {e:#}");
            Ok(())
        }
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritable_daemon_log_fails_before_forking() {
        let err = into_daemon("/nonexistent/ledtrigd/ledtrigd.log").unwrap_err();
        assert!(err.to_string().contains("Failed to create /nonexistent/ledtrigd"));
    }
}
