use clap::Parser;
use std::path::PathBuf;

/// ledtrigd: button driven LED trigger and GPIO waveform daemon
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file path (default: ~/.config/ledtrigd/config.yml, then /etc/ledtrigd/config.yml)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Detach from the terminal and run in the background
    #[arg(short = 'd', long = "daemonize", default_value = "false")]
    pub daemonize: bool,

    /// Log at debug level
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    pub verbose: bool,
}
