use clap::Parser;
use std::path::PathBuf;

/// kb_light_statsd: keyboard backlight that shows system load and dims when idle
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file path (default: standard locations)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Detach from the terminal and run in the background
    #[arg(short = 'd', long = "daemonize", default_value = "false")]
    pub daemonize: bool,

    /// PID file written when daemonized
    #[arg(short = 'p', long = "pid-file", default_value = "/run/kb_light_statsd.pid")]
    pub pid_file: PathBuf,

    /// Log at debug level
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    pub verbose: bool,
}
