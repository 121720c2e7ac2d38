use crate::command::TxfsCommand;
use clap::{ArgAction, Parser};

#[derive(Parser)]
#[command(
    name = "txfs",
    version,
    about = "Inspect, recover and archive transactional file system directories"
)]
pub struct TxfsCli {
    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: TxfsCommand,
}

impl TxfsCli {
    /// Installs the logger. `RUST_LOG` takes precedence over `-v`.
    pub fn init_logging(&self) {
        let level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
            .format_timestamp(None)
            .try_init();
    }
}
