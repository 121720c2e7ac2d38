#![doc = include_str!("../README.md")]

pub mod cli;
pub mod command;
pub mod error;
pub mod fs;

pub use error::*;
pub use fs::{DirectoryLock, LockStatus, TransactionalDirectory, TransactionalFileSystem};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() -> Result<()> {
    use clap::Parser;
    use command::TxfsCommand;

    let cli = cli::TxfsCli::parse();
    cli.init_logging();

    match cli.command {
        TxfsCommand::Status(args) => command::status::execute(args),
        TxfsCommand::Recover(args) => command::recover::execute(args),
        TxfsCommand::Export(args) => command::export::execute(args),
        TxfsCommand::Import(args) => command::import::execute(args),
    }
}
