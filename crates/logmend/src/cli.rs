//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use logmend_core::DEFAULT_MAX_RECREATE_ATTEMPTS;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "logmend")]
#[command(version, about = "Append-only log files that survive deletion and rotation by others")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Append stdin lines to managed log files until EOF or a signal
    Pipe(PipeArgs),

    /// Check that the directory of a log file is writable
    Check(CheckArgs),
}

#[derive(Args)]
pub struct PipeArgs {
    /// Log file to append to
    #[arg(short, long, conflicts_with_all = ["name", "config"])]
    pub file: Option<PathBuf>,

    /// Stream name, written to ~/.logmend/logs/<name>.log
    #[arg(short, long, conflicts_with = "config")]
    pub name: Option<String>,

    /// Config file listing streams (.toml, .yaml, .yml or .json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Fail instead of creating a missing log directory
    #[arg(long)]
    pub no_create_dir: bool,

    /// Consecutive recreate attempts before a stream gives up
    #[arg(long, default_value_t = DEFAULT_MAX_RECREATE_ATTEMPTS, env = "LOGMEND_MAX_RECREATE_ATTEMPTS")]
    pub max_recreate_attempts: u32,

    /// Write lines as-is, without a timestamp prefix
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Log file whose directory is checked
    pub file: PathBuf,

    /// Do not create the directory if it is missing
    #[arg(long)]
    pub no_create_dir: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_pipe_defaults() {
        let cli = Cli::try_parse_from(["logmend", "pipe", "--file", "/tmp/access.log"]).unwrap();
        match cli.command {
            Commands::Pipe(args) => {
                assert_eq!(args.file, Some(PathBuf::from("/tmp/access.log")));
                assert!(!args.no_create_dir);
                assert!(!args.raw);
            }
            _ => panic!("expected pipe"),
        }
    }

    #[test]
    fn test_file_conflicts_with_config() {
        let result = Cli::try_parse_from([
            "logmend", "pipe", "--file", "a.log", "--config", "logmend.toml",
        ]);
        assert!(result.is_err());
    }
}
