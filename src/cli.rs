// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! NOTE: this expects `clap` to be built with the `derive` feature, e.g.:
//! `clap = { version = "4.5.53", features = ["derive"] }` in `Cargo.toml`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `minisched`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "minisched",
    version,
    about = "Run a batch of isolated tasks through a fixed-size worker pool.",
    long_about = None
)]
pub struct CliArgs {
    /// Number of tasks to run.
    #[arg(long, default_value_t = 5)]
    pub count: u32,

    /// Execution-environment image for every task.
    #[arg(long, value_name = "IMAGE", default_value = "alpine")]
    pub image: String,

    /// Command to run inside each unit.
    #[arg(long, value_name = "CMD", default_value = "sleep 2")]
    pub cmd: String,

    /// Number of concurrent workers.
    #[arg(long, default_value_t = crate::config::DEFAULT_WORKER_COUNT)]
    pub workers: usize,

    /// Hard memory ceiling per task, in MiB.
    #[arg(long, value_name = "MIB", default_value_t = 128)]
    pub memory_limit_mb: u64,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MINISCHED_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let args = CliArgs::try_parse_from(["minisched"]).unwrap();
        assert_eq!(args.count, 5);
        assert_eq!(args.image, "alpine");
        assert_eq!(args.cmd, "sleep 2");
        assert_eq!(args.workers, 3);
        assert_eq!(args.memory_limit_mb, 128);
        assert!(args.log_level.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let args = CliArgs::try_parse_from([
            "minisched",
            "--count",
            "12",
            "--image",
            "busybox",
            "--cmd",
            "echo hi",
            "--workers",
            "8",
            "--memory-limit-mb",
            "64",
        ])
        .unwrap();

        assert_eq!(args.count, 12);
        assert_eq!(args.image, "busybox");
        assert_eq!(args.cmd, "echo hi");
        assert_eq!(args.workers, 8);
        assert_eq!(args.memory_limit_mb, 64);
    }
}
