//! Log setup policy for the binary.

use std::path::PathBuf;

use collectfs_telemetry::{DEFAULT_FILE_PREFIX, LogConfig, LogFormat, LogTarget};

use crate::cli::Cli;
use crate::startup::Startup;

/// Platform log directory, or a folder in the system temp dir.
pub(crate) fn default_log_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "collectfs")
        .map(|dirs| {
            dirs.state_dir()
                .unwrap_or_else(|| dirs.cache_dir())
                .to_path_buf()
        })
        .unwrap_or_else(|| std::env::temp_dir().join("collectfs"))
}

/// Foreground runs log to stderr; detached runs log to daily files.
pub(crate) fn log_config(cli: &Cli, startup: &Startup) -> LogConfig {
    let config = if startup.trace {
        LogConfig::new("trace")
    } else {
        LogConfig::new("info").with_directive("fuse3=warn")
    }
    .with_format(LogFormat::Compact);

    if cli.foreground {
        config.with_target(LogTarget::Stderr)
    } else {
        let dir = startup.log_dir.clone().unwrap_or_else(default_log_dir);
        config.with_file_logging(dir, DEFAULT_FILE_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use collectfs_core::EngineConfig;

    fn startup(log_dir: Option<&str>, trace: bool) -> Startup {
        Startup {
            config: EngineConfig::with_root_unchecked("/a"),
            mount_point: PathBuf::from("/b"),
            log_dir: log_dir.map(PathBuf::from),
            trace,
        }
    }

    #[test]
    fn test_foreground_logs_to_stderr() {
        let cli = Cli::try_parse_from(["collectfs", "-f", "/a", "/b"]).unwrap();
        let config = log_config(&cli, &startup(None, true));
        assert!(matches!(config.target, LogTarget::Stderr));
        assert_eq!(config.level, "trace");
        assert!(config.directives.is_empty());
    }

    #[test]
    fn test_quiet_run_silences_fuse_binding() {
        let cli = Cli::try_parse_from(["collectfs", "-f", "/a", "/b"]).unwrap();
        let config = log_config(&cli, &startup(None, false));
        assert_eq!(config.level, "info");
        assert_eq!(config.directives, vec!["fuse3=warn".to_string()]);
    }

    #[test]
    fn test_background_logs_to_file() {
        let cli = Cli::try_parse_from(["collectfs", "/a", "/b"]).unwrap();
        let config = log_config(&cli, &startup(Some("/var/tmp/cfs"), false));
        match config.target {
            LogTarget::File(dir) => assert_eq!(dir, PathBuf::from("/var/tmp/cfs")),
            other => panic!("unexpected target {other:?}"),
        }
        assert!(!config.ansi);
        assert_eq!(config.file_prefix, DEFAULT_FILE_PREFIX);
    }

    #[test]
    fn test_default_log_dir_is_absolute() {
        assert!(default_log_dir().is_absolute());
    }
}
