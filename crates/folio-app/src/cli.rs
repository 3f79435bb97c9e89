//! CLI argument definitions for the Folio server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Folio - chat with your documents, one session at a time.
#[derive(Parser, Debug)]
#[command(name = "folio", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory for the session database, index artifacts and uploads.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > FOLIO_CONFIG env var > ~/.folio/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("FOLIO_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > FOLIO_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("FOLIO_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }

    /// Data directory override, if one was given.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".folio").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".folio").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_take_priority() {
        let args = CliArgs::parse_from([
            "folio",
            "--config",
            "/tmp/folio.toml",
            "--port",
            "9100",
            "--data-dir",
            "/srv/folio",
            "-l",
            "debug",
        ]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/folio.toml"));
        assert_eq!(args.resolve_port(8000), 9100);
        assert_eq!(args.resolve_data_dir().as_deref(), Some("/srv/folio"));
        assert_eq!(args.resolve_log_level().as_deref(), Some("debug"));
    }

    #[test]
    fn test_no_overrides() {
        let args = CliArgs::parse_from(["folio"]);
        assert_eq!(args.resolve_data_dir(), None);
        assert_eq!(args.resolve_log_level(), None);
    }
}
