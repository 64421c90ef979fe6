use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// adsim - simulated ad-campaign backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the session database (omit for an in-memory store)
    #[arg(short = 'd', long, env = "ADSIM_DB_FILE")]
    pub db_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "TOKEN_TTL_SECS", default_value = "3600")]
    pub token_ttl_secs: u64,

    /// Simulated network latency in milliseconds
    #[arg(long, env = "SIMULATED_LATENCY_MS", default_value = "400")]
    pub latency_ms: u64,

    /// Starting billing balance in cents
    #[arg(long, env = "STARTING_BALANCE_CENTS", default_value = "50000")]
    pub starting_balance_cents: i64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// None means ephemeral in-memory storage
    pub db_file: Option<PathBuf>,
    pub token_ttl_secs: u64,
    pub latency_ms: u64,
    pub starting_balance_cents: i64,
    pub log_level: String,
}

impl Config {
    /// Load configuration with priority: CLI > ENV > defaults.
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();

        let config = Config {
            db_file: args.db_file.map(|s| expand_tilde(&s)),
            token_ttl_secs: args.token_ttl_secs,
            latency_ms: args.latency_ms,
            starting_balance_cents: args.starting_balance_cents,
            log_level: args.log_level,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.token_ttl_secs == 0 {
            anyhow::bail!("TOKEN_TTL_SECS must be greater than zero");
        }

        if let Some(ref db_file) = self.db_file {
            if let Some(parent) = db_file.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    anyhow::bail!(
                        "ADSIM_DB_FILE directory does not exist: {}",
                        parent.display()
                    );
                }
            }
        }

        Ok(())
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            db_file: None,
            token_ttl_secs: 3600,
            latency_ms: 400,
            starting_balance_cents: 0,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/test/file.db");
        assert!(path.to_string_lossy().contains("test/file.db"));
        assert!(!path.to_string_lossy().starts_with('~'));

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_validate_zero_ttl_rejected() {
        let config = Config {
            token_ttl_secs: 0,
            ..base_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_missing_db_dir_rejected() {
        let config = Config {
            db_file: Some(PathBuf::from("/definitely/not/a/dir/session.db")),
            ..base_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_memory_mode_ok() {
        assert!(base_config().validate().is_ok());
    }
}
