use crate::logging;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "portald")]
#[command(about = "Attendance and marks records daemon for the academic portal")]
pub struct Config {
    /// Address for the HTTP API.
    #[arg(long, env = "PORTAL_BIND", default_value = "127.0.0.1:3001")]
    pub bind: SocketAddr,

    /// SQLite database file. Falls back to in-memory storage if it cannot be opened.
    #[arg(long, env = "PORTAL_DB", default_value = "portal.sqlite3")]
    pub db: PathBuf,

    /// Skip SQLite and keep everything in process memory.
    #[arg(long)]
    pub memory: bool,

    /// Serve newline-delimited JSON requests on stdin/stdout instead of HTTP.
    #[arg(long)]
    pub stdio: bool,

    #[arg(long, env = "PORTAL_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "PORTAL_LOG_MODE", value_enum, default_value_t = logging::Mode::Default)]
    pub log_mode: logging::Mode,

    #[arg(long, env = "PORTAL_SESSION_TTL", default_value_t = 28_800)]
    pub session_ttl_secs: u64,

    /// Password given to the default `admin` account on first start.
    #[arg(long, env = "PORTAL_ADMIN_PASSWORD", default_value = "admin123", hide_env_values = true)]
    pub admin_password: String,
}

impl Config {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_flags() {
        let cfg = Config::try_parse_from(["portald"]).expect("parse");
        assert_eq!(cfg.bind.port(), 3001);
        assert!(!cfg.memory);
        assert!(!cfg.stdio);
        assert_eq!(cfg.session_ttl(), Duration::from_secs(28_800));
        assert_eq!(cfg.log_mode, logging::Mode::Default);
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = Config::try_parse_from([
            "portald",
            "--stdio",
            "--memory",
            "--db",
            "/tmp/x.sqlite3",
            "--log-mode",
            "json",
            "--session-ttl-secs",
            "5",
        ])
        .expect("parse");
        assert!(cfg.stdio && cfg.memory);
        assert_eq!(cfg.db, PathBuf::from("/tmp/x.sqlite3"));
        assert_eq!(cfg.log_mode, logging::Mode::Json);
        assert_eq!(cfg.session_ttl_secs, 5);
    }
}
