use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

const HOST: &str = "localhost";
const PORT: u16 = 6379;
const MAX_BUFFER_SIZE: usize = 512 * 1024 * 1024;
const SNAPSHOT_PATH: &str = "snapshot.gedis";
const SNAPSHOT_INTERVAL_SECS: u64 = 5;

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "gedis-server", version, about)]
pub struct Config {
    /// The host to listen on
    #[arg(long, env = "GEDIS_HOST", default_value = HOST)]
    pub host: String,

    /// The port to listen on
    #[arg(short, long, env = "GEDIS_PORT", default_value_t = PORT)]
    pub port: u16,

    /// Most bytes a connection may hold while waiting for a command to complete
    #[arg(long, env = "MAX_BUFFER_SIZE", default_value_t = MAX_BUFFER_SIZE)]
    pub max_buffer_size: usize,

    /// Where the store is saved to and restored from
    #[arg(long, env = "GEDIS_SNAPSHOT_PATH", default_value = SNAPSHOT_PATH)]
    pub snapshot_path: PathBuf,

    /// Seconds between two snapshots, 0 disables periodic snapshots
    #[arg(long, env = "GEDIS_SNAPSHOT_INTERVAL", default_value_t = SNAPSHOT_INTERVAL_SECS)]
    pub snapshot_interval: u64,
}

impl Config {
    pub fn snapshot_period(&self) -> Option<Duration> {
        match self.snapshot_interval {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: HOST.to_string(),
            port: PORT,
            max_buffer_size: MAX_BUFFER_SIZE,
            snapshot_path: PathBuf::from(SNAPSHOT_PATH),
            snapshot_interval: SNAPSHOT_INTERVAL_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags() {
        let config = Config::try_parse_from([
            "gedis-server",
            "--host",
            "0.0.0.0",
            "-p",
            "7000",
            "--max-buffer-size",
            "1024",
            "--snapshot-path",
            "/tmp/dump.gedis",
            "--snapshot-interval",
            "0",
        ])
        .unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7000);
        assert_eq!(config.max_buffer_size, 1024);
        assert_eq!(config.snapshot_path, PathBuf::from("/tmp/dump.gedis"));
        assert_eq!(config.snapshot_period(), None);
    }

    #[test]
    fn default_period() {
        assert_eq!(
            Config::default().snapshot_period(),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn invalid_port() {
        assert!(Config::try_parse_from(["gedis-server", "--port", "http"]).is_err());
    }
}
