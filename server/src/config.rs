use clap::Parser;
use std::time::Duration;

/// Command line options for the `server` binary.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "5555")]
    pub port: u16,
    /// Match simulation ticks per second
    #[clap(short, long, default_value = "60")]
    pub tick_rate: u32,
    /// Regulation time of a match in seconds
    #[clap(short = 'd', long, default_value = "30")]
    pub match_duration: f32,
    /// Maximum number of simultaneous connections
    #[clap(short, long, default_value = "64")]
    pub max_clients: usize,
    /// Seconds a connection may stay silent before it is dropped
    #[clap(short, long, default_value = "30")]
    pub idle_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tick_rate: u32,
    /// Seconds.
    pub match_duration: f32,
    pub max_clients: usize,
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5555,
            tick_rate: shared::TICK_RATE,
            match_duration: shared::MATCH_DURATION,
            max_clients: 64,
            idle_timeout: Duration::from_secs(30),
        }
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            tick_rate: args.tick_rate.max(1),
            match_duration: args.match_duration,
            max_clients: args.max_clients,
            idle_timeout: Duration::from_secs(args.idle_timeout),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }

    ///Fixed simulation step in seconds.
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "127.0.0.1:5555");
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.max_clients, 64);
        assert_approx_eq!(config.dt(), 1.0 / 60.0, 1e-7);
    }

    #[test]
    fn test_cli_defaults_match_config_defaults() {
        let config = ServerConfig::from(Args::try_parse_from(["server"]).unwrap());
        let defaults = ServerConfig::default();

        assert_eq!(config.address(), defaults.address());
        assert_eq!(config.tick_rate, defaults.tick_rate);
        assert_eq!(config.match_duration, defaults.match_duration);
        assert_eq!(config.idle_timeout, defaults.idle_timeout);
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args::try_parse_from([
            "server",
            "--port",
            "0",
            "--tick-rate",
            "120",
            "--match-duration",
            "5",
            "--max-clients",
            "2",
        ])
        .unwrap();
        let config = ServerConfig::from(args);

        assert_eq!(config.port, 0);
        assert_eq!(config.tick_rate, 120);
        assert_eq!(config.match_duration, 5.0);
        assert_eq!(config.max_clients, 2);
        assert_eq!(config.tick_duration(), Duration::from_secs_f64(1.0 / 120.0));
    }
}
