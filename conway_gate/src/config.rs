// config.rs - Engine configuration
//
// Sources, lowest priority first: built-in defaults, then `conway.toml` in the
// working directory (or an explicit file), then `CONWAY_STRATEGY`,
// `CONWAY_WORKERS`, `CONWAY_POLL_MS` and `CONWAY_EXCHANGE_TIMEOUT_MS`, then
// whatever the caller sets afterwards (command-line flags).
//
//     # conway.toml
//     strategy = "distributed"   # data-parallel | pool | distributed
//     workers = 4
//     poll_interval_ms = 10
//     exchange_timeout_ms = 5000

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const LOCAL_CONFIG: &str = "conway.toml";

/// How the coordinator drives its workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Fork-join over a stripe thread pool, one pass per generation.
    DataParallel,
    /// Long-lived worker threads meeting at a barrier.
    #[default]
    Pool,
    /// Stripe-owning workers that only see message traffic.
    Distributed,
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data-parallel" | "data_parallel" | "openmp" => Ok(Strategy::DataParallel),
            "pool" | "pthread" => Ok(Strategy::Pool),
            "distributed" | "mpi" => Ok(Strategy::Distributed),
            _ => Err(ConfigError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::DataParallel => "data-parallel",
            Strategy::Pool => "pool",
            Strategy::Distributed => "distributed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub strategy: Strategy,
    /// Clamped to the grid width at launch.
    pub workers: usize,
    /// How often an idle data-parallel coordinator re-checks its target.
    pub poll_interval_ms: u64,
    /// How long the distributed strategy waits for boundary columns and stripe results.
    pub exchange_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            workers: 4,
            poll_interval_ms: 10,
            exchange_timeout_ms: 5000,
        }
    }
}

/// Partial config, as found in a file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    strategy: Option<Strategy>,
    workers: Option<usize>,
    poll_interval_ms: Option<u64>,
    exchange_timeout_ms: Option<u64>,
}

impl EngineConfig {
    /// Defaults, then `path` (or `./conway.toml` if present), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        match path {
            Some(path) => config.merge_file(path)?,
            None => {
                let local = Path::new(LOCAL_CONFIG);
                if local.exists() {
                    config.merge_file(local)?;
                }
            }
        }
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        log::debug!("engine configuration: {config:?}");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        let mut config = Self::default();
        config.merge(toml::from_str(text)?);
        Ok(config)
    }

    /// A zero exchange timeout would fail every distributed generation at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchange_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "exchange_timeout_ms",
                value: "0".into(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }

    fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        self.merge(file);
        log::info!("loaded config from {}", path.display());
        Ok(())
    }

    fn merge(&mut self, file: ConfigFile) {
        if let Some(strategy) = file.strategy {
            self.strategy = strategy;
        }
        if let Some(workers) = file.workers {
            self.workers = workers;
        }
        if let Some(poll) = file.poll_interval_ms {
            self.poll_interval_ms = poll;
        }
        if let Some(timeout) = file.exchange_timeout_ms {
            self.exchange_timeout_ms = timeout;
        }
    }

    /// Applies `CONWAY_*` overrides looked up through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(value) = lookup("CONWAY_STRATEGY") {
            self.strategy = value.parse()?;
        }
        if let Some(value) = lookup("CONWAY_WORKERS") {
            self.workers = parse_number("CONWAY_WORKERS", &value)?;
        }
        if let Some(value) = lookup("CONWAY_POLL_MS") {
            self.poll_interval_ms = parse_number("CONWAY_POLL_MS", &value)?;
        }
        if let Some(value) = lookup("CONWAY_EXCHANGE_TIMEOUT_MS") {
            self.exchange_timeout_ms = parse_number("CONWAY_EXCHANGE_TIMEOUT_MS", &value)?;
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.strategy, Strategy::Pool);
        assert_eq!(config.workers, 4);
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.exchange_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn file_overrides_only_what_it_names() {
        let config = EngineConfig::from_toml("strategy = \"distributed\"\nworkers = 3\n").unwrap();
        assert_eq!(config.strategy, Strategy::Distributed);
        assert_eq!(config.workers, 3);
        assert_eq!(config.poll_interval_ms, 10);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(EngineConfig::from_toml("threads = 3\n").is_err());
    }

    #[test]
    fn environment_beats_file() {
        let mut config = EngineConfig::from_toml("workers = 3\n").unwrap();
        config
            .apply_overrides(|key| match key {
                "CONWAY_WORKERS" => Some("7".into()),
                "CONWAY_STRATEGY" => Some("mpi".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.workers, 7);
        assert_eq!(config.strategy, Strategy::Distributed);
    }

    #[test]
    fn bad_override_is_reported() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides(|key| (key == "CONWAY_POLL_MS").then(|| "soon".into()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "CONWAY_POLL_MS", .. }));
    }

    #[test]
    fn zero_exchange_timeout_is_rejected() {
        let mut config = EngineConfig::from_toml("exchange_timeout_ms = 0").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                key: "exchange_timeout_ms",
                ..
            })
        ));
        config
            .apply_overrides(|key| (key == "CONWAY_EXCHANGE_TIMEOUT_MS").then(|| "250".into()))
            .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn strategy_names_and_aliases() {
        assert_eq!("openmp".parse::<Strategy>().unwrap(), Strategy::DataParallel);
        assert_eq!("Pthread".parse::<Strategy>().unwrap(), Strategy::Pool);
        assert_eq!("distributed".parse::<Strategy>().unwrap(), Strategy::Distributed);
        assert!("gpu".parse::<Strategy>().is_err());
        for strategy in [Strategy::DataParallel, Strategy::Pool, Strategy::Distributed] {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
    }
}
