use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost/msg_scheduler".to_string()
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(5)
}

/// Process-level configuration: where to listen, where the store lives, and
/// how often the tick engine sweeps. Throttle tuning knobs are *not* here --
/// those live in the `delivery_throttle` row and are mutated by operators,
/// not by redeploying this file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_tick_interval", with = "duration_serde")]
    pub tick_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            database_url: default_database_url(),
            tick_interval: default_tick_interval(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        Ok(config)
    }

    /// CLI flags and environment variables take precedence over the file,
    /// mirroring the teacher's `Opt`-over-config-file layering.
    pub fn apply_overrides(
        mut self,
        listen: Option<String>,
        database_url: Option<String>,
    ) -> Self {
        if let Some(listen) = listen {
            self.listen = listen;
        }
        if let Some(database_url) = database_url {
            self.database_url = database_url;
        } else if let Ok(from_env) = std::env::var("DATABASE_URL") {
            self.database_url = from_env;
        }
        self
    }
}
