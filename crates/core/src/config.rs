use serde::{Deserialize, Serialize};

/// Global application configuration, laid out per the table in §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bus: BusSettings,
    pub store: StoreSettings,
    pub cache: CacheSettings,
    pub candle: CandleSettings,
    pub ingest: IngestSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSettings {
    pub servers: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub url: String,
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleSettings {
    /// Set of interval widths in milliseconds, e.g. `1000,5000,60000`.
    #[serde(default = "default_intervals")]
    pub intervals_ms: Vec<i64>,
    #[serde(default)]
    pub max_late_ms: i64,
    #[serde(default = "default_cache_limit")]
    pub cache_limit: usize,
    #[serde(default = "default_deliver_policy")]
    pub deliver_policy: String,
    #[serde(default)]
    pub consumer_reset: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    #[serde(default = "default_adapter_name")]
    pub adapter_name: String,
    #[serde(default = "default_emit_interval_ms")]
    pub emit_interval_ms: i64,
    #[serde(default)]
    pub testing_mode: bool,
    #[serde(default = "default_throttle_ms")]
    pub testing_throttle_ms: i64,
}

fn default_intervals() -> Vec<i64> {
    vec![1000, 5000, 60000]
}
fn default_cache_limit() -> usize {
    2000
}
fn default_deliver_policy() -> String {
    "new".to_string()
}
fn default_adapter_name() -> String {
    "synthetic".to_string()
}
fn default_emit_interval_ms() -> i64 {
    1000
}
fn default_throttle_ms() -> i64 {
    200
}

/// Parses a CSV list of interval widths, e.g. `"1000,5000,60000"`, skipping
/// blank segments. Used when intervals are supplied via an environment
/// variable rather than a structured config file.
pub fn parse_interval_csv(csv: &str) -> Vec<i64> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bus: BusSettings {
                servers: "nats://localhost:4222".to_string(),
            },
            store: StoreSettings {
                url: "http://localhost:8123".to_string(),
                database: "default".to_string(),
            },
            cache: CacheSettings {
                url: "redis://localhost:6379".to_string(),
            },
            candle: CandleSettings {
                intervals_ms: default_intervals(),
                max_late_ms: 0,
                cache_limit: default_cache_limit(),
                deliver_policy: default_deliver_policy(),
                consumer_reset: false,
            },
            ingest: IngestSettings {
                adapter_name: default_adapter_name(),
                emit_interval_ms: default_emit_interval_ms(),
                testing_mode: false,
                testing_throttle_ms: default_throttle_ms(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_table() {
        let config = AppConfig::default();
        assert_eq!(config.bus.servers, "nats://localhost:4222");
        assert_eq!(config.candle.intervals_ms, vec![1000, 5000, 60000]);
        assert_eq!(config.candle.max_late_ms, 0);
        assert_eq!(config.candle.cache_limit, 2000);
        assert_eq!(config.ingest.adapter_name, "synthetic");
        assert_eq!(config.ingest.testing_throttle_ms, 200);
    }

    #[test]
    fn parses_interval_csv() {
        assert_eq!(parse_interval_csv("1000, 5000,60000"), vec![1000, 5000, 60000]);
        assert_eq!(parse_interval_csv(""), Vec::<i64>::new());
    }
}
