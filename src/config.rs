use crate::error::{CacaoWatchError, Result};
use crate::models::{Coordinates, Zone};
use dialoguer::{Input, Select};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub geocoding: Option<GeocodingConfig>,
    #[serde(default = "default_zones")]
    pub zones: Vec<ZoneConfig>,
    /// Zone key selected at startup when no previous selection is remembered
    #[serde(default)]
    pub default_zone: Option<String>,
}

/// Open-Meteo forecast request parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_url")]
    pub base_url: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_past_days")]
    pub past_days: u8,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_url() -> String {
    "https://api.open-meteo.com".into()
}

fn default_timezone() -> String {
    "America/Guayaquil".into()
}

fn default_past_days() -> u8 {
    1
}

fn default_forecast_days() -> u8 {
    1
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_url(),
            timezone: default_timezone(),
            past_days: default_past_days(),
            forecast_days: default_forecast_days(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
    /// How often the TUI re-checks the selected zone for staleness
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

/// Longest cache lifetime accepted from config (one week)
pub const MAX_TTL_MINUTES: i64 = 7 * 24 * 60;

fn default_ttl_minutes() -> i64 {
    crate::logic::cache::DEFAULT_TTL_MINUTES
}

fn default_refresh_interval_secs() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct GeocodingConfig {
    pub api_key: String,
    #[serde(default = "default_geocoding_url")]
    pub base_url: String,
}

fn default_geocoding_url() -> String {
    "https://maps.googleapis.com/maps/api".into()
}

impl std::fmt::Debug for GeocodingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocodingConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// A selectable zone. Zones without coordinates are geocoded by name.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ZoneConfig {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub variety: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl ZoneConfig {
    fn builtin(key: &str, name: &str, variety: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            variety: Some(variety.into()),
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        }
    }

    /// Query string handed to the geocoder, e.g. "jipijapa, manabi, Ecuador"
    pub fn geocode_query(&self) -> String {
        format!("{}, Ecuador", self.key.replace(',', ", ").replace('-', " "))
    }

    pub fn to_zone(&self, coordinates: Coordinates) -> Zone {
        let zone = Zone::new(self.key.clone(), self.name.clone(), coordinates);
        match &self.variety {
            Some(v) => zone.with_variety(v.clone()),
            None => zone,
        }
    }
}

/// Cacao zones of the Ecuadorian coast and Amazon, with their reference variety.
pub fn default_zones() -> Vec<ZoneConfig> {
    vec![
        ZoneConfig::builtin("jipijapa,manabi", "Manabí - Jipijapa", "Arriba Nacional", -1.3486, -80.5786),
        ZoneConfig::builtin("ventanas,los-rios", "Los Ríos - Ventanas", "Nacional Fino", -1.4428, -79.4583),
        ZoneConfig::builtin("naranjal,guayas", "Guayas - Naranjal", "Trinitario Premium", -2.6736, -79.6183),
        ZoneConfig::builtin("arenillas,el-oro", "El Oro - Arenillas", "CCN-51 mejorado", -3.5517, -80.0642),
        ZoneConfig::builtin("shushufindi,sucumbios", "Sucumbíos - Shushufindi", "Trinitario Nativo", -0.1869, -76.6483),
        ZoneConfig::builtin("loreto,orellana", "Orellana - Loreto", "Nacional Amazónico", -0.6917, -77.3067),
        ZoneConfig::builtin("mera,pastaza", "Pastaza - Mera", "Trinitario Silvestre", -1.4592, -78.1119),
    ]
}

impl Config {
    pub fn load(config_override: Option<&PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => p.clone(),
            None => Self::find_config_path()?,
        };

        if !config_path.exists() {
            if config_override.is_some() {
                return Err(CacaoWatchError::Config(format!(
                    "Config file not found at {:?}",
                    config_path
                )));
            }
            tracing::info!(
                "No config file at {:?}, using built-in zones and defaults",
                config_path
            );
            return Ok(Self::default());
        }

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| CacaoWatchError::Config(format!("Failed to read config: {}", e)))?;

        let config_str = Self::substitute_env_vars(&config_str);

        let config: Config = serde_yaml::from_str(&config_str)
            .map_err(|e| CacaoWatchError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        tracing::debug!(path = ?config_path, zones = config.zones.len(), "Config loaded");

        Ok(config)
    }

    /// Reject settings the rest of the app cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_minutes <= 0 {
            return Err(CacaoWatchError::Config(
                "cache.ttl_minutes must be positive".into(),
            ));
        }
        if self.cache.ttl_minutes > MAX_TTL_MINUTES {
            return Err(CacaoWatchError::Config(format!(
                "cache.ttl_minutes must be at most {} (one week)",
                MAX_TTL_MINUTES
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(CacaoWatchError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for zone in &self.zones {
            if !seen.insert(zone.key.as_str()) {
                return Err(CacaoWatchError::Config(format!(
                    "duplicate zone key '{}'",
                    zone.key
                )));
            }
            if let Some(c) = zone.coordinates() {
                if !(-90.0..=90.0).contains(&c.latitude) || !(-180.0..=180.0).contains(&c.longitude)
                {
                    return Err(CacaoWatchError::Config(format!(
                        "zone '{}' has out-of-range coordinates {}",
                        zone.key, c
                    )));
                }
            } else if self.geocoding.is_none() {
                return Err(CacaoWatchError::Config(format!(
                    "zone '{}' has no coordinates and no geocoding section is configured",
                    zone.key
                )));
            }
        }

        if let Some(ref key) = self.default_zone {
            if self.find_zone(key).is_none() {
                return Err(CacaoWatchError::Config(format!(
                    "default_zone '{}' is not one of the configured zones",
                    key
                )));
            }
        }

        Ok(())
    }

    pub fn find_zone(&self, key: &str) -> Option<&ZoneConfig> {
        self.zones.iter().find(|z| z.key == key)
    }

    /// Search for config.yaml in standard locations.
    /// Returns the path of the first found config, or the XDG default path if none found.
    fn find_config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config/config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        Self::default_config_path()
    }

    /// Returns true if a config file can be found in any standard location.
    pub fn exists(config_override: Option<&PathBuf>) -> bool {
        match config_override {
            Some(p) => p.exists(),
            None => Self::find_config_path()
                .map(|p| p.exists())
                .unwrap_or(false),
        }
    }

    /// Default path for writing new config files (~/.config/cacaowatch/config.yaml).
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CacaoWatchError::Config("Cannot determine config directory".into()))?
            .join("cacaowatch");
        Ok(config_dir.join("config.yaml"))
    }

    /// Run interactive setup prompts and write config to disk.
    /// Returns the written Config and the path it was written to.
    pub fn setup_interactive() -> Result<(Self, PathBuf)> {
        println!();
        println!("Let's set up CacaoWatch!");
        println!();

        let defaults = Self::default();

        // --- Weather provider ---
        println!("Open-Meteo");
        let timezone: String = Input::new()
            .with_prompt("  Timezone")
            .default(defaults.provider.timezone.clone())
            .interact_text()
            .map_err(|e| CacaoWatchError::Config(format!("Input error: {}", e)))?;

        let ttl_minutes: i64 = Input::new()
            .with_prompt("  Cache lifetime (minutes)")
            .default(defaults.cache.ttl_minutes)
            .interact_text()
            .map_err(|e| CacaoWatchError::Config(format!("Input error: {}", e)))?;

        println!();

        // --- Default zone ---
        let labels: Vec<&str> = defaults.zones.iter().map(|z| z.name.as_str()).collect();
        let selection = Select::new()
            .with_prompt("Default zone")
            .items(&labels)
            .default(0)
            .interact()
            .map_err(|e| CacaoWatchError::Config(format!("Input error: {}", e)))?;
        let default_zone = defaults.zones.get(selection).map(|z| z.key.clone());

        println!();

        // --- Geocoding (optional) ---
        println!("Google Geocoding (leave API key blank to skip)");
        let api_key: String = Input::new()
            .with_prompt("  API key")
            .default(String::new())
            .allow_empty(true)
            .interact_text()
            .map_err(|e| CacaoWatchError::Config(format!("Input error: {}", e)))?;

        let geocoding = if api_key.is_empty() {
            None
        } else {
            Some(GeocodingConfig {
                api_key,
                base_url: default_geocoding_url(),
            })
        };

        println!();

        let config = Config {
            provider: ProviderConfig {
                timezone,
                ..defaults.provider
            },
            cache: CacheConfig {
                ttl_minutes,
                ..defaults.cache
            },
            retry: defaults.retry,
            geocoding,
            zones: defaults.zones,
            default_zone,
        };
        config.validate()?;

        let config_path = Self::default_config_path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| CacaoWatchError::Config(format!("Failed to serialize config: {}", e)))?;

        let content = format!(
            "# CacaoWatch Configuration\n# Generated by `cacaowatch init`\n# Environment variable substitution (${{VAR}}) is supported.\n\n{}",
            yaml
        );
        std::fs::write(&config_path, content)?;

        println!("Configuration saved to {}", config_path.display());
        println!();

        Ok((config, config_path))
    }

    fn substitute_env_vars(content: &str) -> String {
        let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
            return content.to_string();
        };

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        result
    }

    pub fn data_dir(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        if let Some(dir) = data_dir_override {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        if let Ok(dir) = std::env::var("CACAOWATCH_DATA_DIR") {
            let p = PathBuf::from(dir);
            std::fs::create_dir_all(&p)?;
            return Ok(p);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| CacaoWatchError::Config("Cannot determine data directory".into()))?
            .join("cacaowatch");

        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn db_path(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        Ok(Self::data_dir(data_dir_override)?.join("cacaowatch.db"))
    }

    pub fn log_path(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        Ok(Self::data_dir(data_dir_override)?.join("cacaowatch.log"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            geocoding: None,
            zones: default_zones(),
            default_zone: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.zones.len(), 7);
        assert_eq!(config.cache.ttl_minutes, 30);
        assert_eq!(config.provider.timeout_secs, 10);
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str("default_zone: mera,pastaza\n").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.zones, default_zones());
        assert_eq!(config.provider.base_url, "https://api.open-meteo.com");
    }

    #[test]
    fn custom_zone_without_coordinates_needs_geocoding() {
        let yaml = r#"
zones:
  - key: quevedo,los-rios
    name: Los Ríos - Quevedo
"#;
        let mut config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());

        config.geocoding = Some(GeocodingConfig {
            api_key: "k".into(),
            base_url: default_geocoding_url(),
        });
        assert!(config.validate().is_ok());
        assert_eq!(config.zones[0].coordinates(), None);
    }

    #[test]
    fn rejects_duplicate_keys_and_bad_ttl() {
        let mut config = Config::default();
        config.zones.push(config.zones[0].clone());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.ttl_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_ttl_beyond_one_week() {
        let mut config = Config::default();
        config.cache.ttl_minutes = MAX_TTL_MINUTES;
        assert!(config.validate().is_ok());

        config.cache.ttl_minutes = i64::MAX / 10;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.ttl_minutes"));

        let yaml = "cache:\n  ttl_minutes: 922337203685477580\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_default_zone() {
        let config = Config {
            default_zone: Some("atlantis".into()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn substitutes_env_vars() {
        std::env::set_var("CACAOWATCH_TEST_GEOCODE_KEY", "secret123");
        let out = Config::substitute_env_vars("api_key: ${CACAOWATCH_TEST_GEOCODE_KEY}\nother: ${UNSET_CACAOWATCH_VAR}");
        assert!(out.contains("api_key: secret123"));
        assert!(out.contains("${UNSET_CACAOWATCH_VAR}"));
    }

    #[test]
    fn geocode_query_from_key() {
        let zone = &default_zones()[1];
        assert_eq!(zone.geocode_query(), "ventanas, los rios, Ecuador");
    }

    #[test]
    fn geocoding_key_is_redacted() {
        let g = GeocodingConfig {
            api_key: "super-secret".into(),
            base_url: default_geocoding_url(),
        };
        assert!(!format!("{:?}", g).contains("super-secret"));
    }
}
