#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! TOML configuration loading for the mob limiter.
//!
//! The loader is forgiving: missing keys fall back to their defaults and
//! out-of-range values are replaced by the default together with a
//! [`ConfigWarning`]. Only unreadable files and malformed TOML are errors.

use std::{
    collections::BTreeMap,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use mob_limiter_core::{EntityKind, Feature, PolicyConfig};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Configuration written when the store is opened on a missing file.
pub const DEFAULT_CONFIG: &str = r#"# Hostile mob limiter configuration.

global-limit-enabled = true
global-hostile-limit = 70

mob-limits-enabled = true

low-health-delay-enabled = true
low-health-threshold = 5.0
spawn-delay-radius = 30.0
spawn-delay-chance = 0.5

death-cleanup-enabled = true
death-mob-cleanup-radius = 10.0
death-mob-threshold = 5
death-mob-kill-percentage = 0.5

logging-enabled = true

# Per-kind ceilings, only read while mob-limits-enabled is true.
[mob-limits]
# ZOMBIE = 20
# CREEPER = 10
"#;

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read configuration at {path}")]
    Read {
        /// Location of the file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The file could not be written.
    #[error("failed to write configuration at {path}")]
    Write {
        /// Location of the file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The file is not valid TOML or a value has the wrong type.
    #[error("failed to parse configuration")]
    Parse(#[from] toml::de::Error),
    /// The updated document could not be rendered back to TOML.
    #[error("failed to render configuration")]
    Render(#[from] toml::ser::Error),
}

/// Non-fatal problem found while loading a configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigWarning {
    /// Key the warning refers to.
    pub key: String,
    /// Human readable description of what was done about it.
    pub message: String,
}

impl ConfigWarning {
    fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigFile {
    global_limit_enabled: Option<bool>,
    global_hostile_limit: Option<i64>,
    mob_limits_enabled: Option<bool>,
    mob_limits: Option<BTreeMap<String, i64>>,
    low_health_delay_enabled: Option<bool>,
    low_health_threshold: Option<f64>,
    spawn_delay_radius: Option<f64>,
    spawn_delay_chance: Option<f64>,
    death_cleanup_enabled: Option<bool>,
    death_mob_cleanup_radius: Option<f64>,
    death_mob_threshold: Option<i64>,
    death_mob_kill_percentage: Option<f64>,
    logging_enabled: Option<bool>,
}

struct Clamp<'a> {
    warnings: &'a mut Vec<ConfigWarning>,
}

impl Clamp<'_> {
    fn count(&mut self, key: &str, value: Option<i64>, default: u32) -> u32 {
        let Some(value) = value else {
            return default;
        };
        match u32::try_from(value) {
            Ok(count) => count,
            Err(_) => {
                self.reject(key, &value, &default);
                default
            }
        }
    }

    fn within(&mut self, key: &str, value: Option<f64>, min: f64, max: f64, default: f64) -> f64 {
        let Some(value) = value else {
            return default;
        };
        if value.is_finite() && (min..=max).contains(&value) {
            value
        } else {
            self.reject(key, &value, &default);
            default
        }
    }

    fn reject(&mut self, key: &str, value: &dyn fmt::Display, default: &dyn fmt::Display) {
        self.warnings.push(ConfigWarning::new(
            key,
            format!("invalid value {value}, using default: {default}"),
        ));
    }
}

/// Parses a configuration document into a snapshot.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] when the document is not valid TOML or a
/// key holds a value of the wrong type.
pub fn from_toml_str(contents: &str) -> Result<(PolicyConfig, Vec<ConfigWarning>), ConfigError> {
    let file: ConfigFile = toml::from_str(contents)?;
    let mut warnings = Vec::new();
    let mut clamp = Clamp {
        warnings: &mut warnings,
    };

    let category_limits_enabled = file.mob_limits_enabled.unwrap_or(true);
    let mut category_ceilings = BTreeMap::new();
    if category_limits_enabled {
        for (name, limit) in file.mob_limits.unwrap_or_default() {
            let kind = match name.parse::<EntityKind>() {
                Ok(kind) if kind.is_tracked() => kind,
                Ok(kind) => {
                    clamp.warnings.push(ConfigWarning::new(
                        format!("mob-limits.{name}"),
                        format!("{kind} is not hostile, ignoring"),
                    ));
                    continue;
                }
                Err(error) => {
                    clamp
                        .warnings
                        .push(ConfigWarning::new(format!("mob-limits.{name}"), error.to_string()));
                    continue;
                }
            };
            match u32::try_from(limit) {
                Ok(limit) => {
                    let _ = category_ceilings.insert(kind, limit);
                }
                Err(_) => clamp.warnings.push(ConfigWarning::new(
                    format!("mob-limits.{name}"),
                    format!("invalid limit {limit}, ignoring"),
                )),
            }
        }
    }

    let config = PolicyConfig {
        global_limit_enabled: file.global_limit_enabled.unwrap_or(true),
        global_ceiling: clamp.count(
            "global-hostile-limit",
            file.global_hostile_limit,
            PolicyConfig::DEFAULT_GLOBAL_CEILING,
        ),
        category_limits_enabled,
        category_ceilings,
        proximity_throttle_enabled: file.low_health_delay_enabled.unwrap_or(true),
        vitality_threshold: clamp.within(
            "low-health-threshold",
            file.low_health_threshold,
            0.0,
            PolicyConfig::MAX_VITALITY,
            PolicyConfig::DEFAULT_VITALITY_THRESHOLD,
        ),
        throttle_radius: clamp.within(
            "spawn-delay-radius",
            file.spawn_delay_radius,
            0.0,
            f64::MAX,
            PolicyConfig::DEFAULT_THROTTLE_RADIUS,
        ),
        throttle_chance: clamp.within(
            "spawn-delay-chance",
            file.spawn_delay_chance,
            0.0,
            1.0,
            PolicyConfig::DEFAULT_THROTTLE_CHANCE,
        ),
        death_cleanup_enabled: file.death_cleanup_enabled.unwrap_or(true),
        cleanup_radius: clamp.within(
            "death-mob-cleanup-radius",
            file.death_mob_cleanup_radius,
            0.0,
            f64::MAX,
            PolicyConfig::DEFAULT_CLEANUP_RADIUS,
        ),
        cleanup_threshold: clamp.count(
            "death-mob-threshold",
            file.death_mob_threshold,
            PolicyConfig::DEFAULT_CLEANUP_THRESHOLD,
        ),
        cleanup_fraction: clamp.within(
            "death-mob-kill-percentage",
            file.death_mob_kill_percentage,
            0.0,
            1.0,
            PolicyConfig::DEFAULT_CLEANUP_FRACTION,
        ),
        logging_enabled: file.logging_enabled.unwrap_or(true),
    };

    Ok((config, warnings))
}

/// Reads and parses the configuration file at `path`.
///
/// Every warning is also reported through `tracing`.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed.
pub fn load(path: &Path) -> Result<(PolicyConfig, Vec<ConfigWarning>), ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let (config, warnings) = from_toml_str(&contents)?;
    for warning in &warnings {
        warn!(path = %path.display(), key = %warning.key, "{}", warning.message);
    }
    info!(
        path = %path.display(),
        global_limit = config.global_limit_enabled,
        mob_limits = config.category_limits_enabled,
        low_health_delay = config.proximity_throttle_enabled,
        death_cleanup = config.death_cleanup_enabled,
        logging = config.logging_enabled,
        "loaded configuration"
    );
    Ok((config, warnings))
}

/// Owner of the configuration file and its most recently loaded snapshot.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    snapshot: PolicyConfig,
}

impl ConfigStore {
    /// Opens the store, writing [`DEFAULT_CONFIG`] first when the file does
    /// not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be created, read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        let path = path.into();
        if !path.exists() {
            write_file(&path, DEFAULT_CONFIG)?;
            info!(path = %path.display(), "wrote default configuration");
        }
        let (snapshot, warnings) = load(&path)?;
        Ok((Self { path, snapshot }, warnings))
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Most recently loaded snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &PolicyConfig {
        &self.snapshot
    }

    /// Re-reads the file and replaces the snapshot.
    ///
    /// The previous snapshot stays active when the file cannot be loaded.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn reload(&mut self) -> Result<Vec<ConfigWarning>, ConfigError> {
        let (snapshot, warnings) = load(&self.path)?;
        self.snapshot = snapshot;
        Ok(warnings)
    }

    /// Switches a feature and persists every feature toggle to the file.
    ///
    /// Keys other than the toggles are preserved as they are on disk.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, parsed or written. The
    /// snapshot is left untouched in that case.
    pub fn toggle(&mut self, feature: Feature, enabled: bool) -> Result<(), ConfigError> {
        let next = self.snapshot.with_feature(feature, enabled);

        let mut document = match fs::read_to_string(&self.path) {
            Ok(contents) => contents.parse::<toml::Table>()?,
            Err(source) if source.kind() == io::ErrorKind::NotFound => toml::Table::new(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        for feature in Feature::ALL {
            let _ = document.insert(
                toggle_key(feature),
                toml::Value::Boolean(next.is_enabled(feature)),
            );
        }
        write_file(&self.path, &toml::to_string(&document)?)?;

        info!(%feature, enabled, path = %self.path.display(), "toggled feature");
        self.snapshot = next;
        Ok(())
    }
}

/// Configuration key holding the enable flag of a feature.
#[must_use]
pub fn toggle_key(feature: Feature) -> String {
    format!("{}-enabled", feature.name())
}

fn write_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let write_error = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, contents).map_err(write_error)
}
