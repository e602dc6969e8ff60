use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Weekday;
use serde::Deserialize;
use sift_core::Schema;
use thiserror::Error;

const APP_DIR: &str = "sift";
const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub debug: bool,
    pub confirmation: bool,
    pub filter: FilterConfig,
    pub schema: Schema,
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// `~` is a regular-expression match; off means plain substring.
    pub regex: bool,
    pub verify_legacy: bool,
    pub week_start: Weekday,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            confirmation: true,
            filter: FilterConfig {
                regex: true,
                verify_legacy: false,
                week_start: Weekday::Sun,
            },
            schema: Schema::builtin(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing home directory")]
    MissingHomeDir,
    #[error("invalid config path: {0}")]
    InvalidConfigPath(PathBuf),
    #[error("config file not found: {0}")]
    MissingConfigFile(PathBuf),
    #[error("config file permissions too permissive: {0}")]
    InsecurePermissions(PathBuf),
    #[error("invalid week_start value: {0} (expected sunday or monday)")]
    InvalidWeekStart(String),
    #[error("invalid uda name: {0}")]
    InvalidUda(String),
    #[error("duplicate uda: {0}")]
    DuplicateUda(String),
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    debug: Option<bool>,
    confirmation: Option<bool>,
    filter: Option<FilterFile>,
    udas: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterFile {
    regex: Option<bool>,
    verify_legacy: Option<bool>,
    week_start: Option<String>,
}

pub fn load(config_path: Option<PathBuf>) -> Result<AppConfig> {
    let required = config_path.is_some();
    let path = match resolve_config_path(config_path) {
        Ok(path) => path,
        Err(ConfigError::MissingHomeDir) if !required => return Ok(AppConfig::default()),
        Err(ConfigError::InvalidConfigPath(_)) if !required => return Ok(AppConfig::default()),
        Err(err) => return Err(err),
    };
    match load_at_path(&path, required)? {
        Some(config) => Ok(config),
        None => Ok(AppConfig::default()),
    }
}

pub fn resolve_config_path(custom: Option<PathBuf>) -> Result<PathBuf> {
    match custom {
        Some(path) => {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidConfigPath(path));
            }
            Ok(path)
        }
        None => {
            let base = if let Some(dir) = env::var_os("XDG_CONFIG_HOME") {
                let path = PathBuf::from(dir);
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidConfigPath(path));
                }
                path
            } else {
                let home = dirs::home_dir().ok_or(ConfigError::MissingHomeDir)?;
                home.join(".config")
            };
            Ok(base.join(APP_DIR).join(CONFIG_FILENAME))
        }
    }
}

fn load_at_path(path: &Path, required: bool) -> Result<Option<AppConfig>> {
    if !path.exists() {
        if required {
            return Err(ConfigError::MissingConfigFile(path.to_path_buf()));
        }
        return Ok(None);
    }

    ensure_permissions(path)?;
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: ConfigFile = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(merge_config(parsed)?))
}

fn merge_config(parsed: ConfigFile) -> Result<AppConfig> {
    let mut config = AppConfig::default();

    if let Some(debug) = parsed.debug {
        config.debug = debug;
    }
    if let Some(confirmation) = parsed.confirmation {
        config.confirmation = confirmation;
    }

    if let Some(filter) = parsed.filter {
        if let Some(regex) = filter.regex {
            config.filter.regex = regex;
        }
        if let Some(verify_legacy) = filter.verify_legacy {
            config.filter.verify_legacy = verify_legacy;
        }
        if let Some(week_start) = filter.week_start {
            config.filter.week_start = parse_week_start(&week_start)?;
        }
    }

    if let Some(udas) = parsed.udas {
        let mut seen = BTreeSet::new();
        for uda in &udas {
            let name = uda.trim();
            if !seen.insert(name) || Schema::builtin().contains(name) {
                return Err(ConfigError::DuplicateUda(name.to_string()));
            }
        }
        config.schema = Schema::with_udas(&udas).map_err(|err| match err {
            sift_core::CoreError::InvalidAttributeName(name) => ConfigError::InvalidUda(name),
            other => ConfigError::InvalidUda(other.to_string()),
        })?;
    }

    Ok(config)
}

fn parse_week_start(raw: &str) -> Result<Weekday> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "sunday" => Ok(Weekday::Sun),
        "monday" => Ok(Weekday::Mon),
        _ => Err(ConfigError::InvalidWeekStart(raw.to_string())),
    }
}

#[cfg(unix)]
fn ensure_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mode = metadata.permissions().mode();
    if mode & 0o077 != 0 {
        return Err(ConfigError::InsecurePermissions(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_at_path, merge_config, ConfigError, ConfigFile, FilterFile};
    use chrono::Weekday;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn restrict_permissions(path: &Path) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path).expect("metadata").permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).expect("chmod");
        }
    }

    #[test]
    fn defaults_when_empty() {
        let merged = merge_config(ConfigFile::default()).expect("merge");
        assert!(!merged.debug);
        assert!(merged.confirmation);
        assert!(merged.filter.regex);
        assert!(!merged.filter.verify_legacy);
        assert_eq!(merged.filter.week_start, Weekday::Sun);
    }

    #[test]
    fn merge_config_applies_values() {
        let parsed = ConfigFile {
            debug: Some(true),
            confirmation: Some(false),
            filter: Some(FilterFile {
                regex: Some(false),
                verify_legacy: Some(true),
                week_start: Some("Monday".to_string()),
            }),
            udas: Some(vec!["estimate".to_string()]),
        };
        let merged = merge_config(parsed).expect("merge");
        assert!(merged.debug);
        assert!(!merged.confirmation);
        assert!(!merged.filter.regex);
        assert!(merged.filter.verify_legacy);
        assert_eq!(merged.filter.week_start, Weekday::Mon);
        assert!(merged.schema.contains("estimate"));
    }

    #[test]
    fn rejects_bad_udas_and_week_start() {
        let bad_week = ConfigFile {
            filter: Some(FilterFile {
                week_start: Some("friday".to_string()),
                ..FilterFile::default()
            }),
            ..ConfigFile::default()
        };
        assert!(matches!(
            merge_config(bad_week),
            Err(ConfigError::InvalidWeekStart(_))
        ));

        let duplicate = ConfigFile {
            udas: Some(vec!["size".to_string(), "size".to_string()]),
            ..ConfigFile::default()
        };
        assert!(matches!(
            merge_config(duplicate),
            Err(ConfigError::DuplicateUda(_))
        ));

        let builtin = ConfigFile {
            udas: Some(vec!["project".to_string()]),
            ..ConfigFile::default()
        };
        assert!(matches!(
            merge_config(builtin),
            Err(ConfigError::DuplicateUda(_))
        ));

        let invalid = ConfigFile {
            udas: Some(vec!["two words".to_string()]),
            ..ConfigFile::default()
        };
        assert!(matches!(
            merge_config(invalid),
            Err(ConfigError::InvalidUda(_))
        ));
    }

    #[test]
    fn udas_named_like_dates_or_operators_are_rejected() {
        for name in ["today", "eom", "friday", "or", "not"] {
            let parsed = ConfigFile {
                udas: Some(vec![name.to_string()]),
                ..ConfigFile::default()
            };
            assert!(
                matches!(merge_config(parsed), Err(ConfigError::InvalidUda(ref uda)) if uda == name),
                "{name} accepted"
            );
        }
    }

    #[test]
    fn load_at_path_requires_file_when_requested() {
        let temp = TempDir::new().expect("tempdir");
        let missing = temp.path().join("config.toml");
        let err = load_at_path(&missing, true).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("config file not found"));
        assert!(load_at_path(&missing, false).expect("optional").is_none());
    }

    #[test]
    fn load_at_path_parses_toml() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "debug = true\nudas = [\"estimate\"]\n[filter]\nregex = false\nweek_start = \"monday\"\n",
        )
        .expect("write config");
        restrict_permissions(&path);

        let config = load_at_path(&path, true).expect("load").expect("config");
        assert!(config.debug);
        assert!(!config.filter.regex);
        assert_eq!(config.filter.week_start, Weekday::Mon);
        assert!(config.schema.contains("estimate"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "colour = true\n").expect("write config");
        restrict_permissions(&path);

        let err = load_at_path(&path, true).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn world_readable_config_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "debug = true\n").expect("write config");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o644);
        fs::set_permissions(&path, perms).expect("chmod");

        let err = load_at_path(&path, true).unwrap_err();
        assert!(matches!(err, ConfigError::InsecurePermissions(_)));
    }
}
