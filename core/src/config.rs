//! Configuration loading and the immutable runtime context.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fowsync_watcher::WatchConfig;
use ini::{Ini, ParseOption, Properties};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, SyncError};

/// File name of the configuration file looked up next to the executable.
pub const CONFIG_FILE_NAME: &str = "gdfowsync.toml";

/// Legacy `.ini` configuration, used when no TOML file sits next to it.
pub const INI_FILE_NAME: &str = "gdfowsync.ini";

/// Executable name of the game, as the OS reports it.
pub const DEFAULT_PROCESS_NAME: &str = "Grim Dawn.exe";

/// Configuration file contents.
///
/// The `[PATH]` section keeps the key names of the older `.ini` layout, and
/// an `.ini` file is still accepted as is through [`FowSyncConfig::parse_ini`].
/// Quotes left around values are stripped on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FowSyncConfig {
    /// Filesystem paths.
    #[serde(rename = "PATH")]
    pub paths: PathConfig,

    /// Sync tunables.
    #[serde(default)]
    pub sync: SyncSettings,
}

/// The three configured paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Save directory of the game.
    #[serde(rename = "GD_SAVE_PATH")]
    pub save_path: PathBuf,

    /// Game executable. Carried for completeness; the core never reads it.
    #[serde(rename = "GD_EXE_PATH")]
    pub game_exe_path: PathBuf,

    /// Location of this tool. Carried for completeness.
    #[serde(rename = "GD_FOWSYNC_PATH")]
    pub fowsync_path: PathBuf,
}

/// Timing and policy settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Seconds between periodic passes.
    pub interval_secs: u64,

    /// Milliseconds to wait after a new character appears.
    pub settle_delay_ms: u64,

    /// Milliseconds to wait for in-flight events when stopping.
    pub stop_grace_ms: u64,

    /// Process whose presence keeps the loop alive.
    pub process_name: String,

    /// When to overwrite a target.
    pub policy: SyncPolicy,

    /// Follow symbolic links while scanning for the source file.
    pub follow_symlinks: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            settle_delay_ms: 1000,
            stop_grace_ms: 2000,
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            policy: SyncPolicy::default(),
            follow_symlinks: false,
        }
    }
}

impl SyncSettings {
    /// Overlay the keys present in an `.ini` `[sync]` section.
    fn apply_ini(&mut self, section: &Properties) -> Result<(), ConfigError> {
        if let Some(value) = ini_value(section, "interval_secs") {
            self.interval_secs = parse_setting("interval_secs", value)?;
        }
        if let Some(value) = ini_value(section, "settle_delay_ms") {
            self.settle_delay_ms = parse_setting("settle_delay_ms", value)?;
        }
        if let Some(value) = ini_value(section, "stop_grace_ms") {
            self.stop_grace_ms = parse_setting("stop_grace_ms", value)?;
        }
        if let Some(value) = ini_value(section, "process_name") {
            self.process_name = value.to_string();
        }
        if let Some(value) = ini_value(section, "policy") {
            self.policy = value.parse()?;
        }
        if let Some(value) = ini_value(section, "follow_symlinks") {
            self.follow_symlinks = parse_setting("follow_symlinks", value)?;
        }
        Ok(())
    }
}

/// Decides whether a target gets overwritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    /// Overwrite every target on every pass.
    #[default]
    Always,

    /// Leave targets that already hold identical bytes untouched.
    SkipIdentical,
}

impl std::str::FromStr for SyncPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(Self::Always),
            "skip_identical" => Ok(Self::SkipIdentical),
            other => Err(ConfigError::Invalid(format!(
                "sync.policy must be \"always\" or \"skip_identical\", got \"{other}\""
            ))),
        }
    }
}

impl FowSyncConfig {
    /// Load and validate the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let origin = path.display().to_string();
        let config = if is_ini(path) {
            Self::parse_ini(&content, &origin)?
        } else {
            Self::parse(&content, &origin)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML configuration text and normalize its paths, without
    /// touching the file system.
    pub fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;

        Ok(config.normalized())
    }

    /// Parse the `.ini` layout: a `[PATH]` section with the three `GD_*` keys
    /// and an optional `[sync]` section with the TOML key names.
    ///
    /// Values are taken verbatim, so unquoted values and Windows backslashes
    /// both work. Keys match case-insensitively.
    pub fn parse_ini(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let options = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(content, options).map_err(|source| {
            ConfigError::IniParse {
                path: origin.to_string(),
                source,
            }
        })?;

        let missing = |what: String| ConfigError::Missing {
            path: origin.to_string(),
            what,
        };
        let paths = ini
            .section(Some("PATH"))
            .ok_or_else(|| missing("[PATH] section".to_string()))?;
        let required = |key: &str| {
            ini_value(paths, key)
                .map(PathBuf::from)
                .ok_or_else(|| missing(format!("key {key} in [PATH]")))
        };

        let mut config = Self {
            paths: PathConfig {
                save_path: required("GD_SAVE_PATH")?,
                game_exe_path: required("GD_EXE_PATH")?,
                fowsync_path: required("GD_FOWSYNC_PATH")?,
            },
            sync: SyncSettings::default(),
        };

        if let Some(section) = ini.section(Some("sync")) {
            config.sync.apply_ini(section)?;
        }

        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        self.paths.save_path = expand_home(&strip_quotes(&self.paths.save_path));
        self.paths.game_exe_path = strip_quotes(&self.paths.game_exe_path);
        self.paths.fowsync_path = strip_quotes(&self.paths.fowsync_path);
        self
    }

    /// Check the save path and timing values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.paths.save_path.exists() {
            return Err(ConfigError::SavePathNotFound(
                self.paths.save_path.display().to_string(),
            ));
        }

        if self.sync.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync.interval_secs must be greater than zero".to_string(),
            ));
        }

        if self.sync.settle_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "sync.settle_delay_ms must be greater than zero".to_string(),
            ));
        }

        if self.sync.process_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "sync.process_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Default configuration path: `gdfowsync.toml` next to the running
    /// executable, or `gdfowsync.ini` there when only that one exists.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let exe = std::env::current_exe().map_err(ConfigError::ExecutableDir)?;
        let dir = exe.parent().ok_or_else(|| {
            ConfigError::ExecutableDir(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} has no parent directory", exe.display()),
            ))
        })?;

        Ok(config_in(dir))
    }
}

fn config_in(dir: &Path) -> PathBuf {
    let toml = dir.join(CONFIG_FILE_NAME);
    let ini = dir.join(INI_FILE_NAME);

    if !toml.exists() && ini.exists() {
        ini
    } else {
        toml
    }
}

fn is_ini(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ini"))
}

fn ini_value<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .map(|(_, value)| value.trim().trim_matches('"'))
}

fn parse_setting<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("sync.{key} has an invalid value: {value}")))
}

/// Values an `.ini`-era file may still wrap in double quotes.
fn strip_quotes(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(raw.trim().trim_matches('"'))
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Immutable context shared by every component of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncContext {
    /// Save directory.
    pub save_root: PathBuf,

    /// Game executable path, if configured.
    pub game_exe_path: Option<PathBuf>,

    /// Tool path, if configured.
    pub fowsync_path: Option<PathBuf>,

    /// Time between periodic passes.
    pub interval: Duration,

    /// Delay between a new character appearing and the pass it triggers.
    pub settle_delay: Duration,

    /// Bound on waiting for in-flight events during shutdown.
    pub stop_grace: Duration,

    /// Process name checked by the process gate.
    pub process_name: String,

    /// Target overwrite policy.
    pub policy: SyncPolicy,

    /// Follow symbolic links while scanning for the source file.
    pub follow_symlinks: bool,
}

impl SyncContext {
    /// Create a context for a save root with default settings.
    pub fn new(save_root: impl Into<PathBuf>) -> Self {
        let defaults = SyncSettings::default();

        Self {
            save_root: save_root.into(),
            game_exe_path: None,
            fowsync_path: None,
            interval: Duration::from_secs(defaults.interval_secs),
            settle_delay: Duration::from_millis(defaults.settle_delay_ms),
            stop_grace: Duration::from_millis(defaults.stop_grace_ms),
            process_name: defaults.process_name,
            policy: defaults.policy,
            follow_symlinks: defaults.follow_symlinks,
        }
    }

    /// Build the runtime context from a validated configuration.
    ///
    /// The save root is canonicalized so it compares equal to the paths the
    /// file system watcher reports.
    pub fn from_config(config: &FowSyncConfig) -> Result<Self, SyncError> {
        let save_root = dunce::canonicalize(&config.paths.save_path).map_err(|_| {
            SyncError::SaveRootNotFound(config.paths.save_path.display().to_string())
        })?;

        Ok(Self {
            save_root,
            game_exe_path: Some(config.paths.game_exe_path.clone()),
            fowsync_path: Some(config.paths.fowsync_path.clone()),
            interval: Duration::from_secs(config.sync.interval_secs),
            settle_delay: Duration::from_millis(config.sync.settle_delay_ms),
            stop_grace: Duration::from_millis(config.sync.stop_grace_ms),
            process_name: config.sync.process_name.clone(),
            policy: config.sync.policy,
            follow_symlinks: config.sync.follow_symlinks,
        })
    }

    /// Set the periodic interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the new-character settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the shutdown grace period.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Set the overwrite policy.
    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Follow symbolic links when scanning for the source.
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Replace the save root.
    pub fn with_save_root(mut self, save_root: impl Into<PathBuf>) -> Self {
        self.save_root = save_root.into();
        self
    }

    /// Watch configuration for this context's save root.
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig::new(&self.save_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[PATH]
GD_SAVE_PATH = "/saves"
GD_EXE_PATH = 'C:\Games\Grim Dawn\Grim Dawn.exe'
GD_FOWSYNC_PATH = 'C:\Tools\gdfowsync.exe'
"#;

    #[test]
    fn test_parse_with_default_settings() {
        let config = FowSyncConfig::parse(SAMPLE, "sample").unwrap();

        assert_eq!(config.paths.save_path, PathBuf::from("/saves"));
        assert_eq!(
            config.paths.game_exe_path,
            PathBuf::from(r"C:\Games\Grim Dawn\Grim Dawn.exe")
        );
        assert_eq!(config.sync, SyncSettings::default());
        assert_eq!(config.sync.interval_secs, 60);
        assert_eq!(config.sync.process_name, "Grim Dawn.exe");
    }

    #[test]
    fn test_parse_sync_section() {
        let content = format!(
            "{SAMPLE}\n[sync]\ninterval_secs = 5\npolicy = \"skip_identical\"\n"
        );
        let config = FowSyncConfig::parse(&content, "sample").unwrap();

        assert_eq!(config.sync.interval_secs, 5);
        assert_eq!(config.sync.settle_delay_ms, 1000);
        assert_eq!(config.sync.policy, SyncPolicy::SkipIdentical);
    }

    #[test]
    fn test_missing_key_is_named() {
        let content = "[PATH]\nGD_SAVE_PATH = \"/saves\"\nGD_FOWSYNC_PATH = \"x\"\n";
        let err = FowSyncConfig::parse(content, "sample").unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("GD_EXE_PATH"), "{err}");
    }

    #[test]
    fn test_missing_section_is_rejected() {
        let err = FowSyncConfig::parse("[paths]\n", "sample").unwrap_err();
        assert!(err.to_string().contains("PATH"), "{err}");
    }

    #[test]
    fn test_quotes_are_stripped() {
        let content = r#"
[PATH]
GD_SAVE_PATH = '"/saves/quoted"'
GD_EXE_PATH = '"game.exe"'
GD_FOWSYNC_PATH = "tool.exe"
"#;
        let config = FowSyncConfig::parse(content, "sample").unwrap();

        assert_eq!(config.paths.save_path, PathBuf::from("/saves/quoted"));
        assert_eq!(config.paths.game_exe_path, PathBuf::from("game.exe"));
    }

    #[test]
    fn test_home_is_expanded() {
        let content = SAMPLE.replace("\"/saves\"", "\"~/My Games/save\"");
        let config = FowSyncConfig::parse(&content, "sample").unwrap();

        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.paths.save_path, home.join("My Games/save"));
        }
    }

    #[test]
    fn test_validate_missing_save_path() {
        let content = SAMPLE.replace("/saves", "/nonexistent/save/path/12345");
        let config = FowSyncConfig::parse(&content, "sample").unwrap();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::SavePathNotFound(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = FowSyncConfig::parse(SAMPLE, "sample").unwrap();
        config.paths.save_path = temp_dir.path().to_path_buf();
        config.sync.interval_secs = 0;

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let save_dir = temp_dir.path().join("save");
        std::fs::create_dir(&save_dir).unwrap();

        let file = temp_dir.path().join(CONFIG_FILE_NAME);
        let content = SAMPLE.replace(
            "\"/saves\"",
            &format!("'{}'", save_dir.display()),
        );
        std::fs::write(&file, content).unwrap();

        let config = FowSyncConfig::load(&file).unwrap();
        let ctx = SyncContext::from_config(&config).unwrap();

        assert_eq!(ctx.save_root, dunce::canonicalize(&save_dir).unwrap());
        assert_eq!(ctx.interval, Duration::from_secs(60));
        assert_eq!(ctx.settle_delay, Duration::from_secs(1));
        assert_eq!(ctx.policy, SyncPolicy::Always);
    }

    #[test]
    fn test_example_file_parses() {
        let content = include_str!("../../gdfowsync.example.toml");
        let config = FowSyncConfig::parse(content, "example").unwrap();

        assert_eq!(config.sync, SyncSettings::default());
        assert!(config.paths.game_exe_path.ends_with("Grim Dawn.exe"));
    }

    const SAMPLE_INI: &str = r#"
[PATH]
GD_SAVE_PATH = "C:\Users\me\Documents\My Games\Grim Dawn\save"
GD_EXE_PATH = "C:\Program Files (x86)\Steam\steamapps\common\Grim Dawn\Grim Dawn.exe"
GD_FOWSYNC_PATH = C:\Tools\gdfowsync\gdfowsync.exe
"#;

    #[test]
    fn test_parse_ini_keeps_windows_backslashes() {
        let config = FowSyncConfig::parse_ini(SAMPLE_INI, "sample.ini").unwrap();

        assert_eq!(
            config.paths.save_path,
            PathBuf::from(r"C:\Users\me\Documents\My Games\Grim Dawn\save")
        );
        assert_eq!(
            config.paths.game_exe_path,
            PathBuf::from(r"C:\Program Files (x86)\Steam\steamapps\common\Grim Dawn\Grim Dawn.exe")
        );
        assert_eq!(
            config.paths.fowsync_path,
            PathBuf::from(r"C:\Tools\gdfowsync\gdfowsync.exe")
        );
        assert_eq!(config.sync, SyncSettings::default());
    }

    #[test]
    fn test_windows_path_in_ini_is_not_toml() {
        assert!(FowSyncConfig::parse(SAMPLE_INI, "sample.toml").is_err());
    }

    #[test]
    fn test_parse_ini_unquoted_home_path() {
        let content = "[PATH]\nGD_SAVE_PATH = ~/saves\ngd_exe_path = game.exe\nGD_FOWSYNC_PATH = tool.exe\n";
        let config = FowSyncConfig::parse_ini(content, "sample.ini").unwrap();

        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.paths.save_path, home.join("saves"));
        }
        assert_eq!(config.paths.game_exe_path, PathBuf::from("game.exe"));
    }

    #[test]
    fn test_parse_ini_missing_key_is_named() {
        let content = "[PATH]\nGD_SAVE_PATH = /saves\nGD_FOWSYNC_PATH = tool.exe\n";
        let err = FowSyncConfig::parse_ini(content, "sample.ini").unwrap_err();

        assert!(matches!(err, ConfigError::Missing { .. }));
        assert!(err.to_string().contains("GD_EXE_PATH"), "{err}");
    }

    #[test]
    fn test_parse_ini_missing_section() {
        let err = FowSyncConfig::parse_ini("[paths]\nGD_SAVE_PATH = /saves\n", "sample.ini")
            .unwrap_err();
        assert!(err.to_string().contains("[PATH]"), "{err}");
    }

    #[test]
    fn test_parse_ini_sync_section() {
        let content = format!(
            "{SAMPLE_INI}\n[sync]\ninterval_secs = 5\npolicy = skip_identical\nfollow_symlinks = true\n"
        );
        let config = FowSyncConfig::parse_ini(&content, "sample.ini").unwrap();

        assert_eq!(config.sync.interval_secs, 5);
        assert_eq!(config.sync.settle_delay_ms, 1000);
        assert_eq!(config.sync.policy, SyncPolicy::SkipIdentical);
        assert!(config.sync.follow_symlinks);
    }

    #[test]
    fn test_parse_ini_rejects_bad_setting() {
        let content = format!("{SAMPLE_INI}\n[sync]\ninterval_secs = soon\n");
        let err = FowSyncConfig::parse_ini(&content, "sample.ini").unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("interval_secs"), "{err}");
    }

    #[test]
    fn test_load_ini_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let save_dir = temp_dir.path().join("save");
        std::fs::create_dir(&save_dir).unwrap();

        let file = temp_dir.path().join(INI_FILE_NAME);
        let content = format!(
            "[PATH]\nGD_SAVE_PATH = \"{}\"\nGD_EXE_PATH = \"game.exe\"\nGD_FOWSYNC_PATH = \"tool.exe\"\n",
            save_dir.display()
        );
        std::fs::write(&file, content).unwrap();

        let config = FowSyncConfig::load(&file).unwrap();
        let ctx = SyncContext::from_config(&config).unwrap();

        assert_eq!(ctx.save_root, dunce::canonicalize(&save_dir).unwrap());
        assert_eq!(ctx.game_exe_path, Some(PathBuf::from("game.exe")));
    }

    #[test]
    fn test_default_location_falls_back_to_ini() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        assert_eq!(config_in(dir), dir.join(CONFIG_FILE_NAME));

        std::fs::write(dir.join(INI_FILE_NAME), "[PATH]\n").unwrap();
        assert_eq!(config_in(dir), dir.join(INI_FILE_NAME));

        std::fs::write(dir.join(CONFIG_FILE_NAME), "").unwrap();
        assert_eq!(config_in(dir), dir.join(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_load_missing_file() {
        let err = FowSyncConfig::load("/nonexistent/gdfowsync.toml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_context_builders() {
        let ctx = SyncContext::new("/saves")
            .with_interval(Duration::from_millis(50))
            .with_settle_delay(Duration::from_millis(10))
            .with_policy(SyncPolicy::SkipIdentical)
            .with_follow_symlinks(true);

        assert!(ctx.follow_symlinks);
        assert_eq!(ctx.interval, Duration::from_millis(50));
        assert_eq!(ctx.settle_delay, Duration::from_millis(10));
        assert_eq!(ctx.policy, SyncPolicy::SkipIdentical);
        assert_eq!(ctx.watch_config().save_root, PathBuf::from("/saves"));
    }
}
