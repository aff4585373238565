//! Bot configuration – reads/writes `dinobot.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dinobot_runtime::{CaptureFaultPolicy, ControlLoopConfig, ReportCadence};
use dinobot_types::{DetectionLayout, DinoError, Region, Thresholds};

pub const DEFAULT_CONFIG_FILE: &str = "dinobot.toml";
pub const CONFIG_PATH_ENV: &str = "DINOBOT_CONFIG";

/// Persisted bot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Pixels darker than this count as obstacle pixels.
    #[serde(default = "default_dark_threshold")]
    pub dark_threshold: u8,

    /// A box reports an obstacle once it holds more dark pixels than this.
    #[serde(default = "default_trigger_count")]
    pub trigger_count: usize,

    /// Minimum seconds between two jumps.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,

    /// Seconds slept between two scans.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,

    /// Print an analysis block every N frames (0 = only on obstacles).
    #[serde(default = "default_report_every")]
    pub report_every: u64,

    /// Seconds to wait before the first jump, to focus the game window.
    #[serde(default = "default_start_delay_secs")]
    pub start_delay_secs: u64,

    /// Screen rectangles, in absolute screen pixels.
    #[serde(default = "default_layout")]
    pub layout: DetectionLayout,

    #[serde(default)]
    pub debug: DebugConfig,

    #[serde(default)]
    pub capture_fault: CaptureFaultPolicy,
}

/// Debug image settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugConfig {
    #[serde(default = "default_debug_enabled")]
    pub enabled: bool,
    #[serde(default = "default_debug_folder")]
    pub folder: PathBuf,
    /// Save an image every N frames.
    #[serde(default = "default_debug_every")]
    pub every: u64,
}

fn default_dark_threshold() -> u8 {
    150
}
fn default_trigger_count() -> usize {
    300
}
fn default_cooldown_secs() -> f64 {
    0.3
}
fn default_poll_interval_secs() -> f64 {
    0.01
}
fn default_report_every() -> u64 {
    100
}
fn default_start_delay_secs() -> u64 {
    5
}
fn default_layout() -> DetectionLayout {
    DetectionLayout {
        game: Region::new(593, 246, 729, 162),
        near: Region::new(743, 366, 50, 60),
        far: Region::new(823, 366, 50, 60),
    }
}
fn default_debug_enabled() -> bool {
    true
}
fn default_debug_folder() -> PathBuf {
    PathBuf::from("dino_debug")
}
fn default_debug_every() -> u64 {
    50
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: default_debug_enabled(),
            folder: default_debug_folder(),
            every: default_debug_every(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dark_threshold: default_dark_threshold(),
            trigger_count: default_trigger_count(),
            cooldown_secs: default_cooldown_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            report_every: default_report_every(),
            start_delay_secs: default_start_delay_secs(),
            layout: default_layout(),
            debug: DebugConfig::default(),
            capture_fault: CaptureFaultPolicy::default(),
        }
    }
}

impl Config {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            dark_threshold: self.dark_threshold,
            trigger_count: self.trigger_count,
        }
    }

    /// Build the control loop configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DinoError::Configuration`] for durations that are negative or
    /// not finite, and for anything [`ControlLoopConfig::validate`] rejects.
    pub fn to_loop_config(&self) -> Result<ControlLoopConfig, DinoError> {
        let config = ControlLoopConfig {
            layout: self.layout,
            thresholds: self.thresholds(),
            cooldown: seconds("cooldown_secs", self.cooldown_secs)?,
            poll_interval: seconds("poll_interval_secs", self.poll_interval_secs)?,
            fault_policy: self.capture_fault,
            cadence: ReportCadence {
                every: self.report_every,
                on_obstacle: true,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

fn seconds(subject: &str, value: f64) -> Result<Duration, DinoError> {
    Duration::try_from_secs_f64(value).map_err(|e| DinoError::Configuration {
        subject: subject.to_string(),
        details: format!("{value}: {e}"),
    })
}

/// Resolve the config path: explicit argument, then `DINOBOT_CONFIG`, then
/// `dinobot.toml` in the working directory.
pub fn config_path(arg: Option<String>) -> PathBuf {
    resolve_config_path(arg, std::env::var(CONFIG_PATH_ENV).ok())
}

pub(crate) fn resolve_config_path(arg: Option<String>, env: Option<String>) -> PathBuf {
    arg.or(env)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Save the config to `path`, creating parent directories if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

/// Apply `DINOBOT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `DINOBOT_DARK_THRESHOLD` | `dark_threshold` |
/// | `DINOBOT_TRIGGER_COUNT` | `trigger_count` |
/// | `DINOBOT_COOLDOWN_SECS` | `cooldown_secs` |
/// | `DINOBOT_POLL_INTERVAL_SECS` | `poll_interval_secs` |
/// | `DINOBOT_DEBUG_IMAGES` | `debug.enabled` |
/// | `DINOBOT_DEBUG_FOLDER` | `debug.folder` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("DINOBOT_DARK_THRESHOLD")
        && let Ok(threshold) = v.trim().parse::<u8>()
    {
        cfg.dark_threshold = threshold;
    }
    if let Some(v) = lookup("DINOBOT_TRIGGER_COUNT")
        && let Ok(count) = v.trim().parse::<usize>()
    {
        cfg.trigger_count = count;
    }
    if let Some(secs) = lookup("DINOBOT_COOLDOWN_SECS").and_then(|v| parse_secs(&v)) {
        cfg.cooldown_secs = secs;
    }
    if let Some(secs) = lookup("DINOBOT_POLL_INTERVAL_SECS").and_then(|v| parse_secs(&v)) {
        cfg.poll_interval_secs = secs;
    }
    if let Some(enabled) = lookup("DINOBOT_DEBUG_IMAGES").and_then(|v| parse_flag(&v)) {
        cfg.debug.enabled = enabled;
    }
    if let Some(v) = lookup("DINOBOT_DEBUG_FOLDER")
        && !v.is_empty()
    {
        cfg.debug.folder = PathBuf::from(v);
    }
}

fn parse_secs(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_calibration() {
        let cfg = Config::default();
        let loop_cfg = cfg.to_loop_config().expect("defaults are valid");
        assert_eq!(loop_cfg.layout, ControlLoopConfig::default().layout);
        assert_eq!(loop_cfg.thresholds.dark_threshold, 150);
        assert_eq!(loop_cfg.thresholds.trigger_count, 300);
        assert_eq!(loop_cfg.cooldown, Duration::from_millis(300));
        assert_eq!(loop_cfg.poll_interval, Duration::from_millis(10));
        assert_eq!(loop_cfg.cadence.every, 100);
        assert!(cfg.debug.enabled);
        assert_eq!(cfg.debug.folder, PathBuf::from("dino_debug"));
        assert_eq!(cfg.debug.every, 50);
        assert_eq!(cfg.start_delay_secs, 5);
    }

    #[test]
    fn save_then_load_preserves_every_field() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("nested").join("dinobot.toml");

        let mut cfg = Config::default();
        cfg.dark_threshold = 120;
        cfg.layout.far = Region::new(900, 366, 40, 40);
        cfg.debug.enabled = false;
        cfg.capture_fault = CaptureFaultPolicy::Backoff {
            max_consecutive_failures: 10,
            initial_backoff_ms: 20,
            max_backoff_ms: 200,
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load").expect("file exists");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().expect("tmp dir");
        assert_eq!(load_from(&dir.path().join("absent.toml")), Ok(None));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("dinobot.toml");
        fs::write(
            &path,
            "trigger_count = 250\n\n[capture_fault]\nmode = \"fail_fast\"\n",
        )
        .unwrap();
        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.trigger_count, 250);
        assert_eq!(cfg.dark_threshold, 150);
        assert_eq!(cfg.layout, default_layout());
        assert_eq!(cfg.capture_fault, CaptureFaultPolicy::FailFast);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("dinobot.toml");
        fs::write(&path, "dark_threshold = \"very\"\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse config"), "{err}");
    }

    #[test]
    fn env_overrides_replace_fields() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            lookup_from(&[
                ("DINOBOT_DARK_THRESHOLD", "90"),
                ("DINOBOT_TRIGGER_COUNT", "400"),
                ("DINOBOT_COOLDOWN_SECS", "0.5"),
                ("DINOBOT_POLL_INTERVAL_SECS", "0.02"),
                ("DINOBOT_DEBUG_IMAGES", "false"),
                ("DINOBOT_DEBUG_FOLDER", "/tmp/dino"),
            ]),
        );
        assert_eq!(cfg.dark_threshold, 90);
        assert_eq!(cfg.trigger_count, 400);
        assert_eq!(cfg.cooldown_secs, 0.5);
        assert_eq!(cfg.poll_interval_secs, 0.02);
        assert!(!cfg.debug.enabled);
        assert_eq!(cfg.debug.folder, PathBuf::from("/tmp/dino"));
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            lookup_from(&[
                ("DINOBOT_DARK_THRESHOLD", "300"),
                ("DINOBOT_COOLDOWN_SECS", "-1"),
                ("DINOBOT_POLL_INTERVAL_SECS", "NaN"),
                ("DINOBOT_DEBUG_IMAGES", "maybe"),
            ]),
        );
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn negative_duration_in_file_is_rejected() {
        let cfg = Config {
            cooldown_secs: -0.1,
            ..Config::default()
        };
        let err = cfg.to_loop_config().unwrap_err();
        assert!(err.to_string().contains("cooldown_secs"), "{err}");
    }

    #[test]
    fn invalid_layout_is_rejected_before_the_loop_exists() {
        let mut cfg = Config::default();
        cfg.layout.near = Region::new(743, 366, 50, 0);
        assert!(matches!(
            cfg.to_loop_config(),
            Err(DinoError::Configuration { .. })
        ));
    }

    #[test]
    fn config_path_precedence() {
        assert_eq!(
            resolve_config_path(Some("a.toml".into()), Some("b.toml".into())),
            PathBuf::from("a.toml")
        );
        assert_eq!(
            resolve_config_path(None, Some("b.toml".into())),
            PathBuf::from("b.toml")
        );
        assert_eq!(
            resolve_config_path(None, None),
            PathBuf::from(DEFAULT_CONFIG_FILE)
        );
    }
}
