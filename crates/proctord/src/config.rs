use std::path::PathBuf;
use std::time::Duration;

use proctor_core::{RuleError, RuleSet};

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Recorded capture trace played back as the camera.
    pub trace_path: PathBuf,
    /// TOML indicator rule file. Built-in rules are used when unset.
    pub rules_path: Option<PathBuf>,
    /// Sampling rate while capture is running, in frames per second.
    pub refresh_hz: u32,
    /// Restart the trace when it reaches the end.
    pub loop_playback: bool,
    /// Whether the daemon is running on the session bus (development mode).
    pub session_bus: bool,
}

impl Config {
    /// Load configuration from `PROCTOR_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("proctor");

        let trace_path = var("PROCTOR_TRACE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("capture.jsonl"));

        Self {
            trace_path,
            rules_path: var("PROCTOR_RULES_PATH").map(PathBuf::from),
            refresh_hz: var("PROCTOR_REFRESH_HZ")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(60)
                .clamp(1, 240),
            loop_playback: var("PROCTOR_LOOP_PLAYBACK")
                .map(|v| v != "0")
                .unwrap_or(true),
            session_bus: var("PROCTOR_SESSION_BUS").is_some(),
        }
    }

    /// Time between samples while running.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.refresh_hz as u64)
    }

    pub fn load_rules(&self) -> Result<RuleSet, RuleError> {
        match &self.rules_path {
            Some(path) => RuleSet::load(path),
            None => {
                tracing::info!("using built-in indicator rules");
                Ok(RuleSet::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("HOME", "/home/quiz")]);
        assert_eq!(
            cfg.trace_path,
            PathBuf::from("/home/quiz/.local/share/proctor/capture.jsonl")
        );
        assert_eq!(cfg.rules_path, None);
        assert_eq!(cfg.refresh_hz, 60);
        assert!(cfg.loop_playback);
        assert!(!cfg.session_bus);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("XDG_DATA_HOME", "/var/data"),
            ("PROCTOR_RULES_PATH", "/etc/proctor/indicators.toml"),
            ("PROCTOR_REFRESH_HZ", "30"),
            ("PROCTOR_LOOP_PLAYBACK", "0"),
            ("PROCTOR_SESSION_BUS", "1"),
        ]);
        assert_eq!(
            cfg.trace_path,
            PathBuf::from("/var/data/proctor/capture.jsonl")
        );
        assert_eq!(
            cfg.rules_path.as_deref(),
            Some(std::path::Path::new("/etc/proctor/indicators.toml"))
        );
        assert_eq!(cfg.refresh_hz, 30);
        assert!(!cfg.loop_playback);
        assert!(cfg.session_bus);
    }

    #[test]
    fn test_refresh_rate_clamped_and_parsed() {
        assert_eq!(config(&[("PROCTOR_REFRESH_HZ", "0")]).refresh_hz, 1);
        assert_eq!(config(&[("PROCTOR_REFRESH_HZ", "1000")]).refresh_hz, 240);
        assert_eq!(config(&[("PROCTOR_REFRESH_HZ", "fast")]).refresh_hz, 60);
    }

    #[test]
    fn test_frame_interval() {
        let cfg = config(&[("PROCTOR_REFRESH_HZ", "50")]);
        assert_eq!(cfg.frame_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_builtin_rules_without_path() {
        let rules = config(&[]).load_rules().unwrap();
        assert_eq!(rules, RuleSet::default());
    }
}
