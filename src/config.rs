use std::{path::Path, time::Duration};

use crate::{
    anim_ease::Ease,
    error::{PreloadError, PreloadResult},
};

/// Resource tracked when the host does not name any.
pub const DEFAULT_RESOURCE: &str = "/videos/output.mp4";

/// Number of probes allowed in flight at once.
pub const BATCH_SIZE: usize = 3;

/// Upper bound on the wait for a single asset.
pub const PROBE_TIMEOUT_MS: u64 = 10_000;

/// Pause between two consecutive batches.
pub const BATCH_PAUSE_MS: u64 = 200;

/// Delay after which an idle session shows the bootstrap floor.
pub const BOOTSTRAP_DELAY_MS: u64 = 500;

/// Percentage shown when nothing has settled after the bootstrap delay.
pub const BOOTSTRAP_FLOOR: u8 = 10;

/// Duration of one counter animation toward a new progress target.
pub const SMOOTHING_MS: u64 = 500;

/// Pause between reaching 100% and starting the exit timeline.
pub const GRACE_MS: u64 = 800;

/// Pause used instead of [`GRACE_MS`] when the fallback forced completion.
pub const FALLBACK_GRACE_MS: u64 = 500;

/// Hard upper bound on a whole session.
pub const FALLBACK_TIMEOUT_MS: u64 = 30_000;

/// Interval at which view frames are published to the host (~60 Hz).
pub const FRAME_MS: u64 = 16;

pub const DEFAULT_COMPLETION_MESSAGE: &str = "Welcome!";

/// Tunables of one preloader session.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    /// Ordered resource identifiers. Empty means [`DEFAULT_RESOURCE`].
    pub resources: Vec<String>,
    pub batch_size: usize,
    pub probe_timeout_ms: u64,
    pub batch_pause_ms: u64,
    pub bootstrap_delay_ms: u64,
    pub bootstrap_floor: u8,
    pub smoothing_ms: u64,
    pub grace_ms: u64,
    pub fallback_grace_ms: u64,
    pub fallback_timeout_ms: u64,
    pub frame_ms: u64,
    pub completion_message: String,
    /// Curve of the displayed counter; decelerating by default.
    pub smoothing_ease: Ease,
    /// Curve shared by every tween of the exit sequence.
    pub exit_ease: Ease,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            resources: Vec::new(),
            batch_size: BATCH_SIZE,
            probe_timeout_ms: PROBE_TIMEOUT_MS,
            batch_pause_ms: BATCH_PAUSE_MS,
            bootstrap_delay_ms: BOOTSTRAP_DELAY_MS,
            bootstrap_floor: BOOTSTRAP_FLOOR,
            smoothing_ms: SMOOTHING_MS,
            grace_ms: GRACE_MS,
            fallback_grace_ms: FALLBACK_GRACE_MS,
            fallback_timeout_ms: FALLBACK_TIMEOUT_MS,
            frame_ms: FRAME_MS,
            completion_message: DEFAULT_COMPLETION_MESSAGE.to_string(),
            smoothing_ease: Ease::POWER2_OUT,
            exit_ease: Ease::POWER2_IN,
        }
    }
}

impl PreloadConfig {
    pub fn with_resources<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resources: resources.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn from_json_str(s: &str) -> PreloadResult<Self> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| PreloadError::serde(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> PreloadResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PreloadError::config(format!("read config '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> PreloadResult<()> {
        if self.batch_size == 0 {
            return Err(PreloadError::validation("batch_size must be > 0"));
        }
        if self.bootstrap_floor > 100 {
            return Err(PreloadError::validation("bootstrap_floor must be <= 100"));
        }
        if self.frame_ms == 0 {
            return Err(PreloadError::validation("frame_ms must be > 0"));
        }
        if self.fallback_timeout_ms == 0 {
            return Err(PreloadError::validation("fallback_timeout_ms must be > 0"));
        }
        if self.resources.iter().any(|r| r.trim().is_empty()) {
            return Err(PreloadError::validation("resource identifiers must be non-empty"));
        }
        Ok(())
    }

    /// Resources to load, with the built-in default substituted for an empty list.
    pub fn effective_resources(&self) -> Vec<String> {
        if self.resources.is_empty() {
            vec![DEFAULT_RESOURCE.to_string()]
        } else {
            self.resources.clone()
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn bootstrap_delay(&self) -> Duration {
        Duration::from_millis(self.bootstrap_delay_ms)
    }

    pub fn smoothing(&self) -> Duration {
        Duration::from_millis(self.smoothing_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn fallback_grace(&self) -> Duration {
        Duration::from_millis(self.fallback_grace_ms)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }

    pub fn frame(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg = PreloadConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, PreloadConfig::default());
        assert_eq!(cfg.batch_size, 3);
        assert_eq!(cfg.probe_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.fallback_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn empty_resources_fall_back_to_builtin() {
        let cfg = PreloadConfig::default();
        assert_eq!(cfg.effective_resources(), vec![DEFAULT_RESOURCE.to_string()]);

        let cfg = PreloadConfig::with_resources(["a.mp4", "b.mp4"]);
        assert_eq!(cfg.effective_resources().len(), 2);
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let cfg = PreloadConfig::from_json_str(
            r#"{ "resources": ["/v/a.mp4"], "batch_size": 2, "completion_message": "Hi" }"#,
        )
        .unwrap();
        assert_eq!(cfg.batch_size, 2);
        assert_eq!(cfg.completion_message, "Hi");
        assert_eq!(cfg.grace_ms, GRACE_MS);
    }

    #[test]
    fn eases_are_named_in_snake_case() {
        let cfg = PreloadConfig::from_json_str(
            r#"{ "smoothing_ease": "in_out_quad", "exit_ease": "linear" }"#,
        )
        .unwrap();
        assert_eq!(cfg.smoothing_ease, Ease::InOutQuad);
        assert_eq!(cfg.exit_ease, Ease::Linear);
        assert_eq!(PreloadConfig::default().smoothing_ease, Ease::OutCubic);

        let err = PreloadConfig::from_json_str(r#"{ "exit_ease": "bounce" }"#).unwrap_err();
        assert!(matches!(err, PreloadError::Serde(_)));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad = PreloadConfig {
            batch_size: 0,
            ..PreloadConfig::default()
        };
        assert!(matches!(bad.validate(), Err(PreloadError::Validation(_))));

        let bad = PreloadConfig {
            bootstrap_floor: 120,
            ..PreloadConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = PreloadConfig::with_resources(["ok.mp4", "  "]);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn malformed_json_is_a_serde_error() {
        let err = PreloadConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, PreloadError::Serde(_)));
    }
}
