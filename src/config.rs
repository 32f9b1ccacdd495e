//! Resolved user settings and change notification.
//!
//! The renderer never reads settings ad hoc. A host-side writer publishes a
//! [`ConfigSnapshot`] into a [`SettingsStore`]; the render thread owns a
//! [`SettingsWatcher`] and picks the new snapshot up at the top of the next
//! frame.
//!
//! ```ignore
//! let store = SettingsStore::new(ConfigSnapshot::default());
//! let mut watcher = store.watch();
//!
//! // UI thread
//! store.publish(ConfigSnapshot { speed_multiplier: 2.0, ..store.snapshot() })?;
//!
//! // render thread, top of frame
//! if let Some(snapshot) = watcher.poll() {
//!     renderer.apply(snapshot);
//! }
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::field::MAX_PARTICLES;
use crate::palette::{Palette, Rgb8, Theme, DEFAULT_CUSTOM_COLORS, PALETTE_SIZE};

/// Which population shape and renderer variant is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// Point sprites bursting radially out of the center.
    #[default]
    RadialBurst,
    /// Line streaks flying down a twisting Z tunnel.
    TunnelStreak,
}

/// Frame-rate hint from settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FpsTarget {
    #[serde(rename = "30")]
    Fps30,
    #[default]
    #[serde(rename = "60")]
    Fps60,
    #[serde(rename = "90")]
    Fps90,
    #[serde(rename = "120")]
    Fps120,
    #[serde(rename = "max", alias = "Max")]
    Max,
}

impl FpsTarget {
    /// Frames per second, or `None` when uncapped.
    pub fn fps(self) -> Option<u32> {
        match self {
            FpsTarget::Fps30 => Some(30),
            FpsTarget::Fps60 => Some(60),
            FpsTarget::Fps90 => Some(90),
            FpsTarget::Fps120 => Some(120),
            FpsTarget::Max => None,
        }
    }

    /// Minimum time between frames, or `None` when uncapped.
    pub fn frame_interval(self) -> Option<Duration> {
        self.fps().map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
    }
}

/// A resolved, validated view of the user settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSnapshot {
    pub mode: SimulationMode,
    pub theme: Theme,
    pub custom_colors: [Rgb8; PALETTE_SIZE],
    #[serde(rename = "particle_or_star_count")]
    pub particle_count: i64,
    pub speed_multiplier: f32,
    pub fps_target: FpsTarget,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            mode: SimulationMode::RadialBurst,
            theme: Theme::SciFi,
            custom_colors: DEFAULT_CUSTOM_COLORS,
            particle_count: 4000,
            speed_multiplier: 1.0,
            fps_target: FpsTarget::Fps60,
        }
    }
}

impl ConfigSnapshot {
    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.particle_count <= 0 {
            return Err(ConfigError::NonPositiveCount(self.particle_count));
        }
        if self.particle_count as u64 > MAX_PARTICLES as u64 {
            return Err(ConfigError::CountTooLarge {
                count: self.particle_count,
                max: MAX_PARTICLES,
            });
        }
        if !self.speed_multiplier.is_finite() || self.speed_multiplier <= 0.0 {
            return Err(ConfigError::InvalidSpeed(self.speed_multiplier));
        }
        Ok(())
    }

    /// Parse and validate a JSON settings document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let snapshot: ConfigSnapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Read, parse and validate a JSON settings file.
    pub fn load_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// The palette particles should sample from.
    pub fn palette(&self) -> Palette {
        Palette::for_theme(self.theme, &self.custom_colors)
    }

    /// Population size as a `usize`. Only meaningful after [`validate`](Self::validate).
    pub fn count(&self) -> usize {
        self.particle_count.max(0) as usize
    }

    /// Whether switching from `self` to `other` requires regenerating particles.
    pub fn needs_regeneration(&self, other: &ConfigSnapshot) -> bool {
        self.mode != other.mode
            || self.particle_count != other.particle_count
            || self.theme != other.theme
            || (other.theme == Theme::Custom && self.custom_colors != other.custom_colors)
    }
}

struct SettingsShared {
    snapshot: RwLock<ConfigSnapshot>,
    generation: AtomicU64,
}

/// Shared holder of the latest valid settings.
///
/// Cloning is cheap; all clones see the same snapshot. Publishing bumps a
/// generation counter that watchers use as a dirty flag.
#[derive(Clone)]
pub struct SettingsStore {
    shared: Arc<SettingsShared>,
}

impl SettingsStore {
    /// Create a store holding `initial`. Invalid input falls back to defaults.
    pub fn new(initial: ConfigSnapshot) -> Self {
        let initial = match initial.validate() {
            Ok(()) => initial,
            Err(e) => {
                log::warn!("Rejected initial settings ({}), using defaults", e);
                ConfigSnapshot::default()
            }
        };
        Self {
            shared: Arc::new(SettingsShared {
                snapshot: RwLock::new(initial),
                generation: AtomicU64::new(1),
            }),
        }
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> ConfigSnapshot {
        match self.shared.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the snapshot and notify watchers.
    ///
    /// Invalid snapshots are rejected and the previous one is kept.
    pub fn publish(&self, snapshot: ConfigSnapshot) -> Result<(), ConfigError> {
        snapshot.validate()?;
        {
            let mut guard = match self.shared.snapshot.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = snapshot;
        }
        self.shared.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Parse a JSON document and publish it.
    pub fn publish_json(&self, json: &str) -> Result<(), ConfigError> {
        self.publish(ConfigSnapshot::from_json(json)?)
    }

    /// Current generation; increases on every successful publish.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Create a watcher that reports the current snapshot on its first poll.
    pub fn watch(&self) -> SettingsWatcher {
        SettingsWatcher {
            store: self.clone(),
            seen: 0,
        }
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(ConfigSnapshot::default())
    }
}

/// Per-consumer dirty tracking over a [`SettingsStore`].
pub struct SettingsWatcher {
    store: SettingsStore,
    seen: u64,
}

impl SettingsWatcher {
    /// Whether a snapshot newer than the last polled one exists.
    pub fn is_dirty(&self) -> bool {
        self.store.generation() != self.seen
    }

    /// Return the latest snapshot if it changed since the last call.
    pub fn poll(&mut self) -> Option<ConfigSnapshot> {
        let generation = self.store.generation();
        if generation == self.seen {
            return None;
        }
        self.seen = generation;
        Some(self.store.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let snapshot = ConfigSnapshot::default();
        assert!(snapshot.validate().is_ok());
        assert_eq!(snapshot.count(), 4000);
        assert_eq!(snapshot.fps_target.fps(), Some(60));
    }

    #[test]
    fn test_rejects_non_positive_count() {
        let snapshot = ConfigSnapshot {
            particle_count: 0,
            ..Default::default()
        };
        assert!(matches!(snapshot.validate(), Err(ConfigError::NonPositiveCount(0))));
    }

    #[test]
    fn test_rejects_oversized_count() {
        for count in [MAX_PARTICLES as i64 + 1, i64::MAX] {
            let snapshot = ConfigSnapshot {
                particle_count: count,
                ..Default::default()
            };
            assert!(matches!(
                snapshot.validate(),
                Err(ConfigError::CountTooLarge { count: c, .. }) if c == count
            ));

            let store = SettingsStore::default();
            assert!(store.publish(snapshot).is_err());
            assert_eq!(store.snapshot().particle_count, 4000);
        }
        let largest = ConfigSnapshot {
            particle_count: MAX_PARTICLES as i64,
            ..Default::default()
        };
        assert!(largest.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_speed() {
        for speed in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let snapshot = ConfigSnapshot {
                speed_multiplier: speed,
                ..Default::default()
            };
            assert!(snapshot.validate().is_err());
        }
    }

    #[test]
    fn test_json_keys() {
        let snapshot = ConfigSnapshot::from_json(
            r#"{
                "mode": "tunnel_streak",
                "theme": "custom",
                "custom_colors": [[1,2,3],[4,5,6],[7,8,9],[10,11,12],[13,14,15]],
                "particle_or_star_count": 800,
                "speed_multiplier": 1.5,
                "fps_target": "max"
            }"#,
        )
        .unwrap();
        assert_eq!(snapshot.mode, SimulationMode::TunnelStreak);
        assert_eq!(snapshot.theme, Theme::Custom);
        assert_eq!(snapshot.custom_colors[1], Rgb8(4, 5, 6));
        assert_eq!(snapshot.count(), 800);
        assert_eq!(snapshot.fps_target, FpsTarget::Max);
        assert!(snapshot.fps_target.frame_interval().is_none());
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let snapshot = ConfigSnapshot::from_json(r#"{ "speed_multiplier": 2.0 }"#).unwrap();
        assert_eq!(snapshot.theme, Theme::SciFi);
        assert_eq!(snapshot.particle_count, 4000);
    }

    #[test]
    fn test_malformed_theme_rejected() {
        assert!(matches!(
            ConfigSnapshot::from_json(r#"{ "theme": "rainbow" }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_publish_rejects_and_retains() {
        let store = SettingsStore::default();
        let before = store.generation();
        let bad = ConfigSnapshot {
            particle_count: -5,
            ..Default::default()
        };
        assert!(store.publish(bad).is_err());
        assert!(store.publish_json("{ not json").is_err());
        assert_eq!(store.generation(), before);
        assert_eq!(store.snapshot(), ConfigSnapshot::default());
    }

    #[test]
    fn test_watcher_dirty_flag() {
        let store = SettingsStore::default();
        let mut watcher = store.watch();

        assert!(watcher.is_dirty());
        assert!(watcher.poll().is_some());
        assert!(watcher.poll().is_none());

        store
            .publish(ConfigSnapshot {
                speed_multiplier: 3.0,
                ..Default::default()
            })
            .unwrap();
        assert!(watcher.is_dirty());
        let snapshot = watcher.poll().unwrap();
        assert_eq!(snapshot.speed_multiplier, 3.0);
        assert!(!watcher.is_dirty());
    }

    #[test]
    fn test_regeneration_rules() {
        let base = ConfigSnapshot::default();
        let faster = ConfigSnapshot {
            speed_multiplier: 2.0,
            ..base.clone()
        };
        assert!(!base.needs_regeneration(&faster));

        let classic = ConfigSnapshot {
            theme: Theme::Classic,
            ..base.clone()
        };
        assert!(base.needs_regeneration(&classic));

        let tunnel = ConfigSnapshot {
            mode: SimulationMode::TunnelStreak,
            ..base.clone()
        };
        assert!(base.needs_regeneration(&tunnel));
    }
}
