use blobworld_common::Mailbox;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::sample::{InputError, Orientation, SourceKind, normalize_axes};

/// Scaling applied to remapped samples before they become commands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Multiplier from sample units to world units per second.
    pub gain: f32,
    /// Upper bound on the command's length, if any.
    pub max_speed: Option<f32>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            gain: 1.0,
            max_speed: None,
        }
    }
}

/// Turns raw samples delivered on arbitrary threads into the latest
/// avatar velocity command.
///
/// Shared by reference (`Arc<InputAggregator>`) between the producing
/// threads and the simulation thread.
#[derive(Debug, Default)]
pub struct InputAggregator {
    config: InputConfig,
    latest: Mailbox<Vec2>,
    accepted: AtomicU64,
}

impl InputConfig {
    /// Reject a gain that is not finite and a speed bound that is not a
    /// positive finite number.
    pub fn validate(&self) -> Result<(), InputError> {
        if !self.gain.is_finite() {
            return Err(InputError::InvalidConfig {
                reason: format!("gain must be finite, got {}", self.gain),
            });
        }
        if let Some(max) = self.max_speed {
            if !(max.is_finite() && max > 0.0) {
                return Err(InputError::InvalidConfig {
                    reason: format!("max_speed must be positive and finite, got {max}"),
                });
            }
        }
        Ok(())
    }
}

impl InputAggregator {
    /// Aggregator with unit gain and no speed bound.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: InputConfig) -> Result<Self, InputError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    /// Remap a raw reading into the simulation frame and store it as the
    /// latest command. Returns the stored command.
    ///
    /// The reading is padded or truncated to three axes; the first two are
    /// rotated by `orientation`. An unrecognized source, or a reading that
    /// does not yield a finite command, is rejected and the previous command
    /// stays in place.
    pub fn inject_sample(
        &self,
        raw: &[f32],
        source: SourceKind,
        orientation: Orientation,
    ) -> Result<Vec2, InputError> {
        match source {
            SourceKind::Gravity | SourceKind::Acceleration | SourceKind::PointerDelta => {}
            SourceKind::Unrecognized(code) => {
                tracing::warn!(code, "rejected sample from unsupported source");
                return Err(InputError::UnsupportedInputSource(code));
            }
        }

        let [x, y, _] = normalize_axes(raw);
        let mut command = orientation.remap(Vec2::new(x, y)) * self.config.gain;
        if let Some(max) = self.config.max_speed {
            command = command.clamp_length_max(max);
        }
        if !command.is_finite() {
            tracing::warn!(?source, ?raw, "rejected non-finite sample");
            return Err(InputError::NonFiniteSample);
        }

        self.latest.publish(command);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(?source, ?orientation, %command, "sample injected");
        Ok(command)
    }

    /// The most recent command, or zero if none has arrived. Reading does not
    /// consume the command.
    pub fn latest_command(&self) -> Vec2 {
        self.latest.peek_copied().unwrap_or(Vec2::ZERO)
    }

    /// The command stored since the last call, if any. Diagnostic only; the
    /// command itself is level-triggered and stays readable.
    pub fn take_new_command(&self) -> Option<Vec2> {
        self.latest.take().map(|command| *command)
    }

    /// Number of samples accepted so far.
    pub fn samples_accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }
}
