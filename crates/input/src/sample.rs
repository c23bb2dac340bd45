use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Errors from interpreting a raw input sample.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("unsupported input source code {0}")]
    UnsupportedInputSource(u32),
    #[error("unknown input source name {0:?}")]
    UnknownSourceName(String),
    #[error("unsupported orientation {0}")]
    UnsupportedOrientation(u32),
    #[error("sample does not produce a finite command")]
    NonFiniteSample,
    #[error("invalid input config: {reason}")]
    InvalidConfig { reason: String },
}

/// Where a raw sample came from.
///
/// Hosts report sources as numeric sensor codes; codes without a mapping
/// are kept as `Unrecognized` so the rejection happens where the sample is
/// injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Gravity vector from an orientation sensor.
    Gravity,
    /// Raw accelerometer reading.
    Acceleration,
    /// Pointer or touch drag delta.
    PointerDelta,
    Unrecognized(u32),
}

impl SourceKind {
    pub const GRAVITY_CODE: u32 = 0;
    pub const ACCELERATION_CODE: u32 = 1;
    pub const POINTER_CODE: u32 = 2;
}

impl From<u32> for SourceKind {
    fn from(code: u32) -> Self {
        match code {
            Self::GRAVITY_CODE => Self::Gravity,
            Self::ACCELERATION_CODE => Self::Acceleration,
            Self::POINTER_CODE => Self::PointerDelta,
            other => Self::Unrecognized(other),
        }
    }
}

impl FromStr for SourceKind {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gravity" => Ok(Self::Gravity),
            "acceleration" | "accelerometer" => Ok(Self::Acceleration),
            "pointer" | "touch" => Ok(Self::PointerDelta),
            other => Err(InputError::UnknownSourceName(other.to_string())),
        }
    }
}

/// Display rotation relative to the device's natural orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Orientation {
    /// Map a host rotation index (0-3, quarter turns) to an orientation.
    pub fn from_rotation_index(index: u32) -> Result<Self, InputError> {
        match index {
            0 => Ok(Self::Deg0),
            1 => Ok(Self::Deg90),
            2 => Ok(Self::Deg180),
            3 => Ok(Self::Deg270),
            other => Err(InputError::UnsupportedOrientation(other)),
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Rotate a device-frame vector into the simulation frame.
    pub fn remap(self, v: Vec2) -> Vec2 {
        match self {
            Self::Deg0 => v,
            Self::Deg90 => Vec2::new(-v.y, v.x),
            Self::Deg180 => Vec2::new(-v.x, -v.y),
            Self::Deg270 => Vec2::new(v.y, -v.x),
        }
    }
}

impl TryFrom<u32> for Orientation {
    type Error = InputError;

    /// Accepts exact degrees: 0, 90, 180 or 270.
    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => Err(InputError::UnsupportedOrientation(other)),
        }
    }
}

/// Number of axes a raw sample is padded or truncated to.
pub const SAMPLE_ARITY: usize = 3;

/// Zero-pad or truncate a raw reading to `SAMPLE_ARITY` axes.
pub fn normalize_axes(raw: &[f32]) -> [f32; SAMPLE_ARITY] {
    let mut axes = [0.0; SAMPLE_ARITY];
    for (dst, src) in axes.iter_mut().zip(raw) {
        *dst = *src;
    }
    axes
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn quarter_turn_rule() {
        let x = Vec2::new(1.0, 0.0);
        assert_eq!(Orientation::Deg0.remap(x), Vec2::new(1.0, 0.0));
        assert_eq!(Orientation::Deg90.remap(x), Vec2::new(0.0, 1.0));
        assert_eq!(Orientation::Deg180.remap(x), Vec2::new(-1.0, 0.0));
        assert_eq!(Orientation::Deg270.remap(x), Vec2::new(0.0, -1.0));
    }

    #[test]
    fn orientation_from_degrees() {
        assert_eq!(Orientation::try_from(90), Ok(Orientation::Deg90));
        assert_eq!(
            Orientation::try_from(45),
            Err(InputError::UnsupportedOrientation(45))
        );
        assert_eq!(Orientation::from_rotation_index(3), Ok(Orientation::Deg270));
        assert!(Orientation::from_rotation_index(4).is_err());
        assert_eq!(Orientation::Deg180.degrees(), 180);
    }

    #[test]
    fn source_codes_and_names() {
        assert_eq!(SourceKind::from(0), SourceKind::Gravity);
        assert_eq!(SourceKind::from(2), SourceKind::PointerDelta);
        assert_eq!(SourceKind::from(17), SourceKind::Unrecognized(17));
        assert_eq!("touch".parse::<SourceKind>(), Ok(SourceKind::PointerDelta));
        assert!("gyroscope".parse::<SourceKind>().is_err());
    }

    #[test]
    fn axes_are_padded_and_truncated() {
        assert_eq!(normalize_axes(&[]), [0.0, 0.0, 0.0]);
        assert_eq!(normalize_axes(&[1.0]), [1.0, 0.0, 0.0]);
        assert_eq!(normalize_axes(&[1.0, 2.0, 3.0, 4.0]), [1.0, 2.0, 3.0]);
    }

    fn any_orientation() -> impl Strategy<Value = Orientation> {
        prop_oneof![
            Just(Orientation::Deg0),
            Just(Orientation::Deg90),
            Just(Orientation::Deg180),
            Just(Orientation::Deg270),
        ]
    }

    proptest! {
        #[test]
        fn remap_preserves_length(x in -100.0f32..100.0, y in -100.0f32..100.0, o in any_orientation()) {
            let v = Vec2::new(x, y);
            prop_assert_eq!(o.remap(v).length_squared(), v.length_squared());
        }

        #[test]
        fn four_quarter_turns_are_identity(x in -100.0f32..100.0, y in -100.0f32..100.0) {
            let v = Vec2::new(x, y);
            let turned = (0..4).fold(v, |acc, _| Orientation::Deg90.remap(acc));
            prop_assert_eq!(turned, v);
        }
    }
}
