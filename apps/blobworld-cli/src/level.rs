use anyhow::Context;
use blobworld_common::{StateBuilder, Vec2, WorldState};
use blobworld_kernel::WorldConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A wall as written in a level file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WallSpec {
    Box { center: Vec2, half_extents: Vec2 },
    Corners { corners: [Vec2; 4] },
}

/// On-disk level description. Positions are world units, y up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelFile {
    pub width: f32,
    pub avatar: Vec2,
    #[serde(default)]
    pub walls: Vec<WallSpec>,
    #[serde(default)]
    pub hazards: Vec<Vec2>,
    #[serde(default)]
    pub config: WorldConfig,
}

impl LevelFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading level {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing level {}", path.display()))
    }

    pub fn load_or_demo(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::demo()),
        }
    }

    /// Built-in level: a walled room with one floating platform and two hazards.
    pub fn demo() -> Self {
        let b = |cx, cy, hx, hy| WallSpec::Box {
            center: Vec2::new(cx, cy),
            half_extents: Vec2::new(hx, hy),
        };
        Self {
            width: 960.0,
            avatar: Vec2::new(100.0, 180.0),
            walls: vec![
                b(480.0, 5.0, 480.0, 5.0),
                b(480.0, 355.0, 480.0, 5.0),
                b(5.0, 180.0, 5.0, 180.0),
                b(955.0, 180.0, 5.0, 180.0),
                WallSpec::Corners {
                    corners: [
                        Vec2::new(300.0, 120.0),
                        Vec2::new(420.0, 120.0),
                        Vec2::new(420.0, 140.0),
                        Vec2::new(300.0, 140.0),
                    ],
                },
            ],
            hazards: vec![Vec2::new(600.0, 250.0), Vec2::new(750.0, 100.0)],
            config: WorldConfig::default(),
        }
    }

    pub fn initial_state(&self) -> anyhow::Result<WorldState> {
        let mut builder = StateBuilder::new().avatar(self.avatar);
        for (i, wall) in self.walls.iter().enumerate() {
            builder = match *wall {
                WallSpec::Box {
                    center,
                    half_extents,
                } => builder.wall(center, half_extents),
                WallSpec::Corners { corners } => builder
                    .wall_from_corners(corners)
                    .with_context(|| format!("wall {i}"))?,
            };
        }
        for &hazard in &self.hazards {
            builder = builder.hazard(hazard);
        }
        Ok(builder.build())
    }
}
