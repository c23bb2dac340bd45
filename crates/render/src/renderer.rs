use blobworld_common::WorldState;
use glam::Vec2;

/// Viewport framing for a side-scrolling level.
///
/// The viewport has the world's full height and follows the avatar
/// horizontally, stopping at the level's left and right edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    pub viewport: Vec2,
    pub world_width: f32,
}

impl RenderView {
    /// Viewport of `viewport` world units over a level `world_width` wide.
    pub fn new(viewport: Vec2, world_width: f32) -> Self {
        Self {
            viewport,
            world_width,
        }
    }

    /// Horizontal camera center for an avatar at `avatar_x`.
    pub fn camera_x(&self, avatar_x: f32) -> f32 {
        let half = self.viewport.x / 2.0;
        if self.world_width <= self.viewport.x {
            return self.world_width / 2.0;
        }
        avatar_x.clamp(half, self.world_width - half)
    }

    /// Visible horizontal range `[left, right)` for an avatar at `avatar_x`.
    pub fn visible_range(&self, avatar_x: f32) -> (f32, f32) {
        let center = self.camera_x(avatar_x);
        let half = self.viewport.x / 2.0;
        (center - half, center + half)
    }
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            viewport: Vec2::new(480.0, 360.0),
            world_width: 960.0,
        }
    }
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// The renderer reads a snapshot and a view configuration, then produces
/// output. Snapshots are immutable, so there is nothing to write back.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame from the given snapshot and view.
    fn render(&self, state: &WorldState, view: &RenderView) -> Self::Output;
}

/// Text renderer for terminals, logs and tests.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, state: &WorldState, view: &RenderView) -> String {
        let avatar = state.avatar();
        let (left, right) = view.visible_range(avatar.x);
        let mut out = String::new();
        out.push_str(&format!(
            "=== tick={} hash={:#018x} ===\n",
            state.tick(),
            state.state_hash()
        ));
        out.push_str(&format!(
            "camera: x={:.1} visible=[{left:.1}, {right:.1})\n",
            view.camera_x(avatar.x)
        ));
        out.push_str(&format!("avatar: ({:.2}, {:.2})\n", avatar.x, avatar.y));

        out.push_str(&format!("hazards: {}\n", state.hazards().len()));
        for (i, p) in state.hazards().iter().enumerate() {
            out.push_str(&format!("  [{i}] ({:.2}, {:.2})\n", p.x, p.y));
        }
        out.push_str(&format!("walls: {}\n", state.walls().len()));
        for (i, wall) in state.walls().iter().enumerate() {
            out.push_str(&format!(
                "  [{i}] center=({:.1}, {:.1}) half=({:.1}, {:.1})\n",
                wall.center.x, wall.center.y, wall.half_extents.x, wall.half_extents.y
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobworld_common::StateBuilder;

    #[test]
    fn camera_follows_then_stops_at_edges() {
        let view = RenderView::new(Vec2::new(480.0, 360.0), 960.0);
        assert_eq!(view.camera_x(500.0), 500.0);
        assert_eq!(view.camera_x(10.0), 240.0);
        assert_eq!(view.camera_x(950.0), 720.0);
        assert_eq!(view.visible_range(10.0), (0.0, 480.0));
    }

    #[test]
    fn narrow_level_is_centered() {
        let view = RenderView::new(Vec2::new(480.0, 360.0), 300.0);
        assert_eq!(view.camera_x(0.0), 150.0);
        assert_eq!(view.camera_x(290.0), 150.0);
    }

    #[test]
    fn debug_renderer_empty_level() {
        let state = StateBuilder::new().build();
        let output = DebugTextRenderer::new().render(&state, &RenderView::default());

        assert!(output.contains("tick=0"));
        assert!(output.contains("hazards: 0"));
        assert!(output.contains("walls: 0"));
    }

    #[test]
    fn debug_renderer_lists_bodies() {
        let state = StateBuilder::new()
            .tick(12)
            .avatar(Vec2::new(1.0, 2.0))
            .hazard(Vec2::new(30.0, 40.0))
            .hazard(Vec2::new(50.0, 60.0))
            .wall(Vec2::new(480.0, 5.0), Vec2::new(480.0, 5.0))
            .build();
        let output = DebugTextRenderer::new().render(&state, &RenderView::default());

        assert!(output.contains("tick=12"));
        assert!(output.contains("avatar: (1.00, 2.00)"));
        assert!(output.contains("hazards: 2"));
        assert!(output.contains("[1] (50.00, 60.00)"));
        assert!(output.contains("half=(480.0, 5.0)"));
    }
}
