use blobworld_common::{Mailbox, WorldState};
use std::sync::Arc;

use crate::renderer::{RenderView, Renderer};

/// Consumer side of the state mailbox.
///
/// Each call to `next_frame` takes whatever the simulation published since
/// the previous call. Frames are skipped when nothing new arrived; the last
/// drawn snapshot is kept for redraws the host asks for explicitly.
pub struct FramePump<R: Renderer> {
    snapshots: Arc<Mailbox<WorldState>>,
    renderer: R,
    view: RenderView,
    last: Option<Arc<WorldState>>,
    frames: u64,
    skipped: u64,
}

impl<R: Renderer> FramePump<R> {
    /// Pump that has drawn nothing yet.
    pub fn new(snapshots: Arc<Mailbox<WorldState>>, renderer: R, view: RenderView) -> Self {
        Self {
            snapshots,
            renderer,
            view,
            last: None,
            frames: 0,
            skipped: 0,
        }
    }

    /// Render the newest snapshot, or `None` if nothing was published since
    /// the last frame.
    pub fn next_frame(&mut self) -> Option<R::Output> {
        let Some(state) = self.snapshots.take() else {
            self.skipped += 1;
            return None;
        };
        let output = self.renderer.render(&state, &self.view);
        tracing::trace!(tick = state.tick(), "frame rendered");
        self.last = Some(state);
        self.frames += 1;
        Some(output)
    }

    /// Draw the last snapshot again, e.g. after the surface was recreated.
    pub fn redraw(&self) -> Option<R::Output> {
        self.last
            .as_ref()
            .map(|state| self.renderer.render(state, &self.view))
    }

    /// Snapshot behind the most recent frame.
    pub fn last_state(&self) -> Option<&WorldState> {
        self.last.as_deref()
    }

    pub fn view(&self) -> &RenderView {
        &self.view
    }

    /// Change framing; takes effect on the next frame or redraw.
    pub fn set_view(&mut self, view: RenderView) {
        self.view = view;
    }

    /// Frames drawn from new snapshots.
    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Calls to `next_frame` that found nothing new.
    pub fn frames_skipped(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::DebugTextRenderer;
    use blobworld_common::{StateBuilder, Vec2};

    /// Renders the tick only.
    struct TickRenderer;

    impl Renderer for TickRenderer {
        type Output = u64;

        fn render(&self, state: &WorldState, _view: &RenderView) -> u64 {
            state.tick()
        }
    }

    fn state_at(tick: u64) -> WorldState {
        StateBuilder::new()
            .tick(tick)
            .avatar(Vec2::new(tick as f32, 0.0))
            .build()
    }

    #[test]
    fn skips_when_nothing_new() {
        let mailbox = Arc::new(Mailbox::new());
        let mut pump = FramePump::new(Arc::clone(&mailbox), TickRenderer, RenderView::default());

        assert_eq!(pump.next_frame(), None);
        assert!(pump.last_state().is_none());
        assert_eq!(pump.redraw(), None);

        mailbox.publish(state_at(1));
        assert_eq!(pump.next_frame(), Some(1));
        assert_eq!(pump.next_frame(), None);
        assert_eq!(pump.frames_rendered(), 1);
        assert_eq!(pump.frames_skipped(), 2);
    }

    #[test]
    fn only_newest_snapshot_is_drawn() {
        let mailbox = Arc::new(Mailbox::new());
        let mut pump = FramePump::new(Arc::clone(&mailbox), TickRenderer, RenderView::default());

        for tick in 1..=5 {
            mailbox.publish(state_at(tick));
        }
        assert_eq!(pump.next_frame(), Some(5));
        assert_eq!(pump.last_state().map(WorldState::tick), Some(5));
    }

    #[test]
    fn redraw_repeats_last_frame() {
        let mailbox = Arc::new(Mailbox::with_value(state_at(3)));
        let mut pump = FramePump::new(mailbox, DebugTextRenderer::new(), RenderView::default());

        let first = pump.next_frame().unwrap();
        assert!(first.contains("tick=3"));
        assert_eq!(pump.next_frame(), None);
        assert_eq!(pump.redraw(), Some(first));
    }
}
