use blobworld_common::{Mailbox, WorldState};
use blobworld_input::InputAggregator;
use blobworld_kernel::{FieldEvent, KernelError, Simulation, WorldModel};
use crossbeam_channel::{Receiver, Sender};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Lifecycle of a simulation loop.
///
/// `Stopped` is left once, by `start`. `Running` and `Paused` alternate.
/// `Terminated` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
    Paused,
    Terminated,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Errors from driving a simulation loop.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("cannot {action} a loop that is {from}")]
    InvalidTransition { from: LoopState, action: &'static str },
    #[error("failed to spawn simulation thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("simulation stopped on a fault: {0}")]
    Fault(#[from] KernelError),
    #[error("simulation thread panicked")]
    Panicked,
}

/// Settings for the simulation thread.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sleep after each tick. `None` only yields, so the loop steps as fast
    /// as the scheduler allows; simulated time is unaffected either way.
    pub tick_pacing: Option<Duration>,
    pub thread_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_pacing: None,
            thread_name: "blobworld-sim".into(),
        }
    }
}

/// State flag plus the condition the paused thread sleeps on.
#[derive(Debug)]
struct Control {
    state: Mutex<LoopState>,
    wake: Condvar,
}

impl Control {
    fn lock(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, next: LoopState) {
        *self.lock() = next;
        self.wake.notify_all();
    }

    /// Block while paused. Returns whether the loop should run another tick.
    fn wait_for_tick(&self) -> bool {
        let mut state = self.lock();
        while *state == LoopState::Paused {
            state = self
                .wake
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *state == LoopState::Running
    }
}

/// Drives a world (a `WorldModel` unless stated otherwise) on a dedicated
/// thread.
///
/// Each tick reads the latest input command, applies it to the avatar, steps
/// the world once and publishes the resulting snapshot. The world is moved
/// onto the thread by `start` and never touched from outside again.
pub struct SimulationLoop<S: Simulation = WorldModel> {
    control: Arc<Control>,
    input: Arc<InputAggregator>,
    snapshots: Arc<Mailbox<WorldState>>,
    ticks: Arc<AtomicU64>,
    config: SessionConfig,
    world: Option<S>,
    events_tx: Option<Sender<FieldEvent>>,
    events_rx: Option<Receiver<FieldEvent>>,
    handle: Option<JoinHandle<Result<(), KernelError>>>,
}

impl<S: Simulation> SimulationLoop<S> {
    /// Wrap a world in a stopped loop. The world's current state is already
    /// in the snapshot mailbox, so a renderer can draw before the first tick.
    pub fn new(world: S, input: Arc<InputAggregator>, config: SessionConfig) -> Self {
        let snapshots = Arc::new(Mailbox::with_value(world.current_state().clone()));
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            control: Arc::new(Control {
                state: Mutex::new(LoopState::Stopped),
                wake: Condvar::new(),
            }),
            input,
            snapshots,
            ticks: Arc::new(AtomicU64::new(0)),
            config,
            world: Some(world),
            events_tx: Some(events_tx),
            events_rx: Some(events_rx),
            handle: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        *self.control.lock()
    }

    /// Shared handle to the state mailbox, for the consuming thread.
    pub fn snapshots(&self) -> Arc<Mailbox<WorldState>> {
        Arc::clone(&self.snapshots)
    }

    /// The aggregator the loop reads commands from.
    pub fn input(&self) -> &Arc<InputAggregator> {
        &self.input
    }

    /// Ticks completed since `start`.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Receiver for avatar field transitions. Available once.
    pub fn take_field_events(&mut self) -> Option<Receiver<FieldEvent>> {
        self.events_rx.take()
    }

    /// Spawn the simulation thread and begin ticking.
    pub fn start(&mut self) -> Result<(), LoopError> {
        let mut state = self.control.lock();
        let (Some(world), Some(events)) = (self.world.take(), self.events_tx.take()) else {
            return Err(LoopError::InvalidTransition {
                from: *state,
                action: "start",
            });
        };
        if *state != LoopState::Stopped {
            return Err(LoopError::InvalidTransition {
                from: *state,
                action: "start",
            });
        }

        // The thread blocks on this lock until the state below is visible.
        *state = LoopState::Running;
        let worker = Worker {
            world,
            control: Arc::clone(&self.control),
            input: Arc::clone(&self.input),
            snapshots: Arc::clone(&self.snapshots),
            ticks: Arc::clone(&self.ticks),
            events,
            pacing: self.config.tick_pacing,
        };
        let spawned = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::debug!(thread = %self.config.thread_name, "simulation loop started");
                Ok(())
            }
            Err(err) => {
                *state = LoopState::Terminated;
                tracing::error!(%err, "could not spawn simulation thread");
                Err(LoopError::Spawn(err))
            }
        }
    }

    /// Stop ticking after the current step. Pausing a paused loop does nothing.
    pub fn pause(&self) -> Result<(), LoopError> {
        self.transition("pause", |from| match from {
            LoopState::Running | LoopState::Paused => Some(LoopState::Paused),
            _ => None,
        })
    }

    /// Continue ticking. Resuming a running loop does nothing.
    pub fn resume(&self) -> Result<(), LoopError> {
        self.transition("resume", |from| match from {
            LoopState::Running | LoopState::Paused => Some(LoopState::Running),
            _ => None,
        })
    }

    /// Host-facing toggle mirroring foreground/background transitions.
    pub fn set_paused(&self, paused: bool) -> Result<(), LoopError> {
        if paused { self.pause() } else { self.resume() }
    }

    /// Stop the loop for good and wait for the thread to exit.
    ///
    /// Returns the fault that ended the loop, if one did. Calling this again
    /// afterwards returns `Ok(())`.
    pub fn terminate(&mut self) -> Result<(), LoopError> {
        self.control.set(LoopState::Terminated);
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let outcome = match handle.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(fault)) => Err(LoopError::Fault(fault)),
            Err(_) => Err(LoopError::Panicked),
        };
        tracing::debug!(ticks = self.ticks(), "simulation loop terminated");
        outcome
    }

    fn transition(
        &self,
        action: &'static str,
        next: impl FnOnce(LoopState) -> Option<LoopState>,
    ) -> Result<(), LoopError> {
        let mut state = self.control.lock();
        let from = *state;
        let to = next(from).ok_or(LoopError::InvalidTransition { from, action })?;
        if to != from {
            *state = to;
            self.control.wake.notify_all();
            tracing::debug!(%from, %to, "simulation loop state changed");
        }
        Ok(())
    }
}

impl<S: Simulation> Drop for SimulationLoop<S> {
    fn drop(&mut self) {
        if let Err(err) = self.terminate() {
            tracing::warn!(%err, "simulation loop ended with an error");
        }
    }
}

/// Everything the simulation thread owns.
struct Worker<S> {
    world: S,
    control: Arc<Control>,
    input: Arc<InputAggregator>,
    snapshots: Arc<Mailbox<WorldState>>,
    ticks: Arc<AtomicU64>,
    events: Sender<FieldEvent>,
    pacing: Option<Duration>,
}

impl<S: Simulation> Worker<S> {
    fn run(mut self) -> Result<(), KernelError> {
        let _span = tracing::info_span!("sim_loop").entered();
        while self.control.wait_for_tick() {
            self.world.set_avatar_velocity(self.input.latest_command());
            if let Err(fault) = self.world.step() {
                tracing::error!(%fault, "stopping simulation");
                self.control.set(LoopState::Terminated);
                return Err(fault);
            }
            for event in self.world.drain_events() {
                // Nobody listening is fine; the events are diagnostic.
                let _ = self.events.send(event);
            }
            self.snapshots.publish(self.world.current_state().clone());
            self.ticks.fetch_add(1, Ordering::Release);

            match self.pacing {
                Some(interval) => thread::sleep(interval),
                None => thread::yield_now(),
            }
        }
        Ok(())
    }
}
