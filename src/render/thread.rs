//! The render loop: a single thread owning the GPU context.
//!
//! Producers talk to the loop through a [`RenderLoopHandle`]; every signal is a
//! field write under one `parking_lot::Mutex` followed by a condvar notify. The
//! render thread copies what it needs out of that state, releases the lock and
//! only then calls into the GPU context, the renderer or host callbacks.
//!
//! One iteration: wait while paused or idle → make current → recreate surface
//! if replaced → apply the last pending resize → run up to
//! `max_tasks_per_frame` graphics tasks → draw → present → `on_draw` → pace.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::RenderLoopConfig;
use crate::core::error::{panic_message, RenderError};
use crate::core::executor::GraphicsTaskSink;
use crate::core::graphics::run_isolated;
use crate::core::task::Task;
use crate::util::clock::frame_interval;

use super::context::{GpuContext, LoopEvent, RenderCallbacks, Renderer};
use super::latch::{LifecycleLatch, LifecyclePhase};
use super::surface::SurfaceState;

#[derive(Debug)]
struct LoopState {
    queue: VecDeque<Task>,
    dirty: bool,
    paused: bool,
    finished: bool,
    running: bool,
    pending_resize: Option<(u32, u32)>,
    surface_recreated: bool,
    target_frame_rate: Option<u32>,
    surface: SurfaceState,
    terminal_error: Option<RenderError>,
}

struct LoopShared {
    state: Mutex<LoopState>,
    wake: Condvar,
    frames: AtomicU64,
}

/// Builder for a [`RenderLoop`].
#[must_use]
pub struct RenderLoopBuilder {
    config: RenderLoopConfig,
    context: Option<Box<dyn GpuContext>>,
    renderer: Option<Box<dyn Renderer>>,
    callbacks: RenderCallbacks,
    initial_size: Option<(u32, u32)>,
}

impl RenderLoopBuilder {
    /// Start from a configuration.
    pub fn new(config: RenderLoopConfig) -> Self {
        Self {
            config,
            context: None,
            renderer: None,
            callbacks: RenderCallbacks::default(),
            initial_size: None,
        }
    }

    /// GPU context the render thread will own.
    pub fn with_context<C: GpuContext>(mut self, context: C) -> Self {
        self.context = Some(Box::new(context));
        self
    }

    /// Drawing logic.
    pub fn with_renderer<R: Renderer>(mut self, renderer: R) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Host callbacks.
    pub fn with_callbacks(mut self, callbacks: RenderCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Size applied on the first frame.
    pub fn with_initial_size(mut self, width: u32, height: u32) -> Self {
        self.initial_size = Some((width, height));
        self
    }

    /// Spawn the render thread.
    ///
    /// # Errors
    ///
    /// [`RenderError::Configuration`] if the config is invalid, no context or
    /// renderer is bound, or the thread cannot be spawned.
    pub fn spawn(self) -> Result<RenderLoop, RenderError> {
        self.config
            .validate()
            .map_err(RenderError::Configuration)?;
        let context = self
            .context
            .ok_or_else(|| RenderError::Configuration("no GPU context bound".into()))?;
        let renderer = self
            .renderer
            .ok_or_else(|| RenderError::Configuration("no renderer bound".into()))?;

        let shared = Arc::new(LoopShared {
            state: Mutex::new(LoopState {
                queue: VecDeque::new(),
                dirty: false,
                paused: self.config.start_paused,
                finished: false,
                running: true,
                pending_resize: self.initial_size,
                surface_recreated: false,
                target_frame_rate: self.config.target_frame_rate,
                surface: SurfaceState::Uninitialized,
                terminal_error: None,
            }),
            wake: Condvar::new(),
            frames: AtomicU64::new(0),
        });

        let name = self.config.thread_name.clone();
        let render_thread = RenderThread {
            shared: Arc::clone(&shared),
            config: self.config,
            context,
            renderer,
            callbacks: self.callbacks,
            latch: LifecycleLatch::new(),
        };
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _exit = ExitGuard(Arc::clone(&render_thread.shared));
                render_thread.run()
            })
            .map_err(|e| RenderError::Configuration(format!("failed to spawn {name}: {e}")))?;

        Ok(RenderLoop {
            handle: RenderLoopHandle { shared },
            thread: Some(thread),
        })
    }
}

/// Owner of the render thread.
///
/// Dropping it calls [`finish`](Self::finish) without joining.
pub struct RenderLoop {
    handle: RenderLoopHandle,
    thread: Option<JoinHandle<Result<(), RenderError>>>,
}

impl RenderLoop {
    /// A cloneable handle for producers and the host.
    #[must_use]
    pub fn handle(&self) -> RenderLoopHandle {
        self.handle.clone()
    }

    /// Ask the loop to tear down.
    pub fn finish(&self) {
        self.handle.finish();
    }

    /// Wait for the render thread to exit and return its terminal error.
    ///
    /// Blocks until [`finish`](Self::finish) is called or the loop fails.
    ///
    /// # Errors
    ///
    /// The error that ended the loop, or [`RenderError::ThreadPanicked`].
    pub fn join(mut self) -> Result<(), RenderError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        if thread.thread().id() == thread::current().id() {
            warn!("render loop joined from its own thread; detaching");
            return Ok(());
        }
        match thread.join() {
            Ok(result) => result,
            Err(payload) => Err(RenderError::ThreadPanicked(panic_message(payload.as_ref()))),
        }
    }
}

impl fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderLoop")
            .field("handle", &self.handle)
            .field("joined", &self.thread.is_none())
            .finish()
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        if self.thread.take().is_some() {
            self.handle.finish();
            debug!("render loop dropped without join; thread detached");
        }
    }
}

/// Cloneable, thread-safe handle to a render loop.
#[derive(Clone)]
pub struct RenderLoopHandle {
    shared: Arc<LoopShared>,
}

impl RenderLoopHandle {
    fn signal(&self, update: impl FnOnce(&mut LoopState)) {
        update(&mut self.shared.state.lock());
        self.shared.wake.notify_all();
    }

    /// Request a frame even if no task is queued.
    pub fn request_render(&self) {
        self.signal(|s| s.dirty = true);
    }

    /// Queue a task on the render thread and request a frame.
    ///
    /// If the loop is no longer running the task is dropped; with
    /// `clear_if_not_running` the queue is emptied as well.
    pub fn queue_event(&self, task: Task, clear_if_not_running: bool) {
        let mut state = self.shared.state.lock();
        if !state.running {
            let stale = if clear_if_not_running {
                std::mem::take(&mut state.queue)
            } else {
                VecDeque::new()
            };
            drop(state);
            debug!(
                task_id = %task.id(),
                cleared = stale.len(),
                "render loop not running; dropping graphics task"
            );
            return;
        }
        state.queue.push_back(task);
        state.dirty = true;
        drop(state);
        self.shared.wake.notify_all();
    }

    /// Record a new surface size. Applied once, at the top of the next frame,
    /// using the last size supplied.
    pub fn on_window_resize(&self, width: u32, height: u32) {
        self.signal(|s| {
            s.pending_resize = Some((width, height));
            s.dirty = true;
        });
    }

    /// The host replaced the native surface; rebuild it on the next frame.
    pub fn on_surface_created(&self) {
        self.signal(|s| {
            s.surface_recreated = true;
            s.dirty = true;
        });
    }

    /// Stop rendering. The pause callback fires once the loop observes it.
    pub fn do_pause(&self) {
        self.signal(|s| s.paused = true);
    }

    /// Resume rendering and draw a frame.
    pub fn do_resume(&self) {
        self.signal(|s| {
            s.paused = false;
            s.dirty = true;
        });
    }

    /// Terminate the loop permanently.
    pub fn finish(&self) {
        self.signal(|s| s.finished = true);
    }

    /// Cap the frame rate; `None` renders as fast as work arrives.
    pub fn set_target_frame_rate(&self, fps: Option<u32>) {
        self.shared.state.lock().target_frame_rate = fps;
    }

    /// Current surface state.
    #[must_use]
    pub fn surface_state(&self) -> SurfaceState {
        self.shared.state.lock().surface
    }

    /// Whether the render thread is still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Whether the loop has been asked to pause.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.state.lock().paused
    }

    /// Error that ended the loop, if any.
    #[must_use]
    pub fn terminal_error(&self) -> Option<RenderError> {
        self.shared.state.lock().terminal_error.clone()
    }

    /// Frames presented so far.
    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }

    /// Graphics tasks waiting for a frame.
    #[must_use]
    pub fn queued_tasks(&self) -> usize {
        self.shared.state.lock().queue.len()
    }
}

impl GraphicsTaskSink for RenderLoopHandle {
    fn schedule_graphics(&self, task: Task) {
        self.queue_event(task, false);
    }
}

impl fmt::Debug for RenderLoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("RenderLoopHandle")
            .field("surface", &state.surface)
            .field("running", &state.running)
            .field("paused", &state.paused)
            .field("queued", &state.queue.len())
            .finish_non_exhaustive()
    }
}

/// Marks the loop dead if the render thread unwinds.
struct ExitGuard(Arc<LoopShared>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }
        let mut state = self.0.state.lock();
        state.running = false;
        state.finished = true;
        state.surface = SurfaceState::Destroyed;
        state
            .terminal_error
            .get_or_insert_with(|| RenderError::ThreadPanicked("render thread panicked".into()));
        drop(state);
        self.0.wake.notify_all();
    }
}

struct FrameWork {
    tasks: Vec<Task>,
    resize: Option<(u32, u32)>,
    recreate_surface: bool,
    frame_interval: Option<Duration>,
}

struct RenderThread {
    shared: Arc<LoopShared>,
    config: RenderLoopConfig,
    context: Box<dyn GpuContext>,
    renderer: Box<dyn Renderer>,
    callbacks: RenderCallbacks,
    latch: LifecycleLatch,
}

impl RenderThread {
    fn run(mut self) -> Result<(), RenderError> {
        info!(thread = %self.config.thread_name, "render loop started");
        let result = self.initialize().and_then(|()| self.frame_loop());
        if let Err(e) = &result {
            error!(error = %e, "render loop terminated");
        }
        self.teardown(result.as_ref().err().cloned());
        result
    }

    fn initialize(&mut self) -> Result<(), RenderError> {
        self.context.initialize().map_err(RenderError::Context)?;
        self.set_surface(SurfaceState::Created)?;
        // The surface was just built; an earlier replacement notice is moot.
        self.shared.state.lock().surface_recreated = false;
        self.renderer.on_surface_created();
        Ok(())
    }

    fn frame_loop(&mut self) -> Result<(), RenderError> {
        while let Some(work) = self.next_frame() {
            self.render_frame(work)?;
        }
        Ok(())
    }

    /// Block until there is a frame to render or the loop is finished.
    fn next_frame(&mut self) -> Option<FrameWork> {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.state.lock();
        loop {
            if state.finished {
                return None;
            }
            if state.paused {
                if self.latch.observe(LifecyclePhase::Paused) {
                    debug!("render loop paused");
                    MutexGuard::unlocked(&mut state, || self.callbacks.fire(LoopEvent::Pause));
                } else {
                    shared.wake.wait_for(&mut state, self.config.idle_wait());
                }
                continue;
            }
            if self.latch.observe(LifecyclePhase::Resumed) {
                debug!("render loop resumed");
                MutexGuard::unlocked(&mut state, || self.callbacks.fire(LoopEvent::Resume));
                continue;
            }
            if state.queue.is_empty() && !state.dirty {
                shared.wake.wait_for(&mut state, self.config.idle_wait());
                continue;
            }

            state.dirty = false;
            let batch = state.queue.len().min(self.config.max_tasks_per_frame);
            return Some(FrameWork {
                tasks: state.queue.drain(..batch).collect(),
                resize: state.pending_resize.take(),
                recreate_surface: std::mem::take(&mut state.surface_recreated),
                frame_interval: state.target_frame_rate.and_then(frame_interval),
            });
        }
    }

    fn render_frame(&mut self, work: FrameWork) -> Result<(), RenderError> {
        let started = Instant::now();
        debug_assert!(self.shared.state.lock().surface.can_issue_gpu_calls());

        self.context.make_current().map_err(RenderError::Context)?;
        if work.recreate_surface {
            self.context.recreate_surface().map_err(RenderError::Context)?;
            self.set_surface(SurfaceState::Created)?;
            self.renderer.on_surface_created();
        }
        if let Some((width, height)) = work.resize {
            self.context
                .resize(width, height)
                .map_err(RenderError::Context)?;
            self.set_surface(SurfaceState::Sized)?;
            self.renderer.on_surface_changed(width, height);
        }

        let task_count = work.tasks.len();
        for task in work.tasks {
            run_isolated(task);
        }

        self.renderer.on_draw_frame();
        if self.config.debug_gpu_checks {
            if let Some(diagnostic) = self.context.check_error() {
                warn!(%diagnostic, "gpu error after draw");
            }
        }
        self.context.present().map_err(RenderError::GpuSubmission)?;
        let frame = self.shared.frames.fetch_add(1, Ordering::Relaxed) + 1;
        self.callbacks.fire(LoopEvent::Draw);
        debug!(frame, tasks = task_count, "frame presented");

        if let Some(interval) = work.frame_interval {
            let elapsed = started.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        Ok(())
    }

    fn set_surface(&self, to: SurfaceState) -> Result<(), RenderError> {
        let mut state = self.shared.state.lock();
        state.surface = state.surface.transition(to)?;
        Ok(())
    }

    /// Pause callback (unless already reported) → finishing → release → Destroyed.
    fn teardown(&mut self, error: Option<RenderError>) {
        if self.latch.observe(LifecyclePhase::Paused) {
            self.callbacks.fire(LoopEvent::Pause);
        }
        self.callbacks.fire(LoopEvent::Finishing);

        let surface = self.shared.state.lock().surface;
        if surface.can_issue_gpu_calls() {
            self.context.release();
        }

        let leftover = {
            let mut state = self.shared.state.lock();
            state.surface = SurfaceState::Destroyed;
            state.running = false;
            state.finished = true;
            state.terminal_error = error;
            std::mem::take(&mut state.queue)
        };
        self.shared.wake.notify_all();
        info!(
            frames = self.shared.frames.load(Ordering::Relaxed),
            dropped_tasks = leftover.len(),
            "render loop stopped"
        );
    }
}
