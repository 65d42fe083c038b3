//! Host-supplied GPU context, renderer and loop callbacks.

use std::fmt;

use crate::core::error::GpuError;

/// The GPU context owned by the render thread.
///
/// Every method is called on the render thread only, and only while the
/// surface is `Created` or `Sized` (except [`initialize`](Self::initialize),
/// which creates it).
pub trait GpuContext: Send + 'static {
    /// Create the context and its surface.
    ///
    /// # Errors
    ///
    /// Fatal to the render loop.
    fn initialize(&mut self) -> Result<(), GpuError>;

    /// Bind the context to the render thread before a frame.
    ///
    /// # Errors
    ///
    /// Fatal to the render loop.
    fn make_current(&mut self) -> Result<(), GpuError>;

    /// Rebuild the surface after the host replaced the native window.
    ///
    /// # Errors
    ///
    /// Fatal to the render loop.
    fn recreate_surface(&mut self) -> Result<(), GpuError>;

    /// Apply a new surface size.
    ///
    /// # Errors
    ///
    /// Fatal to the render loop.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), GpuError>;

    /// Present the frame (swap buffers).
    ///
    /// # Errors
    ///
    /// Fatal to the render loop.
    fn present(&mut self) -> Result<(), GpuError>;

    /// Pending GPU diagnostic, if any. Queried after each draw in debug mode.
    fn check_error(&mut self) -> Option<String> {
        None
    }

    /// Release every GPU resource.
    fn release(&mut self);
}

/// Drawing logic run on the render thread.
pub trait Renderer: Send + 'static {
    /// The surface was created or recreated.
    fn on_surface_created(&mut self);

    /// The surface has a new size.
    fn on_surface_changed(&mut self, width: u32, height: u32);

    /// Draw one frame. Queued graphics tasks have already run.
    fn on_draw_frame(&mut self);
}

type Callback = Box<dyn FnMut() + Send + 'static>;

/// Loop event a [`RenderCallbacks`] entry reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopEvent {
    /// A frame was presented.
    Draw,
    /// The loop observed a resume edge.
    Resume,
    /// The loop observed a pause edge.
    Pause,
    /// The loop is about to release the GPU context for good.
    Finishing,
}

/// Optional host callbacks, all run on the render thread.
#[derive(Default)]
pub struct RenderCallbacks {
    on_draw: Option<Callback>,
    on_resume: Option<Callback>,
    on_pause: Option<Callback>,
    on_finishing: Option<Callback>,
}

impl RenderCallbacks {
    /// No callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run after every presented frame.
    #[must_use]
    pub fn on_draw(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_draw = Some(Box::new(f));
        self
    }

    /// Run once per observed resume edge.
    #[must_use]
    pub fn on_resume(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_resume = Some(Box::new(f));
        self
    }

    /// Run once per observed pause edge, and at teardown if not already paused.
    #[must_use]
    pub fn on_pause(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_pause = Some(Box::new(f));
        self
    }

    /// Run once at teardown, before the GPU context is released.
    #[must_use]
    pub fn on_finishing(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_finishing = Some(Box::new(f));
        self
    }

    pub(crate) fn fire(&mut self, event: LoopEvent) {
        let callback = match event {
            LoopEvent::Draw => &mut self.on_draw,
            LoopEvent::Resume => &mut self.on_resume,
            LoopEvent::Pause => &mut self.on_pause,
            LoopEvent::Finishing => &mut self.on_finishing,
        };
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl fmt::Debug for RenderCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCallbacks")
            .field("on_draw", &self.on_draw.is_some())
            .field("on_resume", &self.on_resume.is_some())
            .field("on_pause", &self.on_pause.is_some())
            .field("on_finishing", &self.on_finishing.is_some())
            .finish()
    }
}
