//! Window-system collaborator (§6.5).
//!
//! The engine only ever crosses this boundary for the operations listed
//! here; how a real implementation pumps X11/Wayland/Win32 events is out of
//! scope. [`WindowCollaborator`] plays the same role `Storage` plays for
//! `lockframe-server`: a trait object the engine is handed at construction,
//! swappable between a production backend and a deterministic test double.

/// One pumped window-system event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// The window became mapped (visible).
    Mapped,
    /// The window became unmapped (hidden/minimized).
    Unmapped,
    /// The window server confirmed a resize, with the new drawable size.
    Configured {
        /// New width in pixels.
        width: u32,
        /// New height in pixels.
        height: u32,
    },
    /// A key was pressed, carrying a platform-defined keycode (interactive
    /// stepping only; the engine does not interpret specific codes).
    Key(u32),
    /// The window was asked to close.
    Close,
}

/// The window-system operations the replay engine needs (§6.5). A real
/// implementation wraps a native window toolkit; `gltrace-harness` provides
/// a deterministic in-memory double for tests.
pub trait WindowCollaborator {
    /// Create the replay window at `(width, height)` with `msaa` samples.
    fn create_window(&mut self, width: u32, height: u32, msaa: u32) -> Result<(), String>;

    /// Opaque native handle for the created window, for a GL driver to bind
    /// a context against.
    fn native_handle(&self) -> u64;

    /// Set the window title (typically the trace file name).
    fn set_title(&mut self, title: &str);

    /// Drain and return every window-system event pending since the last
    /// call, in the order the window system delivered them.
    fn pump_events(&mut self) -> Vec<WindowEvent>;

    /// Ask the window system to resize the window; the engine then waits
    /// for the confirming [`WindowEvent::Configured`] before resuming
    /// (§4.H.4).
    fn request_resize(&mut self, width: u32, height: u32) -> Result<(), String>;

    /// Destroy the window and release any native resources.
    fn destroy(&mut self);
}
