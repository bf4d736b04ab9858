//! Window system collaborator
//!
//! The master renderer only needs a narrow surface from the window: event
//! polling into [`Input`], buffer swap, the close request and the drawable
//! size. [`GlfwDisplay`] provides it on top of a GLFW window with an
//! OpenGL 3.3 core context; [`HeadlessDisplay`] provides it without any
//! window for tests and offline tools.

mod glfw_display;
mod headless;

pub use glfw_display::GlfwDisplay;
pub use headless::HeadlessDisplay;

use crate::input::Input;

/// Window operations used by the frame loop
pub trait Display {
    /// Process pending window events, feeding them into `input`
    ///
    /// A cursor move queued on `input` is applied first.
    fn poll_events(&mut self, input: &mut Input);

    /// Present the default framebuffer
    fn swap_buffers(&mut self);

    /// Whether the window asked to be closed
    fn should_close(&self) -> bool;

    /// Request (or cancel a request) to close the window
    fn set_should_close(&mut self, close: bool);

    /// Drawable size in pixels
    fn framebuffer_size(&self) -> (u32, u32);

    /// Show or hide the cursor over the window
    fn set_cursor_visible(&mut self, visible: bool);

    /// Replace the window caption
    fn set_title(&mut self, title: &str);
}
