//! GLFW window with an OpenGL 3.3 core context
//!
//! Loading the `glow` function table is the one `unsafe` step here: the
//! pointers come from the context made current on this thread just before.

#![allow(unsafe_code)]

use glfw::Context;

use super::Display;
use crate::config::DisplayConfig;
use crate::error::{EngineError, EngineResult};
use crate::input::Input;

/// [`Display`] backed by a GLFW window
pub struct GlfwDisplay {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl GlfwDisplay {
    /// Open a window described by `config` and load the GL function table
    ///
    /// The returned context is current on the calling thread and must stay
    /// on it.
    pub fn create(config: &DisplayConfig) -> EngineResult<(Self, glow::Context)> {
        config.validate().map_err(|e| EngineError::usage("display", "GlfwDisplay::create", e))?;

        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|e| EngineError::Window(format!("GLFW initialization failed: {e:?}")))?;

        glfw.window_hint(glfw::WindowHint::ContextVersion(3, 3));
        glfw.window_hint(glfw::WindowHint::OpenGlProfile(glfw::OpenGlProfileHint::Core));
        glfw.window_hint(glfw::WindowHint::OpenGlForwardCompat(true));
        glfw.window_hint(glfw::WindowHint::Resizable(false));

        let created = if config.fullscreen {
            glfw.with_primary_monitor(|glfw, monitor| {
                let mode = monitor.as_deref().map_or(glfw::WindowMode::Windowed, glfw::WindowMode::FullScreen);
                glfw.create_window(config.width, config.height, &config.title, mode)
            })
        } else {
            glfw.create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
        };
        let (mut window, events) =
            created.ok_or_else(|| EngineError::Window("Window creation failed".to_string()))?;

        window.make_current();
        glfw.set_swap_interval(if config.vsync { glfw::SwapInterval::Sync(1) } else { glfw::SwapInterval::None });

        window.set_key_polling(true);
        window.set_mouse_button_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        // SAFETY: the context was made current on this thread above.
        let gl = unsafe { glow::Context::from_loader_function(|name| window.get_proc_address(name) as *const _) };

        log::info!(
            target: "display",
            "Window [{}] created ({}x{}, fullscreen: {}).",
            config.title,
            config.width,
            config.height,
            config.fullscreen
        );
        Ok((Self { glfw, window, events }, gl))
    }
}

impl Display for GlfwDisplay {
    fn poll_events(&mut self, input: &mut Input) {
        if let Some((x, y)) = input.take_cursor_request() {
            self.window.set_cursor_pos(x, y);
        }
        self.glfw.poll_events();
        for (_, event) in glfw::flush_messages(&self.events) {
            if let glfw::WindowEvent::FramebufferSize(width, height) = event {
                log::debug!(target: "display", "Framebuffer resized to {}x{}.", width, height);
            }
            input.handle_event(&event);
        }
    }

    fn swap_buffers(&mut self) {
        self.window.swap_buffers();
    }

    fn should_close(&self) -> bool {
        self.window.should_close()
    }

    fn set_should_close(&mut self, close: bool) {
        self.window.set_should_close(close);
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0).unsigned_abs(), height.max(0).unsigned_abs())
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        let mode = if visible { glfw::CursorMode::Normal } else { glfw::CursorMode::Hidden };
        self.window.set_cursor_mode(mode);
    }

    fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }
}
