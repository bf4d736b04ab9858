//! Window-less display

use super::Display;
use crate::input::Input;

/// [`Display`] without a window that asks to close after a frame budget
///
/// Pairs with the recording GPU backend to run the frame loop headless.
#[derive(Debug, Clone)]
pub struct HeadlessDisplay {
    size: (u32, u32),
    frames_left: Option<u32>,
    swaps: u32,
    close_requested: bool,
}

impl HeadlessDisplay {
    /// Display of `width` x `height` pixels that never closes by itself
    pub fn new(width: u32, height: u32) -> Self {
        Self { size: (width, height), frames_left: None, swaps: 0, close_requested: false }
    }

    /// Request closing after `frames` buffer swaps
    pub fn with_frame_limit(mut self, frames: u32) -> Self {
        self.frames_left = Some(frames);
        self
    }

    /// Number of swaps so far
    pub fn swaps(&self) -> u32 {
        self.swaps
    }
}

impl Display for HeadlessDisplay {
    fn poll_events(&mut self, input: &mut Input) {
        input.take_cursor_request();
    }

    fn swap_buffers(&mut self) {
        self.swaps += 1;
        if let Some(frames) = self.frames_left.as_mut() {
            *frames = frames.saturating_sub(1);
            if *frames == 0 {
                self.close_requested = true;
            }
        }
    }

    fn should_close(&self) -> bool {
        self.close_requested
    }

    fn set_should_close(&mut self, close: bool) {
        self.close_requested = close;
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn set_cursor_visible(&mut self, _visible: bool) {}

    fn set_title(&mut self, _title: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_limit_requests_close() {
        let mut display = HeadlessDisplay::new(64, 64).with_frame_limit(2);
        display.swap_buffers();
        assert!(!display.should_close());
        display.swap_buffers();
        assert!(display.should_close());
        assert_eq!(display.swaps(), 2);
    }
}
