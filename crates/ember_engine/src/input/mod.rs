//! Keyboard and mouse state
//!
//! [`Input`] is fed with the window events polled each frame and answers the
//! queries made from the per-frame callback. Cursor moves requested by the
//! application are queued and applied by the display on the next poll.

use std::collections::{HashMap, HashSet};

pub use glfw::{Key, MouseButton};
use glfw::{Action, WindowEvent};

/// Key, mouse button and cursor state of one window
#[derive(Debug, Default)]
pub struct Input {
    pressed_keys: HashSet<Key>,
    reported_keys: HashMap<Key, bool>,
    pressed_buttons: HashSet<MouseButton>,
    cursor: (f64, f64),
    cursor_request: Option<(f64, f64)>,
}

impl Input {
    /// No keys held, cursor at the origin
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one window event
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Key(key, _, Action::Press | Action::Repeat, _) => {
                self.pressed_keys.insert(*key);
            }
            WindowEvent::Key(key, _, Action::Release, _) => {
                self.pressed_keys.remove(key);
            }
            WindowEvent::MouseButton(button, Action::Press | Action::Repeat, _) => {
                self.pressed_buttons.insert(*button);
            }
            WindowEvent::MouseButton(button, Action::Release, _) => {
                self.pressed_buttons.remove(button);
            }
            WindowEvent::CursorPos(x, y) => self.cursor = (*x, *y),
            _ => {}
        }
    }

    /// Whether `key` is held
    ///
    /// With `repeat` set this is true on every query while the key is down.
    /// Without it a press is reported once and the key must be released
    /// before it is reported again.
    pub fn is_key_pressed(&mut self, key: Key, repeat: bool) -> bool {
        let held = self.pressed_keys.contains(&key);
        if repeat {
            return held;
        }
        let reported = self.reported_keys.entry(key).or_insert(false);
        if held && !*reported {
            *reported = true;
            true
        } else {
            if !held {
                *reported = false;
            }
            false
        }
    }

    /// Whether a mouse button is held
    pub fn is_mouse_button_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    /// Cursor position in window pixels
    pub fn cursor_position(&self) -> (f64, f64) {
        self.cursor
    }

    /// Warp the cursor; takes effect on the next event poll
    pub fn set_cursor_position(&mut self, x: f64, y: f64) {
        self.cursor = (x, y);
        self.cursor_request = Some((x, y));
    }

    /// Pending cursor warp, consumed by the display
    pub fn take_cursor_request(&mut self) -> Option<(f64, f64)> {
        self.cursor_request.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glfw::{Modifiers, Scancode};

    fn key_event(key: Key, action: Action) -> WindowEvent {
        WindowEvent::Key(key, 0 as Scancode, action, Modifiers::empty())
    }

    #[test]
    fn test_sticky_press_is_reported_once() {
        let mut input = Input::new();
        input.handle_event(&key_event(Key::W, Action::Press));
        assert!(input.is_key_pressed(Key::W, false));
        assert!(!input.is_key_pressed(Key::W, false));
        assert!(input.is_key_pressed(Key::W, true));

        input.handle_event(&key_event(Key::W, Action::Release));
        assert!(!input.is_key_pressed(Key::W, false));
        input.handle_event(&key_event(Key::W, Action::Press));
        assert!(input.is_key_pressed(Key::W, false));
    }

    #[test]
    fn test_mouse_buttons_and_cursor() {
        let mut input = Input::new();
        input.handle_event(&WindowEvent::MouseButton(MouseButton::Button1, Action::Press, Modifiers::empty()));
        input.handle_event(&WindowEvent::CursorPos(12.0, 34.0));
        assert!(input.is_mouse_button_pressed(MouseButton::Button1));
        assert_eq!(input.cursor_position(), (12.0, 34.0));

        input.set_cursor_position(640.0, 360.0);
        assert_eq!(input.take_cursor_request(), Some((640.0, 360.0)));
        assert_eq!(input.take_cursor_request(), None);
        assert_eq!(input.cursor_position(), (640.0, 360.0));
    }
}
