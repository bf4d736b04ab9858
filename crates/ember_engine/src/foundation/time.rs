//! Time management utilities
//!
//! [`FpsCounter`] measures the frame delta and frame rate of the render loop.
//! [`PeriodicTimer`] runs a callback on its own thread; it never touches GPU
//! state, which is only current on the render thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{EngineError, EngineResult};

/// Frame delta and frame-rate measurement
#[derive(Debug, Clone)]
pub struct FpsCounter {
    frame_start: Instant,
    window_start: Instant,
    delta: f64,
    frames_in_window: u32,
    frame_rate: u32,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    /// Length of the window frames are counted over
    pub const WINDOW: Duration = Duration::from_secs(1);

    /// Create a counter; the frame rate reads 99 until the first window closes
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            frame_start: now,
            window_start: now,
            delta: 0.0,
            frames_in_window: 0,
            frame_rate: 99,
        }
    }

    /// Mark the start of a frame
    pub fn start_delta(&mut self) {
        self.frame_start = Instant::now();
    }

    /// Mark the end of a frame and store the elapsed seconds
    pub fn end_delta(&mut self) {
        self.delta = self.frame_start.elapsed().as_secs_f64();
    }

    /// Seconds taken by the last measured frame
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Count one rendered frame
    pub fn update(&mut self) {
        self.tick(Instant::now());
    }

    /// Frames counted in the last complete window
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn tick(&mut self, now: Instant) {
        self.frames_in_window += 1;
        if now.duration_since(self.window_start) >= Self::WINDOW {
            self.frame_rate = self.frames_in_window;
            self.frames_in_window = 0;
            self.window_start = now;
        }
    }
}

/// Invokes a callback periodically on a dedicated thread
#[derive(Debug, Default)]
pub struct PeriodicTimer {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTimer {
    /// Create a stopped timer
    pub fn new() -> Self {
        Self::default()
    }

    /// Start calling `callback` every `interval_ms` milliseconds
    ///
    /// # Arguments
    /// * `interval_ms` - Period in milliseconds (must be > 0)
    /// * `callback` - Invoked on the timer thread
    ///
    /// Starting a timer that is already running logs a warning and keeps the
    /// current callback.
    pub fn start<F>(&mut self, interval_ms: u64, mut callback: F) -> EngineResult<()>
    where
        F: FnMut() + Send + 'static,
    {
        if interval_ms == 0 {
            return Err(EngineError::usage(
                "timer",
                "PeriodicTimer::start",
                "Timer interval value out of range: {0 < VALUE}.",
            ));
        }
        if self.is_running() {
            log::warn!(target: "timer", "Timer is already running.");
            return Ok(());
        }

        let interval = Duration::from_millis(interval_ms);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        self.handle = Some(thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let deadline = Instant::now() + interval;
                let mut now = Instant::now();
                while now < deadline && running.load(Ordering::SeqCst) {
                    thread::park_timeout(deadline - now);
                    now = Instant::now();
                }
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                callback();
            }
        }));
        log::debug!(target: "timer", "Timer started with interval {} ms.", interval_ms);
        Ok(())
    }

    /// Stop the timer and wait for its thread to finish
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                log::error!(target: "timer", "Timer callback panicked.");
            }
        }
    }

    /// Whether the timer thread is active
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_fps_counter_initial_rate() {
        let counter = FpsCounter::new();
        assert_eq!(counter.frame_rate(), 99);
        assert_eq!(counter.delta(), 0.0);
    }

    #[test]
    fn test_fps_counter_counts_frames_per_window() {
        let mut counter = FpsCounter::new();
        let start = counter.window_start;
        for i in 1..=30 {
            counter.tick(start + Duration::from_millis(i * 10));
        }
        assert_eq!(counter.frame_rate(), 99, "Window not yet closed");
        counter.tick(start + Duration::from_millis(1000));
        assert_eq!(counter.frame_rate(), 31);
    }

    #[test]
    fn test_fps_counter_delta() {
        let mut counter = FpsCounter::new();
        counter.start_delta();
        thread::sleep(Duration::from_millis(5));
        counter.end_delta();
        assert!(counter.delta() >= 0.005);
    }

    #[test]
    fn test_timer_rejects_zero_interval() {
        let mut timer = PeriodicTimer::new();
        assert!(timer.start(0, || {}).is_err());
        assert!(!timer.is_running());
    }

    #[test]
    fn test_timer_invokes_callback_until_stopped() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let mut timer = PeriodicTimer::new();
        timer.start(5, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }).unwrap();
        assert!(timer.is_running());

        thread::sleep(Duration::from_millis(60));
        timer.stop();
        let after_stop = hits.load(Ordering::SeqCst);
        assert!(after_stop >= 1, "Callback never ran");

        thread::sleep(Duration::from_millis(30));
        assert_eq!(hits.load(Ordering::SeqCst), after_stop, "Callback ran after stop");
        assert!(!timer.is_running());
    }
}
