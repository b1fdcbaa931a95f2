use std::thread;
use std::time::Duration;

/// Blocks the calling thread. Injected so tests can record waits instead of
/// actually sleeping.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Real sleeper backed by `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Sleep for `secs` seconds. Negative or NaN values sleep for nothing.
pub fn sleep_secs(sleeper: &mut dyn Sleeper, secs: f64) {
    if secs.is_finite() && secs > 0.0 {
        sleeper.sleep(Duration::from_secs_f64(secs));
    }
}

/// Sleep for exact milliseconds.
pub fn sleep_ms(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}
