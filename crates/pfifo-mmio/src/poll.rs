use std::time::{Duration, Instant};

/// Spins until `cond` returns `true` or `timeout` elapses.
///
/// Returns whether the condition was met. `cond` is always evaluated at least once, so a zero
/// timeout still samples the hardware.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::hint::spin_loop();
    }
}
