use std::time::{Duration, SystemTime};

/// Utility for keeping track of the time it took to perform some operation.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start_time: SystemTime,
}

impl Timer {
    /// Create a new `Timer`.
    pub fn now() -> Self {
        Self {
            start_time: SystemTime::now(),
        }
    }

    /// Reset internal timer to now.
    pub fn reset(&mut self) {
        self.start_time = SystemTime::now();
    }

    /// Wall-clock time at which the timer was last reset.
    pub fn started(&self) -> SystemTime {
        self.start_time
    }

    /// Time elapsed since the timer was last reset.
    /// If the system clock went backwards, this is zero.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed().unwrap_or_default()
    }

    /// Print a message with the elapsed time since the timer was last reset.
    pub fn print_elapsed(&self, task: &str) {
        eprintln!("{} took {}", task, format_duration(self.elapsed()));
    }
}

/// Format a duration as e.g. "2h 03m 10.52s", "4m 01.00s" or "12.30s".
pub fn format_duration(d: Duration) -> String {
    // round once, up front, so 119.996s carries into the minutes:
    let centis = (d.as_secs_f64() * 100.0).round() as u64;
    let hours = centis / 360_000;
    let minutes = (centis / 6_000) % 60;
    let seconds = (centis % 6_000) as f64 / 100.0;
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:05.2}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:05.2}s")
    } else {
        format!("{seconds:.2}s")
    }
}
