use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static FILTER_TIMER: Timer = Timer::new();

/// Process-wide time spent filtering, excluding store loads.
pub fn filter_timer() -> &'static Timer {
    &FILTER_TIMER
}

#[derive(Debug)]
pub struct Timer {
    nanos: AtomicU64,
    runs: AtomicU64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub const fn new() -> Self {
        Self {
            nanos: AtomicU64::new(0),
            runs: AtomicU64::new(0),
        }
    }

    pub fn start(&self) -> Running<'_> {
        self.runs.fetch_add(1, Ordering::Relaxed);
        Running {
            timer: self,
            started: Some(Instant::now()),
        }
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }

    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.nanos.store(0, Ordering::Relaxed);
        self.runs.store(0, Ordering::Relaxed);
    }

    fn add(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

/// A started measurement. Time accrues until it is paused or dropped.
#[derive(Debug)]
pub struct Running<'t> {
    timer: &'t Timer,
    started: Option<Instant>,
}

impl Running<'_> {
    pub fn pause(&mut self) {
        if let Some(started) = self.started.take() {
            self.timer.add(started.elapsed());
        }
    }

    pub fn resume(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Runs `f` with the clock stopped.
    pub fn paused<T>(&mut self, f: impl FnOnce() -> T) -> T {
        self.pause();
        let result = f();
        self.resume();
        result
    }
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::Timer;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn paused_sections_are_excluded() {
        let timer = Timer::new();
        {
            let mut running = timer.start();
            running.paused(|| sleep(Duration::from_millis(40)));
            assert!(running.is_running());
        }
        assert_eq!(timer.runs(), 1);
        assert!(timer.total() < Duration::from_millis(40));
    }

    #[test]
    fn drop_accumulates() {
        let timer = Timer::new();
        {
            let _running = timer.start();
            sleep(Duration::from_millis(5));
        }
        assert!(timer.total() >= Duration::from_millis(5));
        timer.reset();
        assert_eq!(timer.total(), Duration::ZERO);
    }
}
