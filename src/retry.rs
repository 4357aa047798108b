use std::time::Duration;

/// Delays between attempts: starts at the base duration and doubles each time.
pub struct ExponentialRetry {
    left_retries: usize,
    current: Duration,
    factor: u32,
}

impl ExponentialRetry {
    pub fn new(retries: usize) -> Self {
        return Self::with_base_duration(retries, Duration::from_millis(500));
    }

    pub fn with_base_duration(retries: usize, duration: Duration) -> Self {
        return Self {
            left_retries: retries,
            current: duration,
            factor: 2,
        };
    }
}

impl Iterator for ExponentialRetry {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.left_retries == 0 {
            return None;
        }
        let duration = self.current;
        self.current *= self.factor;
        self.left_retries -= 1;

        return Some(duration);
    }
}
