//! Counting barrier that frees the static analysis job at shutdown.

/// Counts ordinary jobs that have exited.
///
/// The static analysis job never self-enqueues, so once every job that
/// could dispatch it has stopped it would wait forever. Reaching the
/// ordinary total is the signal to push it to the queue head one last time.
#[derive(Debug, Clone)]
pub struct ShutdownBarrier {
    total: usize,
    exited: usize,
}

impl ShutdownBarrier {
    pub fn new(total: usize) -> Self {
        Self { total, exited: 0 }
    }

    /// Record one exit. Returns true for the arrival that releases the barrier.
    pub fn arrive(&mut self) -> bool {
        if self.exited >= self.total {
            return false;
        }
        self.exited += 1;
        self.exited == self.total
    }

    pub fn is_released(&self) -> bool {
        self.exited >= self.total
    }

    pub fn exited(&self) -> usize {
        self.exited
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_releases_on_last_arrival_only() {
        let mut barrier = ShutdownBarrier::new(3);
        assert!(!barrier.arrive());
        assert!(!barrier.arrive());
        assert!(!barrier.is_released());
        assert!(barrier.arrive());
        assert!(barrier.is_released());

        // Extra arrivals never release twice.
        assert!(!barrier.arrive());
        assert_eq!(barrier.exited(), 3);
    }

    #[test]
    fn test_empty_barrier_starts_released() {
        let mut barrier = ShutdownBarrier::new(0);
        assert!(barrier.is_released());
        assert!(!barrier.arrive());
    }
}
