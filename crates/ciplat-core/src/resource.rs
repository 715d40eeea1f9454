//! Pool of interchangeable CPU cores.

use serde::{Deserialize, Serialize};

use crate::{CoreId, JobId};

/// One unit of the CPU pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Core {
    /// Job currently holding this core, if any.
    pub owner: Option<JobId>,
}

impl Core {
    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }
}

/// Fixed-size set of cores.
///
/// Acquisition is greedy and partial: callers that need all-or-nothing
/// semantics compare the returned count with what they asked for.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    cores: Vec<Core>,
}

impl ResourcePool {
    pub fn new(count: usize) -> Self {
        Self {
            cores: vec![Core::default(); count],
        }
    }

    /// Claim up to `count` free cores for `job`, scanning in index order.
    ///
    /// Returns how many cores were claimed (`0..=count`).
    pub fn try_acquire(&mut self, job: JobId, count: usize) -> usize {
        let mut acquired = 0;
        for core in self.cores.iter_mut().filter(|c| c.is_free()) {
            if acquired == count {
                break;
            }
            core.owner = Some(job);
            acquired += 1;
        }
        acquired
    }

    /// Free every core owned by `job`. Returns how many were freed.
    pub fn release(&mut self, job: JobId) -> usize {
        let mut released = 0;
        for core in self.cores.iter_mut().filter(|c| c.owner == Some(job)) {
            core.owner = None;
            released += 1;
        }
        released
    }

    pub fn free_count(&self) -> usize {
        self.cores.iter().filter(|c| c.is_free()).count()
    }

    pub fn owned_by(&self, job: JobId) -> usize {
        self.cores.iter().filter(|c| c.owner == Some(job)).count()
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    pub fn cores(&self) -> impl Iterator<Item = (CoreId, &Core)> {
        self.cores
            .iter()
            .enumerate()
            .map(|(i, core)| (CoreId::new(i), core))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_claims_lowest_free_cores() {
        let mut pool = ResourcePool::new(4);
        let a = JobId::new(0);

        assert_eq!(pool.try_acquire(a, 2), 2);
        assert_eq!(pool.free_count(), 2);

        let owners: Vec<_> = pool.cores().map(|(_, c)| c.owner).collect();
        assert_eq!(owners, vec![Some(a), Some(a), None, None]);
    }

    #[test]
    fn test_acquire_is_partial_when_short() {
        let mut pool = ResourcePool::new(3);
        let a = JobId::new(0);
        let b = JobId::new(1);

        assert_eq!(pool.try_acquire(a, 2), 2);
        assert_eq!(pool.try_acquire(b, 2), 1);
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.owned_by(b), 1);
    }

    #[test]
    fn test_acquire_zero_claims_nothing() {
        let mut pool = ResourcePool::new(2);
        assert_eq!(pool.try_acquire(JobId::new(0), 0), 0);
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn test_release_only_frees_own_cores() {
        let mut pool = ResourcePool::new(4);
        let a = JobId::new(0);
        let b = JobId::new(1);
        pool.try_acquire(a, 1);
        pool.try_acquire(b, 2);

        assert_eq!(pool.release(a), 1);
        assert_eq!(pool.owned_by(b), 2);
        assert_eq!(pool.free_count(), 2);

        assert_eq!(pool.release(a), 0);
    }
}
