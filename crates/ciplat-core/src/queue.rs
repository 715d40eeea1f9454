//! The global dispatch queue.

use std::collections::VecDeque;

use crate::{Error, JobId, Result};

/// Ordered list of jobs waiting for admission.
///
/// Strict FIFO for [`enqueue_back`](Self::enqueue_back). The privileged
/// [`enqueue_front`](Self::enqueue_front) jumps the whole queue and is
/// reserved for the static-analysis trigger and the shutdown wake.
#[derive(Debug, Clone, Default)]
pub struct DispatchQueue {
    entries: VecDeque<JobId>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_back(&mut self, job: JobId) {
        self.entries.push_back(job);
    }

    pub fn enqueue_front(&mut self, job: JobId) {
        self.entries.push_front(job);
    }

    /// Remove the head. Callers must have confirmed the head first.
    pub fn dequeue_front(&mut self) -> Result<JobId> {
        self.entries.pop_front().ok_or(Error::EmptyQueue)
    }

    pub fn peek_front(&self) -> Option<JobId> {
        self.entries.front().copied()
    }

    /// Drop every entry for `job`. Returns whether any were present.
    pub fn withdraw(&mut self, job: JobId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|j| *j != job);
        self.entries.len() != before
    }

    pub fn count_of(&self, job: JobId) -> usize {
        self.entries.iter().filter(|j| **j == job).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = JobId> + '_ {
        self.entries.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(i: usize) -> JobId {
        JobId::new(i)
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = DispatchQueue::new();
        queue.enqueue_back(job(1));
        queue.enqueue_back(job(2));
        queue.enqueue_back(job(3));

        assert_eq!(queue.peek_front(), Some(job(1)));
        assert_eq!(queue.dequeue_front().unwrap(), job(1));
        assert_eq!(queue.dequeue_front().unwrap(), job(2));
        assert_eq!(queue.dequeue_front().unwrap(), job(3));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_front_insert_jumps_queue() {
        let mut queue = DispatchQueue::new();
        queue.enqueue_back(job(1));
        queue.enqueue_back(job(2));
        queue.enqueue_front(job(8));

        assert_eq!(queue.iter().collect::<Vec<_>>(), vec![job(8), job(1), job(2)]);
    }

    #[test]
    fn test_dequeue_empty_is_error() {
        let mut queue = DispatchQueue::new();
        assert!(matches!(queue.dequeue_front(), Err(Error::EmptyQueue)));
        assert_eq!(queue.peek_front(), None);
    }

    #[test]
    fn test_withdraw_removes_all_entries() {
        let mut queue = DispatchQueue::new();
        queue.enqueue_back(job(1));
        queue.enqueue_back(job(8));
        queue.enqueue_back(job(2));
        queue.enqueue_front(job(8));

        assert_eq!(queue.count_of(job(8)), 2);
        assert!(queue.withdraw(job(8)));
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec![job(1), job(2)]);
        assert!(!queue.withdraw(job(8)));
    }
}
