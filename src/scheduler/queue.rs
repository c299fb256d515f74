use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::models::{JobId, Priority};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    priority: Reverse<Priority>,
    seq: u64,
}

/// Ready queue ordered by priority (highest first) then enqueue order.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    entries: BTreeMap<QueueKey, JobId>,
    keys: HashMap<JobId, QueueKey>,
    next_seq: u64,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: JobId, priority: Priority) {
        let key = QueueKey { priority: Reverse(priority), seq: self.next_seq };
        self.next_seq += 1;
        if let Some(old) = self.keys.insert(id, key) {
            self.entries.remove(&old);
        }
        self.entries.insert(key, id);
    }

    pub fn remove(&mut self, id: JobId) -> bool {
        match self.keys.remove(&id) {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    /// Job ids in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = JobId> + '_ {
        self.entries.values().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(v: u8) -> Priority {
        Priority::new(v).unwrap()
    }

    #[test]
    fn test_priority_then_fifo() {
        let mut q = ReadyQueue::new();
        let (a, b, c, d) = (JobId::new(), JobId::new(), JobId::new(), JobId::new());
        q.push(a, p(3));
        q.push(b, p(5));
        q.push(c, p(3));
        q.push(d, p(5));
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![b, d, a, c]);
    }

    #[test]
    fn test_remove_exact_entry() {
        let mut q = ReadyQueue::new();
        let (a, b) = (JobId::new(), JobId::new());
        q.push(a, p(2));
        q.push(b, p(2));
        assert!(q.remove(a));
        assert!(!q.remove(a));
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![b]);
        assert_eq!(q.len(), 1);
        assert!(q.remove(b));
        assert!(q.is_empty());
    }

    #[test]
    fn test_repush_moves_to_back_of_band() {
        let mut q = ReadyQueue::new();
        let (a, b) = (JobId::new(), JobId::new());
        q.push(a, p(4));
        q.push(b, p(4));
        q.push(a, p(4));
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(q.len(), 2);
    }
}
