use std::{collections::VecDeque, sync::Mutex};

use crate::sync::mutex_lock_or_recover;

/// Fixed-capacity record store that evicts the oldest record once full.
///
/// Safe to share between threads: appends from the stdout and stderr readers
/// land in arrival order and `snapshot` never observes more than `capacity`
/// records.
#[derive(Debug)]
pub struct BoundedLogBuffer {
    capacity: usize,
    records: Mutex<VecDeque<String>>,
}

impl BoundedLogBuffer {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&self, record: impl Into<String>) {
        let mut records = mutex_lock_or_recover(&self.records);
        Self::push_bounded(&mut records, self.capacity, record.into());
    }

    /// Appends and returns the resulting contents under the same lock, so the
    /// snapshot always contains the record just written.
    pub fn append_and_snapshot(&self, record: impl Into<String>) -> Vec<String> {
        let mut records = mutex_lock_or_recover(&self.records);
        Self::push_bounded(&mut records, self.capacity, record.into());
        records.iter().cloned().collect()
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        mutex_lock_or_recover(&self.records).iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        mutex_lock_or_recover(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_bounded(records: &mut VecDeque<String>, capacity: usize, record: String) {
        if records.len() == capacity {
            records.pop_front();
        }
        records.push_back(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_keeps_records_until_full() {
        let buffer = BoundedLogBuffer::new(3);
        buffer.append("a");
        buffer.append("b");
        assert_eq!(buffer.snapshot(), vec!["a", "b"]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let buffer = BoundedLogBuffer::new(3);
        for i in 0..10 {
            buffer.append(format!("line {}", i));
        }
        assert_eq!(buffer.snapshot(), vec!["line 7", "line 8", "line 9"]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let buffer = BoundedLogBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.append("first");
        buffer.append("second");
        assert_eq!(buffer.snapshot(), vec!["second"]);
    }

    #[test]
    fn test_append_and_snapshot_includes_new_record() {
        let buffer = BoundedLogBuffer::new(2);
        buffer.append("a");
        buffer.append("b");
        let snapshot = buffer.append_and_snapshot("c");
        assert_eq!(snapshot, vec!["b", "c"]);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let buffer = BoundedLogBuffer::new(4);
        buffer.append("a");
        let snapshot = buffer.snapshot();
        buffer.append("b");
        assert_eq!(snapshot, vec!["a"]);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_concurrent_appends_stay_bounded_and_ordered() {
        let capacity = 50;
        let buffer = Arc::new(BoundedLogBuffer::new(capacity));
        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    for i in 0..500 {
                        buffer.append(format!("{}:{}", writer, i));
                    }
                })
            })
            .collect();

        let reader = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for _ in 0..200 {
                    let snapshot = buffer.snapshot();
                    assert!(snapshot.len() <= capacity);
                    assert_per_writer_order(&snapshot);
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), capacity);
        assert_per_writer_order(&snapshot);
    }

    fn assert_per_writer_order(snapshot: &[String]) {
        let mut last_seen = [None::<u32>; 4];
        for record in snapshot {
            let (writer, seq) = record.split_once(':').unwrap();
            let writer: usize = writer.parse().unwrap();
            let seq: u32 = seq.parse().unwrap();
            if let Some(prev) = last_seen[writer] {
                assert!(seq > prev, "out of order: {} after {}", seq, prev);
            }
            last_seen[writer] = Some(seq);
        }
    }
}
