//! Fixed-capacity, overwrite-oldest, columnar ring buffer for raw samples
//! (§4.3). All mutation and reads go through one monitor lock — append is
//! microseconds and reads are infrequent, so simplicity dominates
//! micro-contention (§4.3 "Thread model").

use parking_lot::Mutex;

use crate::models::Sample;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingStats {
    pub capacity: usize,
    pub size: usize,
    pub total_written: u64,
    pub overwrites: u64,
}

impl RingStats {
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity == 0 { 0.0 } else { self.size as f64 / self.capacity as f64 }
    }

    pub fn is_full(&self) -> bool {
        self.size >= self.capacity
    }
}

struct Columns {
    timestamps: Vec<u64>,
    rdt_sequence: Vec<u32>,
    ft_sequence: Vec<u32>,
    status: Vec<u32>,
    counts: Vec<[i32; 6]>,
    head: usize,
    size: usize,
    total_written: u64,
    overwrites: u64,
}

/// Thread-safe columnar ring buffer of raw samples.
pub struct RawRing {
    capacity: usize,
    inner: Mutex<Columns>,
}

impl RawRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive, got {capacity}");
        Self {
            capacity,
            inner: Mutex::new(Columns {
                timestamps: vec![0; capacity],
                rdt_sequence: vec![0; capacity],
                ft_sequence: vec![0; capacity],
                status: vec![0; capacity],
                counts: vec![[0; 6]; capacity],
                head: 0,
                size: 0,
                total_written: 0,
                overwrites: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// O(1) append under a single critical section (§4.3).
    pub fn append(&self, sample: &Sample) {
        let mut c = self.inner.lock();
        let idx = c.head;
        c.timestamps[idx] = sample.t_monotonic_ns;
        c.rdt_sequence[idx] = sample.rdt_sequence;
        c.ft_sequence[idx] = sample.ft_sequence;
        c.status[idx] = sample.status;
        c.counts[idx] = sample.counts;

        c.head = (c.head + 1) % self.capacity;
        c.total_written += 1;
        if c.size < self.capacity {
            c.size += 1;
        } else {
            c.overwrites += 1;
        }
    }

    pub fn stats(&self) -> RingStats {
        let c = self.inner.lock();
        RingStats {
            capacity: self.capacity,
            size: c.size,
            total_written: c.total_written,
            overwrites: c.overwrites,
        }
    }

    /// The `n` most recent samples (clamped to `size`), oldest first.
    /// Returns owned copies so a concurrent `append` cannot race the reader.
    pub fn get_latest(&self, n: usize) -> Vec<Sample> {
        let c = self.inner.lock();
        self.read_latest_locked(&c, n)
    }

    pub fn get_all(&self) -> Vec<Sample> {
        let c = self.inner.lock();
        let size = c.size;
        self.read_latest_locked(&c, size)
    }

    fn read_latest_locked(&self, c: &Columns, n: usize) -> Vec<Sample> {
        let n = n.min(c.size);
        if n == 0 {
            return Vec::new();
        }

        let indices: Vec<usize> = if c.size < self.capacity {
            let start = c.size - n;
            (start..c.size).collect()
        } else {
            let end = c.head;
            let start = (end + self.capacity - n) % self.capacity;
            if start < end {
                (start..end).collect()
            } else {
                (start..self.capacity).chain(0..end).collect()
            }
        };

        indices
            .into_iter()
            .map(|i| Sample {
                t_monotonic_ns: c.timestamps[i],
                rdt_sequence: c.rdt_sequence[i],
                ft_sequence: c.ft_sequence[i],
                status: c.status[i],
                counts: c.counts[i],
                force_n: None,
                torque_nm: None,
            })
            .collect()
    }

    /// Zero counters and head; storage is not zeroed (`size` is the sole
    /// validity marker). Per §9 Open Questions this also resets
    /// `total_written`/`overwrites` — callers needing session-monotonic
    /// totals must read before `clear()`.
    pub fn clear(&self) {
        let mut c = self.inner.lock();
        c.head = 0;
        c.size = 0;
        c.total_written = 0;
        c.overwrites = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(seq: u32) -> Sample {
        Sample::raw(seq as u64, seq, seq, 0, [seq as i32; 6])
    }

    #[test]
    fn fewer_than_capacity_appends_all_retrievable() {
        let ring = RawRing::new(5);
        for i in 0..3 {
            ring.append(&sample(i));
        }
        let stats = ring.stats();
        assert_eq!(stats.size, 3);
        assert_eq!(stats.total_written, 3);
        assert_eq!(stats.overwrites, 0);

        let latest = ring.get_latest(3);
        let seqs: Vec<u32> = latest.iter().map(|s| s.rdt_sequence).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn overwrite_past_capacity_keeps_most_recent_in_order() {
        let ring = RawRing::new(4);
        for i in 0..10u32 {
            ring.append(&sample(i));
        }
        let stats = ring.stats();
        assert_eq!(stats.size, 4);
        assert_eq!(stats.total_written, 10);
        assert_eq!(stats.overwrites, 6);

        let latest = ring.get_latest(4);
        let seqs: Vec<u32> = latest.iter().map(|s| s.rdt_sequence).collect();
        assert_eq!(seqs, vec![6, 7, 8, 9]);
    }

    #[test]
    fn get_latest_zero_is_empty() {
        let ring = RawRing::new(4);
        ring.append(&sample(0));
        assert!(ring.get_latest(0).is_empty());
    }

    #[test]
    fn get_latest_beyond_size_clamps() {
        let ring = RawRing::new(10);
        ring.append(&sample(0));
        ring.append(&sample(1));
        assert_eq!(ring.get_latest(100).len(), 2);
    }

    #[test]
    fn clear_resets_counters_but_keeps_capacity() {
        let ring = RawRing::new(4);
        for i in 0..6u32 {
            ring.append(&sample(i));
        }
        ring.clear();
        let stats = ring.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.total_written, 0);
        assert_eq!(stats.overwrites, 0);
        assert_eq!(stats.capacity, 4);
    }
}
