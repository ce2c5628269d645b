//! Three-tier min/max decimated buffer (§4.4), feeding arbitrary time
//! windows from one second to seven days under a bounded memory budget.
//! Grounded in the accumulate-then-finalize cascade of the original
//! `MultiResolutionBuffer`/`_TierBuffer` design: each tier tracks one
//! in-progress accumulator and finalizes into a fixed-capacity ring of
//! buckets, pushing the finalized bucket down to the next tier.

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub t_start_ns: u64,
    pub t_end_ns: u64,
    pub counts_min: [i32; 6],
    pub counts_max: [i32; 6],
    pub sample_count: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct TierConfig {
    pub capacity: usize,
    /// Number of inputs (raw samples for T1, buckets for T2/T3) per
    /// finalized output bucket.
    pub decimation: u32,
}

impl TierConfig {
    pub const T1: TierConfig = TierConfig { capacity: 36_000, decimation: 100 };
    pub const T2: TierConfig = TierConfig { capacity: 8_640, decimation: 100 };
    pub const T3: TierConfig = TierConfig { capacity: 6_048, decimation: 10 };
}

struct Accumulator {
    t_start_ns: u64,
    t_end_ns: u64,
    counts_min: [i32; 6],
    counts_max: [i32; 6],
    sample_count: u64,
    input_count: u32,
}

impl Accumulator {
    fn empty() -> Self {
        Self { t_start_ns: 0, t_end_ns: 0, counts_min: [0; 6], counts_max: [0; 6], sample_count: 0, input_count: 0 }
    }

    fn seed(&mut self, t_start: u64, t_end: u64, counts_min: [i32; 6], counts_max: [i32; 6], sample_count: u64) {
        self.t_start_ns = t_start;
        self.t_end_ns = t_end;
        self.counts_min = counts_min;
        self.counts_max = counts_max;
        self.sample_count = sample_count;
    }

    fn merge(&mut self, t_end: u64, counts_min: &[i32; 6], counts_max: &[i32; 6], added_samples: u64) {
        self.t_end_ns = t_end;
        for i in 0..6 {
            self.counts_min[i] = self.counts_min[i].min(counts_min[i]);
            self.counts_max[i] = self.counts_max[i].max(counts_max[i]);
        }
        self.sample_count += added_samples;
    }

    fn finalize(&self) -> Bucket {
        Bucket {
            t_start_ns: self.t_start_ns,
            t_end_ns: self.t_end_ns,
            counts_min: self.counts_min,
            counts_max: self.counts_max,
            sample_count: self.sample_count,
        }
    }
}

struct Tier {
    config: TierConfig,
    buckets: Vec<Option<Bucket>>,
    head: usize,
    size: usize,
    accumulator: Accumulator,
}

impl Tier {
    fn new(config: TierConfig) -> Self {
        Self {
            buckets: vec![None; config.capacity],
            head: 0,
            size: 0,
            accumulator: Accumulator::empty(),
            config,
        }
    }

    /// Push a finalized bucket into this tier's ring, overwriting the
    /// oldest exactly like the raw ring (§4.3).
    fn push_finalized(&mut self, bucket: Bucket) {
        self.buckets[self.head] = Some(bucket);
        self.head = (self.head + 1) % self.config.capacity;
        if self.size < self.config.capacity {
            self.size += 1;
        }
    }

    /// Feed one input (a raw sample for T1, or an upstream bucket for
    /// T2/T3). Returns `Some(bucket)` when this input finalizes the
    /// in-progress accumulator.
    fn feed(&mut self, t_start: u64, t_end: u64, counts_min: [i32; 6], counts_max: [i32; 6], added_samples: u64) -> Option<Bucket> {
        if self.accumulator.input_count == 0 {
            self.accumulator.seed(t_start, t_end, counts_min, counts_max, added_samples);
        } else {
            self.accumulator.merge(t_end, &counts_min, &counts_max, added_samples);
        }
        self.accumulator.input_count += 1;

        if self.accumulator.input_count == self.config.decimation {
            let bucket = self.accumulator.finalize();
            self.push_finalized(bucket);
            self.accumulator = Accumulator::empty();
            Some(bucket)
        } else {
            None
        }
    }

    fn query(&self, start_ns: u64, end_ns: u64) -> Vec<Bucket> {
        let mut out = Vec::new();
        if self.size == 0 {
            return out;
        }
        let start_idx = if self.size < self.config.capacity { 0 } else { self.head };
        for offset in 0..self.size {
            let idx = (start_idx + offset) % self.config.capacity;
            if let Some(b) = self.buckets[idx] {
                if b.t_start_ns < end_ns && b.t_end_ns >= start_ns {
                    out.push(b);
                }
            }
        }
        out
    }

    fn clear(&mut self) {
        self.buckets.iter_mut().for_each(|b| *b = None);
        self.head = 0;
        self.size = 0;
        self.accumulator = Accumulator::empty();
    }

    fn len(&self) -> usize {
        self.size
    }

    fn bucket_at(&self, index: usize) -> Option<Bucket> {
        if index >= self.size {
            return None;
        }
        let start_idx = if self.size < self.config.capacity { 0 } else { self.head };
        self.buckets[(start_idx + index) % self.config.capacity]
    }
}

struct Tiers {
    t1: Tier,
    t2: Tier,
    t3: Tier,
}

/// Three-tier min/max decimated buffer, cascading T1 -> T2 -> T3.
pub struct TieredBuffer {
    inner: Mutex<Tiers>,
}

impl Default for TieredBuffer {
    fn default() -> Self {
        Self::new(TierConfig::T1, TierConfig::T2, TierConfig::T3)
    }
}

impl TieredBuffer {
    pub fn new(t1: TierConfig, t2: TierConfig, t3: TierConfig) -> Self {
        Self {
            inner: Mutex::new(Tiers { t1: Tier::new(t1), t2: Tier::new(t2), t3: Tier::new(t3) }),
        }
    }

    /// Feed one raw sample, cascading finalized buckets down through T1,
    /// T2, T3 as each tier's decimation factor is reached.
    pub fn add_sample(&self, t_ns: u64, counts: &[i32; 6]) {
        let mut tiers = self.inner.lock();
        if let Some(b1) = tiers.t1.feed(t_ns, t_ns, *counts, *counts, 1) {
            if let Some(b2) = tiers.t2.feed(b1.t_start_ns, b1.t_end_ns, b1.counts_min, b1.counts_max, b1.sample_count) {
                tiers.t3.feed(b2.t_start_ns, b2.t_end_ns, b2.counts_min, b2.counts_max, b2.sample_count);
            }
        }
    }

    pub fn get_tier_data(&self, tier: TierName, start_ns: u64, end_ns: u64) -> Vec<Bucket> {
        let tiers = self.inner.lock();
        match tier {
            TierName::T1 => tiers.t1.query(start_ns, end_ns),
            TierName::T2 => tiers.t2.query(start_ns, end_ns),
            TierName::T3 => tiers.t3.query(start_ns, end_ns),
        }
    }

    pub fn tier_len(&self, tier: TierName) -> usize {
        let tiers = self.inner.lock();
        match tier {
            TierName::T1 => tiers.t1.len(),
            TierName::T2 => tiers.t2.len(),
            TierName::T3 => tiers.t3.len(),
        }
    }

    pub fn tier_bucket_at(&self, tier: TierName, index: usize) -> Option<Bucket> {
        let tiers = self.inner.lock();
        match tier {
            TierName::T1 => tiers.t1.bucket_at(index),
            TierName::T2 => tiers.t2.bucket_at(index),
            TierName::T3 => tiers.t3.bucket_at(index),
        }
    }

    /// Choose the finest tier whose capacity covers a window of
    /// `window_secs` seconds at `sample_rate_hz`, falling back to raw if
    /// the caller's raw-ring capacity already covers it.
    pub fn select_tier_for_window(window_secs: f64, sample_rate_hz: f64, raw_capacity: usize) -> SelectedTier {
        if window_secs * sample_rate_hz <= raw_capacity as f64 {
            return SelectedTier::Raw;
        }
        if window_secs <= 3600.0 {
            SelectedTier::Tier(TierName::T1)
        } else if window_secs <= 86_400.0 {
            SelectedTier::Tier(TierName::T2)
        } else {
            SelectedTier::Tier(TierName::T3)
        }
    }

    pub fn clear(&self) {
        let mut tiers = self.inner.lock();
        tiers.t1.clear();
        tiers.t2.clear();
        tiers.t3.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierName {
    T1,
    T2,
    T3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedTier {
    Raw,
    Tier(TierName),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_thousand_ramping_samples_produce_expected_tier_sizes() {
        let buf = TieredBuffer::default();
        for i in 0u64..10_000 {
            let v = (i % 100) as i32;
            buf.add_sample(i, &[v, 0, 0, 0, 0, 0]);
        }
        assert_eq!(buf.tier_len(TierName::T1), 100);
        assert_eq!(buf.tier_len(TierName::T2), 1);

        let t2_bucket = buf.tier_bucket_at(TierName::T2, 0).unwrap();
        assert_eq!(t2_bucket.counts_min[0], 0);
        assert_eq!(t2_bucket.counts_max[0], 99);
    }

    #[test]
    fn bucket_sample_count_sums_across_cascade() {
        let buf = TieredBuffer::new(
            TierConfig { capacity: 10, decimation: 5 },
            TierConfig { capacity: 10, decimation: 2 },
            TierConfig { capacity: 10, decimation: 2 },
        );
        for i in 0u64..20 {
            buf.add_sample(i, &[0; 6]);
        }
        assert_eq!(buf.tier_len(TierName::T1), 4);
        assert_eq!(buf.tier_len(TierName::T2), 2);
        assert_eq!(buf.tier_len(TierName::T3), 1);

        let t3 = buf.tier_bucket_at(TierName::T3, 0).unwrap();
        assert_eq!(t3.sample_count, 20);
    }

    #[test]
    fn query_overlap_filters_half_open_range() {
        let buf = TieredBuffer::new(TierConfig { capacity: 100, decimation: 1 }, TierConfig::T2, TierConfig::T3);
        for i in 0u64..5 {
            buf.add_sample(i * 10, &[0; 6]);
        }
        let hits = buf.get_tier_data(TierName::T1, 15, 25);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].t_start_ns, 20);
    }

    #[test]
    fn query_excludes_bucket_starting_exactly_at_end_ns() {
        let buf = TieredBuffer::new(TierConfig { capacity: 100, decimation: 1 }, TierConfig::T2, TierConfig::T3);
        for i in 0u64..5 {
            buf.add_sample(i * 10, &[0; 6]);
        }
        let hits = buf.get_tier_data(TierName::T1, 0, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].t_start_ns, 0);
    }

    #[test]
    fn select_tier_picks_finest_sufficient_tier() {
        assert_eq!(TieredBuffer::select_tier_for_window(0.5, 1000.0, 60_000), SelectedTier::Raw);
        assert_eq!(TieredBuffer::select_tier_for_window(1800.0, 1000.0, 60_000), SelectedTier::Tier(TierName::T1));
        assert_eq!(TieredBuffer::select_tier_for_window(7200.0, 1000.0, 60_000), SelectedTier::Tier(TierName::T2));
        assert_eq!(TieredBuffer::select_tier_for_window(200_000.0, 1000.0, 60_000), SelectedTier::Tier(TierName::T3));
    }

    #[test]
    fn clear_empties_all_tiers_and_accumulators() {
        let buf = TieredBuffer::default();
        for i in 0u64..150 {
            buf.add_sample(i, &[0; 6]);
        }
        buf.clear();
        assert_eq!(buf.tier_len(TierName::T1), 0);
        assert_eq!(buf.tier_len(TierName::T2), 0);
    }
}
