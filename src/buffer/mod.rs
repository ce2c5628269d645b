//! In-memory storage tiers (§4.3, §4.4): the raw ring and the
//! multi-resolution decimated buffer built on top of it.

pub mod ring;
pub mod tiered;

pub use ring::{RawRing, RingStats};
pub use tiered::{Bucket, SelectedTier, TierConfig, TierName, TieredBuffer};
