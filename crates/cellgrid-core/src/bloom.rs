//! Bloom filter provider for cheap membership pre-checks.
//!
//! Filters are advisory: a positive answer means "possibly present" and the
//! caller must consult the authoritative index. Filter names are prefixed
//! `bf:`; document dedup uses one filter per tenant.

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::debug;

const FILTER_PREFIX: &str = "bf:";

/// Name of the per-tenant document checksum filter.
pub fn document_checksum_filter(company_id: i64) -> String {
    format!("document_checksums_{company_id}")
}

/// Contract for bloom filter providers.
#[async_trait]
pub trait BloomFilterProvider: Send + Sync {
    /// Add a value; returns false only on provider failure.
    async fn add(&self, filter_name: &str, value: &str) -> bool;

    /// Whether the value is possibly present. False means definitely absent.
    async fn might_contain(&self, filter_name: &str, value: &str) -> bool;

    /// Drop the filter entirely.
    async fn clear(&self, filter_name: &str) -> bool;
}

/// k-hash bit-vector filter sized for ~1% false positives at the default
/// capacity, matching the reservation parameters the backing module uses.
#[derive(Debug)]
struct BloomBits {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
}

impl BloomBits {
    /// ~100k capacity at 1% error: m ≈ 9.6 n, k ≈ 7.
    fn with_defaults() -> Self {
        let num_bits: u64 = 958_506;
        Self {
            bits: vec![0; num_bits.div_ceil(64) as usize],
            num_bits,
            num_hashes: 7,
        }
    }

    /// Double hashing over two independent 64-bit digests of the value.
    fn positions(&self, value: &str) -> impl Iterator<Item = u64> + '_ {
        let digest = Sha256::digest(value.as_bytes());
        let h1 = u64::from_le_bytes(digest[0..8].try_into().expect("digest is 32 bytes"));
        let h2 = u64::from_le_bytes(digest[8..16].try_into().expect("digest is 32 bytes"));
        (0..self.num_hashes as u64)
            .map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits)
    }

    fn insert(&mut self, value: &str) {
        let positions: Vec<u64> = self.positions(value).collect();
        for pos in positions {
            self.bits[(pos / 64) as usize] |= 1 << (pos % 64);
        }
    }

    fn contains(&self, value: &str) -> bool {
        self.positions(value)
            .all(|pos| self.bits[(pos / 64) as usize] & (1 << (pos % 64)) != 0)
    }
}

/// In-process bloom filter store, one bit vector per filter name.
#[derive(Debug, Default)]
pub struct MemoryBloomFilter {
    filters: DashMap<String, BloomBits>,
}

impl MemoryBloomFilter {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(filter_name: &str) -> String {
        format!("{FILTER_PREFIX}{filter_name}")
    }
}

#[async_trait]
impl BloomFilterProvider for MemoryBloomFilter {
    async fn add(&self, filter_name: &str, value: &str) -> bool {
        self.filters
            .entry(Self::key(filter_name))
            .or_insert_with(BloomBits::with_defaults)
            .insert(value);
        debug!(filter_name, "added value to bloom filter");
        true
    }

    async fn might_contain(&self, filter_name: &str, value: &str) -> bool {
        self.filters
            .get(&Self::key(filter_name))
            .map(|bits| bits.contains(value))
            .unwrap_or(false)
    }

    async fn clear(&self, filter_name: &str) -> bool {
        self.filters.remove(&Self::key(filter_name)).is_some()
    }
}

/// No-op filter for deployments without a filter backend: every check
/// reports "possibly present", forcing the authoritative lookup.
#[derive(Debug, Default)]
pub struct PassthroughBloomFilter;

#[async_trait]
impl BloomFilterProvider for PassthroughBloomFilter {
    async fn add(&self, _filter_name: &str, _value: &str) -> bool {
        true
    }

    async fn might_contain(&self, _filter_name: &str, _value: &str) -> bool {
        true
    }

    async fn clear(&self, _filter_name: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_value_is_definitely_absent() {
        let bloom = MemoryBloomFilter::new();
        assert!(!bloom.might_contain("document_checksums_1", "deadbeef").await);
        bloom.add("document_checksums_1", "deadbeef").await;
        assert!(bloom.might_contain("document_checksums_1", "deadbeef").await);
        // Different filter name is a different bit vector.
        assert!(!bloom.might_contain("document_checksums_2", "deadbeef").await);
    }

    #[tokio::test]
    async fn test_clear_resets_filter() {
        let bloom = MemoryBloomFilter::new();
        bloom.add("f", "v").await;
        assert!(bloom.clear("f").await);
        assert!(!bloom.might_contain("f", "v").await);
    }

    #[tokio::test]
    async fn test_no_false_negatives_over_many_values() {
        let bloom = MemoryBloomFilter::new();
        for i in 0..1000 {
            bloom.add("f", &format!("checksum-{i}")).await;
        }
        for i in 0..1000 {
            assert!(bloom.might_contain("f", &format!("checksum-{i}")).await);
        }
    }

    #[tokio::test]
    async fn test_passthrough_always_possible() {
        let bloom = PassthroughBloomFilter;
        assert!(bloom.might_contain("any", "thing").await);
    }
}
