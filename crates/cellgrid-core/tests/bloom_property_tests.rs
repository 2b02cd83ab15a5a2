//! Property tests for the bloom filter: no false negatives, ever.

use proptest::prelude::*;

use cellgrid_core::bloom::{BloomFilterProvider, MemoryBloomFilter};

proptest! {
    #[test]
    fn added_values_are_always_possibly_present(
        values in prop::collection::hash_set("[a-f0-9]{16,64}", 1..50)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime builds");
        runtime.block_on(async {
            let bloom = MemoryBloomFilter::new();
            for value in &values {
                bloom.add("document_checksums_1", value).await;
            }
            for value in &values {
                prop_assert!(bloom.might_contain("document_checksums_1", value).await);
            }
            Ok(())
        })?;
    }

    #[test]
    fn filters_are_independent(value in "[a-f0-9]{32}") {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime builds");
        runtime.block_on(async {
            let bloom = MemoryBloomFilter::new();
            bloom.add("document_checksums_1", &value).await;
            prop_assert!(!bloom.might_contain("document_checksums_2", &value).await);
            Ok(())
        })?;
    }
}
