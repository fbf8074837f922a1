//! Property tests for the codec and both stores.

use fuelkv_codec::{decode_record, encode_record};
use fuelkv_core::{KvStore, StoreOptions};
use fuelkv_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn codec_preserves_values(value in value_strategy()) {
        let bytes = encode_record(&value).unwrap();
        prop_assert_eq!(decode_record(&bytes).unwrap(), value);
    }

    #[test]
    fn encoding_is_deterministic(value in value_strategy()) {
        prop_assert_eq!(encode_record(&value).unwrap(), encode_record(&value).unwrap());
    }

    #[test]
    fn mapped_store_survives_reopen(
        entries in entries_strategy(40),
        capacity in 1usize..8,
    ) {
        let mut fixture = TempMapped::with_options(StoreOptions::new().cache_capacity(capacity));
        fixture.update(entries.clone()).unwrap();
        prop_assert_eq!(fixture.len().unwrap(), entries.len());

        fixture.reopen(StoreOptions::read_only_mode());
        for (key, value) in &entries {
            prop_assert_eq!(&fixture.get(key).unwrap(), value);
        }
        prop_assert_eq!(fixture.len().unwrap(), entries.len());
    }

    #[test]
    fn relational_store_survives_reopen(
        entries in entries_strategy(40),
        table in table_name_strategy(),
        capacity in 1usize..8,
    ) {
        let mut fixture = TempRelational::with_options(StoreOptions::new().cache_capacity(capacity));
        fixture.as_table(table.as_str()).update(entries.clone()).unwrap();

        fixture.reopen(StoreOptions::read_only_mode());
        let mut view = fixture.as_table(table.as_str());
        for (key, value) in &entries {
            prop_assert_eq!(&view.get(key).unwrap(), value);
        }
        prop_assert_eq!(view.len().unwrap(), entries.len());
    }

    #[test]
    fn last_write_wins(
        writes in prop::collection::vec((key_strategy(), feature_vector_strategy()), 1..60),
        capacity in 1usize..6,
    ) {
        let mut fixture = TempMapped::with_options(StoreOptions::new().cache_capacity(capacity));
        let mut expected = BTreeMap::new();
        for (key, value) in writes {
            fixture.set(key.clone(), value.clone()).unwrap();
            expected.insert(key, value);
        }

        fixture.flush(true).unwrap();
        prop_assert_eq!(fixture.len().unwrap(), expected.len());
        for (key, value) in &expected {
            prop_assert_eq!(&fixture.get(key).unwrap(), value);
        }
    }
}
