//! Property-based tests for multivalued equivalence and the value codec.
//!
//! Laws checked:
//! - a scalar equals its singleton set, in both argument orders
//! - absent equals the empty set
//! - equivalence is symmetric
//! - decode(encode(v)) == v

use acctsync_types::{decode_value, encode_value, multivalued_equals, FieldValue};
use proptest::prelude::*;

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn word_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9@._-]{0,16}").unwrap()
}

fn value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        word_strategy().prop_map(FieldValue::Text),
        any::<i64>().prop_map(FieldValue::Integer),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(FieldValue::Bytes),
        prop::collection::btree_set(word_strategy(), 0..5).prop_map(FieldValue::Set),
    ]
}

fn optional_value_strategy() -> impl Strategy<Value = Option<FieldValue>> {
    prop::option::of(value_strategy())
}

// =============================================================================
// EQUIVALENCE PROPERTIES
// =============================================================================

mod equivalence_properties {
    use super::*;

    proptest! {
        #[test]
        fn scalar_equals_singleton(s in word_strategy()) {
            let scalar = FieldValue::Text(s.clone());
            let single = FieldValue::set([s]);
            prop_assert!(multivalued_equals(Some(&scalar), Some(&single)));
            prop_assert!(multivalued_equals(Some(&single), Some(&scalar)));
        }

        #[test]
        fn distinct_singletons_differ(a in word_strategy(), b in word_strategy()) {
            prop_assume!(a != b);
            let sa = FieldValue::set([a]);
            let sb = FieldValue::set([b]);
            prop_assert!(!multivalued_equals(Some(&sa), Some(&sb)));
        }

        #[test]
        fn is_symmetric(a in optional_value_strategy(), b in optional_value_strategy()) {
            prop_assert_eq!(
                multivalued_equals(a.as_ref(), b.as_ref()),
                multivalued_equals(b.as_ref(), a.as_ref())
            );
        }

        #[test]
        fn is_reflexive(a in optional_value_strategy()) {
            prop_assert!(multivalued_equals(a.as_ref(), a.as_ref()));
        }
    }

    #[test]
    fn absent_equals_empty_set() {
        let empty = FieldValue::set(Vec::<String>::new());
        assert!(multivalued_equals(None, Some(&empty)));
    }
}

// =============================================================================
// CODEC PROPERTIES
// =============================================================================

mod codec_properties {
    use super::*;

    proptest! {
        #[test]
        fn decode_inverts_encode(v in value_strategy()) {
            let decoded = decode_value(&encode_value(&v)).unwrap();
            prop_assert_eq!(decoded, v);
        }
    }
}
