//! Property-based test generators using proptest.
//!
//! Provides strategies for keys, property values and entities that the
//! codecs must accept. Every generated value survives an encode/decode
//! round trip: timestamps have whole seconds, floats are finite, ratings
//! and points are in range, and lists are homogeneous.

use chrono::{DateTime, NaiveDateTime};
use proptest::prelude::*;
use synkit_codec::{Entity, GeoPt, Key, PathElement, Principal, Properties, TypeTag, Value};
use synkit_sync_engine::SYNC_INFO_KIND;

/// Application id used by the generated keys unless stated otherwise.
pub const TEST_APP_ID: &str = "test";

/// Strategy for namespaces, `None` for the default one.
pub fn namespace_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z][a-z0-9_]{0,7}")
}

/// Strategy for entity kinds clients may use.
pub fn kind_strategy() -> impl Strategy<Value = String> {
    "[A-Z][A-Za-z0-9]{0,11}".prop_filter("reserved kind", |kind| kind != SYNC_INFO_KIND)
}

/// Strategy for key names, including whitespace and punctuation.
pub fn name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.:/-]{1,16}"
}

/// Strategy for complete path elements.
pub fn path_element_strategy() -> impl Strategy<Value = PathElement> {
    prop_oneof![
        (kind_strategy(), 1..=u64::MAX).prop_map(|(kind, id)| PathElement::new(kind, id)),
        (kind_strategy(), name_strategy()).prop_map(|(kind, name)| PathElement::new(kind, name)),
    ]
}

/// Strategy for complete keys of `app_id` with one to `max_depth` elements.
pub fn key_strategy(app_id: &'static str, max_depth: usize) -> impl Strategy<Value = Key> {
    (
        namespace_strategy(),
        prop::collection::vec(path_element_strategy(), 1..=max_depth.max(1)),
    )
        .prop_filter_map("valid key", move |(namespace, path)| {
            Key::new(app_id, namespace, path).ok()
        })
}

/// Strategy for fully named keys, the kind whose parents resolve without
/// a sync record.
pub fn named_key_strategy(app_id: &'static str, max_depth: usize) -> impl Strategy<Value = Key> {
    (
        namespace_strategy(),
        prop::collection::vec(
            (kind_strategy(), name_strategy()).prop_map(|(kind, name)| PathElement::new(kind, name)),
            1..=max_depth.max(1),
        ),
    )
        .prop_filter_map("valid key", move |(namespace, path)| {
            Key::new(app_id, namespace, path).ok()
        })
}

/// Strategy for timestamps with whole seconds between 1970 and 2100.
pub fn timestamp_strategy() -> impl Strategy<Value = NaiveDateTime> {
    (0i64..4_102_444_800).prop_filter_map("representable", |secs| {
        DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
    })
}

/// Strategy for in-range geographical points.
pub fn geo_pt_strategy() -> impl Strategy<Value = GeoPt> {
    (-90.0f64..=90.0, -180.0f64..=180.0).prop_filter_map("in range", |(lat, lon)| {
        GeoPt::new(lat, lon).ok()
    })
}

/// Strategy for finite floats.
pub fn finite_float_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        any::<f64>().prop_filter("finite", |f| f.is_finite()),
        Just(0.0),
        Just(1.5),
        Just(-273.15),
    ]
}

/// Strategy for a scalar value of the given tag.
///
/// `key` values reference keys of `app_id`.
pub fn scalar_strategy(tag: TypeTag, app_id: &'static str) -> BoxedStrategy<Value> {
    let text = ".{0,24}";
    match tag {
        TypeTag::Null => Just(Value::Null).boxed(),
        TypeTag::String => text.prop_map(Value::String).boxed(),
        TypeTag::Text => ".{0,256}".prop_map(Value::Text).boxed(),
        TypeTag::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        TypeTag::Int => any::<i64>().prop_map(Value::Int).boxed(),
        TypeTag::Float => finite_float_strategy().prop_map(Value::Float).boxed(),
        TypeTag::ByteString => prop::collection::vec(any::<u8>(), 0..64)
            .prop_map(Value::ByteString)
            .boxed(),
        TypeTag::Blob => prop::collection::vec(any::<u8>(), 0..512)
            .prop_map(Value::Blob)
            .boxed(),
        TypeTag::When => timestamp_strategy().prop_map(Value::Timestamp).boxed(),
        TypeTag::Key => key_strategy(app_id, 3).prop_map(Value::Key).boxed(),
        TypeTag::User => "[a-z]{1,8}@[a-z]{1,8}\\.com"
            .prop_map(|email| Value::User(Principal::new(email)))
            .boxed(),
        TypeTag::Email => "[a-z]{1,8}@[a-z]{1,8}\\.org".prop_map(Value::Email).boxed(),
        TypeTag::Im => text.prop_map(Value::Im).boxed(),
        TypeTag::PhoneNumber => "\\+?[0-9 -]{3,15}".prop_map(Value::PhoneNumber).boxed(),
        TypeTag::PostalAddress => text.prop_map(Value::PostalAddress).boxed(),
        TypeTag::Rating => (0u8..=100).prop_map(Value::Rating).boxed(),
        TypeTag::GeoPt => geo_pt_strategy().prop_map(Value::GeoPt).boxed(),
        TypeTag::Category => text.prop_map(Value::Category).boxed(),
        TypeTag::Link => "https://[a-z]{1,10}\\.example/[a-z0-9]{0,10}"
            .prop_map(Value::Link)
            .boxed(),
        TypeTag::BlobKey => "[A-Za-z0-9_-]{1,32}".prop_map(Value::BlobKey).boxed(),
    }
}

/// Strategy for any type tag.
pub fn type_tag_strategy() -> impl Strategy<Value = TypeTag> {
    prop::sample::select(TypeTag::ALL.to_vec())
}

/// Strategy for scalar values of any tag.
pub fn scalar_value_strategy(app_id: &'static str) -> impl Strategy<Value = Value> {
    type_tag_strategy().prop_flat_map(move |tag| scalar_strategy(tag, app_id))
}

/// Strategy for homogeneous lists, possibly empty.
///
/// `null` elements are never generated inside lists.
pub fn list_value_strategy(app_id: &'static str) -> impl Strategy<Value = Value> {
    type_tag_strategy()
        .prop_filter("lists hold non-null scalars", |tag| *tag != TypeTag::Null)
        .prop_flat_map(move |tag| prop::collection::vec(scalar_strategy(tag, app_id), 0..6))
        .prop_map(Value::List)
}

/// Strategy for any property value.
pub fn value_strategy(app_id: &'static str) -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => scalar_value_strategy(app_id),
        1 => list_value_strategy(app_id),
    ]
}

/// Strategy for property names.
pub fn property_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,15}"
}

/// Strategy for property maps with up to `max` entries.
pub fn properties_strategy(app_id: &'static str, max: usize) -> impl Strategy<Value = Properties> {
    prop::collection::btree_map(property_name_strategy(), value_strategy(app_id), 0..=max)
}

/// Strategy for entities of `app_id`.
pub fn entity_strategy(app_id: &'static str) -> impl Strategy<Value = Entity> {
    (key_strategy(app_id, 3), properties_strategy(app_id, 8))
        .prop_map(|(key, properties)| Entity::with_properties(key, properties))
}

/// One client action against a single remote key.
#[derive(Debug, Clone)]
pub enum SyncStep {
    /// Send the current content with the last known version.
    Sync {
        /// Property set to a new value before sending.
        property: String,
        /// The new value.
        value: i64,
    },
    /// Resend unchanged content.
    Resend,
    /// Send with a version older than the last known one.
    Stale,
    /// Delete the entity.
    Delete,
}

/// Strategy for a client step.
pub fn sync_step_strategy() -> impl Strategy<Value = SyncStep> {
    prop_oneof![
        4 => ("[a-c]", any::<i64>()).prop_map(|(property, value)| SyncStep::Sync { property, value }),
        2 => Just(SyncStep::Resend),
        1 => Just(SyncStep::Stale),
        1 => Just(SyncStep::Delete),
    ]
}

/// Strategy for a sequence of client steps.
pub fn sync_script_strategy(
    min_steps: usize,
    max_steps: usize,
) -> impl Strategy<Value = Vec<SyncStep>> {
    prop::collection::vec(sync_step_strategy(), min_steps..max_steps)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn keys_are_complete(key in key_strategy(TEST_APP_ID, 4)) {
            prop_assert!(key.is_complete());
            prop_assert_eq!(key.app_id(), TEST_APP_ID);
            prop_assert!(key.depth() <= 4);
        }

        #[test]
        fn named_keys_are_fully_named(key in named_key_strategy(TEST_APP_ID, 3)) {
            prop_assert!(key.is_fully_named());
        }

        #[test]
        fn scalars_match_their_tag(
            (tag, value) in type_tag_strategy()
                .prop_flat_map(|tag| (Just(tag), scalar_strategy(tag, TEST_APP_ID)))
        ) {
            prop_assert_eq!(value.scalar_tag(), Some(tag));
        }

        #[test]
        fn lists_are_homogeneous(value in list_value_strategy(TEST_APP_ID)) {
            let Value::List(items) = &value else {
                panic!("not a list");
            };
            let tag = value.type_tag();
            for item in items {
                prop_assert_eq!(item.scalar_tag(), Some(tag));
            }
        }

        #[test]
        fn timestamps_have_whole_seconds(t in timestamp_strategy()) {
            prop_assert_eq!(t.nanosecond(), 0);
        }
    }
}
