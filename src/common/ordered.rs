//! Order-preserving map deserialization
//!
//! Both the endpoint table in the config file and the step map in a test
//! plan are written as maps, but their order (and, for plans, repeated keys)
//! is meaningful. Deserializing into a `HashMap` would lose both, so these
//! helpers collect the entries into a `Vec` in document order.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};

/// Deserialize a map into its `(key, value)` entries in document order,
/// keeping repeated keys. `null` yields an empty list.
pub fn entries<'de, D, V>(deserializer: D) -> std::result::Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct EntriesVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, V>()? {
                out.push((key, value));
            }
            Ok(out)
        }

        fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: serde::de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(EntriesVisitor(PhantomData))
}

/// Deserialize a nullable field, mapping `null` to the type's default
pub fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "entries", default)]
        items: Vec<(String, String)>,
    }

    #[test]
    fn test_entries_keep_document_order_and_duplicates() {
        let holder: Holder =
            serde_json::from_str(r#"{"items": {"b": "1", "a": "2", "b": "3"}}"#).unwrap();
        assert_eq!(
            holder.items,
            vec![
                ("b".to_string(), "1".to_string()),
                ("a".to_string(), "2".to_string()),
                ("b".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_entries_null_is_empty() {
        let holder: Holder = serde_json::from_str(r#"{"items": null}"#).unwrap();
        assert!(holder.items.is_empty());
    }

    #[test]
    fn test_entries_from_toml_table() {
        let holder: Holder = toml::from_str("[items]\nzeta = \"z\"\nalpha = \"a\"\n").unwrap();
        assert_eq!(holder.items.len(), 2);
        assert!(holder.items.iter().any(|(k, v)| k == "zeta" && v == "z"));
    }
}
