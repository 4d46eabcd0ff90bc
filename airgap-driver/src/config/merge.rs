//! Precedence merge over generic YAML mappings.
//!
//! Hand-edited config files may carry keys the typed `ClusterConfig` does not
//! know about, so merging happens on `serde_yaml::Mapping` rather than on
//! the struct.

use serde_yaml::{Mapping, Value};

/// Merge `user` over `defaults`.
///
/// Rules:
/// - a key present in `user` wins, whatever its value
/// - a key only in `defaults` is kept
/// - when both sides hold a mapping under the same key, the two mappings are
///   merged with these same rules, so a partial user section only replaces
///   the fields it names
/// - sequences and scalars are replaced wholesale, never merged element-wise
pub fn merge_mappings(defaults: Mapping, user: Mapping) -> Mapping {
    let mut merged = defaults;

    for (key, user_value) in user {
        let value = match (merged.remove(&key), user_value) {
            (Some(Value::Mapping(default_section)), Value::Mapping(user_section)) => {
                Value::Mapping(merge_mappings(default_section, user_section))
            }
            (_, user_value) => user_value,
        };
        merged.insert(key, value);
    }

    merged
}

/// Recursively order mapping keys so serialized output is byte-stable.
pub fn sort_keys(value: Value) -> Value {
    match value {
        Value::Mapping(mapping) => {
            let mut entries: Vec<(Value, Value)> = mapping.into_iter().collect();
            entries.sort_by_cached_key(|(key, _)| key_text(key));
            Value::Mapping(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect(),
            )
        }
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_user_keys_win() {
        let defaults = mapping("data-dir: /var/lib/rancher/k3s\nwrite-kubeconfig-mode: '0644'\n");
        let user = mapping("write-kubeconfig-mode: '0600'\n");

        let merged = merge_mappings(defaults, user);
        assert_eq!(merged.get("write-kubeconfig-mode").and_then(Value::as_str), Some("0600"));
        assert_eq!(
            merged.get("data-dir").and_then(Value::as_str),
            Some("/var/lib/rancher/k3s")
        );
    }

    #[test]
    fn test_user_sequence_replaces_default_sequence() {
        let defaults = mapping("disable: [metrics-server]\n");
        let user = mapping("disable: [traefik, servicelb, traefik]\n");

        let merged = merge_mappings(defaults, user);
        assert_eq!(
            merged.get("disable").unwrap(),
            &serde_yaml::from_str::<Value>("[traefik, servicelb, traefik]").unwrap()
        );
    }

    #[test]
    fn test_unknown_user_keys_are_kept() {
        let defaults = mapping("data-dir: /var/lib/rancher/k3s\n");
        let user = mapping("node-label: [tier=edge]\ntls-san: [10.0.0.1]\n");

        let merged = merge_mappings(defaults, user);
        assert_eq!(merged.len(), 3);
        assert!(merged.contains_key("node-label"));
        assert!(merged.contains_key("tls-san"));
    }

    #[test]
    fn test_nested_sections_merge_field_by_field() {
        let defaults = mapping("etcd:\n  snapshot-retention: 5\n  snapshot-dir: /snapshots\n");
        let user = mapping("etcd:\n  snapshot-retention: 10\n");

        let merged = merge_mappings(defaults, user);
        let etcd = merged.get("etcd").unwrap().as_mapping().unwrap();
        assert_eq!(etcd.get("snapshot-retention").and_then(Value::as_u64), Some(10));
        assert_eq!(etcd.get("snapshot-dir").and_then(Value::as_str), Some("/snapshots"));
    }

    #[test]
    fn test_user_scalar_replaces_default_section() {
        let defaults = mapping("etcd:\n  snapshot-retention: 5\n");
        let user = mapping("etcd: disabled\n");

        let merged = merge_mappings(defaults, user);
        assert_eq!(merged.get("etcd").and_then(Value::as_str), Some("disabled"));
    }

    #[test]
    fn test_explicit_null_in_user_file_wins() {
        let defaults = mapping("write-kubeconfig-mode: '0644'\n");
        let user = mapping("write-kubeconfig-mode: null\n");

        let merged = merge_mappings(defaults, user);
        assert_eq!(merged.get("write-kubeconfig-mode").unwrap(), &Value::Null);
    }

    #[test]
    fn test_sort_keys_orders_nested_mappings() {
        let value: Value = serde_yaml::from_str("zeta: 1\nalpha:\n  b: 2\n  a: 1\n").unwrap();
        let sorted = serde_yaml::to_string(&sort_keys(value)).unwrap();
        assert_eq!(sorted, "alpha:\n  a: 1\n  b: 2\nzeta: 1\n");
    }

    proptest! {
        #[test]
        fn property_user_value_always_wins(
            defaults in proptest::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,8}", 0..8),
            user in proptest::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,8}", 0..8),
        ) {
            let to_mapping = |m: &std::collections::BTreeMap<String, String>| -> Mapping {
                m.iter()
                    .map(|(k, v)| (Value::String(k.clone()), Value::String(v.clone())))
                    .collect()
            };

            let merged = merge_mappings(to_mapping(&defaults), to_mapping(&user));

            for (key, value) in &user {
                prop_assert_eq!(merged.get(key.as_str()), Some(&Value::String(value.clone())));
            }
            for (key, value) in &defaults {
                if !user.contains_key(key) {
                    prop_assert_eq!(merged.get(key.as_str()), Some(&Value::String(value.clone())));
                }
            }
            let expected_len = defaults.keys().chain(user.keys()).collect::<std::collections::BTreeSet<_>>().len();
            prop_assert_eq!(merged.len(), expected_len);
        }
    }
}
