//! Package merging
//!
//! Folds the reserved top-level `packages` mapping into the main document.
//! At every level the main document wins: mappings merge recursively,
//! sequences concatenate with the main elements first, and for scalars or
//! mismatched types the main value is kept.

use indexmap::IndexMap;
use tracing::warn;

use crate::value::Value;

/// Merge the extracted `packages` value into the main mapping.
///
/// Package iteration order does not affect the result for well-formed
/// input because conflicts always resolve in favor of what is already in
/// the main mapping.
pub(crate) fn merge_packages(
    mut main: IndexMap<String, Value>,
    packages: Option<Value>,
) -> IndexMap<String, Value> {
    let Some(packages) = packages else {
        return main;
    };

    let Value::Mapping(packages) = packages else {
        warn!(
            "'packages' is not a mapping, got a {}",
            packages.type_name()
        );
        return main;
    };

    for (name, package) in packages {
        match package {
            Value::Mapping(package) => merge_elements(&mut main, package),
            other => warn!("package '{}' is not a mapping, got a {}", name, other.type_name()),
        }
    }
    main
}

fn merge_elements(main: &mut IndexMap<String, Value>, package: IndexMap<String, Value>) {
    for (key, value) in package {
        if let Some(existing) = main.get_mut(&key) {
            match (existing, value) {
                (Value::Mapping(main_map), Value::Mapping(package_map)) => {
                    merge_elements(main_map, package_map);
                }
                (Value::Sequence(main_seq), Value::Sequence(package_seq)) => {
                    main_seq.extend(package_seq);
                }
                // scalar or mismatched types: the main value is kept
                _ => {}
            }
        } else {
            main.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: Vec<(&str, Value)>) -> Value {
        Value::Mapping(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn unwrap_mapping(value: Value) -> IndexMap<String, Value> {
        match value {
            Value::Mapping(m) => m,
            other => panic!("expected a mapping, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_no_packages_is_identity() {
        let main = unwrap_mapping(mapping(vec![("a", Value::Integer(1))]));
        let merged = merge_packages(main.clone(), None);
        assert_eq!(merged, main);
    }

    #[test]
    fn test_disjoint_keys_are_added() {
        let main = unwrap_mapping(mapping(vec![("a", Value::Integer(1))]));
        let packages = mapping(vec![("pkg", mapping(vec![("b", Value::Integer(2))]))]);

        let merged = merge_packages(main, Some(packages));
        assert_eq!(merged.get("a"), Some(&Value::Integer(1)));
        assert_eq!(merged.get("b"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_main_scalar_wins() {
        let main = unwrap_mapping(mapping(vec![("a", Value::String("main".into()))]));
        let packages = mapping(vec![("pkg", mapping(vec![("a", Value::String("pkg".into()))]))]);

        let merged = merge_packages(main, Some(packages));
        assert_eq!(merged.get("a"), Some(&Value::String("main".into())));
    }

    #[test]
    fn test_main_wins_on_type_mismatch() {
        let main = unwrap_mapping(mapping(vec![("a", Value::String("main".into()))]));
        let packages = mapping(vec![(
            "pkg",
            mapping(vec![("a", mapping(vec![("nested", Value::Integer(1))]))]),
        )]);

        let merged = merge_packages(main, Some(packages));
        assert_eq!(merged.get("a"), Some(&Value::String("main".into())));
    }

    #[test]
    fn test_mappings_merge_recursively() {
        let main = unwrap_mapping(mapping(vec![(
            "things",
            mapping(vec![
                ("t1", mapping(vec![("label", Value::String("A".into()))])),
                (
                    "t4",
                    mapping(vec![
                        ("label", Value::String("main".into())),
                        (
                            "config",
                            mapping(vec![
                                ("mainprop", Value::String("m".into())),
                                ("commonprop", Value::String("overridden".into())),
                            ]),
                        ),
                    ]),
                ),
            ]),
        )]));

        let packages = mapping(vec![(
            "p",
            mapping(vec![(
                "things",
                mapping(vec![
                    (
                        "t4",
                        mapping(vec![
                            ("label", Value::String("pkg".into())),
                            (
                                "config",
                                mapping(vec![
                                    ("pkgprop", Value::String("p".into())),
                                    ("commonprop", Value::String("pkg".into())),
                                ]),
                            ),
                        ]),
                    ),
                    ("t2", mapping(vec![("label", Value::String("B".into()))])),
                ]),
            )]),
        )]);

        let merged = Value::Mapping(merge_packages(main, Some(packages)));

        assert_eq!(
            merged.get_nested(&["things", "t1", "label"]).and_then(Value::as_str),
            Some("A")
        );
        assert_eq!(
            merged.get_nested(&["things", "t2", "label"]).and_then(Value::as_str),
            Some("B")
        );
        assert_eq!(
            merged.get_nested(&["things", "t4", "label"]).and_then(Value::as_str),
            Some("main")
        );
        assert_eq!(
            merged
                .get_nested(&["things", "t4", "config", "mainprop"])
                .and_then(Value::as_str),
            Some("m")
        );
        assert_eq!(
            merged
                .get_nested(&["things", "t4", "config", "pkgprop"])
                .and_then(Value::as_str),
            Some("p")
        );
        assert_eq!(
            merged
                .get_nested(&["things", "t4", "config", "commonprop"])
                .and_then(Value::as_str),
            Some("overridden")
        );
    }

    #[test]
    fn test_sequences_concatenate_main_first() {
        let main = unwrap_mapping(mapping(vec![(
            "list",
            mapping(vec![(
                "test1",
                Value::Sequence(vec![Value::String("main1".into())]),
            )]),
        )]));
        let packages = mapping(vec![(
            "p",
            mapping(vec![(
                "list",
                mapping(vec![(
                    "test1",
                    Value::Sequence(vec![Value::String("package1".into())]),
                )]),
            )]),
        )]);

        let merged = Value::Mapping(merge_packages(main, Some(packages)));
        let list = merged
            .get_nested(&["list", "test1"])
            .and_then(Value::as_sequence)
            .unwrap();
        let texts: Vec<_> = list.iter().filter_map(Value::as_str).collect();
        assert_eq!(texts, vec!["main1", "package1"]);
    }

    #[test]
    fn test_non_mapping_package_is_skipped() {
        let main = unwrap_mapping(mapping(vec![("a", Value::Integer(1))]));
        let packages = mapping(vec![
            ("bad", Value::String("not a mapping".into())),
            ("good", mapping(vec![("b", Value::Integer(2))])),
        ]);

        let merged = merge_packages(main, Some(packages));
        assert_eq!(merged.get("a"), Some(&Value::Integer(1)));
        assert_eq!(merged.get("b"), Some(&Value::Integer(2)));
        assert!(!merged.contains_key("bad"));
    }

    #[test]
    fn test_non_mapping_packages_value_is_ignored() {
        let main = unwrap_mapping(mapping(vec![("a", Value::Integer(1))]));
        let merged = merge_packages(main, Some(Value::Sequence(vec![])));
        assert_eq!(merged.len(), 1);
    }
}
