//! Merging of parameter trains into complete parameter sets.
//!
//! A parameter train is an ordered list of parameter sets: first the full
//! defaults, then previously found parameters, then whatever is being tried
//! in the current trial. Later sets override earlier ones.

use qopt_types::{train_error, ParamSet, ParamValue, QoptResult};
use serde_json::Value;
use std::collections::BTreeSet;

/// Merge a parameter train left to right.
///
/// The first set is the authoritative key set; every later set must only
/// contain keys that appear in it. Inputs are left untouched.
pub fn merge_param_train(param_train: &[ParamSet]) -> QoptResult<ParamSet> {
    let (first, rest) = param_train
        .split_first()
        .ok_or_else(|| train_error!("param train must contain at least one parameter set"))?;

    for (position, params) in rest.iter().enumerate() {
        let unknown: BTreeSet<&str> = params
            .keys()
            .filter(|k| !first.contains_key(*k))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            let mut known: Vec<&str> = first.keys().map(String::as_str).collect();
            known.sort_unstable();
            return Err(train_error!(
                "parameters must be a subset of the default parameters: {:?} at position {} not in {:?}",
                unknown,
                position + 1,
                known
            ));
        }
    }

    let mut merged = ParamSet::with_capacity(first.len());
    for params in param_train {
        merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    Ok(merged)
}

/// Merge a train given as raw JSON values. Every element must be a mapping of
/// scalar values.
pub fn merge_param_values(param_train: &[Value]) -> QoptResult<ParamSet> {
    let train = param_train
        .iter()
        .enumerate()
        .map(|(position, raw)| {
            let fields = raw.as_object().ok_or_else(|| {
                train_error!("element {position} must be a mapping, got {raw}")
            })?;
            fields
                .iter()
                .map(|(key, value)| {
                    ParamValue::from_json(value)
                        .map(|v| (key.clone(), v))
                        .ok_or_else(|| {
                            train_error!("element {position} has a non-scalar value for '{key}': {value}")
                        })
                })
                .collect::<QoptResult<ParamSet>>()
        })
        .collect::<QoptResult<Vec<_>>>()?;

    merge_param_train(&train)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qopt_types::QoptError;
    use serde_json::json;

    fn params(pairs: &[(&str, ParamValue)]) -> ParamSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn single_empty_set() {
        assert_eq!(merge_param_train(&[ParamSet::new()]).unwrap(), ParamSet::new());
    }

    #[test]
    fn later_sets_override() {
        let defaults = params(&[("a", ParamValue::Int(1)), ("b", ParamValue::Int(2))]);
        let proposal = params(&[("a", ParamValue::Int(3))]);
        let merged = merge_param_train(&[defaults.clone(), proposal]).unwrap();
        assert_eq!(merged, params(&[("a", ParamValue::Int(3)), ("b", ParamValue::Int(2))]));
        // inputs are not mutated
        assert_eq!(defaults.get("a"), Some(&ParamValue::Int(1)));
    }

    #[test]
    fn most_recent_override_wins() {
        let train = [
            params(&[("key1", "value1".into()), ("key2", "value2".into())]),
            params(&[("key1", "value1.1".into())]),
            params(&[("key1", "value1.2".into()), ("key2", "value2.1".into())]),
            params(&[("key2", "value2.2".into())]),
        ];
        let merged = merge_param_train(&train).unwrap();
        assert_eq!(merged.get("key1"), Some(&ParamValue::from("value1.2")));
        assert_eq!(merged.get("key2"), Some(&ParamValue::from("value2.2")));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn empty_train_fails() {
        let err = merge_param_train(&[]).unwrap_err();
        assert!(matches!(err, QoptError::InvalidParameterTrain { .. }));
    }

    #[test]
    fn keys_outside_defaults_fail() {
        let train = [params(&[("a", ParamValue::Int(1))]), params(&[("c", ParamValue::Int(3))])];
        let err = merge_param_train(&train).unwrap_err();
        match err {
            QoptError::InvalidParameterTrain { reason } => {
                assert!(reason.contains("\"c\""), "reason: {reason}");
                assert!(reason.contains("subset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn json_train() {
        let merged = merge_param_values(&[
            json!({"a": 1, "b": "x"}),
            json!({"b": "y"}),
            json!({}),
        ])
        .unwrap();
        assert_eq!(merged, params(&[("a", ParamValue::Int(1)), ("b", "y".into())]));
    }

    #[test]
    fn json_train_rejects_non_mappings() {
        let err = merge_param_values(&[json!({"a": 1}), json!([1, 2])]).unwrap_err();
        assert!(matches!(err, QoptError::InvalidParameterTrain { ref reason } if reason.contains("element 1")));

        let err = merge_param_values(&[json!({"a": {"nested": true}})]).unwrap_err();
        assert!(matches!(err, QoptError::InvalidParameterTrain { .. }));

        let err = merge_param_values(&[]).unwrap_err();
        assert!(matches!(err, QoptError::InvalidParameterTrain { .. }));
    }
}
