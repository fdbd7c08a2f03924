//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use serde_json::Value;

/// Serializes a JSON value into its canonical string form: object keys
/// sorted lexicographically, arrays in order, no whitespace.
///
/// Fingerprints embed JSON payloads (e.g. the dataplane event of a
/// traffic injection) by canonical string so that equality is stable
/// across record and replay runs.
pub fn to_canonical_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s).unwrap(),
        Value::Array(array) => {
            let items = array
                .iter()
                .map(to_canonical_string)
                .collect::<Vec<_>>()
                .join(",");
            format!("[{items}]")
        }
        Value::Object(map) => {
            let sorted = map
                .iter()
                .map(|(k, v)| (k, to_canonical_string(v)))
                .collect::<BTreeMap<_, _>>();
            let items = sorted
                .into_iter()
                .map(|(k, v)| {
                    format!("{}:{}", serde_json::to_string(k).unwrap(), v)
                })
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{items}}}")
        }
    }
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_sorted_keys() {
        let value = json!({"b": 1, "a": [2, {"d": null, "c": "x"}]});
        assert_eq!(
            to_canonical_string(&value),
            r#"{"a":[2,{"c":"x","d":null}],"b":1}"#
        );
    }
}
