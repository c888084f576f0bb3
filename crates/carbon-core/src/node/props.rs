use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Namespace prefix for properties that only matter to the running editor.
pub const LOCAL: &str = "local";
/// Namespace prefix for properties that persist with the document.
pub const REMOTE: &str = "remote";

/// Hierarchical property bag attached to every node.
///
/// Keys are slash-separated paths (`"remote/html/checked"`); the leading
/// segment is the namespace — `local/` values never leave the process,
/// `remote/` values round-trip through the transport form. Internally the
/// bag is flat (full path → value) so partial updates and their inverses are
/// cheap to compute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeProps {
    values: BTreeMap<String, Value>,
}

impl NodeProps {
    pub fn new() -> Self {
        NodeProps::default()
    }

    /// Builds a bag from a nested JSON object, flattening it into paths.
    /// Top-level keys that are not a known namespace are treated as
    /// `remote/` properties.
    pub fn from_json(obj: &Value) -> Self {
        let mut props = NodeProps::new();
        if let Value::Object(map) = obj {
            for (key, value) in map {
                let path = if key == LOCAL
                    || key == REMOTE
                    || key.starts_with("local/")
                    || key.starts_with("remote/")
                {
                    key.clone()
                } else {
                    format!("{REMOTE}/{key}")
                };
                flatten(&path, value, &mut props.values);
            }
        }
        props
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.values.get(path)
    }

    /// Sets one path; `Value::Null` deletes.
    pub fn set(&mut self, path: &str, value: Value) {
        if value.is_null() {
            self.values.remove(path);
        } else {
            self.values.insert(path.to_string(), value);
        }
    }

    /// Applies a partial update (possibly nested) and returns the prior
    /// values at every touched path, with `Value::Null` standing in for
    /// "was absent". Feeding the returned map back through `merge`
    /// restores the original bag — the inverse used by undo.
    pub fn merge(&mut self, partial: &Map<String, Value>) -> Map<String, Value> {
        let mut flat = BTreeMap::new();
        for (key, value) in partial {
            let path = if key == LOCAL
                || key == REMOTE
                || key.starts_with("local/")
                || key.starts_with("remote/")
            {
                key.clone()
            } else {
                format!("{REMOTE}/{key}")
            };
            flatten(&path, value, &mut flat);
        }
        let mut before = Map::new();
        for (path, value) in flat {
            let prior = self.values.get(&path).cloned().unwrap_or(Value::Null);
            before.insert(path.clone(), prior);
            self.set(&path, value);
        }
        before
    }

    /// Properties that belong in the persisted transport form.
    pub fn remote_json(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for (path, value) in &self.values {
            if path == REMOTE || path.starts_with("remote/") {
                out.insert(path.clone(), value.clone());
            }
        }
        out
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten(&format!("{prefix}/{key}"), child, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_defaults_to_remote_namespace() {
        let props = NodeProps::from_json(&json!({ "html": { "placeholder": "Untitled" } }));
        assert_eq!(
            props.get("remote/html/placeholder"),
            Some(&json!("Untitled"))
        );
    }

    #[test]
    fn explicit_namespaces_are_kept() {
        let props = NodeProps::from_json(&json!({ "local/ui/opened": true }));
        assert_eq!(props.get("local/ui/opened"), Some(&json!(true)));
    }

    #[test]
    fn merge_returns_inverse_snapshot() {
        let mut props = NodeProps::from_json(&json!({ "state": { "checked": false } }));
        let partial = json!({ "remote/state/checked": true })
            .as_object()
            .cloned()
            .unwrap();

        let before = props.merge(&partial);
        assert_eq!(props.get("remote/state/checked"), Some(&json!(true)));

        // Applying the snapshot rolls the bag back.
        props.merge(&before);
        assert_eq!(props.get("remote/state/checked"), Some(&json!(false)));
    }

    #[test]
    fn merging_null_removes_and_inverts_to_reinsert() {
        let mut props = NodeProps::from_json(&json!({ "kind": "callout" }));
        let partial = json!({ "remote/kind": null }).as_object().cloned().unwrap();

        let before = props.merge(&partial);
        assert_eq!(props.get("remote/kind"), None);

        props.merge(&before);
        assert_eq!(props.get("remote/kind"), Some(&json!("callout")));
    }

    #[test]
    fn remote_json_excludes_local_values() {
        let props = NodeProps::from_json(&json!({
            "local/ui/opened": true,
            "remote/state/checked": false,
        }));
        let remote = props.remote_json();
        assert!(remote.contains_key("remote/state/checked"));
        assert!(!remote.contains_key("local/ui/opened"));
    }
}
