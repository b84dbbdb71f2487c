//! Pure helpers manipulating the JSON document tree.

use serde_json::{Map, Value};

/// Borrow the value stored at `segments`, if any.
pub(crate) fn lookup<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

/// Store `value` at `segments`. Nulls delete, and objects left empty are pruned.
pub(crate) fn write(root: &mut Value, segments: &[String], value: Value) {
    let value = prune(value);
    let Some((last, parents)) = segments.split_last() else {
        *root = value.unwrap_or_else(|| Value::Object(Map::new()));
        return;
    };

    match value {
        Some(value) => {
            let mut node = root;
            for segment in parents {
                node = as_object(node)
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
            }
            as_object(node).insert(last.clone(), value);
        }
        None => {
            remove(root, segments);
        }
    }
}

/// Whether a write at `a` can change what a reader at `b` observes.
pub(crate) fn overlaps(a: &[String], b: &[String]) -> bool {
    a.iter().zip(b).all(|(left, right)| left == right)
}

fn as_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        unreachable!("node was just replaced by an object");
    };
    map
}

/// Remove the entry at `segments`; returns whether `node` is now an empty object.
fn remove(node: &mut Value, segments: &[String]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return false;
    };
    let Value::Object(map) = node else {
        return false;
    };

    if rest.is_empty() {
        map.remove(first);
    } else if let Some(child) = map.get_mut(first) {
        if remove(child, rest) {
            map.remove(first);
        }
    }
    map.is_empty()
}

/// Strip nulls and empty objects; `None` means "nothing to store".
fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, value)| prune(value).map(|value| (key, value)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn segs(path: &str) -> Vec<String> {
        path.split('/').map(str::to_string).collect()
    }

    #[test]
    fn write_creates_intermediate_objects() {
        let mut root = json!({});
        write(&mut root, &segs("rooms/ABCD/status"), json!("lobby"));
        assert_eq!(root, json!({"rooms": {"ABCD": {"status": "lobby"}}}));
    }

    #[test]
    fn null_write_deletes_and_prunes_parents() {
        let mut root = json!({"rooms": {"ABCD": {"reactions": {"e1": {"emoji": "x"}}, "host": "h"}}});
        write(&mut root, &segs("rooms/ABCD/reactions/e1"), Value::Null);
        assert_eq!(root, json!({"rooms": {"ABCD": {"host": "h"}}}));
    }

    #[test]
    fn nested_nulls_are_not_stored() {
        let mut root = json!({});
        write(&mut root, &segs("a"), json!({"b": null, "c": 1, "d": {"e": null}}));
        assert_eq!(root, json!({"a": {"c": 1}}));
    }

    #[test]
    fn lookup_walks_objects_only() {
        let root = json!({"a": {"b": [1, 2]}});
        assert_eq!(lookup(&root, &segs("a/b")), Some(&json!([1, 2])));
        assert_eq!(lookup(&root, &segs("a/b/0")), None);
        assert_eq!(lookup(&root, &[]), Some(&root));
    }

    #[test]
    fn overlap_is_a_prefix_relation_in_both_directions() {
        assert!(overlaps(&segs("rooms/ABCD"), &segs("rooms/ABCD/players/p1")));
        assert!(overlaps(&segs("rooms/ABCD/players/p1"), &segs("rooms/ABCD")));
        assert!(!overlaps(&segs("rooms/ABCD"), &segs("rooms/WXYZ")));
    }
}
