//! Local mirror of a JSON subtree, updated with `put`/`patch` semantics.

use serde_json::{Map, Value};

use super::source::segments;

/// A JSON value that never holds empty objects: removing the last child
/// of a node removes the node itself, the way the database stores data.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Tree {
    root: Value,
}

impl Tree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whole value, `None` when empty.
    pub(crate) fn value(&self) -> Option<&Value> {
        (!self.root.is_null()).then_some(&self.root)
    }

    /// Value stored at `path`, `None` when absent.
    pub(crate) fn get(&self, path: &str) -> Option<&Value> {
        let mut node = &self.root;
        for segment in segments(path) {
            node = match node {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        (!node.is_null()).then_some(node)
    }

    /// Replace the value at `path`; `Null` deletes it.
    pub(crate) fn put(&mut self, path: &str, data: Value) {
        set_at(&mut self.root, &segments(path), prune(data));
    }

    /// Merge each child of `data` into the value at `path`.
    ///
    /// Returns `false` (and changes nothing) when `data` is not an object.
    pub(crate) fn patch(&mut self, path: &str, data: Value) -> bool {
        let Value::Object(children) = data else {
            return false;
        };
        let base = segments(path);
        for (key, value) in children {
            let mut full = base.clone();
            full.extend(segments(&key));
            set_at(&mut self.root, &full, prune(value));
        }
        true
    }

    /// Direct children of the root keyed by child key. Arrays are treated
    /// as objects keyed by index.
    pub(crate) fn children(&self) -> Map<String, Value> {
        children_of(&self.root)
    }
}

/// Children of a node as a key map.
pub(crate) fn children_of(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        _ => Map::new(),
    }
}

fn set_at(node: &mut Value, path: &[&str], data: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = data;
        return;
    };

    if let Value::Array(items) = node {
        if let Some(index) = array_slot(items, head, &data) {
            if index == items.len() {
                items.push(Value::Null);
            }
            set_at(&mut items[index], rest, data);
            while items.last().is_some_and(Value::is_null) {
                items.pop();
            }
            if items.is_empty() {
                *node = Value::Null;
            }
            return;
        }
    }

    if !node.is_object() {
        if data.is_null() && !node.is_array() {
            return;
        }
        *node = Value::Object(children_of(node));
    }

    let now_empty = match node {
        Value::Object(map) => {
            let child = map.entry(head.to_string()).or_insert(Value::Null);
            set_at(child, rest, data);
            if child.is_null() {
                map.remove(*head);
            }
            map.is_empty()
        }
        _ => false,
    };
    if now_empty {
        *node = Value::Null;
    }
}

/// Index of `head` inside `items` when the write keeps the array dense:
/// an existing slot, or one past the end for a non-null value. Other
/// writes turn the array into an index-keyed object.
fn array_slot(items: &[Value], head: &str, data: &Value) -> Option<usize> {
    let index = head.parse::<usize>().ok()?;
    if index < items.len() || (index == items.len() && !data.is_null()) {
        Some(index)
    } else {
        None
    }
}

/// Drop nulls and empty containers from incoming data.
fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, prune(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        Value::Array(items) if items.is_empty() => Value::Null,
        other => other,
    }
}
