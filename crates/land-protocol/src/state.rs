use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable map of field path to value, as produced by serializing a
/// land's state through its schema. Keyed by `BTreeMap` so snapshot
/// iteration (and therefore diffing) is always in path order.
pub type StateSnapshot = BTreeMap<String, Value>;

/// A single mutation against a `StateSnapshot`, addressed by a
/// JSON-pointer-style path (`/`-separated segments, `~0`/`~1` escaped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePatch {
    pub path: String,
    pub op: PatchOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Set(Value),
    /// A newtype over `()` rather than a unit variant so this serializes as
    /// `{"remove": null}` per spec §6, not the bare string `"remove"` a unit
    /// variant would produce under external tagging.
    Remove(()),
    Insert { index: usize, value: Value },
}

/// The outcome of comparing a subscriber's last-seen snapshot against the
/// land's current (visibility-filtered) snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StateUpdate {
    FirstSync { snapshot: StateSnapshot },
    Diff { patches: Vec<StatePatch> },
    NoChange,
}

/// Escapes a single path segment per RFC 6901 (`~` -> `~0`, `/` -> `~1`).
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Unescapes a single path segment per RFC 6901.
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

pub fn join_path(segments: &[&str]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&escape_segment(segment));
    }
    out
}

pub fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .skip(1)
        .map(unescape_segment)
        .collect()
}

/// Computes the minimal, path-sorted patch list turning `previous` into
/// `current`. Both maps are assumed already filtered to one subscriber's
/// visibility — the caller (the keeper) must filter before calling this, not
/// after, so that `previous` reflects exactly what that subscriber received.
pub fn diff(previous: &StateSnapshot, current: &StateSnapshot) -> Vec<StatePatch> {
    let mut patches = Vec::new();

    for (path, value) in current {
        match previous.get(path) {
            Some(old) if old == value => {}
            _ => patches.push(StatePatch {
                path: path.clone(),
                op: PatchOp::Set(value.clone()),
            }),
        }
    }

    for path in previous.keys() {
        if !current.contains_key(path) {
            patches.push(StatePatch {
                path: path.clone(),
                op: PatchOp::Remove(()),
            });
        }
    }

    patches.sort_by(|a, b| a.path.cmp(&b.path));
    patches
}

/// Applies a patch list to a snapshot, producing the resulting snapshot.
/// Used by consumers (and tests) to validate diff soundness: applying the
/// patches returned for a subscriber must reproduce its new view exactly.
pub fn apply_patches(base: &StateSnapshot, patches: &[StatePatch]) -> StateSnapshot {
    let mut result = base.clone();
    for patch in patches {
        match &patch.op {
            PatchOp::Set(value) => {
                result.insert(patch.path.clone(), value.clone());
            }
            PatchOp::Remove(()) => {
                result.remove(&patch.path);
            }
            PatchOp::Insert { value, .. } => {
                // Snapshots are flat path->value maps; an `insert` targets an
                // array-valued leaf. We splice into that array by index,
                // falling back to `set` semantics if the leaf isn't an array.
                let entry = result.entry(patch.path.clone()).or_insert(Value::Array(Vec::new()));
                if let Value::Array(arr) = entry {
                    let index = patch_insert_index(patches, patch);
                    let idx = index.min(arr.len());
                    arr.insert(idx, value.clone());
                } else {
                    *entry = value.clone();
                }
            }
        }
    }
    result
}

fn patch_insert_index(_patches: &[StatePatch], patch: &StatePatch) -> usize {
    match &patch.op {
        PatchOp::Insert { index, .. } => *index,
        _ => 0,
    }
}
