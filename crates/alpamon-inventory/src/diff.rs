//! The three-way diff between freshly collected facts and the server's
//! sync snapshot ( "Three-way diff semantics quirks"), grounded in the
//! original agent's `compare_data`.
//!
//! Darwin's `packages` rows never carry `arch` locally (its `homebrew_packages`
//! query doesn't select it), but the server's echoed snapshot does, left
//! over from a Debian/RHEL report for the same host — it's stripped before
//! comparison. `addresses` normalizes a null `broadcast` to `""` because the
//! local fact source and the remote schema disagree on how "no broadcast
//! address" is represented.

use crate::model::FactDef;
use alpamon_core::Platform;
use serde_json::Value;
use std::collections::HashMap;

/// The result of reconciling one key's local rows against its remote
/// snapshot. `create`'s shape matches the collection endpoint's POST
/// contract directly: a single object for singleton keys, a JSON array for
/// multi-row keys — callers post it as-is.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub create: Option<Value>,
    pub update: Vec<(String, Value)>,
    pub delete: Vec<String>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.create.is_none() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Normalizes one remote row in place before comparison (Darwin `packages`
/// arch stripping, `addresses` broadcast normalization).
fn normalize_remote_row(def: &FactDef, platform: Platform, row: &mut Value) {
    if let Some(obj) = row.as_object_mut() {
        if def.key == crate::model::FactKey::Addresses {
            let is_empty_broadcast = obj
                .get("broadcast")
                .map(|v| v.is_null() || v == &Value::Bool(false))
                .unwrap_or(true);
            if is_empty_broadcast {
                obj.insert("broadcast".to_string(), Value::String(String::new()));
            }
        }
        if def.key == crate::model::FactKey::Packages && platform == Platform::Darwin {
            obj.remove("arch");
        }
    }
}

pub fn three_way_diff(def: &FactDef, platform: Platform, local: Vec<Value>, remote: Vec<Value>) -> DiffResult {
    if def.multirow {
        diff_multirow(def, platform, local, remote)
    } else {
        diff_singleton(local, remote)
    }
}

fn diff_multirow(def: &FactDef, platform: Platform, local: Vec<Value>, remote: Vec<Value>) -> DiffResult {
    let mut remote_by_pk: HashMap<String, (String, Value)> = HashMap::new();
    for mut row in remote {
        normalize_remote_row(def, platform, &mut row);
        let Some(obj) = row.as_object_mut() else { continue };
        let Some(id) = obj.remove("id").and_then(|v| v.as_str().map(str::to_string).or(Some(v.to_string()))) else {
            continue;
        };
        let Some(pk_value) = obj.get(def.pk).map(|v| v.to_string()) else { continue };
        remote_by_pk.insert(pk_value, (id, Value::Object(obj.clone())));
    }

    let mut create = Vec::new();
    let mut update = Vec::new();

    for item in local {
        let Some(pk_value) = item.get(def.pk).map(|v| v.to_string()) else {
            create.push(item);
            continue;
        };
        match remote_by_pk.remove(&pk_value) {
            Some((id, remote_data)) => {
                if item != remote_data {
                    update.push((id, item));
                }
            }
            None => create.push(item),
        }
    }

    let delete = remote_by_pk.into_values().map(|(id, _)| id).collect();

    DiffResult {
        create: (!create.is_empty()).then(|| Value::Array(create)),
        update,
        delete,
    }
}

fn diff_singleton(local: Vec<Value>, mut remote: Vec<Value>) -> DiffResult {
    let Some(first) = local.into_iter().next() else {
        return DiffResult::default();
    };

    if remote.is_empty() {
        return DiffResult { create: Some(first), update: Vec::new(), delete: Vec::new() };
    }

    let mut remote_obj = remote.remove(0);
    let id = remote_obj
        .as_object_mut()
        .and_then(|o| o.remove("id"))
        .and_then(|v| v.as_str().map(str::to_string).or(Some(v.to_string())))
        .unwrap_or_default();

    if first != remote_obj {
        DiffResult { create: None, update: vec![(id, first)], delete: Vec::new() }
    } else {
        DiffResult::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FactKey;
    use serde_json::json;

    #[test]
    fn multirow_detects_create_update_delete() {
        let def = FactKey::Users.def();
        let local = vec![
            json!({"uid": 1, "username": "root", "gid": 0, "description": "", "directory": "/root", "shell": "/bin/bash"}),
            json!({"uid": 2, "username": "new", "gid": 100, "description": "", "directory": "/home/new", "shell": "/bin/bash"}),
        ];
        let remote = vec![
            json!({"id": "r1", "uid": 1, "username": "root", "gid": 0, "description": "changed", "directory": "/root", "shell": "/bin/bash"}),
            json!({"id": "r3", "uid": 3, "username": "gone", "gid": 100, "description": "", "directory": "/home/gone", "shell": "/bin/bash"}),
        ];

        let diff = three_way_diff(def, Platform::Debian, local, remote);
        assert_eq!(diff.delete, vec!["r3".to_string()]);
        assert_eq!(diff.update.len(), 1);
        assert_eq!(diff.update[0].0, "r1");
        let created = diff.create.unwrap();
        assert_eq!(created.as_array().unwrap().len(), 1);
    }

    #[test]
    fn singleton_create_is_unwrapped_from_array() {
        let local = vec![json!({"name": "ubuntu", "version": "22.04"})];
        let diff = diff_singleton(local, vec![]);
        assert!(diff.create.unwrap().is_object());
    }

    #[test]
    fn singleton_unchanged_produces_empty_diff() {
        let local = vec![json!({"name": "ubuntu", "version": "22.04"})];
        let remote = vec![json!({"id": "x", "name": "ubuntu", "version": "22.04"})];
        let diff = diff_singleton(local, remote);
        assert!(diff.is_empty());
    }

    #[test]
    fn darwin_packages_strip_arch_before_comparison() {
        let def = FactKey::Packages.def();
        let local = vec![json!({"name": "git", "source": "/usr/local", "version": "2.40"})];
        let remote = vec![json!({"id": "r1", "name": "git", "source": "/usr/local", "version": "2.40", "arch": "x86_64"})];
        let diff = three_way_diff(def, Platform::Darwin, local, remote);
        assert!(diff.is_empty(), "arch-only difference should not trigger an update on darwin");
    }

    #[test]
    fn addresses_null_broadcast_normalizes_to_empty_string() {
        let def = FactKey::Addresses.def();
        let local = vec![json!({"address": "10.0.0.1", "interface_name": "eth0", "mask": "255.255.255.0", "broadcast": ""})];
        let remote = vec![json!({"id": "r1", "address": "10.0.0.1", "interface_name": "eth0", "mask": "255.255.255.0", "broadcast": null})];
        let diff = three_way_diff(def, Platform::Debian, local, remote);
        assert!(diff.is_empty(), "null broadcast should normalize to empty string before comparing");
    }
}
