// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Principal list normalization.
//!
//! Chunk metadata written by older indexers stores `authorized_users` and
//! `authorized_groups` as the string form of a list (`"['a@b.com']"`, single
//! quotes). [`normalize_principals`] is the only place that deals with that:
//! every caller gets a plain `Vec<String>` back.
//!
//! | Stored value | Result |
//! |--------------|--------|
//! | `["a", "b"]` | `["a", "b"]` (non-string items dropped) |
//! | `"['a', 'b']"` | `["a", "b"]` |
//! | `"not a list"` | `["not a list"]` |
//! | `null` / missing | `[]` |

use serde_json::Value;

pub fn normalize_principals(value: Option<&Value>) -> Vec<String> {
    let items = match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => strings_of(items),
        Some(Value::String(raw)) => parse_encoded_list(raw),
        Some(other) => vec![other.to_string()],
    };

    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn strings_of(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn parse_encoded_list(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(&raw.replace('\'', "\"")) {
        Ok(Value::Array(items)) => strings_of(&items),
        _ => vec![raw.to_string()],
    }
}
