//! JSON Patch (RFC 6902) over `serde_json::Value`.
//!
//! [`apply_patch`] works on a copy of the document: either every operation
//! succeeds and the patched copy is returned, or the first failing operation
//! aborts the whole patch and the input is left untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One JSON Patch operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

impl PatchOp {
    /// The target pointer of the operation.
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Move { path, .. }
            | Self::Copy { path, .. }
            | Self::Test { path, .. } => path,
        }
    }

    /// The source pointer for `move` and `copy`.
    pub fn from_path(&self) -> Option<&str> {
        match self {
            Self::Move { from, .. } | Self::Copy { from, .. } => Some(from),
            _ => None,
        }
    }

    /// Returns `true` for operations that can change the document.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Test { .. })
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum PatchError {
    #[error("invalid JSON pointer \"{0}\"")]
    InvalidPointer(String),
    #[error("path \"{0}\" does not exist")]
    PathNotFound(String),
    #[error("invalid array index in \"{0}\"")]
    InvalidIndex(String),
    #[error("cannot remove the document root")]
    RootRemoval,
    #[error("cannot move \"{from}\" into its own child \"{path}\"")]
    MoveIntoChild { from: String, path: String },
    #[error("test failed at \"{0}\"")]
    TestFailed(String),
}

/// Applies `ops` in order to a copy of `doc`.
pub fn apply_patch(doc: &Value, ops: &[PatchOp]) -> Result<Value, PatchError> {
    let mut working = doc.clone();
    for op in ops {
        apply_op(&mut working, op)?;
    }
    Ok(working)
}

fn apply_op(doc: &mut Value, op: &PatchOp) -> Result<(), PatchError> {
    match op {
        PatchOp::Add { path, value } => add(doc, path, value.clone()),
        PatchOp::Remove { path } => remove(doc, path).map(|_| ()),
        PatchOp::Replace { path, value } => {
            let tokens = parse_pointer(path)?;
            let target = walk_mut(doc, &tokens, path)?;
            *target = value.clone();
            Ok(())
        }
        PatchOp::Move { from, path } => {
            if from == path {
                // Still has to exist.
                get(doc, from)?;
                return Ok(());
            }
            if path.starts_with(&format!("{from}/")) {
                return Err(PatchError::MoveIntoChild {
                    from: from.clone(),
                    path: path.clone(),
                });
            }
            let value = remove(doc, from)?;
            add(doc, path, value)
        }
        PatchOp::Copy { from, path } => {
            let value = get(doc, from)?.clone();
            add(doc, path, value)
        }
        PatchOp::Test { path, value } => {
            if get(doc, path)? != value {
                return Err(PatchError::TestFailed(path.clone()));
            }
            Ok(())
        }
    }
}

/// Splits a pointer into unescaped reference tokens. The empty pointer is the
/// document root.
pub(crate) fn parse_pointer(path: &str) -> Result<Vec<String>, PatchError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(PatchError::InvalidPointer(path.to_string()));
    };
    rest.split('/')
        .map(|token| {
            if has_bad_escape(token) {
                return Err(PatchError::InvalidPointer(path.to_string()));
            }
            Ok(token.replace("~1", "/").replace("~0", "~"))
        })
        .collect()
}

fn has_bad_escape(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes
        .iter()
        .enumerate()
        .any(|(i, b)| *b == b'~' && !matches!(bytes.get(i + 1), Some(b'0') | Some(b'1')))
}

fn parse_index(token: &str, path: &str) -> Result<usize, PatchError> {
    let well_formed = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !well_formed {
        return Err(PatchError::InvalidIndex(path.to_string()));
    }
    token
        .parse()
        .map_err(|_| PatchError::InvalidIndex(path.to_string()))
}

fn walk_mut<'a>(
    doc: &'a mut Value,
    tokens: &[String],
    path: &str,
) -> Result<&'a mut Value, PatchError> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?,
            Value::Array(items) => {
                let idx = parse_index(token, path)?;
                items
                    .get_mut(idx)
                    .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?
            }
            _ => return Err(PatchError::PathNotFound(path.to_string())),
        };
    }
    Ok(current)
}

fn get<'a>(doc: &'a Value, path: &str) -> Result<&'a Value, PatchError> {
    let tokens = parse_pointer(path)?;
    let mut current = doc;
    for token in &tokens {
        current = match current {
            Value::Object(map) => map
                .get(token)
                .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?,
            Value::Array(items) => {
                let idx = parse_index(token, path)?;
                items
                    .get(idx)
                    .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?
            }
            _ => return Err(PatchError::PathNotFound(path.to_string())),
        };
    }
    Ok(current)
}

fn add(doc: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    let tokens = parse_pointer(path)?;
    let Some((last, parents)) = tokens.split_last() else {
        *doc = value;
        return Ok(());
    };
    match walk_mut(doc, parents, path)? {
        Value::Object(map) => {
            map.insert(last.clone(), value);
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
            } else {
                let idx = parse_index(last, path)?;
                if idx > items.len() {
                    return Err(PatchError::InvalidIndex(path.to_string()));
                }
                items.insert(idx, value);
            }
        }
        _ => return Err(PatchError::PathNotFound(path.to_string())),
    }
    Ok(())
}

fn remove(doc: &mut Value, path: &str) -> Result<Value, PatchError> {
    let tokens = parse_pointer(path)?;
    let Some((last, parents)) = tokens.split_last() else {
        return Err(PatchError::RootRemoval);
    };
    match walk_mut(doc, parents, path)? {
        Value::Object(map) => map
            .remove(last)
            .ok_or_else(|| PatchError::PathNotFound(path.to_string())),
        Value::Array(items) => {
            let idx = parse_index(last, path)?;
            if idx >= items.len() {
                return Err(PatchError::PathNotFound(path.to_string()));
            }
            Ok(items.remove(idx))
        }
        _ => Err(PatchError::PathNotFound(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc() -> Value {
        json!({
            "title": "Lisbon",
            "shared_notes": "",
            "lodgings": [{"name": "Hotel A"}],
            "a/b": 1,
            "m~n": 2
        })
    }

    #[test]
    fn replace_field() {
        let out = apply_patch(
            &doc(),
            &[PatchOp::Replace {
                path: "/shared_notes".to_string(),
                value: json!("bring sunscreen"),
            }],
        )
        .unwrap();
        assert_eq!(out["shared_notes"], "bring sunscreen");
        assert_eq!(out["title"], "Lisbon");
    }

    #[test]
    fn add_appends_and_inserts_into_arrays() {
        let out = apply_patch(
            &doc(),
            &[
                PatchOp::Add {
                    path: "/lodgings/-".to_string(),
                    value: json!({"name": "Hotel C"}),
                },
                PatchOp::Add {
                    path: "/lodgings/1".to_string(),
                    value: json!({"name": "Hotel B"}),
                },
            ],
        )
        .unwrap();
        let names: Vec<_> = out["lodgings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Hotel A", "Hotel B", "Hotel C"]);
    }

    #[test]
    fn escaped_tokens_resolve() {
        let out = apply_patch(
            &doc(),
            &[
                PatchOp::Test {
                    path: "/a~1b".to_string(),
                    value: json!(1),
                },
                PatchOp::Remove {
                    path: "/m~0n".to_string(),
                },
            ],
        )
        .unwrap();
        assert!(out.get("m~n").is_none());
    }

    #[test]
    fn failed_test_aborts_everything() {
        let original = doc();
        let err = apply_patch(
            &original,
            &[
                PatchOp::Replace {
                    path: "/title".to_string(),
                    value: json!("Porto"),
                },
                PatchOp::Test {
                    path: "/shared_notes".to_string(),
                    value: json!("something else"),
                },
            ],
        )
        .unwrap_err();
        assert_eq!(err, PatchError::TestFailed("/shared_notes".to_string()));
        assert_eq!(original["title"], "Lisbon");
    }

    #[test]
    fn move_and_copy() {
        let out = apply_patch(
            &doc(),
            &[
                PatchOp::Copy {
                    from: "/title".to_string(),
                    path: "/original_title".to_string(),
                },
                PatchOp::Move {
                    from: "/lodgings/0".to_string(),
                    path: "/primary_lodging".to_string(),
                },
            ],
        )
        .unwrap();
        assert_eq!(out["original_title"], "Lisbon");
        assert_eq!(out["primary_lodging"]["name"], "Hotel A");
        assert_eq!(out["lodgings"], json!([]));
    }

    #[test]
    fn move_into_own_child_is_rejected() {
        let err = apply_patch(
            &doc(),
            &[PatchOp::Move {
                from: "/lodgings".to_string(),
                path: "/lodgings/0/inner".to_string(),
            }],
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::MoveIntoChild { .. }));
    }

    #[test]
    fn missing_paths_and_bad_indexes() {
        assert_eq!(
            apply_patch(
                &doc(),
                &[PatchOp::Remove {
                    path: "/nope".to_string()
                }]
            )
            .unwrap_err(),
            PatchError::PathNotFound("/nope".to_string())
        );
        assert_eq!(
            apply_patch(
                &doc(),
                &[PatchOp::Replace {
                    path: "/lodgings/01".to_string(),
                    value: json!(null)
                }]
            )
            .unwrap_err(),
            PatchError::InvalidIndex("/lodgings/01".to_string())
        );
        assert_eq!(
            apply_patch(
                &doc(),
                &[PatchOp::Add {
                    path: "/lodgings/5".to_string(),
                    value: json!(null)
                }]
            )
            .unwrap_err(),
            PatchError::InvalidIndex("/lodgings/5".to_string())
        );
        assert_eq!(
            apply_patch(
                &doc(),
                &[PatchOp::Add {
                    path: "title".to_string(),
                    value: json!(null)
                }]
            )
            .unwrap_err(),
            PatchError::InvalidPointer("title".to_string())
        );
    }

    #[test]
    fn ops_deserialize_from_wire_format() {
        let ops: Vec<PatchOp> = serde_json::from_value(json!([
            {"op": "replace", "path": "/shared_notes", "value": "x"},
            {"op": "move", "from": "/a", "path": "/b"},
            {"op": "remove", "path": "/c"}
        ]))
        .unwrap();
        assert_eq!(ops[1].from_path(), Some("/a"));
        assert_eq!(ops[2].path(), "/c");
        assert!(serde_json::from_value::<PatchOp>(json!({"op": "merge", "path": "/a"})).is_err());
    }
}
