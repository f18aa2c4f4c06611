use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Formatting flags attached to an insert or retain.
///
/// Kept as the raw name → value map so that formats we have no typed
/// accessor for, and `null` values (which clear a format), survive a
/// decode/encode cycle untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    fn flag(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    pub fn bold(&self) -> Option<bool> {
        self.flag("bold")
    }

    pub fn italic(&self) -> Option<bool> {
        self.flag("italic")
    }

    pub fn underline(&self) -> Option<bool> {
        self.flag("underline")
    }

    pub fn link(&self) -> Option<&str> {
        self.0.get("link").and_then(Value::as_str)
    }

    pub fn list(&self) -> Option<&str> {
        self.0.get("list").and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Inserted content: plain text or an embed such as `{"image": "https://..."}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum InsertContent {
    Text(String),
    Embed(Map<String, Value>),
}

/// A single edit step, applied against the current document cursor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "RawOperation", into = "RawOperation")]
pub enum Operation {
    Retain {
        count: u64,
        attributes: Option<Attributes>,
    },
    Insert {
        content: InsertContent,
        attributes: Option<Attributes>,
    },
    Delete {
        count: u64,
    },
}

/// Wire shape of an operation. Exactly one of `retain`, `insert`, `delete` must be set.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct RawOperation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retain: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    insert: Option<InsertContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delete: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attributes: Option<Attributes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    NoDiscriminant,
    MultipleDiscriminants,
    ZeroCount,
    AttributesOnDelete,
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationError::NoDiscriminant => write!(f, "operation has none of retain/insert/delete"),
            OperationError::MultipleDiscriminants => write!(f, "operation has more than one of retain/insert/delete"),
            OperationError::ZeroCount => write!(f, "retain/delete count must be positive"),
            OperationError::AttributesOnDelete => write!(f, "delete cannot carry attributes"),
        }
    }
}

impl std::error::Error for OperationError {}

impl TryFrom<RawOperation> for Operation {
    type Error = OperationError;

    fn try_from(raw: RawOperation) -> Result<Self, Self::Error> {
        let set = [raw.retain.is_some(), raw.insert.is_some(), raw.delete.is_some()]
            .iter()
            .filter(|present| **present)
            .count();
        if set == 0 {
            return Err(OperationError::NoDiscriminant);
        }
        if set > 1 {
            return Err(OperationError::MultipleDiscriminants);
        }

        match (raw.retain, raw.insert, raw.delete) {
            (Some(count), None, None) => {
                if count == 0 {
                    return Err(OperationError::ZeroCount);
                }
                Ok(Operation::Retain { count, attributes: raw.attributes })
            }
            (None, Some(content), None) => Ok(Operation::Insert { content, attributes: raw.attributes }),
            (None, None, Some(count)) => {
                if count == 0 {
                    return Err(OperationError::ZeroCount);
                }
                if raw.attributes.is_some() {
                    return Err(OperationError::AttributesOnDelete);
                }
                Ok(Operation::Delete { count })
            }
            _ => Err(OperationError::MultipleDiscriminants),
        }
    }
}

impl From<Operation> for RawOperation {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Retain { count, attributes } => RawOperation {
                retain: Some(count),
                attributes,
                ..Default::default()
            },
            Operation::Insert { content, attributes } => RawOperation {
                insert: Some(content),
                attributes,
                ..Default::default()
            },
            Operation::Delete { count } => RawOperation {
                delete: Some(count),
                ..Default::default()
            },
        }
    }
}

impl Operation {
    pub fn insert_text(text: impl Into<String>) -> Self {
        Operation::Insert {
            content: InsertContent::Text(text.into()),
            attributes: None,
        }
    }

    pub fn retain(count: u64) -> Self {
        Operation::Retain { count, attributes: None }
    }

    pub fn delete(count: u64) -> Self {
        Operation::Delete { count }
    }
}

/// An ordered rich-text edit. Order of `ops` is significant.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Delta {
    pub ops: Vec<Operation>,
}

/// A delta scoped to one editor (one subsection editor on the page).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditorDelta {
    pub editor_id: String,
    pub delta: Delta,
}

impl EditorDelta {
    pub fn new(editor_id: impl Into<String>, ops: Vec<Operation>) -> Self {
        Self {
            editor_id: editor_id.into(),
            delta: Delta { ops },
        }
    }
}
