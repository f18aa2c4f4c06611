use serde::{Deserialize, Serialize};

/// Stored content of one subsection, as returned by the repository.
///
/// `content` is the JSON text of the last persisted delta envelope, or an
/// empty string when nothing has been saved yet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SubsectionContent {
    pub title: String,
    pub content: String,
}

impl SubsectionContent {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}
