//! SQL scripts

use serde::{Deserialize, Serialize};

use crate::ids::ScriptId;

/// A named SQL script. Names are unique among scripts and comparisons.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlScript {
    pub id: ScriptId,
    pub name: String,
    pub content: String,
}

impl SqlScript {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: ScriptId::new(),
            name: name.into(),
            content: content.into(),
        }
    }
}
