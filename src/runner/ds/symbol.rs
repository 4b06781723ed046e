use std::fmt;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// A unique property key. Two symbols with the same description are still distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolData {
    description: String,
    id: Uuid,
}

impl SymbolData {
    pub fn new(description: impl Into<String>) -> Self {
        SymbolData {
            description: description.into(),
            id: Uuid::new_v4(),
        }
    }

    pub fn new_empty() -> Self {
        let id = Uuid::new_v4();
        SymbolData {
            description: id.to_hyphenated().to_string(),
            id,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl Display for SymbolData {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}
