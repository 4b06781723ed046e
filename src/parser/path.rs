use std::fmt;
use std::fmt::{Display, Formatter};

/// A parsed dotted class path. The empty path denotes the registry root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ClassPath {
    segments: Vec<String>,
}

impl ClassPath {
    pub fn root() -> Self {
        ClassPath { segments: vec![] }
    }

    pub(crate) fn from_segments(segments: Vec<String>) -> Self {
        ClassPath { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Last segment, or the empty string for the root.
    pub fn leaf(&self) -> &str {
        self.segments.last().map(|s| s.as_str()).unwrap_or("")
    }

    /// Everything but the last segment.
    pub fn parent(&self) -> ClassPath {
        if self.segments.is_empty() {
            ClassPath::root()
        } else {
            ClassPath::from_segments(self.segments[..self.segments.len() - 1].to_vec())
        }
    }

    pub fn child(&self, name: &str) -> ClassPath {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        ClassPath::from_segments(segments)
    }

    pub fn is_qualified(&self) -> bool {
        self.segments.len() > 1
    }
}

impl Display for ClassPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Join a namespace and a name the way registry paths are spelled.
pub fn join_path(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        namespace.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}
