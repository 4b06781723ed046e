//! Registry mapping dotted paths to classes and namespaces.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::parser::ClassPath;
use crate::runner::ds::class::ClassRef;
use crate::runner::ds::error::ClassError;
use crate::runner::ds::value::Value;

/// What sits at a registry path.
#[derive(Clone, Debug)]
pub enum Entry {
    Namespace(NamespaceRef),
    Class(ClassRef),
}

pub struct Namespace {
    name: String,
    path: String,
    is_namespace: bool,
    members: IndexMap<String, Entry>,
}

/// A node of the registry tree. A node made by `get_namespace` is flagged and acts as a factory
/// for its main class, the member named after the node's own leaf.
#[derive(Clone)]
pub struct NamespaceRef(Rc<RefCell<Namespace>>);

impl NamespaceRef {
    fn new(path: &ClassPath, is_namespace: bool) -> Self {
        NamespaceRef(Rc::new(RefCell::new(Namespace {
            name: path.leaf().to_string(),
            path: path.to_string(),
            is_namespace,
            members: IndexMap::new(),
        })))
    }

    pub fn ptr_eq(&self, other: &NamespaceRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn path(&self) -> String {
        self.0.borrow().path.clone()
    }

    pub fn is_namespace(&self) -> bool {
        self.0.borrow().is_namespace
    }

    pub(crate) fn flag(&self) {
        self.0.borrow_mut().is_namespace = true;
    }

    pub fn member(&self, name: &str) -> Option<Entry> {
        self.0.borrow().members.get(name).cloned()
    }

    pub fn member_names(&self) -> Vec<String> {
        self.0.borrow().members.keys().cloned().collect()
    }

    fn insert(&self, name: &str, entry: Entry) {
        self.0.borrow_mut().members.insert(name.to_string(), entry);
    }

    /// The class registered under this namespace's own leaf name, if any yet.
    pub fn main_class(&self) -> Option<ClassRef> {
        let name = self.name();
        match self.member(&name) {
            Some(Entry::Class(c)) => Some(c),
            _ => None,
        }
    }

    /// Instantiates the main class. Fails if it has not been registered yet.
    pub fn construct(&self, args: Vec<Value>) -> Result<Value, ClassError> {
        match self.main_class() {
            Some(c) => c.instantiate(args),
            None => Err(ClassError::UnresolvedClass {
                name: self.name(),
                namespace: self.path(),
            }),
        }
    }
}
impl fmt::Debug for NamespaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamespaceRef({})", self.path())
    }
}

pub struct ClassRegistry {
    root: NamespaceRef,
    globals: HashMap<String, ClassRef>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        ClassRegistry {
            root: NamespaceRef::new(&ClassPath::root(), false),
            globals: HashMap::new(),
        }
    }

    pub fn root(&self) -> NamespaceRef {
        self.root.clone()
    }

    pub fn lookup(&self, path: &ClassPath) -> Option<Entry> {
        let mut current = Entry::Namespace(self.root.clone());
        for segment in path.segments() {
            current = match current {
                Entry::Namespace(ns) => ns.member(segment)?,
                Entry::Class(_) => return None,
            };
        }
        Some(current)
    }

    pub fn lookup_class(&self, path: &ClassPath) -> Option<ClassRef> {
        match self.lookup(path) {
            Some(Entry::Class(c)) => Some(c),
            _ => None,
        }
    }

    /// Walks to the node at `path`, creating plain intermediate nodes on the way.
    pub(crate) fn ensure_node(&self, path: &ClassPath) -> Result<NamespaceRef, ClassError> {
        let mut node = self.root.clone();
        let mut walked = ClassPath::root();
        for segment in path.segments() {
            walked = walked.child(segment);
            let next = match node.member(segment) {
                Some(Entry::Namespace(ns)) => ns,
                Some(Entry::Class(c)) => {
                    return Err(ClassError::InvalidTarget(format!(
                        "'{}' is the class {:?}, not a namespace",
                        walked, c
                    )))
                }
                None => {
                    let ns = NamespaceRef::new(&walked, false);
                    node.insert(segment, Entry::Namespace(ns.clone()));
                    ns
                }
            };
            node = next;
        }
        Ok(node)
    }

    /// Stores `class` at `path`. A namespace already sitting at `path` keeps its place and
    /// receives the class as its main class instead.
    pub(crate) fn set_path(&self, path: &ClassPath, class: &ClassRef) -> Result<ClassPath, ClassError> {
        if path.is_root() {
            return Err(ClassError::InvalidKey("class path must not be empty".to_string()));
        }
        let parent = self.ensure_node(&path.parent())?;
        let leaf = path.leaf();
        let target = match parent.member(leaf) {
            Some(Entry::Namespace(ns)) => {
                ns.flag();
                let main = path.child(leaf);
                ns.insert(leaf, Entry::Class(class.clone()));
                main
            }
            _ => {
                parent.insert(leaf, Entry::Class(class.clone()));
                path.clone()
            }
        };
        debug!(class = %class.name(), path = %target, "registered class");
        Ok(target)
    }

    pub(crate) fn insert_namespace(&self, path: &ClassPath) -> Result<NamespaceRef, ClassError> {
        let parent = self.ensure_node(&path.parent())?;
        let ns = NamespaceRef::new(path, true);
        parent.insert(path.leaf(), Entry::Namespace(ns.clone()));
        Ok(ns)
    }

    pub fn global(&self, name: &str) -> Option<ClassRef> {
        self.globals.get(name).cloned()
    }

    pub fn define_global(&mut self, name: impl Into<String>, class: ClassRef) {
        self.globals.insert(name.into(), class);
    }
}
impl Default for ClassRegistry {
    fn default() -> Self {
        ClassRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PathParser;

    fn p(s: &str) -> ClassPath {
        PathParser::parse_path(s).unwrap()
    }

    #[test]
    fn test_set_path_creates_plain_intermediates() {
        let registry = ClassRegistry::new();
        let user = ClassRef::new("User");
        registry.set_path(&p("App.Models.User"), &user).unwrap();
        match registry.lookup(&p("App.Models")) {
            Some(Entry::Namespace(ns)) => {
                assert!(!ns.is_namespace());
                assert_eq!(ns.path(), "App.Models");
            }
            other => panic!("expected namespace, got {:?}", other),
        }
        assert_eq!(registry.lookup_class(&p("App.Models.User")), Some(user));
    }

    #[test]
    fn test_class_at_namespace_path_becomes_main_class() {
        let registry = ClassRegistry::new();
        let ns = registry.insert_namespace(&p("Shop")).unwrap();
        let shop = ClassRef::new("Shop");
        let stored = registry.set_path(&p("Shop"), &shop).unwrap();
        assert_eq!(stored.to_string(), "Shop.Shop");
        assert_eq!(ns.main_class(), Some(shop));
    }

    #[test]
    fn test_class_cannot_hold_members() {
        let registry = ClassRegistry::new();
        registry.set_path(&p("Leaf"), &ClassRef::new("Leaf")).unwrap();
        let err = registry
            .set_path(&p("Leaf.Inner"), &ClassRef::new("Inner"))
            .unwrap_err();
        assert!(matches!(err, ClassError::InvalidTarget(_)));
    }

    #[test]
    fn test_construct_without_main_class() {
        let registry = ClassRegistry::new();
        let ns = registry.insert_namespace(&p("App.Models")).unwrap();
        assert_eq!(
            ns.construct(vec![]).unwrap_err(),
            ClassError::UnresolvedClass {
                name: "Models".to_string(),
                namespace: "App.Models".to_string()
            }
        );
        registry
            .set_path(&p("App.Models.Models"), &ClassRef::new("Models"))
            .unwrap();
        assert!(ns.construct(vec![]).is_ok());
    }
}
