//! The `inherits` operation: links a class to its parent(s), registers it and schedules its
//! constitutors.

use tracing::debug;

use crate::runner::ds::class::ClassRef;
use crate::runner::ds::error::ClassError;
use crate::runner::ds::object::ObjectRef;
use crate::runner::ds::static_chain::add_descriptor_to_static;
use crate::runner::events::{Event, EventKind};
use crate::runner::runtime::{class_path, Runtime};

/// Name reported as the ancestor of classes defined without a parent.
pub const ROOT_ANCESTOR: &str = "Function";

/// What a class inherits from.
#[derive(Clone, Debug)]
pub enum Parent {
    /// No parent: the class starts a new hierarchy.
    Root,
    Class(ClassRef),
    /// A dotted path that may not be registered yet.
    Name(String),
    /// Several parents, merged in order. The first is the primary parent.
    Names(Vec<String>),
}
impl From<ClassRef> for Parent {
    fn from(c: ClassRef) -> Self {
        Parent::Class(c)
    }
}
impl From<&ClassRef> for Parent {
    fn from(c: &ClassRef) -> Self {
        Parent::Class(c.clone())
    }
}
impl From<&str> for Parent {
    fn from(s: &str) -> Self {
        Parent::Name(s.to_string())
    }
}
impl From<String> for Parent {
    fn from(s: String) -> Self {
        Parent::Name(s)
    }
}
impl From<Vec<&str>> for Parent {
    fn from(v: Vec<&str>) -> Self {
        Parent::Names(v.into_iter().map(String::from).collect())
    }
}
impl From<Vec<String>> for Parent {
    fn from(v: Vec<String>) -> Self {
        Parent::Names(v)
    }
}

pub(crate) enum Linked {
    /// A parent name is still missing; the class is waiting.
    Deferred(ClassRef),
    Done(ClassRef),
}
impl Linked {
    fn into_class(self) -> ClassRef {
        match self {
            Linked::Deferred(c) | Linked::Done(c) => c,
        }
    }
}

impl Runtime {
    /// Registers `child` as a root class.
    pub fn define(&mut self, child: &ClassRef) -> Result<ClassRef, ClassError> {
        self.inherits_with(Parent::Root, None, child, true)
    }

    pub fn inherits(&mut self, parent: impl Into<Parent>, child: &ClassRef) -> Result<ClassRef, ClassError> {
        self.inherits_with(parent.into(), None, child, true)
    }

    pub fn inherits_in(
        &mut self,
        parent: impl Into<Parent>,
        namespace: &str,
        child: &ClassRef,
    ) -> Result<ClassRef, ClassError> {
        self.inherits_with(parent.into(), Some(namespace), child, true)
    }

    /// `parent.extend(child)`.
    pub fn extend(&mut self, parent: &ClassRef, child: &ClassRef) -> Result<ClassRef, ClassError> {
        self.inherits_with(Parent::Class(parent.clone()), None, child, true)
    }

    /// Makes `child` inherit from `parent` and registers it under its namespace.
    ///
    /// The child's namespace is fixed the first time it inherits: its own if already set, else
    /// `namespace`, else the parent's. Parent names that do not resolve yet leave the child
    /// waiting and return it unchanged. The returned class is the one that was registered,
    /// which differs from `child` only if the parent's child modifier replaced it.
    pub fn inherits_with(
        &mut self,
        parent: Parent,
        namespace: Option<&str>,
        child: &ClassRef,
        run_constitutors: bool,
    ) -> Result<ClassRef, ClassError> {
        let ns = match child.namespace() {
            Some(ns) => ns,
            None => {
                let inherited = match &parent {
                    Parent::Class(p) => p.namespace(),
                    _ => None,
                };
                namespace
                    .filter(|n| !n.is_empty())
                    .map(String::from)
                    .or(inherited)
                    .unwrap_or_default()
            }
        };
        class_path(&ns, &child.name())?;
        if child.namespace().is_none() {
            child.set_namespace(&ns);
        }

        match parent {
            Parent::Root => self.link(None, child, run_constitutors),
            Parent::Class(p) => self.link(Some(&p), child, run_constitutors),
            Parent::Name(name) => self
                .inherit_names(vec![name], namespace, child, run_constitutors)
                .map(Linked::into_class),
            Parent::Names(names) => {
                if names.is_empty() {
                    return Err(ClassError::InvalidKey(
                        "at least one parent name is required".to_string(),
                    ));
                }
                self.inherit_names(names, namespace, child, run_constitutors)
                    .map(Linked::into_class)
            }
        }
    }

    /// All names must resolve before any is linked. The first linked class carries on as the
    /// child for the remaining names.
    pub(crate) fn inherit_names(
        &mut self,
        names: Vec<String>,
        namespace: Option<&str>,
        child: &ClassRef,
        run_constitutors: bool,
    ) -> Result<Linked, ClassError> {
        let mut parents = Vec::with_capacity(names.len());
        for name in &names {
            let resolution = self.resolve_parent(name, child)?;
            match resolution.class.clone() {
                Some(parent) => parents.push(parent),
                None => {
                    self.defer(child, names.clone(), namespace, resolution)?;
                    return Ok(Linked::Deferred(child.clone()));
                }
            }
        }

        let mut current = child.clone();
        for (i, parent) in parents.iter().enumerate() {
            let linked = self.link(Some(parent), &current, run_constitutors)?;
            if i == 0 {
                current = linked;
            }
        }
        Ok(Linked::Done(current))
    }

    fn link(
        &mut self,
        parent: Option<&ClassRef>,
        child: &ClassRef,
        run_constitutors: bool,
    ) -> Result<ClassRef, ClassError> {
        let mut child = child.clone();
        let namespace = child.namespace().unwrap_or_default();
        self.prepare_slot(&namespace, &child.name())?;

        if let Some(parent) = parent {
            check_not_descendant(parent, &child)?;

            if let Some(modifier) = parent.child_modifier() {
                if let Some(replacement) = modifier(&child)? {
                    if !replacement.ptr_eq(&child) {
                        replacement.adopt_identity(&child);
                        child = replacement;
                    }
                }
            }

            parent.add_child(&child);
            for (key, descriptor) in parent.static_chain().unwrap_or_default() {
                add_descriptor_to_static(&child, &key, descriptor, true)?;
            }

            let multiple = child.super_class().is_some();
            child.set_super(Some(parent.clone()));
            if multiple {
                flatten_into(&child, parent)?;
            } else {
                child.prototype().set_prototype(Some(parent.prototype()))?;
            }

            if run_constitutors {
                for task in parent.constitutors() {
                    self.constitute(&child, task)?;
                }
            }
        }

        let stored = self.register(&namespace, &child)?;
        let stored_namespace = stored.parent().to_string();

        let ancestor = parent
            .map(|p| p.name())
            .unwrap_or_else(|| ROOT_ANCESTOR.to_string());
        let descendant = child.name();
        self.queue_tick(move |rt| {
            rt.emit(Event {
                kind: EventKind::Extended,
                ancestor: Some(ancestor),
                descendant: Some(descendant.clone()),
                namespace: namespace.clone(),
            })?;
            rt.fire_pending(&descendant, &namespace)?;
            if stored_namespace != namespace {
                rt.fire_pending(&descendant, &stored_namespace)?;
            }
            Ok(())
        });

        let class = child.clone();
        self.on_loaded(move |rt, already_loaded| {
            if already_loaded {
                rt.queue_immediate(move |rt| rt.do_constitutors(&class));
                Ok(())
            } else {
                rt.do_constitutors(&class)
            }
        })?;

        debug!(class = %child.name(), path = %stored, "linked class");
        Ok(child)
    }
}

/// Rejects links that would make a class its own ancestor.
fn check_not_descendant(parent: &ClassRef, child: &ClassRef) -> Result<(), ClassError> {
    let target = child.prototype();
    let mut current = Some(parent.prototype());
    while let Some(o) = current {
        if o.ptr_eq(&target) {
            return Err(ClassError::TypeError(format!(
                "{} cannot inherit from its descendant {}",
                child.name(),
                parent.name()
            )));
        }
        current = o.prototype();
    }
    Ok(())
}

/// Splices `parent`'s members in front of the child's current delegate.
///
/// The parent's prototype chain is copied root first into one flat object, so the most specific
/// ancestor wins. The child's own members stay on its prototype and keep precedence over
/// everything copied.
fn flatten_into(child: &ClassRef, parent: &ClassRef) -> Result<(), ClassError> {
    let proto = child.prototype();
    let flat = ObjectRef::with_prototype(proto.prototype());

    let mut levels = vec![];
    let mut current = Some(parent.prototype());
    while let Some(level) = current {
        current = level.prototype();
        levels.push(level);
    }

    for level in levels.iter().rev() {
        for (key, descriptor) in level.own_entries() {
            if proto.has_own_property(&key) {
                continue;
            }
            flat.define_own_property(key, descriptor)?;
        }
    }
    proto.set_prototype(Some(flat))
}
