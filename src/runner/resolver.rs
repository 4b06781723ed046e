//! Deferred resolution of parents named before they are registered.
//!
//! A class whose parent names do not all resolve is parked as a pending edge. Each edge carries
//! the `(name, namespace)` keys under which the missing parent may later be registered. The
//! first registration matching any key removes the edge and re-runs the inheritance.

use tracing::debug;

use crate::parser::join_path;
use crate::runner::ds::class::ClassRef;
use crate::runner::ds::error::ClassError;
use crate::runner::ds::static_chain::add_descriptor_to_static;
use crate::runner::inheritance::Linked;
use crate::runner::members::{define_method, replay_property, Target};
use crate::runner::runtime::Runtime;

pub type ResolutionKey = (String, String);

struct PendingEdge {
    child: ClassRef,
    parents: Vec<String>,
    namespace: Option<String>,
    keys: Vec<ResolutionKey>,
}

#[derive(Default)]
pub struct PendingResolver {
    edges: Vec<PendingEdge>,
}
impl PendingResolver {
    pub fn new() -> Self {
        PendingResolver::default()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn is_pending(&self, child: &ClassRef) -> bool {
        self.edges.iter().any(|e| e.child.ptr_eq(child))
    }

    /// Every key the given class is waiting on.
    pub fn keys_for(&self, child: &ClassRef) -> Vec<ResolutionKey> {
        self.edges
            .iter()
            .filter(|e| e.child.ptr_eq(child))
            .flat_map(|e| e.keys.iter().cloned())
            .collect()
    }

    /// A class waits on one edge at a time; parking again replaces the old edge.
    fn park(&mut self, edge: PendingEdge) {
        self.edges.retain(|e| !e.child.ptr_eq(&edge.child));
        self.edges.push(edge);
    }

    fn take_matching(&mut self, name: &str, namespace: &str) -> Vec<PendingEdge> {
        let (fired, kept): (Vec<PendingEdge>, Vec<PendingEdge>) = std::mem::take(&mut self.edges)
            .into_iter()
            .partition(|e| e.keys.iter().any(|(n, ns)| n == name && ns == namespace));
        self.edges = kept;
        fired
    }
}

/// The outcome of looking up one parent name.
pub(crate) struct Resolution {
    pub(crate) class: Option<ClassRef>,
    pub(crate) namespace: String,
    pub(crate) keys: Vec<ResolutionKey>,
}

impl Runtime {
    /// Looks up a parent by name. Unqualified names are tried inside the child's namespace
    /// first when relative lookup is enabled.
    pub(crate) fn resolve_parent(
        &mut self,
        name: &str,
        child: &ClassRef,
    ) -> Result<Resolution, ClassError> {
        let info = self.get_class_path_info(name)?;
        let mut keys = vec![(info.name.clone(), info.namespace.clone())];
        if !info.namespace.is_empty() {
            keys.push((info.name.clone(), join_path(&info.namespace, &info.name)));
        }

        let mut class = None;
        let child_ns = child.namespace().unwrap_or_default();
        if self.config.resolution.relative_parents && !child_ns.is_empty() && !name.contains('.') {
            let qualified = join_path(&child_ns, name);
            class = self.get_class(&qualified)?.filter(|c| !c.ptr_eq(child));
            for key in vec![
                (name.to_string(), child_ns.clone()),
                (name.to_string(), qualified),
            ] {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        Ok(Resolution {
            class: class.or(info.class),
            namespace: info.namespace,
            keys,
        })
    }

    /// Parks `child` until the parent described by `missing` is registered.
    pub(crate) fn defer(
        &mut self,
        child: &ClassRef,
        parents: Vec<String>,
        namespace: Option<&str>,
        missing: Resolution,
    ) -> Result<(), ClassError> {
        child.enter_waiting();

        if !missing.namespace.is_empty() {
            if let Some(main) = self.get_class(&missing.namespace)? {
                if !main.ptr_eq(child) {
                    for (key, descriptor) in main.static_chain().unwrap_or_default() {
                        add_descriptor_to_static(child, &key, descriptor, true)?;
                    }
                }
            }
        }

        let waiting = child.clone();
        self.on_loaded(move |_, _| {
            if let Some(parent) = waiting.super_class() {
                parent.add_waiting_child(&waiting);
            }
            Ok(())
        })?;

        debug!(class = %child.name(), parents = ?parents, keys = ?missing.keys, "deferring inheritance");
        self.pending.park(PendingEdge {
            child: child.clone(),
            parents,
            namespace: namespace.map(String::from),
            keys: missing.keys,
        });
        Ok(())
    }

    /// Re-runs every pending inheritance waiting on a class called `name` in `namespace`.
    pub(crate) fn fire_pending(&mut self, name: &str, namespace: &str) -> Result<(), ClassError> {
        for edge in self.pending.take_matching(name, namespace) {
            debug!(class = %edge.child.name(), parent = name, namespace, "resolving deferred parent");
            let linked = self.inherit_names(
                edge.parents,
                edge.namespace.as_deref(),
                &edge.child,
                false,
            )?;
            if let Linked::Done(_) = linked {
                self.replay_waiting(&edge.child)?;
            }
        }
        Ok(())
    }

    /// Applies everything queued while `class` was waiting, in the order it was requested.
    fn replay_waiting(&mut self, class: &ClassRef) -> Result<(), ClassError> {
        let waiting = match class.take_waiting() {
            Some(w) => w,
            None => return Ok(()),
        };

        let proto = class.prototype();
        for (keys, _) in &waiting.methods {
            for key in keys.iter() {
                proto.delete(key)?;
            }
        }
        for queued in &waiting.properties {
            proto.delete(&queued.key)?;
        }

        let target = Target::Class(class.clone());
        for (keys, descriptor) in waiting.methods {
            define_method(&target, keys, descriptor)?;
        }
        for queued in waiting.properties {
            replay_property(class, queued)?;
        }
        if let Some(parent) = class.super_class() {
            for task in parent.constitutors() {
                self.constitute(class, task)?;
            }
        }
        for task in waiting.constitute {
            self.constitute(class, task)?;
        }
        Ok(())
    }
}
