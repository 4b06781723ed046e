//! The runtime owns every piece of shared state: the class registry, listeners, the job
//! queues and the pending parent resolutions.

use tracing::debug;

use crate::parser::{join_path, ClassPath, PathParser};
use crate::runner::config::RuntimeConfig;
use crate::runner::ds::class::ClassRef;
use crate::runner::ds::error::ClassError;
use crate::runner::events::{Event, EventBus, EventKind};
use crate::runner::registry::{ClassRegistry, Entry, NamespaceRef};
use crate::runner::resolver::PendingResolver;
use crate::runner::scheduler::Scheduler;

pub struct Runtime {
    pub(crate) registry: ClassRegistry,
    pub(crate) events: EventBus,
    pub(crate) scheduler: Scheduler,
    pub(crate) pending: PendingResolver,
    pub(crate) config: RuntimeConfig,
}

/// Where a dotted path points, see [`Runtime::get_class_path_info`].
#[derive(Debug, Clone)]
pub struct ClassPathInfo {
    pub name: String,
    pub namespace: String,
    pub path: String,
    pub class: Option<ClassRef>,
    pub namespace_wrapper: NamespaceRef,
}

impl Runtime {
    pub fn new() -> Self {
        Runtime::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Runtime {
            registry: ClassRegistry::new(),
            events: EventBus::new(),
            scheduler: Scheduler::new(),
            pending: PendingResolver::new(),
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn define_global(&mut self, name: impl Into<String>, class: ClassRef) {
        self.registry.define_global(name, class);
    }

    /// Returns the node at `path`, creating a flagged namespace there if nothing exists yet.
    pub fn get_namespace(&mut self, path: &str) -> Result<NamespaceRef, ClassError> {
        let parsed = PathParser::parse_path(path)?;
        self.namespace_at(&parsed)
    }

    pub(crate) fn namespace_at(&mut self, path: &ClassPath) -> Result<NamespaceRef, ClassError> {
        if path.is_root() {
            return Ok(self.registry.root());
        }
        match self.registry.lookup(path) {
            Some(Entry::Namespace(ns)) => Ok(ns),
            Some(Entry::Class(c)) => Err(ClassError::InvalidTarget(format!(
                "'{}' is already the class {:?}",
                path, c
            ))),
            None => {
                let ns = self.registry.insert_namespace(path)?;
                debug!(namespace = %path, "created namespace");
                self.emit(Event {
                    kind: EventKind::Namespace,
                    ancestor: None,
                    descendant: None,
                    namespace: path.to_string(),
                })?;
                Ok(ns)
            }
        }
    }

    /// Resolves `path` to a class. A namespace answers with its main class. Absence is `None`.
    pub fn get_class(&self, path: &str) -> Result<Option<ClassRef>, ClassError> {
        let parsed = PathParser::parse_path(path)?;
        Ok(self.class_at(&parsed))
    }

    pub(crate) fn class_at(&self, path: &ClassPath) -> Option<ClassRef> {
        match self.registry.lookup(path) {
            Some(Entry::Class(c)) => return Some(c),
            Some(Entry::Namespace(ns)) => {
                if let Some(main) = ns.main_class() {
                    return Some(main);
                }
            }
            None => {}
        }
        if self.config.resolution.global_fallback {
            self.registry.global(&path.to_string())
        } else {
            None
        }
    }

    /// Splits `path` into the class name and namespace it denotes, ensuring the namespace
    /// node exists.
    pub fn get_class_path_info(&mut self, path: &str) -> Result<ClassPathInfo, ClassError> {
        let parsed = PathParser::parse_path(path)?;
        let (name, namespace, full) = match self.registry.lookup(&parsed) {
            None => (
                parsed.leaf().to_string(),
                parsed.parent(),
                parsed.clone(),
            ),
            Some(Entry::Namespace(ns)) => {
                let name = ns.name();
                let full = parsed.child(&name);
                (name, parsed.clone(), full)
            }
            Some(Entry::Class(c)) => {
                let namespace = PathParser::parse_path(&c.namespace().unwrap_or_default())?;
                (c.name(), namespace, parsed.clone())
            }
        };

        let mut class = self.registry.lookup_class(&full);
        if class.is_none() && namespace.is_root() && self.config.resolution.global_fallback {
            class = self.registry.global(&name);
        }
        let namespace_wrapper = match self.registry.lookup(&namespace) {
            Some(Entry::Namespace(ns)) => ns,
            _ => self.namespace_at(&namespace)?,
        };

        Ok(ClassPathInfo {
            name,
            namespace: namespace.to_string(),
            path: full.to_string(),
            class,
            namespace_wrapper,
        })
    }

    /// Checks that a class called `name` can be stored in `namespace` and creates the namespace
    /// node. Nothing else is touched when this fails.
    pub(crate) fn prepare_slot(&mut self, namespace: &str, name: &str) -> Result<ClassPath, ClassError> {
        let path = class_path(namespace, name)?;
        let ns = path.parent();
        if !ns.is_root() {
            self.namespace_at(&ns)?;
        }
        Ok(path)
    }

    /// Registers `class` under `namespace.name`. Returns the path it was stored at.
    pub(crate) fn register(&mut self, namespace: &str, class: &ClassRef) -> Result<ClassPath, ClassError> {
        let path = self.prepare_slot(namespace, &class.name())?;
        self.registry.set_path(&path, class)
    }
}

/// The registry path of a class called `name` in `namespace`. The name must be one non-empty
/// path segment.
pub(crate) fn class_path(namespace: &str, name: &str) -> Result<ClassPath, ClassError> {
    if name.is_empty() {
        return Err(ClassError::InvalidKey("class name must not be empty".to_string()));
    }
    let ns = PathParser::parse_path(namespace)?;
    let path = PathParser::parse_path(&join_path(namespace, name))?;
    if path.len() != ns.len() + 1 {
        return Err(ClassError::InvalidPath {
            path: path.to_string(),
            reason: format!("class name '{}' must be a single segment", name),
        });
    }
    Ok(path)
}
impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}
