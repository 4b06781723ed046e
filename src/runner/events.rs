//! Filter-matched notifications for namespace creation and class registration.

use std::rc::Rc;

use tracing::trace;

use crate::runner::ds::error::ClassError;
use crate::runner::runtime::Runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A namespace node was created by `get_namespace`.
    Namespace,
    /// A class was linked to its parent and registered.
    Extended,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub ancestor: Option<String>,
    pub descendant: Option<String>,
    pub namespace: String,
}

/// A listener fires on every event whose fields equal each field the filter sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub kind: Option<EventKind>,
    pub ancestor: Option<String>,
    pub descendant: Option<String>,
    pub namespace: Option<String>,
}
impl EventFilter {
    pub fn extended() -> Self {
        EventFilter {
            kind: Some(EventKind::Extended),
            ..EventFilter::default()
        }
    }

    pub fn namespace_created() -> Self {
        EventFilter {
            kind: Some(EventKind::Namespace),
            ..EventFilter::default()
        }
    }

    pub fn descendant(mut self, name: impl Into<String>) -> Self {
        self.descendant = Some(name.into());
        self
    }

    pub fn ancestor(mut self, name: impl Into<String>) -> Self {
        self.ancestor = Some(name.into());
        self
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        fn field(f: &Option<String>, v: &Option<String>) -> bool {
            match f {
                None => true,
                Some(f) => v.as_ref() == Some(f),
            }
        }
        self.kind.map_or(true, |k| k == event.kind)
            && field(&self.ancestor, &event.ancestor)
            && field(&self.descendant, &event.descendant)
            && self.namespace.as_ref().map_or(true, |n| *n == event.namespace)
    }
}

pub type Listener = Rc<dyn Fn(&mut Runtime, &Event) -> Result<(), ClassError>>;

struct Subscription {
    filter: EventFilter,
    once: bool,
    callback: Listener,
}

#[derive(Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
}
impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    pub fn listener_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn add(&mut self, filter: EventFilter, once: bool, callback: Listener) {
        self.subscriptions.push(Subscription {
            filter,
            once,
            callback,
        });
    }

    /// Detaches every listener whose callbacks fire for `event`; once-listeners are dropped.
    fn take_matching(&mut self, event: &Event) -> Vec<Listener> {
        let mut fired = vec![];
        self.subscriptions.retain(|s| {
            if s.filter.matches(event) {
                fired.push(s.callback.clone());
                !s.once
            } else {
                true
            }
        });
        fired
    }
}

impl Runtime {
    pub fn on<F>(&mut self, filter: EventFilter, callback: F)
    where
        F: Fn(&mut Runtime, &Event) -> Result<(), ClassError> + 'static,
    {
        self.events.add(filter, false, Rc::new(callback));
    }

    pub fn once<F>(&mut self, filter: EventFilter, callback: F)
    where
        F: Fn(&mut Runtime, &Event) -> Result<(), ClassError> + 'static,
    {
        self.events.add(filter, true, Rc::new(callback));
    }

    /// Removes listeners registered with exactly this filter.
    pub fn remove_all_listeners(&mut self, filter: &EventFilter) {
        self.events.subscriptions.retain(|s| s.filter != *filter);
    }

    pub(crate) fn emit(&mut self, event: Event) -> Result<(), ClassError> {
        let listeners = self.events.take_matching(&event);
        trace!(kind = ?event.kind, namespace = %event.namespace, listeners = listeners.len(), "emit");
        for listener in listeners {
            listener(self, &event)?;
        }
        Ok(())
    }
}
