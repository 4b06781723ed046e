use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::runner::ds::class::{Class, ClassRef};
use crate::runner::ds::error::ClassError;
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};
use crate::runner::ds::value::Value;

pub struct ObjectData {
    properties: IndexMap<PropertyKey, PropertyDescriptor>,
    prototype: Option<ObjectRef>,
    constructor: Option<Weak<RefCell<Class>>>,
}

/// Shared handle to an object: an ordered own-property table plus an optional delegate.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<ObjectData>>);

impl ObjectRef {
    pub fn new() -> Self {
        ObjectRef::with_prototype(None)
    }

    pub fn with_prototype(prototype: Option<ObjectRef>) -> Self {
        ObjectRef(Rc::new(RefCell::new(ObjectData {
            properties: IndexMap::new(),
            prototype,
            constructor: None,
        })))
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn prototype(&self) -> Option<ObjectRef> {
        self.0.borrow().prototype.clone()
    }

    /// Re-point the delegate of this object. Refuses to build a cycle.
    pub fn set_prototype(&self, prototype: Option<ObjectRef>) -> Result<(), ClassError> {
        let mut p = prototype.clone();
        while let Some(o) = p {
            if o.ptr_eq(self) {
                return Err(ClassError::TypeError(
                    "cyclic prototype chain is not allowed".to_string(),
                ));
            }
            p = o.prototype();
        }
        self.0.borrow_mut().prototype = prototype;
        Ok(())
    }

    pub(crate) fn set_constructor(&self, class: Weak<RefCell<Class>>) {
        self.0.borrow_mut().constructor = Some(class);
    }

    /// The class this object was built from, looked up along the delegate chain.
    pub fn constructor_class(&self) -> Option<ClassRef> {
        let mut current = Some(self.clone());
        while let Some(o) = current {
            if let Some(c) = &o.0.borrow().constructor {
                return c.upgrade().map(ClassRef::from_rc);
            }
            current = o.prototype();
        }
        None
    }

    pub fn is_instance_of(&self, class: &ClassRef) -> bool {
        let target = class.prototype();
        let mut current = self.prototype();
        while let Some(o) = current {
            if o.ptr_eq(&target) {
                return true;
            }
            current = o.prototype();
        }
        false
    }

    pub fn get_own_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        self.0.borrow().properties.get(key).cloned()
    }

    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        self.0.borrow().properties.contains_key(key)
    }

    /// Finds the descriptor for `key` on this object or the first delegate that owns it.
    pub fn get_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        let mut current = Some(self.clone());
        while let Some(o) = current {
            if let Some(d) = o.get_own_property(key) {
                return Some(d);
            }
            current = o.prototype();
        }
        None
    }

    pub fn has_property(&self, key: &PropertyKey) -> bool {
        self.get_property(key).is_some()
    }

    pub fn define_own_property(
        &self,
        key: PropertyKey,
        descriptor: PropertyDescriptor,
    ) -> Result<(), ClassError> {
        let mut data = self.0.borrow_mut();
        if let Some(existing) = data.properties.get(&key) {
            if !existing.is_configurable() {
                return Err(ClassError::TypeError(format!(
                    "cannot redefine property: {}",
                    key
                )));
            }
        }
        data.properties.insert(key, descriptor);
        Ok(())
    }

    pub fn delete(&self, key: &PropertyKey) -> Result<bool, ClassError> {
        let mut data = self.0.borrow_mut();
        match data.properties.get(key) {
            None => Ok(true),
            Some(d) if d.is_configurable() => {
                data.properties.shift_remove(key);
                Ok(true)
            }
            Some(_) => Err(ClassError::TypeError(format!(
                "cannot delete property: {}",
                key
            ))),
        }
    }

    pub fn own_property_keys(&self) -> Vec<PropertyKey> {
        self.0.borrow().properties.keys().cloned().collect()
    }

    pub fn own_entries(&self) -> Vec<(PropertyKey, PropertyDescriptor)> {
        self.0
            .borrow()
            .properties
            .iter()
            .map(|(k, d)| (k.clone(), d.clone()))
            .collect()
    }

    pub fn get(&self, key: &PropertyKey) -> Result<Value, ClassError> {
        self.get_with_receiver(key, &Value::Object(self.clone()))
    }

    /// `[[Get]]`: data values are returned as stored, getters run against `receiver`.
    pub fn get_with_receiver(&self, key: &PropertyKey, receiver: &Value) -> Result<Value, ClassError> {
        match self.get_property(key) {
            None => Ok(Value::Undefined),
            Some(PropertyDescriptor::Data { value, .. }) => Ok(value),
            Some(PropertyDescriptor::Accessor { get, .. }) => match get {
                Some(g) => g.call(receiver, vec![]),
                None => Ok(Value::Undefined),
            },
        }
    }

    pub fn set(&self, key: PropertyKey, value: Value) -> Result<(), ClassError> {
        self.set_with_receiver(key, value, &Value::Object(self.clone()))
    }

    /// `[[Set]]`: an inherited setter runs against `receiver`; otherwise the value lands as an
    /// own data property of the receiver.
    pub fn set_with_receiver(
        &self,
        key: PropertyKey,
        value: Value,
        receiver: &Value,
    ) -> Result<(), ClassError> {
        match self.get_property(&key) {
            Some(PropertyDescriptor::Accessor { set: Some(s), .. }) => {
                s.call(receiver, vec![value])?;
                Ok(())
            }
            Some(PropertyDescriptor::Accessor { set: None, .. }) => Err(ClassError::TypeError(
                format!("cannot set property {} which has only a getter", key),
            )),
            Some(PropertyDescriptor::Data { writable: false, .. }) => Err(ClassError::TypeError(
                format!("cannot assign to read only property '{}'", key),
            )),
            _ => {
                let target = receiver.as_object().ok_or_else(|| {
                    ClassError::InvalidTarget(format!("cannot set '{}' on {}", key, receiver))
                })?;
                let descriptor = match target.get_own_property(&key) {
                    Some(PropertyDescriptor::Data {
                        enumerable,
                        configurable,
                        ..
                    }) => PropertyDescriptor::Data {
                        value,
                        writable: true,
                        enumerable,
                        configurable,
                    },
                    _ => PropertyDescriptor::data(value),
                };
                target.define_own_property(key, descriptor)
            }
        }
    }

    /// Looks up `key` and calls it with this object as `this`.
    pub fn call_method(&self, key: &PropertyKey, args: Vec<Value>) -> Result<Value, ClassError> {
        let this = Value::Object(self.clone());
        match self.get_with_receiver(key, &this)? {
            Value::Function(f) => f.call(&this, args),
            other => Err(ClassError::TypeError(format!(
                "{} is not a function (got {})",
                key,
                other.type_name()
            ))),
        }
    }
}
impl Default for ObjectRef {
    fn default() -> Self {
        ObjectRef::new()
    }
}
impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.own_property_keys().iter().map(|k| k.to_string()).collect();
        f.debug_struct("ObjectRef").field("keys", &keys).finish()
    }
}
