//! Member definition API: methods, properties, statics, lazy and enforced properties, and
//! trait composition.
//!
//! Every operation takes a [`Target`]. A class target puts instance members on the class
//! prototype, hidden from enumeration. A plain object target receives the members directly.
//! The same operations are also available as methods on [`ClassRef`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::runner::ds::class::{ClassRef, Constitutor, QueuedProperty};
use crate::runner::ds::error::ClassError;
use crate::runner::ds::function_object::{same_function, FunctionObject, FunctionRef};
use crate::runner::ds::object::ObjectRef;
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};
use crate::runner::ds::static_chain::add_descriptor_to_static;
use crate::runner::ds::symbol::SymbolData;
use crate::runner::ds::value::Value;
use crate::runner::runtime::Runtime;

lazy_static! {
    pub static ref COMPOSITOR_PARENT_KEY: PropertyKey = PropertyKey::from("compositorParent");
}

#[derive(Clone, Debug)]
pub enum Target {
    Class(ClassRef),
    Object(ObjectRef),
}
impl Target {
    /// Classes and objects are valid targets; anything else is rejected.
    pub fn from_value(value: &Value) -> Result<Target, ClassError> {
        match value {
            Value::Class(c) => Ok(Target::Class(c.clone())),
            Value::Object(o) => Ok(Target::Object(o.clone())),
            other => Err(ClassError::InvalidTarget(format!(
                "expected a class or object, got {}",
                other.type_name()
            ))),
        }
    }

    /// The object instance members are defined on.
    pub fn member_holder(&self) -> ObjectRef {
        match self {
            Target::Class(c) => c.prototype(),
            Target::Object(o) => o.clone(),
        }
    }

    fn enumerable(&self) -> bool {
        matches!(self, Target::Object(_))
    }

    fn waiting_class(&self) -> Option<&ClassRef> {
        match self {
            Target::Class(c) if c.is_waiting() => Some(c),
            _ => None,
        }
    }
}
impl From<ClassRef> for Target {
    fn from(c: ClassRef) -> Self {
        Target::Class(c)
    }
}
impl From<&ClassRef> for Target {
    fn from(c: &ClassRef) -> Self {
        Target::Class(c.clone())
    }
}
impl From<ObjectRef> for Target {
    fn from(o: ObjectRef) -> Self {
        Target::Object(o)
    }
}
impl From<&ObjectRef> for Target {
    fn from(o: &ObjectRef) -> Self {
        Target::Object(o.clone())
    }
}

/// One or more names for the same member. The first name is the primary one.
#[derive(Clone, Debug, PartialEq)]
pub struct Keys(Vec<PropertyKey>);
impl Keys {
    pub fn new(keys: Vec<PropertyKey>) -> Self {
        Keys(keys)
    }

    fn validate(self, what: &str) -> Result<Keys, ClassError> {
        match self.0.first() {
            None => Err(ClassError::InvalidKey(format!("{} must be set to a valid key", what))),
            Some(PropertyKey::Str(s)) if s.is_empty() => {
                Err(ClassError::InvalidKey(format!("{} must be set to a valid key", what)))
            }
            Some(_) => Ok(self),
        }
    }

    pub fn first(&self) -> Option<&PropertyKey> {
        self.0.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PropertyKey> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<PropertyKey> {
        self.0.clone()
    }
}
impl From<&str> for Keys {
    fn from(s: &str) -> Self {
        Keys(vec![PropertyKey::from(s)])
    }
}
impl From<String> for Keys {
    fn from(s: String) -> Self {
        Keys(vec![PropertyKey::from(s)])
    }
}
impl From<PropertyKey> for Keys {
    fn from(k: PropertyKey) -> Self {
        Keys(vec![k])
    }
}
impl From<SymbolData> for Keys {
    fn from(s: SymbolData) -> Self {
        Keys(vec![PropertyKey::Sym(s)])
    }
}
impl From<Vec<&str>> for Keys {
    fn from(v: Vec<&str>) -> Self {
        Keys(v.into_iter().map(PropertyKey::from).collect())
    }
}
impl From<&[&str]> for Keys {
    fn from(v: &[&str]) -> Self {
        Keys(v.iter().map(|s| PropertyKey::from(*s)).collect())
    }
}
impl From<Vec<PropertyKey>> for Keys {
    fn from(v: Vec<PropertyKey>) -> Self {
        Keys(v)
    }
}

fn static_name(key: &PropertyKey) -> Result<&str, ClassError> {
    key.as_str()
        .ok_or_else(|| ClassError::InvalidKey(format!("static members need a string key, got {}", key)))
}

/// A property is either computed by a getter or holds a plain value.
#[derive(Clone)]
pub enum PropertyInit {
    Getter(FunctionRef),
    Value(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    Field,
    Accessor,
}
impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemberKind::Method => "method",
            MemberKind::Field => "field",
            MemberKind::Accessor => "accessor",
        };
        write!(f, "{}", s)
    }
}

/// What a decorator receives and returns.
#[derive(Clone, Debug)]
pub struct Decoration {
    pub kind: MemberKind,
    pub key: PropertyKey,
    pub descriptor: PropertyDescriptor,
}

/// Which compositor methods get forwarded onto the composing target.
#[derive(Clone, Debug, PartialEq)]
pub enum Traits {
    All,
    Only(Vec<String>),
    None,
}

/// Attaches `method` under every key. The member already reachable at the first key becomes
/// the method's `super`.
pub fn set_method(
    target: impl Into<Target>,
    keys: impl Into<Keys>,
    method: FunctionRef,
) -> Result<FunctionRef, ClassError> {
    define_method(
        &target.into(),
        keys.into(),
        PropertyDescriptor::hidden(Value::Function(method.clone())),
    )?;
    Ok(method)
}

pub(crate) fn define_method(
    target: &Target,
    keys: Keys,
    descriptor: PropertyDescriptor,
) -> Result<(), ClassError> {
    let keys = keys.validate("method")?;
    let holder = target.member_holder();

    if let (Some(method), Some(first)) = (descriptor.function(), keys.first()) {
        if let Some(existing) = holder.get_property(first).as_ref().and_then(|d| d.function()) {
            if !same_function(existing, method) {
                method.set_super(Some(existing.clone()));
            }
        }
    }

    if let Some(class) = target.waiting_class() {
        class.with_waiting(|w| w.methods.push((keys.clone(), descriptor.clone())));
    }
    for key in keys.iter() {
        holder.define_own_property(key.clone(), descriptor.clone())?;
    }
    Ok(())
}

/// Lets `decorator` rewrite a method before it is attached. Only methods can be decorated.
pub fn decorate_method<F>(
    target: impl Into<Target>,
    key: impl Into<PropertyKey>,
    method: FunctionRef,
    decorator: F,
) -> Result<(), ClassError>
where
    F: FnOnce(Decoration) -> Result<Decoration, ClassError>,
{
    let decoration = decorator(Decoration {
        kind: MemberKind::Method,
        key: key.into(),
        descriptor: PropertyDescriptor::hidden(Value::Function(method)),
    })?;
    match decoration.kind {
        MemberKind::Method => define_method(
            &target.into(),
            Keys::from(decoration.key),
            decoration.descriptor,
        ),
        kind => Err(ClassError::Unsupported(format!("decorating {}", kind))),
    }
}

/// Defines a getter/setter pair or a plain value under every key.
///
/// A getter defined on a class with a parent takes the parent's accessor for the same key as
/// its `super`, and inherits the parent's setter if none is given.
pub fn set_property(
    target: impl Into<Target>,
    keys: impl Into<Keys>,
    init: PropertyInit,
    setter: Option<FunctionRef>,
) -> Result<(), ClassError> {
    let target = target.into();
    let keys = keys.into().validate("property")?;
    let enumerable = target.enumerable();
    let holder = target.member_holder();

    let mut descriptor = match init {
        PropertyInit::Getter(get) => PropertyDescriptor::accessor(Some(get), setter, enumerable),
        PropertyInit::Value(value) => PropertyDescriptor::Data {
            value,
            writable: true,
            enumerable,
            configurable: true,
        },
    };

    let mut super_desc: Option<PropertyDescriptor> = None;
    for key in keys.iter() {
        if let Some(class) = target.waiting_class() {
            class.with_waiting(|w| {
                w.properties.push(QueuedProperty {
                    key: key.clone(),
                    descriptor: descriptor.clone(),
                    links_super: true,
                })
            });
        } else if super_desc.is_none() {
            super_desc = super_accessor(&target, key, &descriptor);
        }
        if let Some(parent_desc) = &super_desc {
            link_super_accessor(&mut descriptor, parent_desc);
        }
        holder.define_own_property(key.clone(), descriptor.clone())?;
    }
    Ok(())
}

/// The parent's accessor for `key`, when `descriptor` is an accessor defined on a linked class.
fn super_accessor(
    target: &Target,
    key: &PropertyKey,
    descriptor: &PropertyDescriptor,
) -> Option<PropertyDescriptor> {
    if !descriptor.is_accessor_descriptor() {
        return None;
    }
    match target {
        Target::Class(class) => class
            .super_class()
            .and_then(|parent| parent.prototype().get_property(key))
            .filter(|d| d.is_accessor_descriptor()),
        Target::Object(_) => None,
    }
}

fn link_super_accessor(descriptor: &mut PropertyDescriptor, parent: &PropertyDescriptor) {
    if let PropertyDescriptor::Accessor { get, set, .. } = descriptor {
        if let Some(g) = get {
            g.set_super(parent.getter().cloned());
        }
        if let Some(parent_set) = parent.setter() {
            match set {
                Some(s) => s.set_super(Some(parent_set.clone())),
                None => *set = Some(parent_set.clone()),
            }
        }
    }
}

/// Re-applies a property queued while `class` was waiting, now that its parent is linked.
pub(crate) fn replay_property(class: &ClassRef, queued: QueuedProperty) -> Result<(), ClassError> {
    let QueuedProperty {
        key,
        mut descriptor,
        links_super,
    } = queued;
    if links_super {
        if let Some(parent_desc) = super_accessor(&Target::Class(class.clone()), &key, &descriptor) {
            link_super_accessor(&mut descriptor, &parent_desc);
        }
    }
    class.prototype().define_own_property(key, descriptor)
}

/// Defines a read-only static value that subclasses inherit when `inherit` is set.
pub fn set_static(
    class: &ClassRef,
    keys: impl Into<Keys>,
    value: Value,
    inherit: bool,
) -> Result<(), ClassError> {
    let keys = keys.into().validate("static property")?;
    let descriptor = PropertyDescriptor::Data {
        value,
        writable: false,
        enumerable: false,
        configurable: true,
    };
    for key in keys.iter() {
        add_descriptor_to_static(class, static_name(key)?, descriptor.clone(), inherit)?;
    }
    Ok(())
}

pub fn set_static_property(
    class: &ClassRef,
    keys: impl Into<Keys>,
    init: PropertyInit,
    setter: Option<FunctionRef>,
    inherit: bool,
) -> Result<(), ClassError> {
    let keys = keys.into().validate("static property")?;
    let descriptor = match init {
        PropertyInit::Getter(get) => PropertyDescriptor::accessor(Some(get), setter, false),
        PropertyInit::Value(value) => PropertyDescriptor::Data {
            value,
            writable: false,
            enumerable: false,
            configurable: true,
        },
    };
    for key in keys.iter() {
        add_descriptor_to_static(class, static_name(key)?, descriptor.clone(), inherit)?;
    }
    Ok(())
}

/// The accessor pair behind lazy properties. On first get it calls `getter` with a `doNext`
/// function, on first set it takes the assigned value. Either way it then replaces itself on
/// the receiver with a read-only value and runs the continuations handed to `doNext`.
fn lazy_descriptor(keys: &Keys, getter: FunctionRef, enumerable: bool) -> PropertyDescriptor {
    let keys = keys.to_vec();
    let definer = FunctionObject::new("definer", move |_, this, args| {
        let receiver = this.as_object().ok_or_else(|| {
            ClassError::InvalidTarget(format!("cannot define a lazy property on {}", this))
        })?;
        let continuations: Rc<RefCell<Vec<FunctionRef>>> = Rc::new(RefCell::new(vec![]));

        let value = match args.into_iter().next() {
            Some(v) => v,
            None => {
                let queue = continuations.clone();
                let do_next = FunctionObject::new("doNext", move |_, _, args| match args.first() {
                    Some(Value::Function(f)) => {
                        queue.borrow_mut().push(f.clone());
                        Ok(Value::Undefined)
                    }
                    _ => Err(ClassError::TypeError("doNext expects a function".to_string())),
                });
                getter.call(this, vec![Value::Function(do_next)])?
            }
        };

        for key in &keys {
            receiver.define_own_property(
                key.clone(),
                PropertyDescriptor::Data {
                    value: value.clone(),
                    writable: false,
                    enumerable,
                    configurable: true,
                },
            )?;
        }

        let pending = continuations.borrow().clone();
        for next in pending {
            next.call(this, vec![])?;
        }
        Ok(value)
    });
    PropertyDescriptor::Accessor {
        get: Some(definer.clone()),
        set: Some(definer),
        enumerable,
        configurable: true,
    }
}

/// Defines a property computed by `getter` on first access and then frozen per receiver.
pub fn prepare_property(
    target: impl Into<Target>,
    keys: impl Into<Keys>,
    getter: FunctionRef,
) -> Result<(), ClassError> {
    let target = target.into();
    let keys = keys.into().validate("property")?;
    let descriptor = lazy_descriptor(&keys, getter, false);
    let holder = target.member_holder();
    for key in keys.iter() {
        if let Some(class) = target.waiting_class() {
            class.with_waiting(|w| {
                w.properties.push(QueuedProperty {
                    key: key.clone(),
                    descriptor: descriptor.clone(),
                    links_super: false,
                })
            });
        }
        holder.define_own_property(key.clone(), descriptor.clone())?;
    }
    Ok(())
}

/// Like [`prepare_property`], for class-level members. Subclasses inherit the lazy accessor and
/// compute their own value.
pub fn prepare_static_property(
    class: &ClassRef,
    keys: impl Into<Keys>,
    getter: FunctionRef,
) -> Result<(), ClassError> {
    let keys = keys.into().validate("static property")?;
    let descriptor = lazy_descriptor(&keys, getter, false);
    for key in keys.iter() {
        add_descriptor_to_static(class, static_name(key)?, descriptor.clone(), true)?;
    }
    Ok(())
}

/// Routes every read and write of the property through `setter`.
///
/// The value lives behind a fresh, non-enumerable symbol slot. A read while the slot is
/// `undefined` calls `setter()` and stores the result; every write calls `setter(new, old)`.
/// Returns the slot.
pub fn enforce_property(
    target: impl Into<Target>,
    keys: impl Into<Keys>,
    setter: FunctionRef,
) -> Result<SymbolData, ClassError> {
    let target = target.into();
    let keys = keys.into().validate("property")?;
    let symbol = match keys.first() {
        Some(first) => SymbolData::new(first.to_string()),
        None => SymbolData::new_empty(),
    };
    let slot = PropertyKey::Sym(symbol.clone());
    target
        .member_holder()
        .define_own_property(slot.clone(), PropertyDescriptor::hidden(Value::Undefined))?;

    let (get_slot, get_setter) = (slot.clone(), setter.clone());
    let getter = FunctionObject::new("getter", move |_, this, _| {
        let receiver = receiver_of(this)?;
        let current = receiver.get_with_receiver(&get_slot, this)?;
        if !current.is_undefined() {
            return Ok(current);
        }
        let value = get_setter.call(this, vec![])?;
        store_slot(&receiver, &get_slot, value.clone())?;
        Ok(value)
    });
    let enforcer = FunctionObject::new("setter", move |_, this, args| {
        let receiver = receiver_of(this)?;
        let old = receiver.get_with_receiver(&slot, this)?;
        let new = args.into_iter().next().unwrap_or(Value::Undefined);
        let value = setter.call(this, vec![new, old])?;
        store_slot(&receiver, &slot, value)?;
        Ok(Value::Undefined)
    });

    set_property(target, keys, PropertyInit::Getter(getter), Some(enforcer))?;
    Ok(symbol)
}

fn store_slot(receiver: &ObjectRef, slot: &PropertyKey, value: Value) -> Result<(), ClassError> {
    receiver.define_own_property(slot.clone(), PropertyDescriptor::hidden(value))
}

fn receiver_of(this: &Value) -> Result<ObjectRef, ClassError> {
    this.as_object()
        .ok_or_else(|| ClassError::InvalidTarget(format!("{} has no properties", this)))
}

/// The function that builds a compositor instance the first time `key` is read.
fn composite_getter(compositor: &ClassRef) -> FunctionRef {
    let compositor = compositor.clone();
    FunctionObject::new("getComposite", move |_, this, args| {
        let do_next = args.into_iter().next().unwrap_or(Value::Undefined);
        let instance = ObjectRef::with_prototype(Some(compositor.prototype()));
        instance.define_own_property(
            COMPOSITOR_PARENT_KEY.clone(),
            PropertyDescriptor::Data {
                value: this.clone(),
                writable: false,
                enumerable: false,
                configurable: true,
            },
        )?;
        let instance = Value::Object(instance);
        match compositor.apply_constructor(&instance, vec![do_next])? {
            Value::Object(replacement) => {
                replacement.define_own_property(
                    COMPOSITOR_PARENT_KEY.clone(),
                    PropertyDescriptor::hidden(this.clone()),
                )?;
                Ok(Value::Object(replacement))
            }
            _ => Ok(instance),
        }
    })
}

fn trait_methods(compositor: &ClassRef, traits: &Traits) -> Vec<(String, FunctionRef)> {
    let proto = compositor.prototype();
    let own_function = |key: &PropertyKey| {
        proto
            .get_own_property(key)
            .and_then(|d| d.function().cloned())
    };
    match traits {
        Traits::None => vec![],
        Traits::All => proto
            .own_property_keys()
            .into_iter()
            .filter_map(|k| {
                let name = k.as_str()?.to_string();
                own_function(&k).map(|f| (name, f))
            })
            .collect(),
        Traits::Only(names) => names
            .iter()
            .filter_map(|n| own_function(&PropertyKey::from(n.as_str())).map(|f| (n.clone(), f)))
            .collect(),
    }
}

/// A method that calls `name` on the composite stored under `key` of the receiver.
fn trait_forwarder(key: &str, name: &str) -> FunctionRef {
    let key = PropertyKey::from(key);
    let method = PropertyKey::from(name);
    FunctionObject::new(name.to_string(), move |_, this, args| {
        let composite = receiver_of(this)?.get_with_receiver(&key, this)?;
        match composite.as_object() {
            Some(o) => o.call_method(&method, args),
            None => Err(ClassError::TypeError(format!(
                "composite '{}' is {}",
                key,
                composite.type_name()
            ))),
        }
    })
}

fn owns_member(holder: &ObjectRef, name: &str) -> bool {
    match holder.get_own_property(&PropertyKey::from(name)) {
        Some(PropertyDescriptor::Data { value, .. }) => !value.is_nullish(),
        Some(PropertyDescriptor::Accessor { .. }) => true,
        None => false,
    }
}

/// Embeds a lazily built instance of `compositor` under `key` and forwards the selected trait
/// methods to it. Members the target already owns are left alone.
pub fn compose(
    target: impl Into<Target>,
    key: &str,
    compositor: &ClassRef,
    traits: Traits,
) -> Result<(), ClassError> {
    let target = target.into();
    prepare_property(target.clone(), key, composite_getter(compositor))?;
    let holder = target.member_holder();
    for (name, _) in trait_methods(compositor, &traits) {
        if owns_member(&holder, &name) {
            continue;
        }
        set_method(target.clone(), name.as_str(), trait_forwarder(key, &name))?;
    }
    Ok(())
}

/// Class-level [`compose`]. The class's compose data starts as a copy of its parent's and
/// records every static composite by key.
pub fn static_compose(
    class: &ClassRef,
    key: &str,
    compositor: &ClassRef,
    traits: Traits,
) -> Result<(), ClassError> {
    let mut data = match class.compose_data() {
        Some(data) => data,
        None => class
            .super_class()
            .and_then(|parent| parent.compose_data())
            .unwrap_or_else(IndexMap::new),
    };
    data.insert(key.to_string(), Value::Class(compositor.clone()));
    class.set_compose_data(data);

    prepare_static_property(class, key, composite_getter(compositor))?;
    let statics = class.statics();
    for (name, _) in trait_methods(compositor, &traits) {
        if owns_member(&statics, &name) {
            continue;
        }
        set_static(
            class,
            name.as_str(),
            Value::Function(trait_forwarder(key, &name)),
            true,
        )?;
    }
    Ok(())
}

/// Every descendant of `class`, depth first, each child before its own children.
pub fn get_children(class: &ClassRef) -> Vec<ClassRef> {
    let mut result = vec![];
    fn walk(class: &ClassRef, result: &mut Vec<ClassRef>) {
        for child in class.children() {
            result.push(child.clone());
            walk(&child, result);
        }
    }
    walk(class, &mut result);
    result
}

impl ClassRef {
    pub fn set_method(&self, keys: impl Into<Keys>, method: FunctionRef) -> Result<FunctionRef, ClassError> {
        set_method(self, keys, method)
    }

    pub fn decorate_method<F>(
        &self,
        key: impl Into<PropertyKey>,
        method: FunctionRef,
        decorator: F,
    ) -> Result<(), ClassError>
    where
        F: FnOnce(Decoration) -> Result<Decoration, ClassError>,
    {
        decorate_method(self, key, method, decorator)
    }

    pub fn set_property(
        &self,
        keys: impl Into<Keys>,
        init: PropertyInit,
        setter: Option<FunctionRef>,
    ) -> Result<(), ClassError> {
        set_property(self, keys, init, setter)
    }

    pub fn set_static(&self, keys: impl Into<Keys>, value: Value) -> Result<(), ClassError> {
        set_static(self, keys, value, true)
    }

    pub fn set_static_property(
        &self,
        keys: impl Into<Keys>,
        init: PropertyInit,
        setter: Option<FunctionRef>,
    ) -> Result<(), ClassError> {
        set_static_property(self, keys, init, setter, true)
    }

    pub fn prepare_property(&self, keys: impl Into<Keys>, getter: FunctionRef) -> Result<(), ClassError> {
        prepare_property(self, keys, getter)
    }

    pub fn prepare_static_property(
        &self,
        keys: impl Into<Keys>,
        getter: FunctionRef,
    ) -> Result<(), ClassError> {
        prepare_static_property(self, keys, getter)
    }

    pub fn enforce_property(&self, keys: impl Into<Keys>, setter: FunctionRef) -> Result<SymbolData, ClassError> {
        enforce_property(self, keys, setter)
    }

    pub fn compose(&self, key: &str, compositor: &ClassRef, traits: Traits) -> Result<(), ClassError> {
        compose(self, key, compositor, traits)
    }

    pub fn static_compose(&self, key: &str, compositor: &ClassRef, traits: Traits) -> Result<(), ClassError> {
        static_compose(self, key, compositor, traits)
    }

    pub fn get_children(&self) -> Vec<ClassRef> {
        get_children(self)
    }

    pub fn constitute(&self, runtime: &mut Runtime, task: Constitutor) -> Result<(), ClassError> {
        runtime.constitute(self, task)
    }
}
