use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::parser::join_path;
use crate::runner::ds::error::ClassError;
use crate::runner::ds::function_object::{FunctionObject, FunctionRef};
use crate::runner::ds::object::ObjectRef;
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};
use crate::runner::ds::value::Value;
use crate::runner::members::Keys;
use crate::runner::runtime::Runtime;

pub type ConstitutorFn = dyn Fn(&mut Runtime, &ClassRef) -> Result<(), ClassError>;

/// Hook a parent can install to rewrite every class that inherits from it.
pub type ChildModifier = dyn Fn(&ClassRef) -> Result<Option<ClassRef>, ClassError>;

/// A post-definition task. Two constitutors are the same task only if they share the same body.
#[derive(Clone)]
pub struct Constitutor {
    name: String,
    body: Rc<ConstitutorFn>,
}
impl Constitutor {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Runtime, &ClassRef) -> Result<(), ClassError> + 'static,
    {
        Constitutor {
            name: name.into(),
            body: Rc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn run(&self, runtime: &mut Runtime, class: &ClassRef) -> Result<(), ClassError> {
        (self.body)(runtime, class)
    }
}
impl PartialEq for Constitutor {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }
}
impl fmt::Debug for Constitutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constitutor({})", self.name)
    }
}

/// A property defined on a waiting class, kept for replay once the parent is linked.
pub(crate) struct QueuedProperty {
    pub(crate) key: PropertyKey,
    pub(crate) descriptor: PropertyDescriptor,
    /// Set for `set_property` accessors, which take the parent's accessor as `super`.
    pub(crate) links_super: bool,
}

/// Everything requested of a class while its named parent is still missing.
#[derive(Default)]
pub struct WaitingState {
    pub(crate) methods: Vec<(Keys, PropertyDescriptor)>,
    pub(crate) properties: Vec<QueuedProperty>,
    pub(crate) constitute: Vec<Constitutor>,
}

pub struct Class {
    name: String,
    namespace: Option<String>,
    super_class: Option<ClassRef>,
    children: Vec<Weak<RefCell<Class>>>,
    statics: ObjectRef,
    static_chain: Option<IndexMap<String, PropertyDescriptor>>,
    prototype: ObjectRef,
    constructor: Option<FunctionRef>,
    constitutors: Vec<Constitutor>,
    compose_data: Option<IndexMap<String, Value>>,
    waiting: Option<WaitingState>,
    constituted: bool,
    finished: Vec<Constitutor>,
    waiting_children: Vec<Weak<RefCell<Class>>>,
    child_modifier: Option<Rc<ChildModifier>>,
}

#[derive(Clone)]
pub struct ClassRef(Rc<RefCell<Class>>);

impl ClassRef {
    pub fn new(name: impl Into<String>) -> Self {
        let class = ClassRef(Rc::new(RefCell::new(Class {
            name: name.into(),
            namespace: None,
            super_class: None,
            children: vec![],
            statics: ObjectRef::new(),
            static_chain: None,
            prototype: ObjectRef::new(),
            constructor: None,
            constitutors: vec![],
            compose_data: None,
            waiting: None,
            constituted: false,
            finished: vec![],
            waiting_children: vec![],
            child_modifier: None,
        })));
        class.prototype().set_constructor(class.downgrade());
        class
    }

    /// A class whose instances are initialised by `body`, called with the new instance as `this`.
    pub fn with_constructor<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&FunctionObject, &Value, Vec<Value>) -> Result<Value, ClassError> + 'static,
    {
        let name = name.into();
        let class = ClassRef::new(name.clone());
        class.0.borrow_mut().constructor = Some(FunctionObject::new(name, body));
        class
    }

    pub(crate) fn from_rc(rc: Rc<RefCell<Class>>) -> Self {
        ClassRef(rc)
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<Class>> {
        Rc::downgrade(&self.0)
    }

    pub fn ptr_eq(&self, other: &ClassRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn namespace(&self) -> Option<String> {
        self.0.borrow().namespace.clone()
    }

    /// Namespaces are set once. Later calls are ignored.
    pub(crate) fn set_namespace(&self, namespace: &str) {
        let mut c = self.0.borrow_mut();
        if c.namespace.is_none() {
            c.namespace = Some(namespace.to_string());
        }
    }

    /// Dotted registry path: `namespace.name`, or the bare name outside any namespace.
    pub fn path(&self) -> String {
        let c = self.0.borrow();
        join_path(c.namespace.as_deref().unwrap_or(""), &c.name)
    }

    pub fn super_class(&self) -> Option<ClassRef> {
        self.0.borrow().super_class.clone()
    }

    pub(crate) fn set_super(&self, parent: Option<ClassRef>) {
        self.0.borrow_mut().super_class = parent;
    }

    /// Direct subclasses that are still alive, in registration order.
    pub fn children(&self) -> Vec<ClassRef> {
        self.0
            .borrow()
            .children
            .iter()
            .filter_map(|w| w.upgrade().map(ClassRef))
            .collect()
    }

    pub(crate) fn add_child(&self, child: &ClassRef) {
        self.0.borrow_mut().children.push(child.downgrade());
    }

    pub fn statics(&self) -> ObjectRef {
        self.0.borrow().statics.clone()
    }

    pub fn prototype(&self) -> ObjectRef {
        self.0.borrow().prototype.clone()
    }

    pub fn constructor_fn(&self) -> Option<FunctionRef> {
        self.0.borrow().constructor.clone()
    }

    pub fn static_chain(&self) -> Option<IndexMap<String, PropertyDescriptor>> {
        self.0.borrow().static_chain.clone()
    }

    pub(crate) fn store_static_chain_entry(&self, key: &str, descriptor: PropertyDescriptor) {
        self.0
            .borrow_mut()
            .static_chain
            .get_or_insert_with(IndexMap::new)
            .insert(key.to_string(), descriptor);
    }

    pub(crate) fn ensure_static_chain(&self) {
        self.0
            .borrow_mut()
            .static_chain
            .get_or_insert_with(IndexMap::new);
    }

    pub fn constitutors(&self) -> Vec<Constitutor> {
        self.0.borrow().constitutors.clone()
    }

    pub(crate) fn push_constitutor(&self, task: Constitutor) {
        self.0.borrow_mut().constitutors.push(task);
    }

    pub fn compose_data(&self) -> Option<IndexMap<String, Value>> {
        self.0.borrow().compose_data.clone()
    }

    pub(crate) fn set_compose_data(&self, data: IndexMap<String, Value>) {
        self.0.borrow_mut().compose_data = Some(data);
    }

    pub fn is_waiting(&self) -> bool {
        self.0.borrow().waiting.is_some()
    }

    /// Keeps any queue that already exists so a second deferral does not lose requests.
    pub(crate) fn enter_waiting(&self) {
        self.0
            .borrow_mut()
            .waiting
            .get_or_insert_with(WaitingState::default);
    }

    pub(crate) fn take_waiting(&self) -> Option<WaitingState> {
        self.0.borrow_mut().waiting.take()
    }

    pub(crate) fn with_waiting<R>(&self, f: impl FnOnce(&mut WaitingState) -> R) -> Option<R> {
        self.0.borrow_mut().waiting.as_mut().map(f)
    }

    pub fn is_constituted(&self) -> bool {
        self.0.borrow().constituted
    }

    /// Latches the class as constituted. Returns `false` if it already was.
    pub(crate) fn mark_constituted(&self) -> bool {
        let mut c = self.0.borrow_mut();
        if c.constituted {
            false
        } else {
            c.constituted = true;
            true
        }
    }

    pub fn has_finished(&self, task: &Constitutor) -> bool {
        self.0.borrow().finished.iter().any(|t| t == task)
    }

    pub(crate) fn mark_finished(&self, task: Constitutor) {
        self.0.borrow_mut().finished.push(task);
    }

    pub fn waiting_children(&self) -> Vec<ClassRef> {
        self.0
            .borrow()
            .waiting_children
            .iter()
            .filter_map(|w| w.upgrade().map(ClassRef))
            .collect()
    }

    pub(crate) fn add_waiting_child(&self, child: &ClassRef) {
        self.0.borrow_mut().waiting_children.push(child.downgrade());
    }

    pub fn set_child_modifier<F>(&self, modifier: F)
    where
        F: Fn(&ClassRef) -> Result<Option<ClassRef>, ClassError> + 'static,
    {
        self.0.borrow_mut().child_modifier = Some(Rc::new(modifier));
    }

    pub(crate) fn child_modifier(&self) -> Option<Rc<ChildModifier>> {
        self.0.borrow().child_modifier.clone()
    }

    /// Takes over the identity of the class a modifier hook replaced.
    pub(crate) fn adopt_identity(&self, from: &ClassRef) {
        let (name, namespace, chain, parent) = {
            let f = from.0.borrow();
            (
                f.name.clone(),
                f.namespace.clone(),
                f.static_chain.clone(),
                f.super_class.clone(),
            )
        };
        let mut c = self.0.borrow_mut();
        c.name = name;
        c.namespace = namespace;
        c.static_chain = chain;
        c.super_class = parent;
    }

    /// Runs the constructor body of this class against `this`. A class without its own body
    /// defers to its parent's.
    pub fn apply_constructor(&self, this: &Value, args: Vec<Value>) -> Result<Value, ClassError> {
        match self.constructor_fn() {
            Some(f) => f.call(this, args),
            None => match self.super_class() {
                Some(parent) => parent.apply_constructor(this, args),
                None => Ok(Value::Undefined),
            },
        }
    }

    /// Creates an instance delegating to this class's prototype. If the constructor returns an
    /// object, that object is the instance.
    pub fn instantiate(&self, args: Vec<Value>) -> Result<Value, ClassError> {
        let this = Value::Object(ObjectRef::with_prototype(Some(self.prototype())));
        match self.apply_constructor(&this, args)? {
            Value::Object(o) => Ok(Value::Object(o)),
            _ => Ok(this),
        }
    }

    pub fn get_static(&self, key: impl Into<PropertyKey>) -> Result<Value, ClassError> {
        self.statics()
            .get_with_receiver(&key.into(), &Value::Class(self.clone()))
    }

    pub fn assign_static(&self, key: impl Into<PropertyKey>, value: Value) -> Result<(), ClassError> {
        self.statics()
            .set_with_receiver(key.into(), value, &Value::Class(self.clone()))
    }

    pub fn call_static(&self, key: impl Into<PropertyKey>, args: Vec<Value>) -> Result<Value, ClassError> {
        let key = key.into();
        match self.get_static(key.clone())? {
            Value::Function(f) => f.call(&Value::Class(self.clone()), args),
            other => Err(ClassError::TypeError(format!(
                "{}.{} is not a function (got {})",
                self.name(),
                key,
                other.type_name()
            ))),
        }
    }
}
impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}
impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassRef({})", self.path())
    }
}
