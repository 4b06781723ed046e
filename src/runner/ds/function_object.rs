use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::runner::ds::error::ClassError;
use crate::runner::ds::value::Value;

/// Body of a native function. It receives the function object itself (so overrides can reach
/// their `super`), the `this` value and the argument list.
pub type NativeFn = dyn Fn(&FunctionObject, &Value, Vec<Value>) -> Result<Value, ClassError>;

pub type FunctionRef = Rc<FunctionObject>;

pub struct FunctionObject {
    name: String,
    body: Rc<NativeFn>,
    super_fn: RefCell<Option<FunctionRef>>,
}
impl FunctionObject {
    pub fn new<F>(name: impl Into<String>, body: F) -> FunctionRef
    where
        F: Fn(&FunctionObject, &Value, Vec<Value>) -> Result<Value, ClassError> + 'static,
    {
        Rc::new(FunctionObject {
            name: name.into(),
            body: Rc::new(body),
            super_fn: RefCell::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, this: &Value, args: Vec<Value>) -> Result<Value, ClassError> {
        (self.body)(self, this, args)
    }

    /// The member this function overrode when it was attached, if any.
    pub fn super_fn(&self) -> Option<FunctionRef> {
        self.super_fn.borrow().clone()
    }

    pub(crate) fn set_super(&self, super_fn: Option<FunctionRef>) {
        *self.super_fn.borrow_mut() = super_fn;
    }

    pub fn call_super(&self, this: &Value, args: Vec<Value>) -> Result<Value, ClassError> {
        match self.super_fn() {
            Some(f) => f.call(this, args),
            None => Err(ClassError::TypeError(format!(
                "'{}' has no super method",
                self.name
            ))),
        }
    }
}
impl fmt::Debug for FunctionObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionObject({})", self.name)
    }
}

pub fn same_function(a: &FunctionRef, b: &FunctionRef) -> bool {
    Rc::ptr_eq(a, b)
}
