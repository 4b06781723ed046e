use std::fmt;
use std::fmt::{Display, Formatter};

use crate::runner::ds::function_object::{same_function, FunctionRef};
use crate::runner::ds::symbol::SymbolData;
use crate::runner::ds::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Str(String),
    Sym(SymbolData),
}
impl PropertyKey {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyKey::Str(s) => Some(s),
            PropertyKey::Sym(_) => None,
        }
    }
}
impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::Str(s.to_string())
    }
}
impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        PropertyKey::Str(s)
    }
}
impl From<&String> for PropertyKey {
    fn from(s: &String) -> Self {
        PropertyKey::Str(s.clone())
    }
}
impl From<SymbolData> for PropertyKey {
    fn from(s: SymbolData) -> Self {
        PropertyKey::Sym(s)
    }
}
impl Display for PropertyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Str(s) => write!(f, "{}", s),
            PropertyKey::Sym(s) => write!(f, "{}", s),
        }
    }
}

/// A member descriptor: either a plain value or a getter/setter pair.
#[derive(Clone)]
pub enum PropertyDescriptor {
    Data {
        value: Value,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        get: Option<FunctionRef>,
        set: Option<FunctionRef>,
        enumerable: bool,
        configurable: bool,
    },
}
impl PropertyDescriptor {
    /// Writable, enumerable and configurable data.
    pub fn data(value: Value) -> Self {
        PropertyDescriptor::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Writable and configurable but not enumerable. This is how members are attached to
    /// prototypes and statics.
    pub fn hidden(value: Value) -> Self {
        PropertyDescriptor::Data {
            value,
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }

    pub fn accessor(get: Option<FunctionRef>, set: Option<FunctionRef>, enumerable: bool) -> Self {
        PropertyDescriptor::Accessor {
            get,
            set,
            enumerable,
            configurable: true,
        }
    }

    pub fn is_enumerable(&self) -> bool {
        match self {
            PropertyDescriptor::Data { enumerable, .. } => *enumerable,
            PropertyDescriptor::Accessor { enumerable, .. } => *enumerable,
        }
    }

    pub fn is_configurable(&self) -> bool {
        match self {
            PropertyDescriptor::Data { configurable, .. } => *configurable,
            PropertyDescriptor::Accessor { configurable, .. } => *configurable,
        }
    }

    pub fn is_data_descriptor(&self) -> bool {
        match self {
            PropertyDescriptor::Data { .. } => true,
            PropertyDescriptor::Accessor { .. } => false,
        }
    }

    pub fn is_accessor_descriptor(&self) -> bool {
        !self.is_data_descriptor()
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            PropertyDescriptor::Data { value, .. } => Some(value),
            PropertyDescriptor::Accessor { .. } => None,
        }
    }

    pub fn getter(&self) -> Option<&FunctionRef> {
        match self {
            PropertyDescriptor::Accessor { get, .. } => get.as_ref(),
            PropertyDescriptor::Data { .. } => None,
        }
    }

    pub fn setter(&self) -> Option<&FunctionRef> {
        match self {
            PropertyDescriptor::Accessor { set, .. } => set.as_ref(),
            PropertyDescriptor::Data { .. } => None,
        }
    }

    /// The function stored in a data descriptor, if any.
    pub fn function(&self) -> Option<&FunctionRef> {
        match self.value() {
            Some(Value::Function(f)) => Some(f),
            _ => None,
        }
    }
}
impl PartialEq for PropertyDescriptor {
    fn eq(&self, other: &Self) -> bool {
        fn same_opt(a: &Option<FunctionRef>, b: &Option<FunctionRef>) -> bool {
            match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => same_function(a, b),
                _ => false,
            }
        }
        match (self, other) {
            (
                PropertyDescriptor::Data {
                    value,
                    writable,
                    enumerable,
                    configurable,
                },
                PropertyDescriptor::Data {
                    value: other_value,
                    writable: other_writable,
                    enumerable: other_enumerable,
                    configurable: other_configurable,
                },
            ) => {
                value == other_value
                    && writable == other_writable
                    && enumerable == other_enumerable
                    && configurable == other_configurable
            }
            (
                PropertyDescriptor::Accessor {
                    get,
                    set,
                    enumerable,
                    configurable,
                },
                PropertyDescriptor::Accessor {
                    get: other_get,
                    set: other_set,
                    enumerable: other_enumerable,
                    configurable: other_configurable,
                },
            ) => {
                same_opt(get, other_get)
                    && same_opt(set, other_set)
                    && enumerable == other_enumerable
                    && configurable == other_configurable
            }
            _ => false,
        }
    }
}
impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PropertyDescriptor::Data {
                value,
                writable,
                enumerable,
                configurable,
            } => f
                .debug_struct("Data")
                .field("value", value)
                .field("writable", writable)
                .field("enumerable", enumerable)
                .field("configurable", configurable)
                .finish(),
            PropertyDescriptor::Accessor {
                get,
                set,
                enumerable,
                configurable,
            } => f
                .debug_struct("Accessor")
                .field("get", &get.as_ref().map(|g| g.name().to_string()))
                .field("set", &set.as_ref().map(|s| s.name().to_string()))
                .field("enumerable", enumerable)
                .field("configurable", configurable)
                .finish(),
        }
    }
}
