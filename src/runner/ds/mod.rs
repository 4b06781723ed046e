//! Descriptor store: objects, property descriptors, native functions and class records.

pub mod class;
pub mod error;
pub mod function_object;
pub mod object;
pub mod object_property;
pub mod static_chain;
pub mod symbol;
pub mod value;
