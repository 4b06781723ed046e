//! # lineage - runtime class composition
//!
//! A small object model with classes that are wired together at runtime:
//! - single and multiple inheritance over prototype chains
//! - static members that propagate to every subclass, including later ones
//! - a dotted namespace registry (`App.Models.User`)
//! - classes whose parents are named before they exist, resolved once the parent registers
//! - constitutors, post-definition tasks run parent first once loading finishes
//! - a member definition API: methods, lazy and enforced properties, composition and traits
//!
//! ## Quick Start
//!
//! ```
//! use lineage::runner::ds::class::ClassRef;
//! use lineage::runner::ds::function_object::FunctionObject;
//! use lineage::runner::ds::value::Value;
//! use lineage::runner::{Parent, Runtime};
//!
//! let mut rt = Runtime::new();
//!
//! // The child names its parent before the parent exists.
//! let user = ClassRef::new("User");
//! rt.inherits_in("Model", "App", &user).unwrap();
//! assert!(user.is_waiting());
//!
//! let model = ClassRef::new("Model");
//! model
//!     .set_method("kind", FunctionObject::new("kind", |_, _, _| Ok(Value::from("model"))))
//!     .unwrap();
//! rt.inherits_in(Parent::Root, "App", &model).unwrap();
//! rt.finish_loading().unwrap();
//! rt.run_until_idle().unwrap();
//!
//! assert_eq!(user.super_class(), Some(model));
//! let instance = user.instantiate(vec![]).unwrap().as_object().unwrap();
//! assert_eq!(instance.call_method(&"kind".into(), vec![]).unwrap(), Value::from("model"));
//! ```
//!
//! ## Architecture
//!
//! - **[`parser`]** - dotted class path grammar
//! - **[`runner`]** - the runtime
//!   - **[`runner::ds`]** - values, objects, functions and classes
//!   - **[`runner::registry`]** - the namespace tree
//!   - **[`runner::scheduler`]** - job queues and the loaded latch
//!   - **[`runner::inheritance`]** - `inherits` and multiple inheritance
//!   - **[`runner::resolver`]** - deferred parent resolution
//!   - **[`runner::members`]** - member definition API

#[macro_use]
extern crate lazy_static;

pub mod parser;
pub mod runner;
