//! Runtime side of the crate: class data structures, the registry, the scheduler and the
//! operations that compose classes.

pub mod config;
pub mod constitutor;
pub mod ds;
pub mod events;
pub mod inheritance;
pub mod members;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod scheduler;

pub use inheritance::Parent;
pub use runtime::Runtime;
