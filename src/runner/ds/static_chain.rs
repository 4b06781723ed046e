//! Static members that every current and future subclass receives.
//!
//! Two paths keep a class's statics in step with its ancestors: `inherits` copies the parent's
//! whole chain when a subclass links, and [`add_to_static_chain`] walks the live children
//! whenever a member is added later.

use tracing::trace;

use crate::runner::ds::class::ClassRef;
use crate::runner::ds::error::ClassError;
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};

/// Records `key` in the class's chain after replicating it onto every registered child,
/// depth first.
pub fn add_to_static_chain(
    class: &ClassRef,
    key: &str,
    descriptor: &PropertyDescriptor,
) -> Result<(), ClassError> {
    class.ensure_static_chain();
    add_to_children(class, key, descriptor)?;
    class.store_static_chain_entry(key, descriptor.clone());
    Ok(())
}

fn add_to_children(
    parent: &ClassRef,
    key: &str,
    descriptor: &PropertyDescriptor,
) -> Result<(), ClassError> {
    for child in parent.children() {
        trace!(parent = %parent.name(), child = %child.name(), key, "propagating static");
        child
            .statics()
            .define_own_property(PropertyKey::from(key), descriptor.clone())?;
        add_to_static_chain(&child, key, descriptor)?;
    }
    Ok(())
}

/// Defines a static member on `target`, feeding it into the chain when `inherit` is set.
pub fn add_descriptor_to_static(
    target: &ClassRef,
    key: &str,
    descriptor: PropertyDescriptor,
    inherit: bool,
) -> Result<(), ClassError> {
    if inherit {
        add_to_static_chain(target, key, &descriptor)?;
    }
    target
        .statics()
        .define_own_property(PropertyKey::from(key), descriptor)
}
