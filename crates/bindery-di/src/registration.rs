//! Auto-discovery of class descriptors using the inventory crate
//!
//! Any crate linked into the final binary can submit descriptors for its
//! classes; [`TypeRegistry::discover`] picks them all up.
//!
//! ```rust,ignore
//! use bindery_di::{ClassDescriptor, ClassRegistration};
//!
//! fn describe_clock() -> ClassDescriptor {
//!     ClassDescriptor::builder::<SystemClock>("SystemClock")
//!         .implements("Clock")
//!         .constructor(|_| Ok(SystemClock))
//!         .build()
//! }
//!
//! inventory::submit! {
//!     ClassRegistration::new("SystemClock", describe_clock)
//! }
//! ```

use tracing::{debug, info};

use crate::registry::{ClassDescriptor, TypeRegistry};

/// A class descriptor factory collected via inventory
pub struct ClassRegistration {
    /// Class name, used for logging
    pub name: &'static str,

    /// Produces the descriptor
    pub describe_fn: fn() -> ClassDescriptor,
}

impl ClassRegistration {
    pub const fn new(name: &'static str, describe_fn: fn() -> ClassDescriptor) -> Self {
        Self { name, describe_fn }
    }
}

inventory::collect!(ClassRegistration);

/// Register every discovered class with `registry`
pub fn register_discovered_classes(registry: &TypeRegistry) -> usize {
    let mut count = 0;
    for registration in inventory::iter::<ClassRegistration> {
        debug!("Registering discovered class '{}'", registration.name);
        registry.register((registration.describe_fn)());
        count += 1;
    }
    info!("Discovered {} class registrations via inventory", count);
    count
}

pub fn discovered_class_count() -> usize {
    inventory::iter::<ClassRegistration>.into_iter().count()
}

/// Names of all discovered classes, sorted
pub fn list_discovered_classes() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = inventory::iter::<ClassRegistration>
        .into_iter()
        .map(|registration| registration.name)
        .collect();
    names.sort_unstable();
    names
}
