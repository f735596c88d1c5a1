//! The process-wide container slot
//!
//! Prefer passing a [`Container`] explicitly. The slot exists for code that
//! can only reach the container through ambient lookup.

use std::fmt;
use std::sync::Arc;

use bindery_di::{Container, TypeRegistry};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{AppError, Result};

/// What registered the global container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// A plain container set through [`set_global_container`]
    Container,
    /// An [`Application`](crate::Application), or the lazily created default
    Application,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Container => f.write_str("container"),
            ContainerKind::Application => f.write_str("application"),
        }
    }
}

struct GlobalSlot {
    container: Container,
    kind: ContainerKind,
}

static GLOBAL_CONTAINER: Lazy<RwLock<Option<GlobalSlot>>> = Lazy::new(|| RwLock::new(None));

pub fn has_global_container() -> bool {
    GLOBAL_CONTAINER.read().is_some()
}

/// Kind of the current global container
pub fn global_container_kind() -> Option<ContainerKind> {
    GLOBAL_CONTAINER.read().as_ref().map(|slot| slot.kind)
}

/// The global container, created on first use with every discovered class
pub fn global_container() -> Container {
    if let Some(slot) = GLOBAL_CONTAINER.read().as_ref() {
        return slot.container.clone();
    }

    let mut slot = GLOBAL_CONTAINER.write();
    let slot = slot.get_or_insert_with(|| {
        info!("Creating default global container");
        GlobalSlot {
            container: Container::new(Arc::new(TypeRegistry::discover())),
            kind: ContainerKind::Application,
        }
    });
    slot.container.clone()
}

/// The global container, or a configuration error when none is set
pub fn require_global_container() -> Result<Container> {
    GLOBAL_CONTAINER
        .read()
        .as_ref()
        .map(|slot| slot.container.clone())
        .ok_or_else(|| AppError::configuration("no global container is set"))
}

/// Set or clear the global container.
///
/// Setting fails while an application owns the slot.
pub fn set_global_container(container: Option<Container>) -> Result<()> {
    match container {
        Some(container) => register_global_container(container, ContainerKind::Container),
        None => {
            if GLOBAL_CONTAINER.write().take().is_some() {
                debug!("Cleared global container");
            }
            Ok(())
        }
    }
}

/// Install `container` as the global container for `kind`.
///
/// A container of the same kind replaces the current one.
pub fn register_global_container(container: Container, kind: ContainerKind) -> Result<()> {
    let mut slot = GLOBAL_CONTAINER.write();
    if let Some(existing) = slot.as_ref() {
        if existing.kind != kind {
            return Err(AppError::configuration(format!(
                "cannot register a global {kind}: a global {} is already set",
                existing.kind
            )));
        }
        debug!("Replacing global {}", kind);
    }
    *slot = Some(GlobalSlot { container, kind });
    Ok(())
}

/// Clear the slot if it still holds `container`
pub(crate) fn release_global_container(container: &Container) -> bool {
    let mut slot = GLOBAL_CONTAINER.write();
    let owned = slot
        .as_ref()
        .is_some_and(|current| current.container.same_view(container));
    if owned {
        *slot = None;
        debug!("Released global container");
    }
    owned
}
