//! Bindery application layer
//!
//! [`Application`] owns the root container built from a
//! [`ContainerConfig`](bindery_config::ContainerConfig) and registers it in the
//! process-wide slot of the [`global`] module.

pub mod application;
pub mod error;
pub mod global;

pub use application::Application;
pub use error::{AppError, Result};
pub use global::{
    global_container, global_container_kind, has_global_container, register_global_container,
    require_global_container, set_global_container, ContainerKind,
};

pub use bindery_config as config;
pub use bindery_di as di;
