//! Application bootstrap: one container, its configuration and a lifecycle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bindery_config::{ConfigManager, ContainerConfig};
use bindery_di::{Container, TypeRegistry};
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::global::{register_global_container, release_global_container, ContainerKind};

pub struct Application {
    container: Container,
    config: ContainerConfig,
    started: AtomicBool,
}

impl Application {
    /// Build the container, apply `config` and register it as the global
    /// application container
    pub fn new(registry: Arc<TypeRegistry>, config: ContainerConfig) -> Result<Self> {
        let container = Container::new(registry);
        config.apply(&container)?;
        register_global_container(container.clone(), ContainerKind::Application)?;
        info!(
            "Application container ready with {} binding(s)",
            config.bindings.len()
        );
        Ok(Self {
            container,
            config,
            started: AtomicBool::new(false),
        })
    }

    /// Load configuration through `manager`, install logging, then [`Application::new`]
    pub fn bootstrap(registry: Arc<TypeRegistry>, manager: &ConfigManager) -> Result<Self> {
        let config = manager.load()?;
        bindery_common::init_logging(&config.logging)?;
        Self::new(registry, config)
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Resolve every eager service
    pub fn start(&self) -> Result<()> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::logic("application is already started"));
        }

        for service in self.config.eager_services() {
            if let Err(err) = self.container.get(service.clone()) {
                self.started.store(false, Ordering::SeqCst);
                return Err(err.into());
            }
            debug!("Eagerly resolved {}", service);
        }
        info!("Application started");
        Ok(())
    }

    /// Drop shared instances and give up the global slot
    pub fn stop(&self) -> Result<()> {
        if self
            .started
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::logic("application is not started"));
        }
        self.container.unload();
        release_global_container(&self.container);
        info!("Application stopped");
        Ok(())
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        release_global_container(&self.container);
    }
}
