use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bindery::config::{ConfigManager, ContainerConfig};
use bindery::di::{ClassDescriptor, Container, TypeRegistry};
use bindery::*;
use serial_test::serial;

static CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

struct Connection;

fn registry() -> Arc<TypeRegistry> {
    let registry = TypeRegistry::new();
    registry.register(
        ClassDescriptor::builder::<Connection>("Connection")
            .constructor(|_| {
                CONNECTIONS.fetch_add(1, Ordering::SeqCst);
                Ok(Connection)
            })
            .build(),
    );
    Arc::new(registry)
}

fn config(source: &str) -> ContainerConfig {
    ContainerConfig::from_toml_str(source).unwrap()
}

const EAGER: &str = r#"
eager = ["Database"]

[bindings.Database]
target = "Connection"
shared = true
"#;

#[test]
#[serial]
fn test_application_registers_global_container() {
    set_global_container(None).unwrap();
    let app = Application::new(registry(), config(EAGER)).unwrap();

    assert!(has_global_container());
    assert_eq!(global_container_kind(), Some(ContainerKind::Application));
    assert!(require_global_container()
        .unwrap()
        .same_view(app.container()));
    assert_eq!(app.config().eager.len(), 1);

    set_global_container(None).unwrap();
}

#[test]
#[serial]
fn test_start_resolves_eager_services_once() {
    set_global_container(None).unwrap();
    let app = Application::new(registry(), config(EAGER)).unwrap();
    let before = CONNECTIONS.load(Ordering::SeqCst);

    app.start().unwrap();
    assert!(app.is_started());
    assert_eq!(CONNECTIONS.load(Ordering::SeqCst), before + 1);
    assert_eq!(app.container().shared_count(), 1);

    app.container().get("Database").unwrap();
    assert_eq!(CONNECTIONS.load(Ordering::SeqCst), before + 1);

    assert!(matches!(app.start(), Err(AppError::Logic(_))));
    app.stop().unwrap();
}

#[test]
#[serial]
fn test_stop_unloads_and_releases_global() {
    set_global_container(None).unwrap();
    let app = Application::new(registry(), config(EAGER)).unwrap();

    assert!(matches!(app.stop(), Err(AppError::Logic(_))));

    app.start().unwrap();
    app.stop().unwrap();
    assert!(!app.is_started());
    assert_eq!(app.container().shared_count(), 0);
    assert!(!has_global_container());
}

#[test]
#[serial]
fn test_dropping_unstarted_application_releases_global() {
    set_global_container(None).unwrap();
    let app = Application::new(registry(), config(EAGER)).unwrap();
    assert!(has_global_container());

    drop(app);
    assert!(!has_global_container());
    assert!(Application::new(registry(), ContainerConfig::default()).is_ok());
}

#[test]
#[serial]
fn test_dropping_replaced_application_keeps_new_global() {
    set_global_container(None).unwrap();
    let first = Application::new(registry(), config(EAGER)).unwrap();
    let second = Application::new(registry(), config(EAGER)).unwrap();

    drop(first);
    assert!(require_global_container()
        .unwrap()
        .same_view(second.container()));

    drop(second);
    assert!(!has_global_container());
}

#[test]
#[serial]
fn test_failed_eager_service_leaves_application_stopped() {
    set_global_container(None).unwrap();
    let app = Application::new(registry(), config(r#"eager = ["Missing"]"#)).unwrap();

    assert!(matches!(app.start(), Err(AppError::Container(_))));
    assert!(!app.is_started());

    set_global_container(None).unwrap();
}

#[test]
#[serial]
fn test_application_conflicts_with_plain_global_container() {
    set_global_container(None).unwrap();
    set_global_container(Some(Container::default())).unwrap();

    let result = Application::new(registry(), ContainerConfig::default());
    assert!(matches!(result, Err(AppError::Configuration(_))));

    set_global_container(None).unwrap();
}

#[test]
#[serial]
fn test_invalid_config_is_rejected() {
    set_global_container(None).unwrap();
    let result = Application::new(
        registry(),
        config(
            r#"
[[providers]]
id = "Connection"
"#,
        ),
    );
    assert!(matches!(result, Err(AppError::Config(_))));
    assert!(!has_global_container());
}

#[test]
#[serial]
fn test_bootstrap_from_file() {
    set_global_container(None).unwrap();
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(EAGER.as_bytes()).unwrap();
    file.flush().unwrap();

    let app = Application::bootstrap(registry(), &ConfigManager::with_path(file.path())).unwrap();
    app.start().unwrap();
    assert!(app.container().get("Database").is_ok());
    app.stop().unwrap();
}
