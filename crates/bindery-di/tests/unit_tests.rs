//! Unit tests for binding, resolution and contextual substitution
use std::sync::Arc;

use bindery_di::*;
use parking_lot::Mutex;

trait Logger: Send + Sync {
    fn name(&self) -> &'static str;
}

struct FileLogger;

impl Logger for FileLogger {
    fn name(&self) -> &'static str {
        "file"
    }
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn name(&self) -> &'static str {
        "console"
    }
}

struct AppImpl {
    logger: Arc<dyn Logger>,
    container: Option<Container>,
    resolved_as: Option<ServiceId>,
}

struct MemCache {
    size: u64,
}

struct Reporter {
    logger: Arc<dyn Logger>,
    title: String,
}

struct Mailer {
    host: String,
}

struct Connection;

struct UserRepo {
    connection: Arc<Connection>,
}

struct OrderRepo {
    connection: Arc<Connection>,
}

struct Checkout {
    users: Arc<UserRepo>,
    orders: Arc<OrderRepo>,
}

struct Chicken;
struct Egg;

struct Formatter {
    logger: Arc<dyn Logger>,
}

struct Buffered {
    formatter: Arc<Formatter>,
}

impl Logger for Buffered {
    fn name(&self) -> &'static str {
        "buffered"
    }
}

struct Store;

fn logger_class<T: Logger + 'static>(name: &str, make: fn() -> T) -> ClassDescriptor {
    ClassDescriptor::builder::<T>(name)
        .implements_as::<dyn Logger, _>("Logger", |logger| logger as Arc<dyn Logger>)
        .constructor(move |_| Ok(make()))
        .build()
}

fn registry() -> TypeRegistry {
    let registry = TypeRegistry::new();
    registry.register(ClassDescriptor::interface("Logger"));
    registry.register(logger_class("FileLogger", || FileLogger));
    registry.register(logger_class("ConsoleLogger", || ConsoleLogger));

    registry.register(ClassDescriptor::interface("App"));
    registry.register(
        ClassDescriptor::builder::<AppImpl>("AppImpl")
            .implements("App")
            .param(Parameter::typed("logger", "Logger"))
            .provider(
                ProviderSpec::new()
                    .service("App")
                    .binding("Logger", Substitution::class("ConsoleLogger")),
            )
            .constructor(|args| {
                Ok(AppImpl {
                    logger: args.interface::<dyn Logger>("logger")?,
                    container: None,
                    resolved_as: None,
                })
            })
            .on_container(|app, container| app.container = Some(container.clone()))
            .on_service_name(|app, service| app.resolved_as = Some(service.clone()))
            .build(),
    );

    registry.register(ClassDescriptor::interface("Cache"));
    registry.register(
        ClassDescriptor::builder::<MemCache>("MemCache")
            .implements("Cache")
            .param(Parameter::data("size").with_default(64))
            .constructor(|args| {
                Ok(MemCache {
                    size: args.data("size")?,
                })
            })
            .build(),
    );

    registry.register(
        ClassDescriptor::builder::<Reporter>("Reporter")
            .param(Parameter::typed("logger", "Logger"))
            .param(Parameter::data("title").with_default("untitled"))
            .constructor(|args| {
                Ok(Reporter {
                    logger: args.interface::<dyn Logger>("logger")?,
                    title: args.data("title")?,
                })
            })
            .build(),
    );

    registry.register(
        ClassDescriptor::builder::<Mailer>("Mailer")
            .param(Parameter::data("host"))
            .constructor(|args| {
                Ok(Mailer {
                    host: args.data("host")?,
                })
            })
            .build(),
    );

    registry.register(
        ClassDescriptor::builder::<Connection>("Connection")
            .constructor(|_| Ok(Connection))
            .build(),
    );
    registry.register(
        ClassDescriptor::builder::<UserRepo>("UserRepo")
            .param(Parameter::typed("connection", "Connection"))
            .constructor(|args| {
                Ok(UserRepo {
                    connection: args.object("connection")?,
                })
            })
            .build(),
    );
    registry.register(
        ClassDescriptor::builder::<OrderRepo>("OrderRepo")
            .param(Parameter::typed("connection", "Connection"))
            .constructor(|args| {
                Ok(OrderRepo {
                    connection: args.object("connection")?,
                })
            })
            .build(),
    );
    registry.register(
        ClassDescriptor::builder::<Checkout>("Checkout")
            .param(Parameter::typed("users", "UserRepo"))
            .param(Parameter::typed("orders", "OrderRepo"))
            .constructor(|args| {
                Ok(Checkout {
                    users: args.object("users")?,
                    orders: args.object("orders")?,
                })
            })
            .build(),
    );

    registry.register(
        ClassDescriptor::builder::<Chicken>("Chicken")
            .param(Parameter::typed("egg", "Egg"))
            .constructor(|_| Ok(Chicken))
            .build(),
    );
    registry.register(
        ClassDescriptor::builder::<Egg>("Egg")
            .param(Parameter::typed("chicken", "Chicken"))
            .constructor(|_| Ok(Egg))
            .build(),
    );

    registry.register(
        ClassDescriptor::builder::<Formatter>("Formatter")
            .param(Parameter::typed("logger", "Logger"))
            .constructor(|args| {
                Ok(Formatter {
                    logger: args.interface::<dyn Logger>("logger")?,
                })
            })
            .build(),
    );
    registry.register(
        ClassDescriptor::builder::<Buffered>("Buffered")
            .implements_as::<dyn Logger, _>("Logger", |logger| logger as Arc<dyn Logger>)
            .param(Parameter::typed("formatter", "Formatter"))
            .constructor(|args| {
                Ok(Buffered {
                    formatter: args.object("formatter")?,
                })
            })
            .build(),
    );

    registry.register(ClassDescriptor::interface("ReadStore"));
    registry.register(ClassDescriptor::interface("WriteStore"));
    registry.register(
        ClassDescriptor::builder::<Store>("Store")
            .implements("ReadStore")
            .implements("WriteStore")
            .provider(
                ProviderSpec::new()
                    .service("ReadStore")
                    .service("WriteStore")
                    .lifetime(Lifetime::SINGLETON | Lifetime::SERVICE_SINGLETON),
            )
            .constructor(|_| Ok(Store))
            .build(),
    );
    registry
}

fn container() -> Container {
    Container::with_registry(registry())
}

#[test]
fn test_contextual_binding_applies_only_inside_consumer() {
    let container = container();
    container.bind("Logger", "FileLogger").unwrap();
    container.bind("App", "AppImpl").unwrap();

    let app = container.get_typed::<AppImpl>("App").unwrap();
    assert_eq!(app.logger.name(), "console");

    let logger = container.get_interface::<dyn Logger>("Logger").unwrap();
    assert_eq!(logger.name(), "file");
}

#[test]
fn test_container_hook_receives_consumer_context() {
    let container = container();
    container.bind("Logger", "FileLogger").unwrap();

    let app = container.get_typed::<AppImpl>("AppImpl").unwrap();
    let inner = app.container.as_ref().unwrap();
    assert_eq!(inner.current_context().unwrap(), ServiceId::new("AppImpl"));
    assert_eq!(
        inner.get_interface::<dyn Logger>("Logger").unwrap().name(),
        "console"
    );
    assert!(container.current_context().is_err());
}

#[test]
fn test_service_name_hook_receives_requested_name() {
    let container = container();
    container.bind("App", "AppImpl").unwrap();

    let app = container.get_typed::<AppImpl>("App").unwrap();
    assert_eq!(app.resolved_as, Some(ServiceId::new("App")));

    let app = container
        .get_as("App", "Application")
        .unwrap()
        .downcast::<AppImpl>()
        .unwrap();
    assert_eq!(app.resolved_as.as_ref().unwrap().as_str(), "Application");
}

#[test]
fn test_singleton_identity_and_unusable_arguments() {
    let container = container();
    container.singleton("Cache", "MemCache").unwrap();

    let first = container.get("Cache").unwrap();
    let second = container.get("cache").unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(first.downcast::<MemCache>().unwrap().size, 64);

    let err = container
        .get_with("Cache", Args::new().named("size", 10))
        .unwrap_err();
    assert!(matches!(err, ContainerError::UnusableArguments { .. }));
    assert_eq!(err.category(), ErrorCategory::UnusableArguments);
}

#[test]
fn test_first_resolution_of_singleton_accepts_arguments() {
    let container = container();
    container.singleton("Cache", "MemCache").unwrap();

    let cache = container
        .get_with("Cache", Args::new().named("$size", 10))
        .unwrap();
    assert_eq!(cache.downcast::<MemCache>().unwrap().size, 10);
    assert!(container.get("Cache").unwrap().ptr_eq(&cache));
}

#[test]
fn test_transient_binding_builds_new_instances() {
    let container = container();
    container.bind("Cache", "MemCache").unwrap();

    let first = container.get("Cache").unwrap();
    let second = container.get("Cache").unwrap();
    assert!(!first.ptr_eq(&second));
    assert_eq!(first.class(), &ServiceId::new("MemCache"));
}

#[test]
fn test_arguments_matched_by_type_and_name_in_any_order() {
    let container = container();
    let registry = container.registry();
    let logger = registry.wrap("FileLogger", FileLogger);

    let reporter = container
        .get_with(
            "Reporter",
            Args::new().named("title", "Q3").object(logger.clone()),
        )
        .unwrap()
        .downcast::<Reporter>()
        .unwrap();
    assert_eq!(reporter.logger.name(), "file");
    assert_eq!(reporter.title, "Q3");

    let reporter = container
        .get_with("Reporter", Args::new().push("Q4").object(logger))
        .unwrap()
        .downcast::<Reporter>()
        .unwrap();
    assert_eq!(reporter.logger.name(), "file");
    assert_eq!(reporter.title, "Q4");
}

#[test]
fn test_type_match_wins_over_name_match() {
    let container = container();
    let registry = container.registry();
    let console = registry.wrap("ConsoleLogger", ConsoleLogger);
    let file = registry.wrap("FileLogger", FileLogger);

    let reporter = container
        .get_with(
            "Reporter",
            Args::new()
                .named("logger", file)
                .named("title", "tie")
                .object(console),
        )
        .unwrap()
        .downcast::<Reporter>()
        .unwrap();
    assert_eq!(reporter.logger.name(), "console");
    assert_eq!(reporter.title, "tie");
}

#[test]
fn test_constructor_args_fill_remaining_parameters() {
    let container = container();
    container
        .bind_args("Digest", "Reporter", vec![Value::from("weekly")])
        .unwrap();
    container.bind("Logger", "FileLogger").unwrap();

    let digest = container.get_typed::<Reporter>("Digest").unwrap();
    assert_eq!(digest.title, "weekly");

    let digest = container
        .get_with("Digest", Args::new().named("title", "daily"))
        .unwrap()
        .downcast::<Reporter>()
        .unwrap();
    assert_eq!(digest.title, "daily");
}

#[test]
fn test_service_reference_in_constructor_args() {
    let container = container();
    container
        .bind_args("Reporter", "Reporter", vec![Value::service("ConsoleLogger")])
        .unwrap();

    let reporter = container.get_typed::<Reporter>("Reporter").unwrap();
    assert_eq!(reporter.logger.name(), "console");
    assert_eq!(reporter.title, "untitled");
}

#[test]
fn test_unresolved_dependency() {
    let container = container();
    let err = container.get("Mailer").unwrap_err();
    match &err {
        ContainerError::UnresolvedDependency {
            service, parameter, ..
        } => {
            assert_eq!(service, "Mailer");
            assert_eq!(parameter, "host");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("Unresolved dependency $host of Mailer"));
}

#[test]
fn test_unbound_interface_parameter_is_unresolved() {
    let container = container();
    let err = container.get("Reporter").unwrap_err();
    assert!(matches!(err, ContainerError::UnresolvedDependency { .. }));
    assert!(err.to_string().contains("Logger"));
}

#[test]
fn test_interface_is_not_instantiable() {
    let container = container();
    assert!(matches!(
        container.get("Logger"),
        Err(ContainerError::NotInstantiable { .. })
    ));
    assert!(matches!(
        container.get("Unknown"),
        Err(ContainerError::NotInstantiable { .. })
    ));
}

#[test]
fn test_circular_dependency_is_reported() {
    let container = container();
    let err = container.get("Chicken").unwrap_err();
    match err {
        ContainerError::CircularDependency { chain } => {
            assert_eq!(chain, "Chicken -> Egg -> Chicken");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_alias_cycle_is_reported() {
    let container = container();
    container.bind("Left", "Right").unwrap();
    container.bind("Right", "Left").unwrap();
    assert!(!container.has("Left"));
    assert!(matches!(
        container.get("Left"),
        Err(ContainerError::CircularDependency { .. })
    ));
}

#[test]
fn test_alias_resolves_when_target_context_remaps_it() {
    let container = container();
    container.bind("Logger", "Buffered").unwrap();
    container
        .bind_rule(
            "Buffered",
            BindingRule::new().with_substitution("Logger", Substitution::class("FileLogger")),
        )
        .unwrap();

    let direct = container.get_typed::<Buffered>("Buffered").unwrap();
    assert_eq!(direct.formatter.logger.name(), "file");

    let logger = container.get_interface::<dyn Logger>("Logger").unwrap();
    assert_eq!(logger.name(), "buffered");
    let buffered = container.get_typed::<Buffered>("Logger").unwrap();
    assert_eq!(buffered.formatter.logger.name(), "file");
}

#[test]
fn test_decorator_without_remapping_is_circular() {
    let container = container();
    container.bind("Logger", "Buffered").unwrap();

    match container.get("Logger").unwrap_err() {
        ContainerError::CircularDependency { chain } => {
            assert_eq!(chain, "Buffered -> Formatter -> Buffered");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_default_rule_type_substitution_to_itself_is_circular() {
    let container = container();
    container
        .bind_rule(
            DEFAULT_RULE_ID,
            BindingRule::new().with_substitution("Cache", Substitution::class("Cache")),
        )
        .unwrap();
    assert!(matches!(
        container.get("Cache"),
        Err(ContainerError::CircularDependency { .. })
    ));
}

#[test]
fn test_default_rule_parameter_substitution() {
    let container = container();
    container
        .bind_rule(
            DEFAULT_RULE_ID,
            BindingRule::new().with_substitution("$host", Substitution::value("smtp.local")),
        )
        .unwrap();

    let mailer = container.get_typed::<Mailer>("Mailer").unwrap();
    assert_eq!(mailer.host, "smtp.local");
}

#[test]
fn test_factory_substitution_for_type() {
    let container = container();
    container
        .bind_rule(
            "Reporter",
            BindingRule::new().with_substitution(
                "Logger",
                Substitution::factory(|c| c.get("ConsoleLogger").map(Value::Object)),
            ),
        )
        .unwrap();

    let reporter = container.get_typed::<Reporter>("Reporter").unwrap();
    assert_eq!(reporter.logger.name(), "console");
    assert!(!container.has("Logger"));
}

#[test]
fn test_factory_errors_are_wrapped() {
    let container = container();
    container
        .bind_rule(
            "Mailer",
            BindingRule::new().with_substitution(
                "$host",
                Substitution::factory(|_| Err(ContainerError::logic("no host configured"))),
            ),
        )
        .unwrap();

    let err = container.get("Mailer").unwrap_err();
    assert!(matches!(err, ContainerError::Factory { .. }));
    assert!(err.to_string().contains("no host configured"));
}

#[test]
fn test_share_instances_within_one_construction_tree() {
    let container = container();
    container
        .bind_rule(
            "Checkout",
            BindingRule::new().with_share_instance("Connection"),
        )
        .unwrap();

    let checkout = container.get_typed::<Checkout>("Checkout").unwrap();
    assert!(Arc::ptr_eq(
        &checkout.users.connection,
        &checkout.orders.connection
    ));

    let again = container.get_typed::<Checkout>("Checkout").unwrap();
    assert!(!Arc::ptr_eq(&checkout.users.connection, &again.users.connection));

    let users = container.get_typed::<UserRepo>("UserRepo").unwrap();
    let orders = container.get_typed::<OrderRepo>("OrderRepo").unwrap();
    assert!(!Arc::ptr_eq(&users.connection, &orders.connection));
}

#[test]
fn test_share_instances_conflicting_with_substitution_is_rejected() {
    let container = container();
    let err = container
        .bind_rule(
            "Checkout",
            BindingRule::new()
                .with_share_instance("Connection")
                .with_substitution("Connection", Substitution::class("Connection")),
        )
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(container.snapshot().get_rule(&ServiceId::new("Checkout")).is_none());
}

#[test]
fn test_instance_registration() {
    let container = container();
    let logger = container.registry().wrap("ConsoleLogger", ConsoleLogger);
    container.instance("Logger", logger.clone()).unwrap();

    assert!(container.get("Logger").unwrap().ptr_eq(&logger));
    assert!(container.has("Logger"));
    assert!(matches!(
        container.get_with("Logger", Args::new().push(1)),
        Err(ContainerError::UnusableArguments { .. })
    ));

    let other = container.registry().wrap("FileLogger", FileLogger);
    container.instance_if("Logger", other).unwrap();
    assert!(container.get("Logger").unwrap().ptr_eq(&logger));
}

#[test]
fn test_bind_if_and_singleton_if_keep_existing_binding() {
    let container = container();
    container.bind("Logger", "FileLogger").unwrap();
    container.bind_if("Logger", "ConsoleLogger").unwrap();
    container.singleton_if("Logger", "ConsoleLogger").unwrap();
    assert_eq!(
        container.get_interface::<dyn Logger>("Logger").unwrap().name(),
        "file"
    );

    container.singleton_if("Cache", "MemCache").unwrap();
    assert!(container.rule("Cache").shared);
}

#[test]
fn test_rebinding_evicts_shared_instance() {
    let container = container();
    container.singleton("Cache", "MemCache").unwrap();
    let first = container.get("Cache").unwrap();

    container.singleton("Cache", "MemCache").unwrap();
    let second = container.get("Cache").unwrap();
    assert!(!first.ptr_eq(&second));
}

#[test]
fn test_unbind_and_unload() {
    let container = container();
    container.singleton("Cache", "MemCache").unwrap();
    container.get("Cache").unwrap();
    assert_eq!(container.shared_count(), 1);

    container.unload();
    assert_eq!(container.shared_count(), 0);

    container.unbind("Cache").unwrap();
    assert!(!container.has("Cache"));
    assert!(container.rule("Cache").target.is_none());
}

#[test]
fn test_has() {
    let container = container();
    assert!(container.has("FileLogger"));
    assert!(!container.has("Logger"));
    assert!(!container.has("Nothing"));

    container.bind("Logger", "FileLogger").unwrap();
    assert!(container.has("logger"));
}

#[test]
fn test_in_context_of_without_substitutions_is_same_view() {
    let container = container();
    let view = container.in_context_of("MemCache").unwrap();
    assert!(view.same_view(&container));
    assert!(view.context_stack().is_empty());
}

#[test]
fn test_in_context_of_is_idempotent_and_isolated() {
    let container = container();
    container.bind("Logger", "FileLogger").unwrap();

    let once = container.in_context_of("AppImpl").unwrap();
    let twice = once.in_context_of("AppImpl").unwrap();
    assert!(twice.same_view(&once));
    assert!(!once.same_view(&container));
    assert_eq!(once.context_stack(), &[ServiceId::new("AppImpl")]);

    assert_eq!(once.get_interface::<dyn Logger>("Logger").unwrap().name(), "console");
    assert_eq!(
        container.get_interface::<dyn Logger>("Logger").unwrap().name(),
        "file"
    );

    once.bind("Cache", "MemCache").unwrap();
    assert!(!container.has("Cache"));
}

#[test]
fn test_views_share_singletons() {
    let container = container();
    container.singleton("Cache", "MemCache").unwrap();
    let view = container.in_context_of("AppImpl").unwrap();

    let from_view = view.get("Cache").unwrap();
    assert!(container.get("Cache").unwrap().ptr_eq(&from_view));
}

#[test]
fn test_rebinding_in_derived_view_keeps_root_singleton() {
    let root = container();
    root.singleton("Cache", "MemCache").unwrap();
    let first = root.get("Cache").unwrap();

    let view = root.in_context_of("AppImpl").unwrap();
    assert!(!view.same_view(&root));

    view.bind("Cache", "MemCache").unwrap();
    assert!(root.get("Cache").unwrap().ptr_eq(&first));
    assert!(!view.get("Cache").unwrap().ptr_eq(&first));

    view.singleton("Cache", "MemCache").unwrap();
    let local = view.get("Cache").unwrap();
    assert!(local.ptr_eq(&view.get("Cache").unwrap()));
    assert!(!local.ptr_eq(&first));
    assert_eq!(view.shared_count(), 2);

    view.unbind("Cache").unwrap();
    view.instance("Cache", Object::new("MemCache", MemCache { size: 1 }))
        .unwrap();
    assert!(root.get("Cache").unwrap().ptr_eq(&first));
    assert_eq!(root.shared_count(), 1);
}

#[test]
fn test_root_rebinding_reaches_derived_views() {
    let root = container();
    root.singleton("Cache", "MemCache").unwrap();
    let view = root.in_context_of("AppImpl").unwrap();
    let first = view.get("Cache").unwrap();

    root.singleton("Cache", "MemCache").unwrap();
    assert!(!view.get("Cache").unwrap().ptr_eq(&first));
    assert!(view.get("Cache").unwrap().ptr_eq(&root.get("Cache").unwrap()));
}

#[test]
fn test_provider_with_singleton_and_service_singleton() {
    let container = container();
    container.register_provider("Store").unwrap();

    let reader = container.get("ReadStore").unwrap();
    let writer = container.get("WriteStore").unwrap();
    let store = container.get("Store").unwrap();

    assert!(!reader.ptr_eq(&writer));
    assert!(!reader.ptr_eq(&store));
    assert!(!writer.ptr_eq(&store));
    assert!(reader.ptr_eq(&container.get("ReadStore").unwrap()));
    assert!(writer.ptr_eq(&container.get("WriteStore").unwrap()));
    assert!(store.ptr_eq(&container.get("Store").unwrap()));
    assert_eq!(container.providers(), vec![ServiceId::new("Store")]);
}

#[test]
fn test_provider_with_singleton_only_shares_one_instance() {
    let container = container();
    container
        .provider("Store", None, &[], Lifetime::SINGLETON)
        .unwrap();

    let reader = container.get("ReadStore").unwrap();
    let writer = container.get("WriteStore").unwrap();
    assert!(reader.ptr_eq(&writer));
}

#[test]
fn test_provider_rejects_service_it_does_not_implement() {
    let container = container();
    let err = container
        .provider(
            "AppImpl",
            Some(&[ServiceId::new("Logger")]),
            &[],
            Lifetime::INHERIT,
        )
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(!container.has("App"));
}

#[test]
fn test_provider_binds_declared_services() {
    let container = container();
    container.register_provider("AppImpl").unwrap();
    container.bind("Logger", "FileLogger").unwrap();

    let app = container.get_typed::<AppImpl>("App").unwrap();
    assert_eq!(app.logger.name(), "console");
}

#[test]
fn test_hooks_run_once_per_construction() {
    let calls = Arc::new(Mutex::new(0u32));
    let registry = TypeRegistry::new();
    let counter = Arc::clone(&calls);
    registry.register(
        ClassDescriptor::builder::<Connection>("Connection")
            .constructor(|_| Ok(Connection))
            .on_container(move |_, _| *counter.lock() += 1)
            .build(),
    );
    let container = Container::with_registry(registry);
    container.singleton("Connection", "Connection").unwrap();

    container.get("Connection").unwrap();
    container.get("Connection").unwrap();
    assert_eq!(*calls.lock(), 1);
}
