//! Integration tests for tracing and event monitoring.
//!
//! The trace callback sees every registry interaction, including those made
//! by registrars on mount and unmount.

use lifecycle_registry::{define_registry, Registrar, Registration, RegistryApi, Scope};
use std::sync::{Arc, Mutex};

fn collect_events(install: impl FnOnce(Box<dyn Fn(String) + Send + Sync>)) -> Arc<Mutex<Vec<String>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    install(Box::new(move |event| events_clone.lock().unwrap().push(event)));
    events
}

#[test]
fn test_basic_tracing() {
    define_registry!(traced1);

    let events = collect_events(|push| traced1::set_trace_callback(move |event| push(event.to_string())));

    traced1::register(42i32).unwrap();
    let _: Arc<i32> = traced1::get().unwrap();
    let _ = traced1::is_registered::<i32>(None);
    traced1::unregister::<i32>(None, true).unwrap();

    let captured = events.lock().unwrap();
    assert_eq!(captured.len(), 4);
    assert!(captured[0].starts_with("register"));
    assert!(captured[1].starts_with("get"));
    assert!(captured[2].starts_with("contains"));
    assert!(captured[3].starts_with("unregister"));
}

#[test]
fn test_trace_register_event() {
    define_registry!(traced2);

    let events = collect_events(|push| traced2::set_trace_callback(move |event| push(event.to_string())));

    traced2::register(999u32).unwrap();
    traced2::register_lazy(|| 1u64).unwrap();
    traced2::register_with(Registration::value(7u32).named("seven")).unwrap();

    let captured = events.lock().unwrap();
    assert_eq!(
        *captured,
        vec![
            "register { type_name: u32, lazy: false }",
            "register { type_name: u64, lazy: true }",
            "register { type_name: u32, name: \"seven\", lazy: false }",
        ]
    );

    traced2::clear_trace_callback();
}

#[test]
fn test_trace_get_found_and_not_found() {
    define_registry!(traced3);

    let events = collect_events(|push| traced3::set_trace_callback(move |event| push(event.to_string())));

    traced3::register(123i64).unwrap();
    let _: Arc<i64> = traced3::get().unwrap();

    let _ = traced3::get::<f32>();

    let captured = events.lock().unwrap();
    assert_eq!(captured.len(), 3);
    assert!(captured[1].contains("found: true"));
    assert!(captured[2].contains("found: false"));

    traced3::clear_trace_callback();
}

#[test]
fn test_trace_contains_event() {
    define_registry!(traced4);

    let events = collect_events(|push| traced4::set_trace_callback(move |event| push(event.to_string())));

    let _ = traced4::is_registered::<String>(None);
    traced4::register("test".to_string()).unwrap();
    let _ = traced4::is_registered::<String>(None);

    let captured = events.lock().unwrap();
    assert_eq!(captured.len(), 3);
    assert!(captured[0].starts_with("contains"));
    assert!(captured[0].contains("found: false"));
    assert!(captured[2].starts_with("contains"));
    assert!(captured[2].contains("found: true"));

    traced4::clear_trace_callback();
}

#[test]
fn test_clear_trace_callback() {
    define_registry!(traced5);

    let events = collect_events(|push| traced5::set_trace_callback(move |event| push(event.to_string())));

    traced5::register(1u8).unwrap();
    traced5::clear_trace_callback();

    traced5::register(2u16).unwrap();
    let _: Arc<u16> = traced5::get().unwrap();

    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn test_unregister_event_reports_disposal() {
    use lifecycle_registry::{Disposable, Managed};

    struct Handle;
    impl Disposable for Handle {
        fn dispose(&self) {}
    }
    impl Managed for Handle {
        fn as_disposable(&self) -> Option<&dyn Disposable> {
            Some(self)
        }
    }

    define_registry!(traced6);

    traced6::register_lazy(|| Handle).unwrap();
    traced6::register(Handle).unwrap_err();
    traced6::register_with(Registration::value(Handle).named("built")).unwrap();

    let events = collect_events(|push| traced6::set_trace_callback(move |event| push(event.to_string())));

    // Never built, so nothing to dispose.
    traced6::unregister::<Handle>(None, true).unwrap();
    traced6::unregister::<Handle>(Some("built"), true).unwrap();

    let captured = events.lock().unwrap();
    assert!(captured[0].ends_with("disposed: false }"));
    assert!(captured[1].contains("name: \"built\""));
    assert!(captured[1].ends_with("disposed: true }"));

    traced6::clear_trace_callback();
}

#[test]
fn test_registrar_mount_and_unmount_are_traced() {
    define_registry!(traced7);

    let events = collect_events(|push| traced7::set_trace_callback(move |event| push(event.to_string())));

    let mounted = Registrar::global(Registration::lazy(|| 5usize))
        .with_registry(traced7::API)
        .mount(&Scope::root())
        .unwrap();
    mounted.unmount().unwrap();

    let captured = events.lock().unwrap();
    assert_eq!(
        *captured,
        vec![
            "register { type_name: usize, lazy: true }",
            "unregister { type_name: usize, disposed: false }",
        ]
    );

    traced7::clear_trace_callback();
}

#[test]
fn test_trace_callback_replacement() {
    define_registry!(traced8);

    let events1 = collect_events(|push| traced8::set_trace_callback(move |event| push(event.to_string())));
    traced8::register(100usize).unwrap();

    let events2 = collect_events(|push| traced8::set_trace_callback(move |event| push(event.to_string())));
    traced8::register(200isize).unwrap();

    assert_eq!(events1.lock().unwrap().len(), 1);
    assert_eq!(events2.lock().unwrap().len(), 1);

    traced8::clear_trace_callback();
}

#[test]
fn test_callback_can_use_the_same_registry() {
    define_registry!(reentrant);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    // The callback runs outside the table lock.
    reentrant::set_trace_callback(move |event| {
        if let lifecycle_registry::RegistryEvent::Register { .. } = event {
            seen_clone.lock().unwrap().push(reentrant::API.len());
        }
    });

    reentrant::register(1i8).unwrap();
    reentrant::register(2i16).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    reentrant::clear_trace_callback();
}

#[test]
fn test_callback_can_use_different_registry() {
    define_registry!(main_registry);
    define_registry!(log_registry);

    let counter = Arc::new(Mutex::new(0usize));
    let counter_clone = counter.clone();

    main_registry::set_trace_callback(move |event| {
        let mut n = counter_clone.lock().unwrap();
        *n += 1;
        log_registry::register_with(Registration::value(event.to_string()).named(format!("event-{n}")))
            .unwrap();
    });

    main_registry::register(42i32).unwrap();
    let value: Arc<i32> = main_registry::get().unwrap();
    assert_eq!(*value, 42);

    let first: Arc<String> = log_registry::get_named("event-1").unwrap();
    let second: Arc<String> = log_registry::get_named("event-2").unwrap();
    assert!(first.starts_with("register"));
    assert!(second.starts_with("get"));

    main_registry::clear_trace_callback();
}
