//! Counter app walkthrough for lifecycle-registry.
//!
//! Simulates a small host tree:
//! - An app node owning a global `Settings` service and two named loggers
//! - A page node owning a scoped `Counter` model
//! - A label that listens to the counter and a footer that only reads it
//!
//! Run with: `RUST_LOG=lifecycle_registry=debug cargo run --example counter_app`

use lifecycle_registry::{
    get, get_named, is_registered, lookup, ChangeNotifier, Dependent, Disposable, Listener, Lookup,
    Managed, MultiRegistrar, Notifier, Observer, Registrar, Registration, RegistryError, Scope,
};
use std::sync::atomic::{AtomicI32, Ordering};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Settings {
    title: String,
}

impl Managed for Settings {}

struct Logger {
    prefix: &'static str,
}

impl Logger {
    fn log(&self, message: &str) {
        println!("   [{}] {message}", self.prefix);
    }
}

impl Disposable for Logger {
    fn dispose(&self) {
        println!("   [{}] closed", self.prefix);
    }
}

impl Managed for Logger {
    fn as_disposable(&self) -> Option<&dyn Disposable> {
        Some(self)
    }
}

struct Counter {
    value: AtomicI32,
    notifier: Notifier,
}

impl Counter {
    fn new(value: i32) -> Self {
        Self {
            value: AtomicI32::new(value),
            notifier: Notifier::new(),
        }
    }

    fn value(&self) -> i32 {
        self.value.load(Ordering::SeqCst)
    }

    fn increment(&self) {
        self.value.fetch_add(1, Ordering::SeqCst);
        self.notifier.notify_listeners();
    }
}

impl Managed for Counter {
    fn as_disposable(&self) -> Option<&dyn Disposable> {
        Some(&self.notifier)
    }

    fn as_notifier(&self) -> Option<&dyn ChangeNotifier> {
        Some(&self.notifier)
    }
}

/// A host widget that caches the value it rendered.
struct Label {
    dependent: Dependent,
    text: String,
}

fn main() -> Result<(), RegistryError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().compact())
        .try_init()
        .ok();

    println!("=== lifecycle-registry: Counter App ===\n");

    // -------------------------------------------------------------------------
    // 1. Mount the app node
    // -------------------------------------------------------------------------
    println!("1. Mounting the app node...");

    let root = Scope::root();
    let settings = Registrar::global(Registration::lazy(|| Settings {
        title: "Counter".to_string(),
    }))
    .mount(&root)?;
    let loggers = MultiRegistrar::new()
        .with(Registration::value(Logger { prefix: "ui" }).named("ui"))
        .with(Registration::value(Logger { prefix: "audit" }).named("audit"))
        .mount(settings.scope())?;

    println!("   Settings registered: {}", is_registered::<Settings>(None));
    println!("   Settings built lazily: {}", get::<Settings>()?.title);
    get_named::<Logger>("ui")?.log("app mounted");

    // -------------------------------------------------------------------------
    // 2. Mount the page with a scoped counter
    // -------------------------------------------------------------------------
    println!("\n2. Mounting the page node with a scoped counter...");

    let page = Registrar::scoped(Registration::lazy(|| Counter::new(42))).mount(loggers.scope())?;
    let body = page.scope().child();

    println!("   Counter visible globally: {}", is_registered::<Counter>(None));

    let dependent = Dependent::with_schedule(|| println!("   (label scheduled for rebuild)"));
    let mut label = Label {
        text: lookup::listen::<Counter>(&body, &dependent)?.value().to_string(),
        dependent,
    };
    let footer = lookup::get::<Counter>(&body)?.value().to_string();
    println!("   label = {}, footer = {}", label.text, footer);

    // -------------------------------------------------------------------------
    // 3. Change the counter
    // -------------------------------------------------------------------------
    println!("\n3. Incrementing the counter...");

    let counter = lookup::get::<Counter>(&body)?;
    counter.increment();

    if label.dependent.take_dirty() {
        label.text = lookup::listen::<Counter>(&body, &label.dependent)?.value().to_string();
    }
    println!("   label = {}, footer = {}", label.text, footer);

    // -------------------------------------------------------------------------
    // 4. Observe the counter from a component
    // -------------------------------------------------------------------------
    println!("\n4. Observing the counter...");

    let mut observer = Observer::new();
    let audit = get_named::<Logger>("audit")?;
    let listener = Listener::new(move || audit.log("counter changed"));
    observer.listen_to::<Counter>(Lookup::Scoped(&body), &listener)?;
    // Subscribing twice is a no-op.
    observer.listen_to::<Counter>(Lookup::Scoped(&body), &listener)?;
    println!("   subscriptions: {}", observer.subscription_count());

    counter.increment();
    observer.cancel_subscriptions();
    counter.increment();

    // -------------------------------------------------------------------------
    // 5. Tear the tree down
    // -------------------------------------------------------------------------
    println!("\n5. Unmounting, innermost first...");

    page.unmount()?;
    println!("   Counter disposed: {}", counter.notifier.is_disposed());

    loggers.unmount()?;
    settings.unmount()?;
    println!("   Settings registered: {}", is_registered::<Settings>(None));

    println!("\n=== Done ===");
    Ok(())
}
