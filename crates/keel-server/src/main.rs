//! Keel server binary.
//!
//! Loads configuration, initialises structured logging, builds the shared
//! core and opens the event store.

use keel_server::config;
use keel_server::events::EventStore;
use keel_server::Core;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("KEEL_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration, the server cannot start without valid config");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let core = Core::new(&config);
    let store = EventStore::open(&core, &config.database.options)
        .expect("failed to open event store, check database.connection_string in config");
    let stored = store.count().expect("failed to count stored events");

    tracing::info!(
        driver = store.database().driver_name(),
        hooks_enabled = core.hooks().is_enabled(),
        known_hooks = ?keel_hooks::KNOWN_HOOKS,
        stored_events = stored,
        "keel server ready"
    );
}
