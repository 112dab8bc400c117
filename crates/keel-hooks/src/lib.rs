//! Extension hooks for the Keel server.
//!
//! Hooks are named points in the server core where optional feature modules
//! can observe domain events without the core depending on them. The core
//! calls [`HookRegistry::run`] at a lifecycle point (for example after an
//! event has been persisted) and every callback a module attached for that
//! kind is invoked synchronously, in attachment order, before `run` returns.
//!
//! Hook support is opt-in. A registry starts disabled, and until
//! [`HookRegistry::enable`] is called both `attach` and `run` do nothing, so
//! a server that never enables hooks pays a single atomic load per call.
//!
//! # Usage
//!
//! ```rust
//! use keel_hooks::{HookRegistry, NewEvent, PersistedEvent};
//!
//! let hooks = HookRegistry::new();
//! hooks.enable();
//! hooks.attach::<NewEvent, _>(|event: &PersistedEvent| {
//!     println!("persisted {}", event.event_id);
//! });
//! ```

mod kind;
mod registry;

pub use kind::{HookKind, NewEvent, PersistedEvent, KNOWN_HOOKS};
pub use registry::HookRegistry;

#[cfg(test)]
mod tests;
