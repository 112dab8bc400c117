//! Keyed publish/subscribe table of hook callbacks.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::kind::HookKind;

type Callback<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Registry of hook callbacks, keyed by hook kind.
///
/// The registry is created disabled. Once [`enable`](Self::enable) has been
/// called it stays enabled for the lifetime of the value.
///
/// Each kind's callbacks are stored as a `Vec<Callback<K::Payload>>` behind
/// the kind's `TypeId`, so the downcast in [`snapshot`](Self::snapshot)
/// always matches the type that [`attach`](Self::attach) stored.
#[derive(Default)]
pub struct HookRegistry {
    enabled: AtomicBool,
    callbacks: Mutex<HashMap<TypeId, Box<dyn Any + Send>>>,
}

impl HookRegistry {
    /// Creates an empty, disabled registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables hook dispatch. Calling this more than once has no further
    /// effect, and there is no way to disable the registry again.
    pub fn enable(&self) {
        if !self.enabled.swap(true, Ordering::SeqCst) {
            tracing::info!("hook dispatch enabled");
        }
    }

    /// Returns `true` once [`enable`](Self::enable) has been called.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Appends `callback` to the list for kind `K`.
    ///
    /// Does nothing while the registry is disabled. Callbacks are not
    /// de-duplicated: attaching the same callback twice makes every `run`
    /// invoke it twice.
    pub fn attach<K, F>(&self, callback: F)
    where
        K: HookKind,
        F: Fn(&K::Payload) + Send + Sync + 'static,
    {
        if !self.is_enabled() {
            return;
        }

        let callback: Callback<K::Payload> = Arc::new(callback);
        let mut map = self.callbacks.lock().unwrap_or_else(|e| e.into_inner());
        let entry = map
            .entry(TypeId::of::<K>())
            .or_insert_with(|| Box::new(Vec::<Callback<K::Payload>>::new()));
        if let Some(list) = entry.downcast_mut::<Vec<Callback<K::Payload>>>() {
            list.push(callback);
            tracing::debug!(hook = K::NAME, attached = list.len(), "attached hook callback");
        }
    }

    /// Invokes every callback attached for kind `K` with `payload`.
    ///
    /// Callbacks run on the calling thread, in attachment order, and all of
    /// them have returned before `run` does. The callback list is copied
    /// out of the lock first, so callbacks may themselves attach or run
    /// hooks. A panicking callback unwinds through `run` and the remaining
    /// callbacks are skipped.
    pub fn run<K: HookKind>(&self, payload: &K::Payload) {
        if !self.is_enabled() {
            return;
        }

        for callback in self.snapshot::<K>() {
            callback(payload);
        }
    }

    /// Number of callbacks currently attached for kind `K`.
    pub fn callback_count<K: HookKind>(&self) -> usize {
        self.snapshot::<K>().len()
    }

    fn snapshot<K: HookKind>(&self) -> Vec<Callback<K::Payload>> {
        let map = self.callbacks.lock().unwrap_or_else(|e| e.into_inner());
        map.get(&TypeId::of::<K>())
            .and_then(|entry| entry.downcast_ref::<Vec<Callback<K::Payload>>>())
            .cloned()
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds = self
            .callbacks
            .lock()
            .map(|map| map.len())
            .unwrap_or_default();
        f.debug_struct("HookRegistry")
            .field("enabled", &self.is_enabled())
            .field("kinds", &kinds)
            .finish()
    }
}
