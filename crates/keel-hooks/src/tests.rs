//! Unit tests for hook registration and dispatch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::Utc;
use serde_json::json;

use crate::kind::{HookKind, NewEvent, PersistedEvent, KNOWN_HOOKS};
use crate::registry::HookRegistry;

/// A kind the server core never triggers.
enum Unused {}

impl HookKind for Unused {
    const NAME: &'static str = "unused";
    type Payload = u32;
}

fn sample_event(id: &str) -> PersistedEvent {
    PersistedEvent {
        event_id: id.to_string(),
        room_id: "!room:localhost".to_string(),
        sender: "@alice:localhost".to_string(),
        event_type: "m.room.message".to_string(),
        content: json!({ "body": "hello" }),
        persisted_at: Utc::now(),
    }
}

// ── enable gating ────────────────────────────────────────────────────

#[test]
fn disabled_registry_never_invokes_callbacks() {
    let hooks = HookRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    hooks.attach::<NewEvent, _>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    hooks.run::<NewEvent>(&sample_event("$a"));

    assert!(!hooks.is_enabled());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(hooks.callback_count::<NewEvent>(), 0);
}

#[test]
fn attach_before_enable_is_discarded() {
    let hooks = HookRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    hooks.attach::<NewEvent, _>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    hooks.enable();
    hooks.run::<NewEvent>(&sample_event("$a"));

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn enable_is_idempotent() {
    let hooks = HookRegistry::new();
    hooks.enable();
    hooks.enable();
    assert!(hooks.is_enabled());
}

// ── dispatch ordering ────────────────────────────────────────────────

#[test]
fn callbacks_run_in_attachment_order() {
    let hooks = HookRegistry::new();
    hooks.enable();
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&order);
    hooks.attach::<NewEvent, _>(move |event| {
        first.lock().unwrap().push(format!("cb1:{}", event.event_id));
    });
    let second = Arc::clone(&order);
    hooks.attach::<NewEvent, _>(move |event| {
        second.lock().unwrap().push(format!("cb2:{}", event.event_id));
    });

    hooks.run::<NewEvent>(&sample_event("$p"));

    // Both callbacks have completed by the time run returns.
    assert_eq!(*order.lock().unwrap(), vec!["cb1:$p", "cb2:$p"]);
}

#[test]
fn same_callback_attached_twice_runs_twice() {
    let hooks = HookRegistry::new();
    hooks.enable();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let callback = move |_: &PersistedEvent| {
        counter.fetch_add(1, Ordering::SeqCst);
    };
    hooks.attach::<NewEvent, _>(callback.clone());
    hooks.attach::<NewEvent, _>(callback);

    hooks.run::<NewEvent>(&sample_event("$a"));

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(hooks.callback_count::<NewEvent>(), 2);
}

#[test]
fn kinds_are_dispatched_independently() {
    let hooks = HookRegistry::new();
    hooks.enable();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    hooks.attach::<Unused, _>(move |n| sink.lock().unwrap().push(*n));

    hooks.run::<NewEvent>(&sample_event("$a"));
    assert!(seen.lock().unwrap().is_empty());

    hooks.run::<Unused>(&7);
    assert_eq!(*seen.lock().unwrap(), vec![7]);
}

#[test]
fn run_with_no_callbacks_is_a_no_op() {
    let hooks = HookRegistry::new();
    hooks.enable();
    hooks.run::<NewEvent>(&sample_event("$a"));
    assert_eq!(hooks.callback_count::<NewEvent>(), 0);
}

#[test]
fn new_event_appender_collects_every_payload() {
    let hooks = HookRegistry::new();
    hooks.enable();
    let collected = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&collected);
    hooks.attach::<NewEvent, _>(move |event| sink.lock().unwrap().push(event.clone()));

    let x = sample_event("$x");
    for _ in 0..3 {
        hooks.run::<NewEvent>(&x);
    }

    assert_eq!(*collected.lock().unwrap(), vec![x.clone(), x.clone(), x]);
}

#[test]
fn callback_may_attach_while_running() {
    let hooks = Arc::new(HookRegistry::new());
    hooks.enable();

    let inner = Arc::clone(&hooks);
    hooks.attach::<NewEvent, _>(move |_| {
        inner.attach::<Unused, _>(|_| {});
    });

    hooks.run::<NewEvent>(&sample_event("$a"));
    assert_eq!(hooks.callback_count::<Unused>(), 1);
}

#[test]
fn callback_panic_propagates_to_caller() {
    let hooks = HookRegistry::new();
    hooks.enable();
    let after = Arc::new(AtomicUsize::new(0));

    hooks.attach::<NewEvent, _>(|_| panic!("callback failed"));
    let counter = Arc::clone(&after);
    hooks.attach::<NewEvent, _>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let event = sample_event("$a");
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        hooks.run::<NewEvent>(&event);
    }));

    assert!(result.is_err(), "panic should reach the caller of run");
    assert_eq!(after.load(Ordering::SeqCst), 0, "later callbacks are skipped");

    // The registry stays usable afterwards.
    assert_eq!(hooks.callback_count::<NewEvent>(), 2);
}

#[test]
fn concurrent_attach_keeps_every_callback() {
    let hooks = Arc::new(HookRegistry::new());
    hooks.enable();
    let calls = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let hooks = Arc::clone(&hooks);
            let calls = Arc::clone(&calls);
            thread::spawn(move || {
                for _ in 0..25 {
                    let calls = Arc::clone(&calls);
                    hooks.attach::<NewEvent, _>(move |_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("attach thread should not panic");
    }

    hooks.run::<NewEvent>(&sample_event("$a"));
    assert_eq!(calls.load(Ordering::SeqCst), 200);
}

#[test]
fn known_hooks_lists_new_event() {
    assert_eq!(KNOWN_HOOKS, &["new_event"]);
    assert_eq!(NewEvent::NAME, "new_event");
}

#[test]
fn persisted_event_serializes_to_json() {
    let event = sample_event("$json");
    let encoded = serde_json::to_value(&event).expect("event should serialize");
    assert_eq!(encoded["event_id"], "$json");
    assert_eq!(encoded["content"]["body"], "hello");
}
