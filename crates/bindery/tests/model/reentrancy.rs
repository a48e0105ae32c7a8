//! Listeners that write back into the model while a broadcast is running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use serde_json::json;

use bindery::model::Phase;
use bindery::{Model, ModelError, SetOptions, ValidationError, ALL_EVENTS};

fn record(model: &Model) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_clone = Arc::clone(&log);
    model.on(ALL_EVENTS, move |_, event| {
        log_clone.lock().push(event.name().into_owned());
    });
    log
}

#[test]
fn nested_set_is_coalesced_into_the_outer_pass() {
    let model = Model::new(json!({"a": 0, "b": 0}));
    model.on("change:a", |model, _| {
        model.set(("b", 1), SetOptions::default()).unwrap();
    });
    let log = record(&model);

    model.set(("a", 1), SetOptions::default()).unwrap();

    assert_eq!(*log.lock(), vec!["change:a", "change:b", "change"]);
    assert_eq!(model.to_json(), json!({"a": 1, "b": 1}));
    assert_eq!(model.phase(), Phase::Idle);
}

#[test]
fn nested_write_is_visible_immediately() {
    let model = Model::new(json!({}));
    let seen = Arc::new(Mutex::new(None));
    let seen_clone = Arc::clone(&seen);
    model.on("change:a", move |model, _| {
        let applied = model.set(("b", "x"), SetOptions::default()).unwrap();
        *seen_clone.lock() = Some((applied, model.get("b"), model.phase()));
    });

    model.set(("a", 1), SetOptions::default()).unwrap();

    assert_eq!(
        *seen.lock(),
        Some((true, Some(json!("x")), Phase::Broadcasting))
    );
}

#[test]
fn write_from_aggregate_listener_triggers_one_more_round() {
    let model = Model::new(json!({}));
    let done = Arc::new(AtomicBool::new(false));
    let done_clone = Arc::clone(&done);
    model.on("change", move |model, _| {
        if !done_clone.swap(true, Ordering::SeqCst) {
            model.set(("c", 1), SetOptions::default()).unwrap();
        }
    });
    let log = record(&model);

    model.set(("a", 1), SetOptions::default()).unwrap();

    assert_eq!(*log.lock(), vec!["change:a", "change", "change:c", "change"]);
}

#[test]
fn nested_key_is_announced_once_even_when_written_twice() {
    let model = Model::new(json!({}));
    model.on("change:a", |model, _| {
        model.set(("b", 1), SetOptions::default()).unwrap();
        model.set(("b", 2), SetOptions::default()).unwrap();
    });
    let log = record(&model);

    model.set(("a", 1), SetOptions::default()).unwrap();

    let changes_to_b = log.lock().iter().filter(|name| *name == "change:b").count();
    assert_eq!(changes_to_b, 1);
    assert_eq!(model.get("b"), Some(json!(2)));
}

#[test]
fn nested_silent_set_is_not_announced() {
    let model = Model::new(json!({}));
    model.on("change:a", |model, _| {
        model.set(("hidden", true), SetOptions::silent()).unwrap();
    });
    let log = record(&model);

    model.set(("a", 1), SetOptions::default()).unwrap();

    assert_eq!(*log.lock(), vec!["change:a", "change"]);
    assert_eq!(model.get("hidden"), Some(json!(true)));
}

#[test]
fn panicking_listener_leaves_model_usable() {
    let model = Model::new(json!({}));
    let armed = Arc::new(AtomicBool::new(true));
    let armed_clone = Arc::clone(&armed);
    model.on("change:a", move |_, _| {
        if armed_clone.swap(false, Ordering::SeqCst) {
            panic!("listener failure");
        }
    });

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        model.set(("a", 1), SetOptions::default()).unwrap();
    }));
    assert!(result.is_err());
    assert_eq!(model.phase(), Phase::Idle);
    assert_eq!(model.get("a"), Some(json!(1)), "mutation was committed before broadcast");

    let log = record(&model);
    model.set(("a", 2), SetOptions::default()).unwrap();
    assert_eq!(*log.lock(), vec!["change:a", "change"]);
}

#[test]
fn write_during_validation_forces_revalidation() {
    let handle: Arc<OnceLock<Weak<Model>>> = Arc::new(OnceLock::new());
    let armed = Arc::new(AtomicBool::new(true));
    let handle_clone = Arc::clone(&handle);
    let armed_clone = Arc::clone(&armed);
    let model = Arc::new(
        Model::builder()
            .validate(move |attrs| {
                if armed_clone.swap(false, Ordering::SeqCst) {
                    if let Some(model) = handle_clone.get().and_then(Weak::upgrade) {
                        model.set(("a", true), SetOptions::default()).unwrap();
                    }
                }
                let both = attrs.get("a") == Some(&json!(true))
                    && attrs.get("b") == Some(&json!(true));
                if both {
                    Err(ValidationError::new("a and b are exclusive"))
                } else {
                    Ok(())
                }
            })
            .build(json!({})),
    );
    handle.set(Arc::downgrade(&model)).unwrap();

    let err = model.set(("b", true), SetOptions::default()).unwrap_err();

    assert!(matches!(err, ModelError::Validation(_)));
    assert_eq!(model.get("a"), Some(json!(true)));
    assert_eq!(model.get("b"), None);
}
