//! Activation-stack behavior: registry lookups, failed activation, scoped
//! overrides, and LIFO restoration on every exit path.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use uniray::{current_backend, has_backend, list_backends, set_backend, unset_backend};
use uniray::{BackendScope, Error};

// The activation stack is process-wide; tests in this binary take turns.
static LOCK: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    uniray_backend_ref_cpu::register_ref_cpu_backend();
    uniray_backend_ndarray::register_ndarray_backend();
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

#[test]
fn registry_lists_registered_backends() {
    let _guard = serial();
    let backends = list_backends();
    assert!(has_backend("ref-cpu"), "ref-cpu backend not registered");
    assert!(has_backend("ndarray"), "ndarray backend not registered");
    assert!(backends.contains(&"ref-cpu".to_string()));
    assert!(!has_backend("torch"));
}

#[test]
fn unknown_backend_leaves_current_unchanged() {
    let _guard = serial();
    let before = current_backend().unwrap();
    match set_backend("torch") {
        Err(Error::UnavailableBackend { name }) => assert_eq!(name, "torch"),
        other => panic!("expected unavailable backend, got {:?}", other.map(|_| ())),
    }
    let after = current_backend().unwrap();
    assert_eq!(before.backend_name(), after.backend_name());
    assert!(unset_backend().is_none(), "failed activation must not push");
}

#[test]
fn activation_is_cached_per_name() {
    let _guard = serial();
    let first = set_backend("ref-cpu").unwrap();
    let second = set_backend("ref-cpu").unwrap();
    assert!(
        std::sync::Arc::ptr_eq(&first, &second),
        "repeated activation must reuse the cached module"
    );
    unset_backend();
    unset_backend();
}

#[test]
fn scopes_nest_lifo() {
    let _guard = serial();
    set_backend("ref-cpu").unwrap();
    {
        let outer = BackendScope::enter("ndarray").unwrap();
        assert_eq!(outer.backend().backend_name(), "ndarray");
        assert_eq!(current_backend().unwrap().backend_name(), "ndarray");
        {
            let _inner = BackendScope::enter("ref-cpu").unwrap();
            assert_eq!(current_backend().unwrap().backend_name(), "ref-cpu");
        }
        assert_eq!(current_backend().unwrap().backend_name(), "ndarray");
    }
    assert_eq!(current_backend().unwrap().backend_name(), "ref-cpu");
    unset_backend();
}

#[test]
fn scope_restores_after_panic() {
    let _guard = serial();
    set_backend("ref-cpu").unwrap();
    let result = catch_unwind(AssertUnwindSafe(|| {
        let _scope = BackendScope::enter("ndarray").unwrap();
        panic!("boom");
    }));
    assert!(result.is_err());
    assert_eq!(current_backend().unwrap().backend_name(), "ref-cpu");
    unset_backend();
}

#[test]
fn scope_restores_after_early_return() {
    let _guard = serial();

    fn failing_work() -> uniray::Result<()> {
        let _scope = BackendScope::enter("ndarray")?;
        Err(Error::InvalidValue {
            reason: "simulated failure".to_string(),
        })
    }

    set_backend("ref-cpu").unwrap();
    assert!(failing_work().is_err());
    assert_eq!(current_backend().unwrap().backend_name(), "ref-cpu");
    unset_backend();
}

#[test]
fn default_backend_answers_with_empty_stack() {
    let _guard = serial();
    // No activation in effect: the configured default resolves.
    let backend = current_backend().unwrap();
    assert_eq!(backend.backend_name(), "ref-cpu");
}
