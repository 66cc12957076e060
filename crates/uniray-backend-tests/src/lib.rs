//! Shared conformance suite run against every registered backend.
//!
//! Backend crates invoke [`define_backend_tests!`] from an integration test
//! to stamp out the full suite against their own registration:
//!
//! ```ignore
//! uniray_backend_tests::define_backend_tests!(
//!     ref_cpu_conformance,
//!     uniray_backend_ref_cpu::register_ref_cpu_backend,
//!     "ref-cpu"
//! );
//! ```

pub mod smoke;

use std::sync::{Mutex, MutexGuard, PoisonError};

static SUITE_LOCK: Mutex<()> = Mutex::new(());

/// Serializes suite cases: the active-backend stack is process-wide and not
/// thread-safe, so concurrent test threads must not switch backends.
pub fn suite_lock() -> MutexGuard<'static, ()> {
    SUITE_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

#[macro_export]
macro_rules! define_backend_tests {
    ($module:ident, $register:expr, $name:expr) => {
        mod $module {
            fn case(f: fn(&str)) {
                let _guard = $crate::suite_lock();
                ($register)();
                f($name);
            }

            #[test]
            fn literal_roundtrip() {
                case($crate::smoke::literal_roundtrip);
            }

            #[test]
            fn elementwise_matches_reference() {
                case($crate::smoke::elementwise_matches_reference);
            }

            #[test]
            fn clip_family_matches_reference() {
                case($crate::smoke::clip_family_matches_reference);
            }

            #[test]
            fn manipulation_matches_reference() {
                case($crate::smoke::manipulation_matches_reference);
            }

            #[test]
            fn gather_matches_reference() {
                case($crate::smoke::gather_matches_reference);
            }

            #[test]
            fn out_target_is_aliased() {
                case($crate::smoke::out_target_is_aliased);
            }

            #[test]
            fn container_roll_scenario() {
                case($crate::smoke::container_roll_scenario);
            }

            #[test]
            fn dtype_table_is_enforced() {
                case($crate::smoke::dtype_table_is_enforced);
            }
        }
    };
}
