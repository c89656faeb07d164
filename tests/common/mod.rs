#![allow(dead_code, unused_imports)]

pub use procwarden_test_utils::builders;
pub use procwarden_test_utils::fake_lookup::{FakeIdentityLookup, LookupGate};
pub use procwarden_test_utils::{
    init_tracing, process_is_running, processes_with_arg, wait_until_gone, with_timeout,
};
