#![allow(dead_code)]

pub use rundag_test_utils::builders;
pub use rundag_test_utils::fake_runner;
pub use rundag_test_utils::{init_tracing, with_timeout};
