//! Phase tracking for integration tests.
//!
//! Lines go to stderr, which the test harness captures and shows only for
//! failing tests, so the last phase printed is where a failure happened.
//!
//! ```rust,ignore
//! let log = TestLogger::new("cache_hit_skips_upstream");
//! log.phase("setup");
//! // ...
//! log.finish_ok();
//! ```
#![allow(dead_code)]

use std::cell::RefCell;
use std::time::Instant;

pub struct TestLogger {
    test_name: String,
    started: Instant,
    phase: RefCell<&'static str>,
}

impl TestLogger {
    #[must_use]
    pub fn new(test_name: &str) -> Self {
        let logger = Self {
            test_name: test_name.to_string(),
            started: Instant::now(),
            phase: RefCell::new("init"),
        };
        logger.line("started");
        logger
    }

    /// Usually "setup", "execute", "verify".
    pub fn phase(&self, phase: &'static str) {
        self.phase.replace(phase);
        self.line("entered phase");
    }

    pub fn finish_ok(&self) {
        self.line(&format!("passed in {}ms", self.started.elapsed().as_millis()));
    }

    fn line(&self, message: &str) {
        eprintln!(
            "[{:>6}ms] [{}] [{}] {message}",
            self.started.elapsed().as_millis(),
            self.test_name,
            self.phase.borrow(),
        );
    }
}
