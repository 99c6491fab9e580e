//! # Festival Testing
//!
//! Testing utilities for the checkout engine.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`test_clock`])
//! - A Given-When-Then builder for reducers ([`ReducerTest`])
//! - Effect assertion helpers ([`assertions`])
//! - One-call tracing setup for tests ([`init_test_tracing`])
//!
//! ## Example
//!
//! ```ignore
//! use festival_testing::{ReducerTest, assertions};
//!
//! ReducerTest::new(CheckoutReducer::new())
//!     .with_env(test_environment())
//!     .given_state(CheckoutState::default())
//!     .when_action(CheckoutAction::SetVisitorPassDays { days: 5 })
//!     .then_state(|s| assert_eq!(s.selection.visitor_pass_days(), 3))
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use festival_core::environment::Clock;

mod reducer_test;

pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use festival_testing::mocks::FixedClock;
    /// use festival_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// The instant every test clock starts at: 2026-02-14 09:00:00 UTC
    #[must_use]
    pub fn test_instant() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_771_059_600, 0).unwrap_or_default()
    }

    /// Create a default fixed clock for tests
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_instant())
    }
}

/// Install a `fmt` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "festival=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
