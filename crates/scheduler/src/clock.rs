use chrono::{DateTime, Utc};

/// Injectable wall-clock source.
///
/// Every component that needs "now" takes a `&dyn Clock` rather than calling
/// `Utc::now()` directly, so that tick/claim/report races can be driven
/// deterministically in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test double for [`Clock`]. Left un-gated (rather than `#[cfg(test)]`) so
/// that integration tests under `tests/`, which compile against this crate
/// as an ordinary dependency, can use it too.
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// A clock that starts at a fixed instant and only moves when told to.
    pub struct FixedClock(Mutex<DateTime<Utc>>);

    impl FixedClock {
        pub fn new(at: DateTime<Utc>) -> Self {
            Self(Mutex::new(at))
        }

        pub fn advance(&self, by: chrono::Duration) {
            let mut guard = self.0.lock().unwrap();
            *guard += by;
        }

        pub fn set(&self, at: DateTime<Utc>) {
            *self.0.lock().unwrap() = at;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }
}
