//! # Boxoffice Testing
//!
//! Testing utilities and helpers for the Boxoffice ticket desk.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given-When-Then harness for reducers
//! - [`effects::run_effects`]: executes effect descriptions and collects fed-back actions
//! - In-memory collaborators: [`InMemoryRecordStore`], [`RecordingNotifier`],
//!   [`StubQrCodec`], [`SequentialIds`]
//! - [`FixedClock`] for deterministic timestamps
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_testing::{InMemoryRecordStore, RecordingNotifier, test_clock};
//!
//! #[tokio::test]
//! async fn buyer_sees_tiers() {
//!     let records = InMemoryRecordStore::seeded(Arc::new(test_clock()));
//!     let notifier = RecordingNotifier::new();
//!     // wire a dispatcher with the fakes, send updates, inspect `notifier.messages()`
//! }
//! ```

use chrono::{DateTime, Utc};
use boxoffice_core::environment::Clock;

mod channel;
mod record_store;

pub use channel::{RecordingNotifier, StubQrCodec};
pub use record_store::InMemoryRecordStore;
pub use reducer_test::{ReducerTest, assertions, effects};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use boxoffice_core::ports::IdGenerator;
    use boxoffice_core::types::{ReferenceToken, TicketId};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use boxoffice_testing::mocks::FixedClock;
    /// use boxoffice_core::environment::Clock;
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

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Predictable identifiers.
    ///
    /// Queued identifiers are handed out first; afterwards ticket ids count up
    /// from `000000000001` and reference tokens from `00000001`.
    #[derive(Debug, Default)]
    pub struct SequentialIds {
        next: AtomicU64,
        tickets: Mutex<VecDeque<TicketId>>,
        references: Mutex<VecDeque<ReferenceToken>>,
    }

    impl SequentialIds {
        /// Counter-only generator
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue ticket identifiers to hand out first
        #[must_use]
        pub fn with_ticket_ids<I, S>(self, ids: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.tickets
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(ids.into_iter().map(|id| TicketId::from_stored(id.into())));
            self
        }

        /// Queue reference tokens to hand out first
        #[must_use]
        pub fn with_reference_tokens<I, S>(self, tokens: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: AsRef<str>,
        {
            self.references
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(tokens.into_iter().filter_map(|t| ReferenceToken::parse(t.as_ref())));
            self
        }

        fn bump(&self) -> u64 {
            self.next.fetch_add(1, Ordering::SeqCst) + 1
        }
    }

    impl IdGenerator for SequentialIds {
        fn ticket_id(&self) -> TicketId {
            let queued = self
                .tickets
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            queued.unwrap_or_else(|| TicketId::from_stored(format!("{:012X}", self.bump())))
        }

        fn reference_token(&self) -> ReferenceToken {
            let queued = self
                .references
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            queued.unwrap_or_else(|| {
                let raw = format!("{:08X}", self.bump());
                ReferenceToken::parse(&raw).unwrap_or_else(ReferenceToken::generate)
            })
        }
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, SequentialIds, test_clock};
