//! # Boxoffice Core
//!
//! Core traits and types for the Boxoffice ticket desk.
//!
//! Both conversations the desk runs (the buyer purchase flow and the
//! administrator flow) are written as reducers: pure functions that take the
//! current session record and one action, update the record in place and
//! return descriptions of the I/O to perform next.
//!
//! ## Core Concepts
//!
//! - **State**: the typed session record of one conversation
//! - **Action**: every input to a reducer (user input and I/O results fed back)
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: a description of I/O, executed by the runtime
//! - **Environment**: collaborators injected through [`ports`] traits
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_core::{effect::Effect, reducer::Reducer, SmallVec};
//!
//! impl Reducer for BuyerReducer {
//!     type State = BuyerSession;
//!     type Action = BuyerAction;
//!     type Environment = BuyerEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut BuyerSession,
//!         action: BuyerAction,
//!         env: &BuyerEnvironment,
//!     ) -> SmallVec<[Effect<BuyerAction>; 4]> {
//!         // Transition logic goes here
//!         SmallVec::new()
//!     }
//! }
//! ```

pub use chrono::{DateTime, Utc};
pub use smallvec::{SmallVec, smallvec};

/// Declarative helpers for building effects
pub mod effect_macros;

/// Error taxonomy shared by every crate in the workspace
pub mod error;

/// Collaborator ports: record store, notification channel, QR codec, id generation
pub mod ports;

/// Domain types: products, tickets, discount codes, money and identifiers
pub mod types;

/// Free-text input rules (names, emails, discount code entries)
pub mod validation;

/// Reducer module - The core trait for conversation logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They hold every transition rule of a conversation and never perform I/O
/// themselves; lookups and deliveries are returned as [`Effect`](super::effect::Effect)s
/// and their results come back as actions.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for conversation logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The session record this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action against the current state
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution).
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Boxed future producing an optional follow-up action.
    pub type ActionFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Boxed future whose result nobody waits for.
    pub type DetachedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the conversation runtime.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially, in order
        Sequential(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        /// within the same turn.
        Future(ActionFuture<Action>),

        /// Fire-and-forget computation
        ///
        /// Spawned by the runtime; the turn does not wait for it and nothing is fed back.
        Detached(DetachedFuture),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Detached(_) => write!(f, "Effect::Detached(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Whether this effect does nothing at all
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().all(Effect::is_none)
                },
                Effect::Future(_) | Effect::Detached(_) => false,
            }
        }
    }
}

/// Environment module - Dependency injection traits
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Production uses [`SystemClock`], tests use a fixed clock.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;

    #[test]
    fn nested_none_effects_are_none() {
        let effect: Effect<()> = Effect::chain(vec![Effect::None, Effect::merge(vec![Effect::None])]);
        assert!(effect.is_none());
    }

    #[test]
    fn future_effect_is_not_none() {
        let effect: Effect<()> = Effect::chain(vec![Effect::None, Effect::Future(Box::pin(async { None }))]);
        assert!(!effect.is_none());
    }
}
