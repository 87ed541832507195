//! # Boxoffice Runtime
//!
//! Conversation runtime for the Boxoffice ticket desk.
//!
//! A [`ConversationStore`] owns one typed session record per chat and runs a
//! reducer over it. Each inbound chat update becomes one **turn**:
//!
//! 1. the chat's record is locked (turns of the same chat run one at a time,
//!    different chats never share a record);
//! 2. the action is reduced, the returned effects are executed and every
//!    action they produce is fed back into the reducer, until nothing is left;
//! 3. the lock is released, and the record is dropped when the flow is idle.
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_runtime::ConversationStore;
//!
//! let buyers = ConversationStore::new(BuyerReducer, environment);
//! buyers.send(chat, BuyerAction::Start).await?;
//!
//! let step = buyers.state(chat, |s| s.step_name()).await;
//! ```

use boxoffice_core::{effect::Effect, reducer::Reducer, types::ChatId};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for the conversation runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur while running a turn
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// The reducer kept feeding actions back past the per-turn limit
        ///
        /// The session record keeps whatever state the last reduced action left.
        #[error("Turn stopped after {0} actions")]
        TurnLimitExceeded(usize),
    }
}

pub use error::StoreError;

/// Session record stored per chat.
///
/// Idle records are dropped after a turn so the table only holds
/// conversations that are actually in progress.
pub trait Session: Default + Send + 'static {
    /// Whether the flow is at rest (nothing captured, nothing expected)
    fn is_idle(&self) -> bool;
}

/// Runtime tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Upper bound for awaiting one `Effect::Future`
    pub effect_timeout: Duration,
    /// Upper bound for actions reduced in one turn
    pub max_actions_per_turn: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            effect_timeout: Duration::from_secs(15),
            max_actions_per_turn: 64,
        }
    }
}

impl RuntimeConfig {
    /// Sets the effect timeout
    #[must_use]
    pub const fn with_effect_timeout(mut self, timeout: Duration) -> Self {
        self.effect_timeout = timeout;
        self
    }
}

type Record<S> = Arc<tokio::sync::Mutex<S>>;
type EffectRun<'a, A> = Pin<Box<dyn Future<Output = Vec<A>> + Send + 'a>>;

/// Per-chat session table plus effect executor for one reducer.
pub struct ConversationStore<R>
where
    R: Reducer,
{
    sessions: Mutex<HashMap<ChatId, Record<R::State>>>,
    reducer: R,
    environment: R::Environment,
    config: RuntimeConfig,
}

impl<R> ConversationStore<R>
where
    R: Reducer + Send + Sync + 'static,
    R::State: Session,
    R::Action: Send + 'static,
    R::Environment: Send + Sync + 'static,
{
    /// Create a store with the default runtime configuration
    #[must_use]
    pub fn new(reducer: R, environment: R::Environment) -> Self {
        Self::with_config(reducer, environment, RuntimeConfig::default())
    }

    /// Create a store with an explicit runtime configuration
    #[must_use]
    pub fn with_config(reducer: R, environment: R::Environment, config: RuntimeConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            reducer,
            environment,
            config,
        }
    }

    /// The injected environment
    pub const fn environment(&self) -> &R::Environment {
        &self.environment
    }

    /// Run one turn for `chat`, starting with `action`.
    ///
    /// Returns once the reducer and every effect awaited within the turn are
    /// done. Detached effects may still be running.
    ///
    /// # Errors
    ///
    /// [`StoreError::TurnLimitExceeded`] if the reducer keeps producing
    /// follow-up actions past [`RuntimeConfig::max_actions_per_turn`].
    #[tracing::instrument(skip(self, chat, action), fields(chat = %chat), name = "conversation_send")]
    pub async fn send(&self, chat: ChatId, action: R::Action) -> Result<(), StoreError> {
        let record = self.record(chat);

        let outcome = {
            let mut state = record.lock().await;
            tracing::trace!("Acquired session record");
            self.run_turn(&mut state, action).await
        };

        self.release(chat, &record);
        outcome
    }

    /// Read a chat's session record through a closure.
    ///
    /// Returns `None` when the chat has no conversation in progress.
    pub async fn state<F, T>(&self, chat: ChatId, f: F) -> Option<T>
    where
        F: FnOnce(&R::State) -> T,
    {
        let record = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&chat)
            .cloned()?;
        let state = record.lock().await;
        Some(f(&state))
    }

    /// Whether `chat` has a conversation in progress
    pub fn is_active(&self, chat: ChatId) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&chat)
    }

    /// Number of conversations in progress
    pub fn active_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn record(&self, chat: ChatId) -> Record<R::State> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let record = sessions.entry(chat).or_default();
        Arc::clone(record)
    }

    /// Drops the record if the flow went idle and no other turn is queued on it.
    fn release(&self, chat: ChatId, record: &Record<R::State>) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);

        // One reference in the table, one held by this turn
        let sole_holder = Arc::strong_count(record) == 2
            && sessions.get(&chat).is_some_and(|stored| Arc::ptr_eq(stored, record));
        let idle = sole_holder && record.try_lock().is_ok_and(|state| state.is_idle());
        if idle {
            sessions.remove(&chat);
        }

        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(metrics::SESSIONS_ACTIVE).set(sessions.len() as f64);
    }

    async fn run_turn(&self, state: &mut R::State, action: R::Action) -> Result<(), StoreError> {
        let mut queue = VecDeque::from([action]);
        let mut reduced = 0_usize;

        while let Some(action) = queue.pop_front() {
            if reduced == self.config.max_actions_per_turn {
                tracing::warn!(reduced, dropped = queue.len() + 1, "Turn action limit reached");
                metrics::counter!(metrics::TURNS_ABORTED).increment(1);
                return Err(StoreError::TurnLimitExceeded(reduced));
            }
            reduced += 1;
            metrics::counter!(metrics::ACTIONS_TOTAL).increment(1);

            let effects = self.reducer.reduce(state, action, &self.environment);
            tracing::trace!(effects = effects.len(), "Reducer completed");

            for effect in effects {
                queue.extend(self.execute(effect).await);
            }
        }

        tracing::debug!(reduced, "Turn completed");
        Ok(())
    }

    /// Execute one effect, returning the actions it feeds back.
    fn execute(&self, effect: Effect<R::Action>) -> EffectRun<'_, R::Action> {
        Box::pin(async move {
            match effect {
                Effect::None => Vec::new(),
                Effect::Parallel(effects) => {
                    futures::future::join_all(effects.into_iter().map(|e| self.execute(e)))
                        .await
                        .into_iter()
                        .flatten()
                        .collect()
                },
                Effect::Sequential(effects) => {
                    let mut produced = Vec::new();
                    for effect in effects {
                        produced.extend(self.execute(effect).await);
                    }
                    produced
                },
                Effect::Future(future) => {
                    match tokio::time::timeout(self.config.effect_timeout, future).await {
                        Ok(next) => next.into_iter().collect(),
                        Err(_) => {
                            tracing::warn!(
                                timeout_ms = self.config.effect_timeout.as_millis(),
                                "Effect timed out, continuing turn without its result"
                            );
                            metrics::counter!(metrics::EFFECTS_TIMED_OUT).increment(1);
                            Vec::new()
                        },
                    }
                },
                Effect::Detached(future) => {
                    tokio::spawn(future);
                    Vec::new()
                },
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use boxoffice_core::{SmallVec, async_effect, detached_effect, smallvec};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Debug, Default)]
    struct Counter {
        value: u32,
        log: Vec<&'static str>,
    }

    impl Session for Counter {
        fn is_idle(&self) -> bool {
            self.value == 0
        }
    }

    #[derive(Debug)]
    enum CounterAction {
        Increment,
        IncrementTwiceLater,
        Reset,
        Slow,
        Forever,
        FireAndForget,
        Noted(&'static str),
    }

    #[derive(Default)]
    struct CounterEnv {
        detached_runs: Arc<AtomicUsize>,
        detached_done: Arc<Notify>,
    }

    struct CounterReducer;

    impl Reducer for CounterReducer {
        type State = Counter;
        type Action = CounterAction;
        type Environment = CounterEnv;

        fn reduce(
            &self,
            state: &mut Counter,
            action: CounterAction,
            env: &CounterEnv,
        ) -> SmallVec<[Effect<CounterAction>; 4]> {
            match action {
                CounterAction::Increment => {
                    state.value += 1;
                    SmallVec::new()
                },
                CounterAction::IncrementTwiceLater => smallvec![Effect::chain(vec![
                    async_effect! { Some(CounterAction::Increment) },
                    Effect::merge(vec![async_effect! { Some(CounterAction::Increment) }]),
                ])],
                CounterAction::Reset => {
                    state.value = 0;
                    SmallVec::new()
                },
                CounterAction::Slow => smallvec![async_effect! {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Some(CounterAction::Noted("slow"))
                }],
                CounterAction::Forever => smallvec![async_effect! { Some(CounterAction::Forever) }],
                CounterAction::FireAndForget => {
                    state.value += 1;
                    let runs = Arc::clone(&env.detached_runs);
                    let done = Arc::clone(&env.detached_done);
                    smallvec![detached_effect! {
                        runs.fetch_add(1, Ordering::SeqCst);
                        done.notify_one();
                    }]
                },
                CounterAction::Noted(note) => {
                    state.log.push(note);
                    SmallVec::new()
                },
            }
        }
    }

    fn store() -> ConversationStore<CounterReducer> {
        ConversationStore::new(CounterReducer, CounterEnv::default())
    }

    #[tokio::test]
    async fn fed_back_actions_run_within_the_turn() {
        let store = store();
        let chat = ChatId::new(1);

        store.send(chat, CounterAction::IncrementTwiceLater).await.unwrap();

        assert_eq!(store.state(chat, |s| s.value).await, Some(2));
    }

    #[tokio::test]
    async fn chats_have_separate_records() {
        let store = store();

        store.send(ChatId::new(1), CounterAction::Increment).await.unwrap();
        store.send(ChatId::new(2), CounterAction::Increment).await.unwrap();
        store.send(ChatId::new(2), CounterAction::Increment).await.unwrap();

        assert_eq!(store.state(ChatId::new(1), |s| s.value).await, Some(1));
        assert_eq!(store.state(ChatId::new(2), |s| s.value).await, Some(2));
        assert_eq!(store.active_sessions(), 2);
    }

    #[tokio::test]
    async fn idle_records_are_dropped() {
        let store = store();
        let chat = ChatId::new(7);

        store.send(chat, CounterAction::Increment).await.unwrap();
        assert!(store.is_active(chat));

        store.send(chat, CounterAction::Reset).await.unwrap();
        assert!(!store.is_active(chat));
        assert_eq!(store.state(chat, |s| s.value).await, None);
    }

    #[tokio::test]
    async fn slow_effect_times_out_without_failing_the_turn() {
        let config = RuntimeConfig::default().with_effect_timeout(Duration::from_millis(20));
        let store = ConversationStore::with_config(CounterReducer, CounterEnv::default(), config);
        let chat = ChatId::new(3);

        store.send(chat, CounterAction::Increment).await.unwrap();
        store.send(chat, CounterAction::Slow).await.unwrap();

        let log = store.state(chat, |s| s.log.clone()).await.unwrap();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn endless_feedback_is_cut_off() {
        let store = store();

        let result = store.send(ChatId::new(4), CounterAction::Forever).await;

        assert_eq!(result, Err(StoreError::TurnLimitExceeded(64)));
    }

    #[tokio::test]
    async fn detached_effects_are_spawned() {
        let env = CounterEnv::default();
        let runs = Arc::clone(&env.detached_runs);
        let done = Arc::clone(&env.detached_done);
        let store = ConversationStore::new(CounterReducer, env);

        store.send(ChatId::new(5), CounterAction::FireAndForget).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), done.notified())
            .await
            .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_turns_on_one_chat_are_serialised() {
        let store = Arc::new(store());
        let chat = ChatId::new(9);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.send(chat, CounterAction::Increment).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.state(chat, |s| s.value).await, Some(20));
    }
}
