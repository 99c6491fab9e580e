//! # Festival Core
//!
//! Reducer, effect and environment abstractions shared by the checkout engine.
//!
//! The checkout flow is modelled as a single owned state value that is only
//! ever changed by a reducer:
//!
//! - **State**: everything the checkout session knows (selection, forms, promo, payment)
//! - **Action**: every input (user interaction, network response, timer)
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: a description of work for the runtime (network call, timer, debounce)
//! - **Environment**: injected collaborators (clock, backend, draft storage)
//!
//! Reducers never perform I/O themselves. They return [`effect::Effect`] values
//! and the runtime executes them, feeding any resulting action back in.
//!
//! ## Example
//!
//! ```
//! use festival_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! #[derive(Default)]
//! struct PassState {
//!     days: u8,
//! }
//!
//! enum PassAction {
//!     AddDay,
//! }
//!
//! struct PassReducer;
//!
//! impl Reducer for PassReducer {
//!     type State = PassState;
//!     type Action = PassAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut PassState,
//!         action: PassAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<PassAction>; 4]> {
//!         match action {
//!             PassAction::AddDay => state.days = (state.days + 1).min(3),
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! let mut state = PassState::default();
//! let _ = PassReducer.reduce(&mut state, PassAction::AddDay, &());
//! assert_eq!(state.days, 1);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Reducer module - the core trait for business logic
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// A reducer validates an action against the current state, mutates the
    /// state in place and returns descriptions of the side effects the
    /// runtime should perform next. Reducers must be deterministic: given the
    /// same state, action and environment they produce the same result.
    ///
    /// Most actions produce zero or one effect, so the return type is a
    /// `SmallVec` that avoids a heap allocation in the common case.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - side effect descriptions
///
/// Effects are values. Returning one from a reducer does nothing by itself;
/// the runtime `Store` interprets it.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Identifies a debounced or cancellable effect.
    ///
    /// Scheduling a second [`Effect::Debounce`] with the same key replaces the
    /// first one before it fires.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct EffectKey(pub &'static str);

    impl EffectKey {
        /// Borrow the key as a string
        #[must_use]
        pub const fn as_str(&self) -> &'static str {
            self.0
        }
    }

    impl std::fmt::Display for EffectKey {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Dispatch an action once no other effect with the same key has been
        /// scheduled for `duration`
        ///
        /// Used to coalesce bursts of triggers (promo revalidation while the
        /// total changes, draft autosave while the user types) into one action.
        Debounce {
            /// Coalescing key
            key: EffectKey,
            /// Quiet period before the action fires
            duration: Duration,
            /// Action to dispatch when the quiet period elapses
            action: Box<Action>,
        },

        /// Cancel a pending debounced effect, if any
        Cancel(EffectKey),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Debounce {
                    key,
                    duration,
                    action,
                } => f
                    .debug_struct("Effect::Debounce")
                    .field("key", key)
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Cancel(key) => f.debug_tuple("Effect::Cancel").field(key).finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Debounce `action` under `key`
        #[must_use]
        pub fn debounce(key: EffectKey, duration: Duration, action: Action) -> Effect<Action> {
            Effect::Debounce {
                key,
                duration,
                action: Box::new(action),
            }
        }

        /// Whether this effect is a debounce under `key`
        #[must_use]
        pub fn debounces(&self, key: EffectKey) -> bool {
            matches!(self, Effect::Debounce { key: k, .. } if *k == key)
        }

        /// Whether this effect does nothing
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }
}

/// Environment module - dependency injection traits
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Production code uses [`SystemClock`]; tests use a fixed clock so that
    /// timestamps written into drafts and payment records are deterministic.
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
