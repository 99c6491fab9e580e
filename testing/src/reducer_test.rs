//! Ergonomic testing utilities for reducers
//!
//! Given-When-Then builder for driving a reducer without a Store. Several
//! actions may be queued with [`ReducerTest::when_actions`]; effects from all
//! but the last action are discarded, which matches how a checkout test
//! usually reads ("select two items, go next, then assert on the effects").

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use festival_core::{effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// ReducerTest::new(CheckoutReducer::new())
///     .with_env(test_environment())
///     .given_state(CheckoutState::default())
///     .when_actions([
///         CheckoutAction::ToggleItem { item: ItemId(1) },
///         CheckoutAction::GoNext,
///     ])
///     .then_state(|state| assert_eq!(state.step, Step::Forms))
///     .then_effects(assertions::assert_has_debounce(DRAFT_AUTOSAVE))
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Queue one action (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Queue several actions, applied in order (When)
    #[must_use]
    pub fn when_actions(mut self, actions: impl IntoIterator<Item = A>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the effects of the last action (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions, returning the final state
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) -> S {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        assert!(
            !self.actions.is_empty(),
            "At least one action must be set with when_action()"
        );

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let mut effects = Vec::new();
        for action in self.actions {
            effects = self.reducer.reduce(&mut state, action, &env).into_vec();
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }

        state
    }
}

/// Helper assertions for effects
pub mod assertions {
    use festival_core::effect::{Effect, EffectKey};

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if any effect would do something.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "Expected at least one Future effect, but none found"
        );
    }

    /// Returns an assertion that some effect debounces under `key`
    pub fn assert_has_debounce<A: std::fmt::Debug>(key: EffectKey) -> impl FnOnce(&[Effect<A>]) {
        move |effects| {
            assert!(
                effects.iter().any(|e| e.debounces(key)),
                "Expected a debounce under {key}, found {effects:?}"
            );
        }
    }

    /// Returns an assertion that no effect debounces under `key`
    pub fn assert_no_debounce<A: std::fmt::Debug>(key: EffectKey) -> impl FnOnce(&[Effect<A>]) {
        move |effects| {
            assert!(
                !effects.iter().any(|e| e.debounces(key)),
                "Expected no debounce under {key}, found {effects:?}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use festival_core::effect::{Effect, EffectKey};
    use festival_core::reducer::Reducer;
    use std::time::Duration;

    const TICK: EffectKey = EffectKey("tick");

    #[derive(Clone, Debug)]
    struct PassState {
        days: u8,
    }

    #[derive(Clone, Debug)]
    enum PassAction {
        Add,
        Remove,
    }

    struct PassReducer;

    impl Reducer for PassReducer {
        type State = PassState;
        type Action = PassAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> smallvec::SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                PassAction::Add => {
                    state.days = (state.days + 1).min(3);
                    smallvec::smallvec![Effect::debounce(
                        TICK,
                        Duration::from_millis(10),
                        PassAction::Remove
                    )]
                },
                PassAction::Remove => {
                    state.days = state.days.saturating_sub(1);
                    smallvec::smallvec![Effect::None]
                },
            }
        }
    }

    #[test]
    fn sequence_of_actions_applies_in_order() {
        let state = ReducerTest::new(PassReducer)
            .with_env(())
            .given_state(PassState { days: 0 })
            .when_actions([PassAction::Add, PassAction::Add, PassAction::Add, PassAction::Add])
            .then_state(|state| assert_eq!(state.days, 3))
            .then_effects(assertions::assert_has_debounce(TICK))
            .run();

        assert_eq!(state.days, 3);
    }

    #[test]
    fn effects_come_from_last_action_only() {
        ReducerTest::new(PassReducer)
            .with_env(())
            .given_state(PassState { days: 0 })
            .when_action(PassAction::Add)
            .when_action(PassAction::Remove)
            .then_state(|state| assert_eq!(state.days, 0))
            .then_effects(assertions::assert_no_effects)
            .then_effects(assertions::assert_no_debounce(TICK))
            .run();
    }

    #[test]
    fn effects_count() {
        assertions::assert_effects_count(&[Effect::<PassAction>::None], 1);
        assertions::assert_effects_count::<PassAction>(&[], 0);
    }

    #[test]
    fn future_is_found() {
        let effects = [
            Effect::Cancel(TICK),
            Effect::Future(Box::pin(async { Some(PassAction::Add) })),
        ];
        assertions::assert_has_future_effect(&effects);
    }
}
