//! Checkout reducer.

use super::actions::CheckoutAction;
use super::environment::CheckoutEnvironment;
use super::payment::{order_request, primary_contact, registration_request};
use super::state::{CheckoutState, DraftStatus, PaymentPhase, PaymentStage, Step, UploadStatus};
use crate::backend::{CheckoutBackend, PromoValidationRequest, UploadBatch};
use crate::draft::{DRAFT_AUTOSAVE, Draft, DraftStore};
use crate::error::BackendError;
use crate::grouping::ensure_member_slots;
use crate::pricing::{needs_promo_revalidation, resolve_customer_email, subtotal};
use crate::promo::{PROMO_REVALIDATE, PromoOutcome, PromoTrigger};
use crate::selection::ToggleOutcome;
use crate::types::Money;
use crate::upload::{collect_upload_parts, compress_parts};
use crate::validation::{ValidationInput, validate};
use crate::verification::{VerificationOutcome, classify_payment_status};
use festival_core::effect::Effect;
use festival_core::reducer::Reducer;
use festival_core::{SmallVec, smallvec};
use festival_runtime::retry::retry_with_predicate;
use std::marker::PhantomData;
use std::sync::Arc;

type Effects = SmallVec<[Effect<CheckoutAction>; 4]>;

/// Message shown when the forms step refuses to advance
pub const FIX_ERRORS_NOTICE: &str = "Please fix the highlighted fields before continuing.";

/// Message shown while the promo is confirmed for a changed total
pub const CONFIRMING_PROMO_NOTICE: &str = "Confirming your promo code for the updated total...";

/// Message shown when the promo could not be confirmed before payment
pub const PROMO_NOT_CONFIRMED_NOTICE: &str =
    "Your promo code could not be confirmed for the new total. Check the total and continue again.";

/// Checkout reducer.
///
/// Stateless; generic over the backend and draft store of its environment.
pub struct CheckoutReducer<B, D> {
    _phantom: PhantomData<fn() -> (B, D)>,
}

impl<B, D> CheckoutReducer<B, D> {
    /// Create a reducer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B, D> Default for CheckoutReducer<B, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, D> Clone for CheckoutReducer<B, D> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

/// Value-style reduction: consume a state, return the next one with the
/// effects to run
pub fn apply_action<B, D>(
    mut state: CheckoutState,
    action: CheckoutAction,
    env: &CheckoutEnvironment<B, D>,
) -> (CheckoutState, Effects)
where
    B: CheckoutBackend,
    D: DraftStore,
{
    let effects = CheckoutReducer::new().reduce(&mut state, action, env);
    (state, effects)
}

impl<B, D> Reducer for CheckoutReducer<B, D>
where
    B: CheckoutBackend,
    D: DraftStore,
{
    type State = CheckoutState;
    type Action = CheckoutAction;
    type Environment = CheckoutEnvironment<B, D>;

    fn reduce(
        &self,
        state: &mut CheckoutState,
        action: CheckoutAction,
        env: &CheckoutEnvironment<B, D>,
    ) -> Effects {
        if action.is_edit() && state.step == Step::Payment {
            tracing::debug!(?action, "Ignoring edit on the payment step");
            return SmallVec::new();
        }
        if action.is_edit() {
            // an edited order needs a fresh continue
            state.awaiting_promo = false;
        }

        match action {
            // ----- selection -----
            CheckoutAction::ToggleItem { item } => {
                match state
                    .selection
                    .toggle_item(item, &env.catalog, env.conflicts.as_ref())
                {
                    ToggleOutcome::Added | ToggleOutcome::Removed => state.notice = None,
                    ToggleOutcome::Rejected { reason } => {
                        state.notice = Some(reason);
                        return SmallVec::new();
                    },
                    ToggleOutcome::UnknownItem => {
                        tracing::warn!(%item, "Toggle of unknown item");
                        return SmallVec::new();
                    },
                }
                Self::after_edit(state, env)
            },
            CheckoutAction::SetVisitorPassDays { days } => {
                state.selection.set_visitor_pass_days(days);
                Self::after_edit(state, env)
            },
            CheckoutAction::SetFlagshipQty { item, kind, qty } => {
                if !state.selection.set_flagship_qty(item, kind, qty) {
                    return SmallVec::new();
                }
                Self::after_edit(state, env)
            },
            CheckoutAction::SetBenefitField {
                item,
                kind,
                index,
                field,
                value,
            } => {
                if !state
                    .selection
                    .set_benefit_field(item, kind, index, &field, value)
                {
                    return SmallVec::new();
                }
                Self::after_edit(state, env)
            },

            // ----- forms -----
            CheckoutAction::SetGroupField {
                group,
                field,
                value,
            } => {
                state.forms.set_group_field(group, field, value);
                Self::after_edit(state, env)
            },
            CheckoutAction::AttachGroupFile { group, field, file } => {
                state.forms.attach_group_file(group, field, file);
                Self::file_changed(state);
                Self::after_edit(state, env)
            },
            CheckoutAction::AddTeamMember { group } => {
                state.forms.add_member(group);
                Self::after_edit(state, env)
            },
            CheckoutAction::RemoveTeamMember { group, index } => {
                if !state.forms.remove_member(&group, index) {
                    return SmallVec::new();
                }
                Self::after_edit(state, env)
            },
            CheckoutAction::SetMemberField {
                group,
                index,
                field,
                value,
            } => {
                if !state.forms.set_member_field(&group, index, field, value) {
                    return SmallVec::new();
                }
                Self::after_edit(state, env)
            },
            CheckoutAction::AttachMemberFile {
                group,
                index,
                field,
                file,
            } => {
                if !state.forms.attach_member_file(&group, index, field, file) {
                    return SmallVec::new();
                }
                Self::file_changed(state);
                Self::after_edit(state, env)
            },
            CheckoutAction::SetVisitorPassField { field, value } => {
                state.forms.visitor_pass.insert(field, value);
                Self::after_edit(state, env)
            },

            // ----- promo -----
            CheckoutAction::SetPromoInput { code } => {
                state.promo.input = code;
                state.promo.error = None;
                smallvec![Self::autosave(env)]
            },
            CheckoutAction::ApplyPromo => Self::apply_promo(state, env),
            CheckoutAction::RemovePromo => {
                state.promo.clear();
                smallvec![Effect::Cancel(PROMO_REVALIDATE), Self::autosave(env)]
            },
            CheckoutAction::RevalidatePromo => Self::revalidate_promo(state, env),
            CheckoutAction::PromoValidated { seq, result } => {
                Self::promo_validated(state, seq, result, env)
            },

            // ----- navigation -----
            CheckoutAction::GoNext => Self::go_next(state, env),
            CheckoutAction::GoBack => Self::go_back(state),

            // ----- payment -----
            CheckoutAction::PaymentUserRegistered { attempt, user_id } => {
                tracing::info!(%user_id, attempt, "User registered");
                state.payment.user_id = Some(user_id);

                let mut effects = Self::start_upload_if_needed(state, env);
                if Self::is_current_attempt(state, attempt) {
                    state.payment.phase = PaymentPhase::Loading(PaymentStage::CreatingOrder);
                    effects.push(Self::create_order(state, env));
                }
                effects
            },
            CheckoutAction::PaymentSessionReady { attempt, session } => {
                if !Self::is_current_attempt(state, attempt) {
                    tracing::debug!(attempt, "Discarding session of a stale attempt");
                    return SmallVec::new();
                }
                let total = state.totals(&env.catalog).total;
                if session.amount != total {
                    tracing::warn!(
                        session_amount = session.amount.paise(),
                        total = total.paise(),
                        "Payment session amount differs from the displayed total"
                    );
                }
                tracing::info!(order_id = %session.order_id, amount = session.amount.paise(), "Payment session ready");
                state.payment.phase = PaymentPhase::Ready(session);
                SmallVec::new()
            },
            CheckoutAction::PaymentInitFailed {
                attempt,
                stage,
                error,
                attempts,
            } => {
                if !Self::is_current_attempt(state, attempt) {
                    return SmallVec::new();
                }
                tracing::error!(?stage, %error, attempts, "Payment initialisation failed");
                state.payment.phase = PaymentPhase::Failed {
                    error,
                    retry_count: attempts.saturating_sub(1),
                    fallback_url: env.config.fallback_payment_url.clone(),
                };
                SmallVec::new()
            },
            CheckoutAction::RetryPayment => {
                if state.step != Step::Payment
                    || !matches!(state.payment.phase, PaymentPhase::Failed { .. })
                {
                    return SmallVec::new();
                }
                state.payment.retries += 1;
                Self::start_payment(state, env)
            },

            // ----- uploads -----
            CheckoutAction::DocumentsUploaded { files } => {
                tracing::info!(files, "Documents uploaded");
                state.upload = UploadStatus::Uploaded { files };
                SmallVec::new()
            },
            CheckoutAction::DocumentUploadFailed { error } => {
                tracing::warn!(%error, "Document upload failed");
                state.upload = UploadStatus::Failed { error };
                SmallVec::new()
            },
            CheckoutAction::RetryUpload => {
                if !matches!(state.upload, UploadStatus::Failed { .. }) {
                    return SmallVec::new();
                }
                state.upload = UploadStatus::Idle;
                Self::start_upload_if_needed(state, env)
            },

            // ----- verification -----
            CheckoutAction::VerifyPayment { order_id } => {
                state.verification.order_id = Some(order_id.clone());
                state.verification.checking = true;
                state.verification.outcome = None;

                let backend = Arc::clone(&env.backend);
                smallvec![Effect::Future(Box::pin(async move {
                    let result = backend.payment_status(order_id.clone()).await;
                    let outcome = classify_payment_status(&result);
                    Some(CheckoutAction::PaymentVerified { order_id, outcome })
                }))]
            },
            CheckoutAction::PaymentVerified { order_id, outcome } => {
                if state.verification.order_id.as_deref() != Some(order_id.as_str()) {
                    return SmallVec::new();
                }
                tracing::info!(%order_id, ?outcome, "Payment verified");
                state.verification.checking = false;
                state.verification.outcome = Some(outcome);

                if outcome == VerificationOutcome::Success {
                    Self::reset_after_success(state, env)
                } else {
                    SmallVec::new()
                }
            },

            // ----- drafts -----
            CheckoutAction::HydrateDraft => {
                if state.draft.hydrated {
                    return SmallVec::new();
                }
                let drafts = Arc::clone(&env.drafts);
                smallvec![Effect::Future(Box::pin(async move {
                    Some(match drafts.load().await {
                        Ok(draft) => CheckoutAction::DraftLoaded {
                            draft: draft.map(Box::new),
                        },
                        Err(error) => CheckoutAction::DraftLoadFailed {
                            error: error.to_string(),
                        },
                    })
                }))]
            },
            CheckoutAction::DraftLoaded { draft } => Self::draft_loaded(state, draft, env),
            CheckoutAction::DraftLoadFailed { error } => {
                tracing::warn!(%error, "Could not read the draft");
                state.draft.hydrated = true;
                state.draft.last_error = Some(error);
                SmallVec::new()
            },
            CheckoutAction::PersistDraft => {
                let draft = Draft::capture(
                    &state.selection,
                    &state.forms,
                    &state.promo,
                    env.clock.now(),
                );
                let drafts = Arc::clone(&env.drafts);
                smallvec![Effect::Future(Box::pin(async move {
                    let at = draft.saved_at;
                    Some(match drafts.save(draft).await {
                        Ok(()) => CheckoutAction::DraftSaved { at },
                        Err(error) => CheckoutAction::DraftSaveFailed {
                            error: error.to_string(),
                        },
                    })
                }))]
            },
            CheckoutAction::DraftSaved { at } => {
                state.draft.last_saved = Some(at);
                state.draft.last_error = None;
                SmallVec::new()
            },
            CheckoutAction::DraftSaveFailed { error } => {
                tracing::warn!(%error, "Could not save the draft");
                state.draft.last_error = Some(error);
                SmallVec::new()
            },
        }
    }
}

impl<B, D> CheckoutReducer<B, D>
where
    B: CheckoutBackend,
    D: DraftStore,
{
    fn autosave(env: &CheckoutEnvironment<B, D>) -> Effect<CheckoutAction> {
        Effect::debounce(
            DRAFT_AUTOSAVE,
            env.config.draft_debounce,
            CheckoutAction::PersistDraft,
        )
    }

    /// Follow-up of every edit: keep shown errors current, schedule promo
    /// revalidation when the subtotal moved, autosave.
    fn after_edit(state: &mut CheckoutState, env: &CheckoutEnvironment<B, D>) -> Effects {
        if state.last_errors.is_some() {
            let groups = state.groups(&env.catalog);
            state.last_errors = Some(validate(&ValidationInput {
                selection: &state.selection,
                groups: &groups,
                forms: &state.forms,
                team_table: &env.team_table,
            }));
        }

        let mut effects = Effects::new();
        if state
            .promo
            .needs_revalidation(subtotal(&state.selection, &env.catalog))
        {
            effects.push(Effect::debounce(
                PROMO_REVALIDATE,
                env.config.promo_debounce,
                CheckoutAction::RevalidatePromo,
            ));
        }
        effects.push(Self::autosave(env));
        effects
    }

    fn file_changed(state: &mut CheckoutState) {
        if matches!(state.upload, UploadStatus::Uploaded { .. }) {
            state.upload = UploadStatus::Idle;
        }
    }

    fn promo_request(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, D>,
        code: &str,
        trigger: PromoTrigger,
    ) -> Effect<CheckoutAction> {
        let amount = subtotal(&state.selection, &env.catalog);
        let groups = state.groups(&env.catalog);
        let user_email = resolve_customer_email(&groups, &state.forms, &state.selection);
        let request = state.promo.begin(code, amount, trigger);
        tracing::debug!(seq = request.seq, code = %request.code, amount = amount.paise(), ?trigger, "Validating promo");

        let backend = Arc::clone(&env.backend);
        let seq = request.seq;
        let body = PromoValidationRequest {
            code: request.code,
            user_email,
            order_amount: amount,
        };
        Effect::Future(Box::pin(async move {
            let result = backend.validate_promo(body).await;
            Some(CheckoutAction::PromoValidated { seq, result })
        }))
    }

    fn apply_promo(state: &mut CheckoutState, env: &CheckoutEnvironment<B, D>) -> Effects {
        let code = state.promo.input.trim().to_string();
        if code.is_empty() {
            state.promo.error = Some("Enter a promo code.".to_string());
            return SmallVec::new();
        }
        let request = Self::promo_request(state, env, &code, PromoTrigger::Apply);
        smallvec![Effect::Cancel(PROMO_REVALIDATE), request]
    }

    fn revalidate_promo(state: &mut CheckoutState, env: &CheckoutEnvironment<B, D>) -> Effects {
        let amount = subtotal(&state.selection, &env.catalog);
        let Some(code) = state.promo.applied.as_ref().map(|p| p.code.clone()) else {
            return SmallVec::new();
        };
        if !state.promo.needs_revalidation(amount) {
            return SmallVec::new();
        }
        smallvec![Self::promo_request(state, env, &code, PromoTrigger::Revalidate)]
    }

    fn promo_validated(
        state: &mut CheckoutState,
        seq: u64,
        result: Result<crate::backend::PromoValidationResponse, BackendError>,
        env: &CheckoutEnvironment<B, D>,
    ) -> Effects {
        let outcome = state.promo.accept(seq, result);
        match &outcome {
            PromoOutcome::Stale => {
                tracing::debug!(seq, "Dropping stale promo response");
                return SmallVec::new();
            },
            PromoOutcome::Applied(promo) => {
                tracing::info!(code = %promo.code, discount = promo.discount.paise(), "Promo applied");
            },
            PromoOutcome::Rejected(message) | PromoOutcome::Failed(message) => {
                tracing::info!(%message, "Promo not applied");
            },
        }

        if state.awaiting_promo && state.step == Step::Review {
            state.awaiting_promo = false;
            if matches!(outcome, PromoOutcome::Applied(_)) {
                let mut effects = Self::go_next(state, env);
                effects.push(Self::autosave(env));
                return effects;
            }
            state.notice = Some(PROMO_NOT_CONFIRMED_NOTICE.to_string());
        }

        let mut effects = Effects::new();
        // the subtotal may have moved while the request was in flight
        if state
            .promo
            .needs_revalidation(subtotal(&state.selection, &env.catalog))
        {
            effects.push(Effect::debounce(
                PROMO_REVALIDATE,
                env.config.promo_debounce,
                CheckoutAction::RevalidatePromo,
            ));
        }
        effects.push(Self::autosave(env));
        effects
    }

    fn go_next(state: &mut CheckoutState, env: &CheckoutEnvironment<B, D>) -> Effects {
        match state.step {
            Step::Select => {
                if state.selection.is_empty() {
                    tracing::debug!("Nothing selected, staying on select");
                    return SmallVec::new();
                }
                let groups = state.groups(&env.catalog);
                ensure_member_slots(&groups, &mut state.forms, &state.selection, &env.team_table);
                state.last_errors = None;
                state.notice = None;
                state.go_to(Step::Forms);
                smallvec![Self::autosave(env)]
            },
            Step::Forms => {
                let groups = state.groups(&env.catalog);
                let report = validate(&ValidationInput {
                    selection: &state.selection,
                    groups: &groups,
                    forms: &state.forms,
                    team_table: &env.team_table,
                });
                if report.is_valid() {
                    state.last_errors = None;
                    state.notice = None;
                    state.go_to(Step::Review);
                } else {
                    tracing::debug!(errors = report.error_count(), "Forms are not valid");
                    state.last_errors = Some(report);
                    state.notice = Some(FIX_ERRORS_NOTICE.to_string());
                }
                SmallVec::new()
            },
            Step::Review => {
                let amount = subtotal(&state.selection, &env.catalog);
                if !state.promo.is_confirmed_for(amount) {
                    return Self::confirm_promo_before_payment(state, env, amount);
                }
                state.awaiting_promo = false;
                state.notice = None;
                state.go_to(Step::Payment);
                // totals are frozen from here; late promo answers are stale
                state.promo.pending = None;
                let mut effects: Effects = smallvec![Effect::Cancel(PROMO_REVALIDATE)];
                effects.extend(Self::start_payment(state, env));
                effects
            },
            Step::Payment => SmallVec::new(),
        }
    }

    /// Hold the visitor on review until the applied promo is confirmed for
    /// `amount`, reusing a request already in flight for it.
    fn confirm_promo_before_payment(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, D>,
        amount: Money,
    ) -> Effects {
        let Some(code) = state.promo.applied.as_ref().map(|p| p.code.clone()) else {
            return SmallVec::new();
        };
        tracing::info!(%code, amount = amount.paise(), "Confirming promo before payment");
        state.awaiting_promo = true;
        state.notice = Some(CONFIRMING_PROMO_NOTICE.to_string());

        let mut effects: Effects = smallvec![Effect::Cancel(PROMO_REVALIDATE)];
        let in_flight = state
            .promo
            .pending
            .as_ref()
            .is_some_and(|pending| !needs_promo_revalidation(pending.amount, amount));
        if !in_flight {
            effects.push(Self::promo_request(state, env, &code, PromoTrigger::Revalidate));
        }
        effects
    }

    fn go_back(state: &mut CheckoutState) -> Effects {
        let Some(previous) = state.step.previous() else {
            return SmallVec::new();
        };
        if state.step == Step::Payment {
            // a session is never reused once the visitor leaves payment
            state.payment.attempt += 1;
            state.payment.phase = PaymentPhase::Idle;
            state.payment.retries = 0;
        }
        state.notice = None;
        state.awaiting_promo = false;
        state.go_to(previous);
        SmallVec::new()
    }

    const fn is_current_attempt(state: &CheckoutState, attempt: u64) -> bool {
        matches!(state.step, Step::Payment) && state.payment.attempt == attempt
    }

    /// Start a payment attempt: register (unless already registered), then
    /// create the order. A known user also starts the document upload.
    fn start_payment(state: &mut CheckoutState, env: &CheckoutEnvironment<B, D>) -> Effects {
        state.payment.attempt += 1;
        let attempt = state.payment.attempt;
        tracing::info!(attempt, total = state.totals(&env.catalog).total.paise(), "Starting payment");

        if state.payment.user_id.is_some() {
            state.payment.phase = PaymentPhase::Loading(PaymentStage::CreatingOrder);
            let mut effects = Self::start_upload_if_needed(state, env);
            effects.push(Self::create_order(state, env));
            return effects;
        }

        state.payment.phase = PaymentPhase::Loading(PaymentStage::Registering);
        let groups = state.groups(&env.catalog);
        let request = registration_request(&primary_contact(state, &groups));
        let backend = Arc::clone(&env.backend);
        let policy = env.config.retry.clone();

        smallvec![Effect::Future(Box::pin(async move {
            let result = retry_with_predicate(
                &policy,
                || backend.register(request.clone()),
                BackendError::is_retryable,
            )
            .await;
            Some(match result {
                Ok(response) => CheckoutAction::PaymentUserRegistered {
                    attempt,
                    user_id: response.user_id,
                },
                Err(failure) => CheckoutAction::PaymentInitFailed {
                    attempt,
                    stage: PaymentStage::Registering,
                    error: failure.error.to_string(),
                    attempts: failure.attempts,
                },
            })
        }))]
    }

    fn create_order(
        state: &CheckoutState,
        env: &CheckoutEnvironment<B, D>,
    ) -> Effect<CheckoutAction> {
        let attempt = state.payment.attempt;
        let groups = state.groups(&env.catalog);
        let contact = primary_contact(state, &groups);
        let user_id = state.payment.user_id.clone().unwrap_or_default();
        let mut request = order_request(state, &env.catalog, user_id, &contact);
        let backend = Arc::clone(&env.backend);
        let policy = env.config.retry.clone();

        Effect::Future(Box::pin(async move {
            // one key per attempt, shared by its retries
            request.idempotency_key = uuid::Uuid::new_v4().to_string();
            let result = retry_with_predicate(
                &policy,
                || backend.create_order(request.clone()),
                BackendError::is_retryable,
            )
            .await;
            Some(match result {
                Ok(session) => CheckoutAction::PaymentSessionReady { attempt, session },
                Err(failure) => CheckoutAction::PaymentInitFailed {
                    attempt,
                    stage: PaymentStage::CreatingOrder,
                    error: failure.error.to_string(),
                    attempts: failure.attempts,
                },
            })
        }))
    }

    /// Start the background upload when a user exists, files are attached
    /// and no upload is running or done. Never part of the payment path.
    fn start_upload_if_needed(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, D>,
    ) -> Effects {
        if !matches!(state.upload, UploadStatus::Idle) {
            return SmallVec::new();
        }
        let Some(user_id) = state.payment.user_id.clone() else {
            return SmallVec::new();
        };
        let groups = state.groups(&env.catalog);
        let parts = collect_upload_parts(&groups, &state.forms);
        if parts.is_empty() {
            return SmallVec::new();
        }

        state.upload = UploadStatus::Uploading;
        tracing::info!(%user_id, parts = parts.len(), "Starting background document upload");
        let backend = Arc::clone(&env.backend);
        let policy = env.config.retry.clone();

        smallvec![Effect::Future(Box::pin(async move {
            let parts = compress_parts(parts).await;
            let files = parts.len();
            let batch = UploadBatch { user_id, parts };
            let result = retry_with_predicate(
                &policy,
                || backend.upload_documents(batch.clone()),
                BackendError::is_retryable,
            )
            .await;
            Some(match result {
                Ok(()) => CheckoutAction::DocumentsUploaded { files },
                Err(failure) => CheckoutAction::DocumentUploadFailed {
                    error: failure.error.to_string(),
                },
            })
        }))]
    }

    fn reset_after_success(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment<B, D>,
    ) -> Effects {
        let previous = std::mem::take(state);
        state.verification = previous.verification;
        state.draft = DraftStatus {
            hydrated: true,
            ..DraftStatus::default()
        };
        state.payment.attempt = previous.payment.attempt + 1;
        state.scroll_epoch = previous.scroll_epoch + 1;

        let drafts = Arc::clone(&env.drafts);
        smallvec![
            Effect::Cancel(DRAFT_AUTOSAVE),
            Effect::Cancel(PROMO_REVALIDATE),
            Effect::Future(Box::pin(async move {
                if let Err(error) = drafts.clear().await {
                    tracing::warn!(%error, "Could not clear the draft after payment");
                }
                None
            })),
        ]
    }

    fn draft_loaded(
        state: &mut CheckoutState,
        draft: Option<Box<Draft>>,
        env: &CheckoutEnvironment<B, D>,
    ) -> Effects {
        if state.draft.hydrated {
            return SmallVec::new();
        }
        state.draft.hydrated = true;

        let Some(draft) = draft else {
            return SmallVec::new();
        };
        if !state.is_pristine() || state.step != Step::Select {
            tracing::debug!("Visitor already started; keeping current state over the draft");
            return SmallVec::new();
        }

        let Draft {
            selection,
            forms,
            promo,
            saved_at,
            ..
        } = *draft;
        tracing::info!(%saved_at, "Restoring draft");
        state.selection = selection.restored(&env.catalog);
        state.forms = forms;
        state.promo.restore(promo.input, promo.applied);

        if state
            .promo
            .needs_revalidation(subtotal(&state.selection, &env.catalog))
        {
            smallvec![Effect::debounce(
                PROMO_REVALIDATE,
                env.config.promo_debounce,
                CheckoutAction::RevalidatePromo,
            )]
        } else {
            SmallVec::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::backend::{PaymentSession, PromoValidationResponse};
    use crate::draft::MemoryDraftStore;
    use crate::mocks::MockBackend;
    use crate::promo::PromoApplication;
    use crate::selection::TimeOverlap;
    use crate::team::TeamSizeTable;
    use crate::types::{FileRef, ItemId, Money, Record};
    use festival_testing::mocks::test_clock;
    use festival_testing::{ReducerTest, assertions};

    type Env = CheckoutEnvironment<MockBackend, MemoryDraftStore>;

    fn env() -> Env {
        CheckoutEnvironment::new(
            MockBackend::new(),
            MemoryDraftStore::new(),
            Arc::new(test_clock()),
        )
    }

    fn reducer() -> CheckoutReducer<MockBackend, MemoryDraftStore> {
        CheckoutReducer::new()
    }

    fn toggle(id: u32) -> CheckoutAction {
        CheckoutAction::ToggleItem { item: ItemId(id) }
    }

    fn solo_record() -> Record {
        [
            ("name", "Meera Iyer"),
            ("email", "meera@college.edu"),
            ("contactNo", "9876543210"),
            ("gender", "female"),
            ("age", "20"),
            ("universityName", "NIT Trichy"),
            ("address", "Hostel 4"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// STEP UP selected and its solo form filled, sitting on the forms step
    fn filled_forms_state(env: &Env) -> CheckoutState {
        let mut state = CheckoutState::default();
        let reducer = reducer();
        reducer.reduce(&mut state, toggle(1), env);
        reducer.reduce(&mut state, CheckoutAction::GoNext, env);
        let group = state.groups(&env.catalog).remove(0);
        state
            .forms
            .group_forms
            .insert(group.signature.clone(), solo_record());
        state.forms.attach_group_file(
            group.signature,
            "idCard".into(),
            FileRef::new("id.jpg", "image/jpeg", vec![0xff, 0xd8]),
        );
        state
    }

    fn payment_state(env: &Env) -> CheckoutState {
        let mut state = filled_forms_state(env);
        reducer().reduce(&mut state, CheckoutAction::GoNext, env);
        reducer().reduce(&mut state, CheckoutAction::GoNext, env);
        state
    }

    #[test]
    fn empty_selection_cannot_leave_select() {
        ReducerTest::new(reducer())
            .with_env(env())
            .given_state(CheckoutState::default())
            .when_action(CheckoutAction::GoNext)
            .then_state(|state| {
                assert_eq!(state.step, Step::Select);
                assert_eq!(state.scroll_epoch, 0);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn visitor_pass_alone_is_enough_to_continue() {
        ReducerTest::new(reducer())
            .with_env(env())
            .given_state(CheckoutState::default())
            .when_actions([
                CheckoutAction::SetVisitorPassDays { days: 1 },
                CheckoutAction::GoNext,
            ])
            .then_state(|state| {
                assert_eq!(state.step, Step::Forms);
                assert_eq!(state.scroll_epoch, 1);
            })
            .then_effects(assertions::assert_has_debounce(DRAFT_AUTOSAVE))
            .run();
    }

    #[test]
    fn selecting_a_team_event_prepares_member_slots() {
        let env = env();
        let state = ReducerTest::new(reducer())
            .with_env(env.clone())
            .given_state(CheckoutState::default())
            .when_actions([toggle(8), CheckoutAction::GoNext])
            .run();

        let group = state.groups(&env.catalog).remove(0);
        // FREE FIRE squads are exactly four: leader plus three members
        assert_eq!(state.forms.members(&group.signature).len(), 3);
    }

    #[test]
    fn member_slots_follow_the_installed_team_table() {
        let table = TeamSizeTable::from_entries([("FREE FIRE", 2, 4)]).unwrap();
        let env = env().with_team_table(table);
        let state = ReducerTest::new(reducer())
            .with_env(env.clone())
            .given_state(CheckoutState::default())
            .when_actions([toggle(8), CheckoutAction::GoNext])
            .run();

        let group = state.groups(&env.catalog).remove(0);
        assert_eq!(state.forms.members(&group.signature).len(), 1);
    }

    #[test]
    fn typed_team_size_never_grows_member_slots_past_bounds() {
        let env = env();
        let reducer = reducer();
        let mut state = CheckoutState::default();
        reducer.reduce(&mut state, toggle(2), &env);
        reducer.reduce(&mut state, CheckoutAction::GoNext, &env);
        let group = state.groups(&env.catalog).remove(0).signature;
        let set_total = |state: &mut CheckoutState, total: &str| {
            reducer.reduce(
                state,
                CheckoutAction::SetGroupField {
                    group: group.clone(),
                    field: "numMembers".into(),
                    value: total.into(),
                },
                &env,
            );
        };
        // RAMP WALK takes 10 to 21
        assert_eq!(state.forms.members(&group).len(), 9);

        set_total(&mut state, "20");
        set_total(&mut state, "200000");
        assert_eq!(state.forms.members(&group).len(), 9);

        reducer.reduce(&mut state, CheckoutAction::GoBack, &env);
        reducer.reduce(&mut state, CheckoutAction::GoNext, &env);
        assert_eq!(state.forms.members(&group).len(), 9);

        set_total(&mut state, "12");
        reducer.reduce(&mut state, CheckoutAction::GoBack, &env);
        reducer.reduce(&mut state, CheckoutAction::GoNext, &env);
        assert_eq!(state.forms.members(&group).len(), 11);
    }

    #[test]
    fn removed_members_stay_removed() {
        let env = env();
        let reducer = reducer();
        let mut state = CheckoutState::default();
        reducer.reduce(&mut state, toggle(8), &env);
        reducer.reduce(&mut state, CheckoutAction::GoNext, &env);
        let group = state.groups(&env.catalog).remove(0).signature;
        assert_eq!(state.forms.members(&group).len(), 3);

        reducer.reduce(
            &mut state,
            CheckoutAction::RemoveTeamMember {
                group: group.clone(),
                index: 2,
            },
            &env,
        );
        reducer.reduce(
            &mut state,
            CheckoutAction::SetGroupField {
                group: group.clone(),
                field: "squadName".into(),
                value: "Night Owls".into(),
            },
            &env,
        );

        assert_eq!(state.forms.members(&group).len(), 2);
        reducer.reduce(&mut state, CheckoutAction::GoNext, &env);
        assert_eq!(state.step, Step::Forms);
        assert_eq!(state.forms.members(&group).len(), 2);
    }

    /// Review with FEST20 confirmed for the current subtotal, then a second
    /// visitor-pass day added
    fn review_with_outdated_promo(env: &Env) -> CheckoutState {
        let mut state = filled_forms_state(env);
        reducer().reduce(&mut state, CheckoutAction::GoNext, env);
        assert_eq!(state.step, Step::Review);
        let amount = subtotal(&state.selection, &env.catalog);
        let request = state.promo.begin("FEST20", amount, PromoTrigger::Apply);
        state.promo.accept(request.seq, Ok(promo_answer(true, 20)));

        reducer().reduce(&mut state, CheckoutAction::SetVisitorPassDays { days: 2 }, env);
        state
    }

    fn promo_answer(success: bool, rupees: u64) -> PromoValidationResponse {
        PromoValidationResponse {
            success,
            discount_amount: Money::from_rupees(rupees),
            message: (!success).then(|| "Promo code has expired.".to_string()),
        }
    }

    #[test]
    fn changed_total_confirms_promo_before_payment() {
        let env = env();
        let mut state = review_with_outdated_promo(&env);
        let amount = subtotal(&state.selection, &env.catalog);

        let effects = reducer().reduce(&mut state, CheckoutAction::GoNext, &env);

        assert_eq!(state.step, Step::Review);
        assert!(state.awaiting_promo);
        assert_eq!(state.notice.as_deref(), Some(CONFIRMING_PROMO_NOTICE));
        assertions::assert_has_future_effect(&effects);
        let pending = state.promo.pending.clone().unwrap();
        assert_eq!(pending.amount, amount);

        let effects = reducer().reduce(
            &mut state,
            CheckoutAction::PromoValidated {
                seq: pending.seq,
                result: Ok(promo_answer(true, 20)),
            },
            &env,
        );

        assert_eq!(state.step, Step::Payment);
        assert!(!state.awaiting_promo);
        assert_eq!(state.promo.last_validated_subtotal, Some(amount));
        assert_eq!(
            state.payment.phase,
            PaymentPhase::Loading(PaymentStage::Registering)
        );
        assertions::assert_has_future_effect(&effects);
    }

    #[test]
    fn promo_refused_for_the_new_total_stops_before_payment() {
        let env = env();
        let mut state = review_with_outdated_promo(&env);
        reducer().reduce(&mut state, CheckoutAction::GoNext, &env);
        let seq = state.promo.pending.as_ref().unwrap().seq;

        reducer().reduce(
            &mut state,
            CheckoutAction::PromoValidated {
                seq,
                result: Ok(promo_answer(false, 0)),
            },
            &env,
        );

        assert_eq!(state.step, Step::Review);
        assert!(state.promo.applied.is_none());
        assert_eq!(state.notice.as_deref(), Some(PROMO_NOT_CONFIRMED_NOTICE));
        assert_eq!(state.totals(&env.catalog).discount, Money::ZERO);

        // continuing again pays the full amount
        reducer().reduce(&mut state, CheckoutAction::GoNext, &env);
        assert_eq!(state.step, Step::Payment);
    }

    #[test]
    fn edits_while_confirming_cancel_the_pending_continue() {
        let env = env();
        let mut state = review_with_outdated_promo(&env);
        reducer().reduce(&mut state, CheckoutAction::GoNext, &env);
        let seq = state.promo.pending.as_ref().unwrap().seq;

        reducer().reduce(&mut state, CheckoutAction::SetVisitorPassDays { days: 1 }, &env);
        reducer().reduce(
            &mut state,
            CheckoutAction::PromoValidated {
                seq,
                result: Ok(promo_answer(true, 20)),
            },
            &env,
        );

        assert_eq!(state.step, Step::Review);
        assert!(!state.awaiting_promo);
    }

    #[test]
    fn installed_conflict_check_refuses_clashing_items() {
        ReducerTest::new(reducer())
            .with_env(env().with_conflict_check(Arc::new(TimeOverlap)))
            .given_state(CheckoutState::default())
            .when_actions([toggle(1), toggle(4)])
            .then_state(|state| {
                assert!(state.selection.is_selected(ItemId(1)));
                assert!(!state.selection.is_selected(ItemId(4)));
                assert!(state.notice.is_some());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn invalid_forms_stay_and_report_errors() {
        let env = env();
        let reducer = reducer();
        let mut state = CheckoutState::default();
        reducer.reduce(&mut state, toggle(1), &env);
        reducer.reduce(&mut state, CheckoutAction::GoNext, &env);
        let group = state.groups(&env.catalog).remove(0).signature;
        reducer.reduce(
            &mut state,
            CheckoutAction::SetGroupField {
                group: group.clone(),
                field: "name".into(),
                value: "Meera Iyer".into(),
            },
            &env,
        );

        let effects = reducer.reduce(&mut state, CheckoutAction::GoNext, &env);

        assert_eq!(state.step, Step::Forms);
        let report = state.last_errors.as_ref().unwrap();
        assert!(!report.is_valid());
        assert_eq!(state.notice.as_deref(), Some(FIX_ERRORS_NOTICE));
        assert_eq!(
            state.forms.group_form(&group).and_then(|f| f.get("name")).map(String::as_str),
            Some("Meera Iyer")
        );
        assertions::assert_no_effects(&effects);
    }

    #[test]
    fn shown_errors_follow_edits() {
        let env = env();
        let mut state = filled_forms_state(&env);
        let group = state.groups(&env.catalog).remove(0);
        state
            .forms
            .group_forms
            .get_mut(&group.signature)
            .unwrap()
            .remove("email");
        reducer().reduce(&mut state, CheckoutAction::GoNext, &env);
        let before = state.last_errors.as_ref().unwrap().error_count();
        assert!(before > 0);

        reducer().reduce(
            &mut state,
            CheckoutAction::SetGroupField {
                group: group.signature,
                field: "email".into(),
                value: "meera@college.edu".into(),
            },
            &env,
        );

        assert!(state.last_errors.as_ref().unwrap().is_valid());
        assert_eq!(state.step, Step::Forms);
    }

    #[test]
    fn valid_forms_advance_to_review() {
        let env = env();
        let state = filled_forms_state(&env);
        ReducerTest::new(reducer())
            .with_env(env)
            .given_state(state)
            .when_action(CheckoutAction::GoNext)
            .then_state(|state| {
                assert_eq!(state.step, Step::Review);
                assert!(state.last_errors.is_none());
                assert_eq!(state.scroll_epoch, 2);
            })
            .run();
    }

    #[test]
    fn entering_payment_registers_first() {
        let env = env();
        let mut state = filled_forms_state(&env);
        reducer().reduce(&mut state, CheckoutAction::GoNext, &env);

        ReducerTest::new(reducer())
            .with_env(env)
            .given_state(state)
            .when_action(CheckoutAction::GoNext)
            .then_state(|state| {
                assert_eq!(state.step, Step::Payment);
                assert_eq!(state.payment.attempt, 1);
                assert_eq!(
                    state.payment.phase,
                    PaymentPhase::Loading(PaymentStage::Registering)
                );
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn edits_are_ignored_on_the_payment_step() {
        let env = env();
        let state = payment_state(&env);
        let selection = state.selection.clone();

        ReducerTest::new(reducer())
            .with_env(env)
            .given_state(state)
            .when_actions([toggle(5), CheckoutAction::SetVisitorPassDays { days: 3 }])
            .then_state(move |state| {
                assert_eq!(state.selection, selection);
                assert_eq!(state.step, Step::Payment);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn registration_leads_to_order_creation() {
        let env = env();
        let state = payment_state(&env);

        ReducerTest::new(reducer())
            .with_env(env)
            .given_state(state)
            .when_action(CheckoutAction::PaymentUserRegistered {
                attempt: 1,
                user_id: "user-1".into(),
            })
            .then_state(|state| {
                assert_eq!(state.payment.user_id.as_deref(), Some("user-1"));
                assert_eq!(
                    state.payment.phase,
                    PaymentPhase::Loading(PaymentStage::CreatingOrder)
                );
                // the id card goes up in the background
                assert_eq!(state.upload, UploadStatus::Uploading);
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 2))
            .run();
    }

    #[test]
    fn leaving_payment_invalidates_the_session() {
        let env = env();
        let mut state = payment_state(&env);
        let session = PaymentSession {
            payment_session_id: "session-1".into(),
            order_id: "order-1".into(),
            amount: Money::from_rupees(40),
        };
        reducer().reduce(
            &mut state,
            CheckoutAction::PaymentSessionReady {
                attempt: 1,
                session: session.clone(),
            },
            &env,
        );
        assert_eq!(state.payment.session(), Some(&session));

        reducer().reduce(&mut state, CheckoutAction::GoBack, &env);
        assert_eq!(state.step, Step::Review);
        assert_eq!(state.payment.phase, PaymentPhase::Idle);

        // the old attempt answering late changes nothing
        reducer().reduce(
            &mut state,
            CheckoutAction::PaymentSessionReady {
                attempt: 1,
                session,
            },
            &env,
        );
        assert_eq!(state.payment.phase, PaymentPhase::Idle);
    }

    #[test]
    fn stale_attempt_failures_are_ignored() {
        let env = env();
        let mut state = payment_state(&env);
        reducer().reduce(&mut state, CheckoutAction::GoBack, &env);
        reducer().reduce(&mut state, CheckoutAction::GoNext, &env);
        let current = state.payment.attempt;
        assert!(current > 1);

        reducer().reduce(
            &mut state,
            CheckoutAction::PaymentInitFailed {
                attempt: 1,
                stage: PaymentStage::Registering,
                error: "timeout".into(),
                attempts: 3,
            },
            &env,
        );
        assert_eq!(
            state.payment.phase,
            PaymentPhase::Loading(PaymentStage::Registering)
        );
    }

    #[test]
    fn failure_offers_retry_and_fallback() {
        let env = env();
        let mut state = payment_state(&env);
        reducer().reduce(
            &mut state,
            CheckoutAction::PaymentInitFailed {
                attempt: 1,
                stage: PaymentStage::Registering,
                error: "server error".into(),
                attempts: 3,
            },
            &env,
        );
        let PaymentPhase::Failed {
            retry_count,
            fallback_url,
            ..
        } = &state.payment.phase
        else {
            panic!("expected failure, got {:?}", state.payment.phase);
        };
        assert_eq!(*retry_count, 2);
        assert_eq!(fallback_url, &env.config.fallback_payment_url);

        let effects = reducer().reduce(&mut state, CheckoutAction::RetryPayment, &env);
        assertions::assert_has_future_effect(&effects);
        assert_eq!(state.payment.attempt, 2);
        assert_eq!(state.payment.retries, 1);
    }

    #[test]
    fn known_user_skips_registration_on_retry() {
        let env = env();
        let mut state = payment_state(&env);
        state.payment.user_id = Some("user-9".into());
        state.upload = UploadStatus::Uploaded { files: 1 };
        state.payment.phase = PaymentPhase::Failed {
            error: "x".into(),
            retry_count: 0,
            fallback_url: String::new(),
        };

        let effects = reducer().reduce(&mut state, CheckoutAction::RetryPayment, &env);
        assert_eq!(
            state.payment.phase,
            PaymentPhase::Loading(PaymentStage::CreatingOrder)
        );
        assertions::assert_effects_count(&effects, 1);
    }

    #[test]
    fn edits_schedule_an_autosave() {
        ReducerTest::new(reducer())
            .with_env(env())
            .given_state(CheckoutState::default())
            .when_action(toggle(5))
            .then_effects(assertions::assert_has_debounce(DRAFT_AUTOSAVE))
            .then_effects(assertions::assert_no_debounce(PROMO_REVALIDATE))
            .run();
    }

    #[test]
    fn subtotal_change_schedules_promo_revalidation() {
        let env = env();
        let mut state = CheckoutState::default();
        reducer().reduce(&mut state, toggle(4), &env);
        state.promo.restore(
            "FEST20".into(),
            Some(PromoApplication {
                code: "FEST20".into(),
                discount: Money::from_rupees(20),
            }),
        );
        state.promo.last_validated_subtotal = Some(Money::from_rupees(85));

        ReducerTest::new(reducer())
            .with_env(env)
            .given_state(state)
            .when_action(toggle(5))
            .then_effects(assertions::assert_has_debounce(PROMO_REVALIDATE))
            .run();
    }

    #[test]
    fn blank_promo_is_refused_locally() {
        ReducerTest::new(reducer())
            .with_env(env())
            .given_state(CheckoutState::default())
            .when_actions([
                CheckoutAction::SetPromoInput { code: "  ".into() },
                CheckoutAction::ApplyPromo,
            ])
            .then_state(|state| {
                assert_eq!(state.promo.error.as_deref(), Some("Enter a promo code."));
                assert!(!state.promo.is_validating());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn only_the_latest_promo_answer_counts() {
        let env = env();
        let mut state = CheckoutState::default();
        reducer().reduce(&mut state, toggle(4), &env);
        state.promo.input = "FEST20".into();
        reducer().reduce(&mut state, CheckoutAction::ApplyPromo, &env);
        reducer().reduce(&mut state, CheckoutAction::ApplyPromo, &env);
        let latest = state.promo.pending.as_ref().unwrap().seq;

        let answer = |discount| {
            Ok(crate::backend::PromoValidationResponse {
                success: true,
                discount_amount: Money::from_rupees(discount),
                message: None,
            })
        };
        let effects = reducer().reduce(
            &mut state,
            CheckoutAction::PromoValidated {
                seq: latest - 1,
                result: answer(50),
            },
            &env,
        );
        assertions::assert_no_effects(&effects);
        assert!(state.promo.applied.is_none());

        reducer().reduce(
            &mut state,
            CheckoutAction::PromoValidated {
                seq: latest,
                result: answer(20),
            },
            &env,
        );
        assert_eq!(state.totals(&env.catalog).total, Money::from_rupees(65));
    }

    #[test]
    fn draft_restores_only_a_pristine_checkout() {
        let env = env();
        let mut source = CheckoutState::default();
        reducer().reduce(&mut source, toggle(5), &env);
        let draft = Draft::capture(
            &source.selection,
            &source.forms,
            &source.promo,
            env.clock.now(),
        );

        let restored = ReducerTest::new(reducer())
            .with_env(env.clone())
            .given_state(CheckoutState::default())
            .when_action(CheckoutAction::DraftLoaded {
                draft: Some(Box::new(draft.clone())),
            })
            .run();
        assert!(restored.selection.is_selected(ItemId(5)));
        assert!(restored.draft.hydrated);

        let kept = ReducerTest::new(reducer())
            .with_env(env)
            .given_state(CheckoutState::default())
            .when_actions([
                toggle(1),
                CheckoutAction::DraftLoaded {
                    draft: Some(Box::new(draft)),
                },
            ])
            .run();
        assert!(kept.selection.is_selected(ItemId(1)));
        assert!(!kept.selection.is_selected(ItemId(5)));
    }

    #[test]
    fn successful_verification_resets_the_checkout() {
        let env = env();
        let mut state = payment_state(&env);
        let epoch = state.scroll_epoch;
        reducer().reduce(
            &mut state,
            CheckoutAction::VerifyPayment {
                order_id: "order-1".into(),
            },
            &env,
        );
        assert!(state.verification.checking);

        let effects = reducer().reduce(
            &mut state,
            CheckoutAction::PaymentVerified {
                order_id: "order-1".into(),
                outcome: VerificationOutcome::Success,
            },
            &env,
        );

        assert_eq!(state.step, Step::Select);
        assert!(state.selection.is_empty());
        assert_eq!(
            state.verification.outcome,
            Some(VerificationOutcome::Success)
        );
        assert!(state.draft.hydrated);
        assert_eq!(state.scroll_epoch, epoch + 1);
        assertions::assert_effects_count(&effects, 3);
    }

    #[test]
    fn apply_action_returns_the_next_state() {
        let (state, effects) = apply_action(CheckoutState::default(), toggle(10), &env());
        assert!(state.selection.is_selected(ItemId(10)));
        assert!(effects.iter().any(|e| e.debounces(DRAFT_AUTOSAVE)));
    }
}
