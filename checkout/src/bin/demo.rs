//! Walk one checkout from selection to a ready payment session.
//!
//! # Usage
//!
//! Against the in-memory backend:
//! ```bash
//! cargo run --bin checkout-demo
//! ```
//!
//! Against a running registration backend, with the draft on disk:
//! ```bash
//! FESTIVAL_API_BASE_URL=http://localhost:5000 cargo run --bin checkout-demo
//! ```
//!
//! `RUST_LOG=festival_checkout=debug` shows every step change, promo check
//! and retry.

use anyhow::{Context, bail};
use festival_checkout::backend::CheckoutBackend;
use festival_checkout::checkout::{
    CheckoutAction, CheckoutEnvironment, CheckoutReducer, CheckoutState, PaymentPhase, Step,
};
use festival_checkout::config::{CheckoutConfig, ENV_API_BASE_URL};
use festival_checkout::draft::{DraftStore, FileDraftStore, MemoryDraftStore};
use festival_checkout::mocks::MockBackend;
use festival_checkout::types::{FileRef, ItemId};
use festival_checkout::{HttpBackend, Money};
use festival_core::environment::{Clock, SystemClock};
use festival_runtime::Store;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const STEP_UP: ItemId = ItemId(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("festival_checkout=info,festival_runtime=info")),
        )
        .with(fmt::layer())
        .init();

    let config = CheckoutConfig::from_env().context("Invalid FESTIVAL_* configuration")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    if std::env::var_os(ENV_API_BASE_URL).is_some() {
        info!(base_url = %config.api_base_url, draft = %config.draft_path.display(), "Using the HTTP backend");
        let backend = HttpBackend::from_config(&config);
        let drafts = FileDraftStore::new(config.draft_path.clone());
        run(CheckoutEnvironment::new(backend, drafts, clock).with_config(config)).await
    } else {
        info!("{ENV_API_BASE_URL} not set, using the in-memory backend");
        let env = CheckoutEnvironment::new(MockBackend::new(), MemoryDraftStore::new(), clock)
            .with_config(config);
        run(env).await
    }
}

async fn run<B, D>(env: CheckoutEnvironment<B, D>) -> anyhow::Result<()>
where
    B: CheckoutBackend,
    D: DraftStore,
{
    let catalog = Arc::clone(&env.catalog);
    let store = Store::new(CheckoutState::default(), CheckoutReducer::new(), env);
    let send = |action| {
        let store = store.clone();
        async move {
            let mut handle = store.send(action).await?;
            handle.wait_with_timeout(Duration::from_secs(60)).await?;
            anyhow::Ok(())
        }
    };

    send(CheckoutAction::HydrateDraft).await?;

    // Select: STEP UP and a one-day visitor pass
    send(CheckoutAction::ToggleItem { item: STEP_UP }).await?;
    send(CheckoutAction::SetVisitorPassDays { days: 1 }).await?;
    send(CheckoutAction::GoNext).await?;

    // Forms: the solo participant and the pass holder
    let group = store
        .state(|s| s.groups(&catalog).into_iter().next().map(|g| g.signature))
        .await
        .context("STEP UP should produce a form group")?;
    for (field, value) in [
        ("name", "Meera Iyer"),
        ("email", "meera@college.edu"),
        ("contactNo", "9876543210"),
        ("gender", "female"),
        ("age", "20"),
        ("universityName", "NIT Trichy"),
        ("address", "Hostel 4, NIT Trichy"),
    ] {
        send(CheckoutAction::SetGroupField {
            group: group.clone(),
            field: field.into(),
            value: value.into(),
        })
        .await?;
    }
    send(CheckoutAction::AttachGroupFile {
        group,
        field: "idCard".into(),
        file: sample_id_card()?,
    })
    .await?;
    for (field, value) in [
        ("name", "Ravi Kumar"),
        ("email", "ravi@mail.in"),
        ("contactNo", "9123456780"),
    ] {
        send(CheckoutAction::SetVisitorPassField {
            field: field.into(),
            value: value.into(),
        })
        .await?;
    }
    send(CheckoutAction::GoNext).await?;

    let (step, totals) = store.state(|s| (s.step, s.totals(&catalog))).await;
    if step != Step::Review {
        let errors = store.state(|s| s.last_errors.clone()).await;
        bail!("Forms were refused: {errors:?}");
    }
    info!(
        subtotal = %totals.subtotal,
        discount = %totals.discount,
        total = %totals.total,
        "Review"
    );
    if totals.total != Money::from_rupees(109) {
        tracing::warn!(total = %totals.total, "Unexpected total for STEP UP with a one-day pass");
    }

    // Payment: register, create the order; documents upload alongside
    send(CheckoutAction::GoNext).await?;
    let (phase, upload) = store
        .state(|s| (s.payment.phase.clone(), s.upload.clone()))
        .await;
    info!(?upload, "Document upload");

    match phase {
        PaymentPhase::Ready(session) => {
            info!(
                order_id = %session.order_id,
                session_id = %session.payment_session_id,
                amount = %session.amount,
                "Payment session ready"
            );
            send(CheckoutAction::VerifyPayment {
                order_id: session.order_id,
            })
            .await?;
            let outcome = store.state(|s| s.verification.outcome).await;
            info!(?outcome, "Payment verification");
        },
        PaymentPhase::Failed {
            error,
            fallback_url,
            ..
        } => {
            tracing::error!(%error, %fallback_url, "Payment could not be started");
        },
        other => tracing::warn!(?other, "Payment did not settle"),
    }

    store.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}

/// A large PNG standing in for a photographed ID card, so the upload path
/// has something to shrink
fn sample_id_card() -> anyhow::Result<FileRef> {
    let channel = |v: u32| u8::try_from(v % 256).unwrap_or(0);
    let image = RgbImage::from_fn(1600, 1000, |x, y| {
        image::Rgb([channel(x), channel(y), channel(x + y)])
    });
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image).write_to(&mut bytes, ImageFormat::Png)?;
    Ok(FileRef::new("id-card.png", "image/png", bytes.into_inner()))
}
