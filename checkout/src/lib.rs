//! # Festival Checkout
//!
//! Order composition and checkout for the festival registration flow.
//!
//! A visitor picks events, visitor-pass days and flagship add-ons, fills in
//! one form per group of items, optionally applies a promo code and pays.
//! This crate holds the rules behind that flow:
//!
//! - [`catalog`], [`fields`] and [`team`]: what is on sale and what each item asks for
//! - [`selection`], [`grouping`] and [`forms`]: what the visitor chose and entered
//! - [`validation`]: per-field errors for everything entered
//! - [`pricing`] and [`promo`]: totals and discount handling
//! - [`checkout`]: the reducer that drives the flow, with its state and actions
//! - [`backend`], [`upload`], [`draft`] and [`verification`]: the I/O around it
//!
//! ## Example
//!
//! ```ignore
//! use festival_checkout::{
//!     checkout::{CheckoutAction, CheckoutEnvironment, CheckoutReducer, CheckoutState},
//!     mocks::{MemoryDraftStore, MockBackend},
//!     types::ItemId,
//! };
//! use festival_runtime::Store;
//!
//! let env = CheckoutEnvironment::new(MockBackend::new(), MemoryDraftStore::new(), clock);
//! let store = Store::new(CheckoutState::default(), CheckoutReducer::new(), env);
//! store.send(CheckoutAction::ToggleItem { item: ItemId(1) }).await?;
//! ```

pub mod backend;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod draft;
pub mod error;
pub mod fields;
pub mod forms;
pub mod grouping;
pub mod mocks;
pub mod pricing;
pub mod promo;
pub mod selection;
pub mod team;
pub mod types;
pub mod upload;
pub mod validation;
pub mod verification;

pub use backend::{CheckoutBackend, HttpBackend};
pub use catalog::{Catalog, CatalogItem};
pub use checkout::{CheckoutAction, CheckoutEnvironment, CheckoutReducer, CheckoutState, Step};
pub use config::CheckoutConfig;
pub use draft::{Draft, DraftStore, FileDraftStore};
pub use error::{BackendError, ConfigError, DraftError, UploadError};
pub use types::{GroupSignature, ItemId, Money};
