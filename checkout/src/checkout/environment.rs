//! Checkout environment.
//!
//! Everything the reducer reads but does not own: static configuration and
//! the collaborators effects talk to.

use crate::backend::CheckoutBackend;
use crate::catalog::Catalog;
use crate::config::CheckoutConfig;
use crate::draft::DraftStore;
use crate::selection::{ConflictCheck, NoConflicts};
use crate::team::TeamSizeTable;
use festival_core::environment::Clock;
use std::sync::Arc;

/// Checkout environment.
///
/// # Type Parameters
///
/// - `B`: backend
/// - `D`: draft store
pub struct CheckoutEnvironment<B, D>
where
    B: CheckoutBackend,
    D: DraftStore,
{
    /// Items on sale
    pub catalog: Arc<Catalog>,
    /// Team sizes by title
    pub team_table: Arc<TeamSizeTable>,
    /// Remote collaborator
    pub backend: Arc<B>,
    /// Draft persistence
    pub drafts: Arc<D>,
    /// Time source for draft timestamps
    pub clock: Arc<dyn Clock>,
    /// Co-selection rule
    pub conflicts: Arc<dyn ConflictCheck>,
    /// Timeouts, retries, debounce periods and the fallback link
    pub config: CheckoutConfig,
}

impl<B, D> Clone for CheckoutEnvironment<B, D>
where
    B: CheckoutBackend,
    D: DraftStore,
{
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            team_table: Arc::clone(&self.team_table),
            backend: Arc::clone(&self.backend),
            drafts: Arc::clone(&self.drafts),
            clock: Arc::clone(&self.clock),
            conflicts: Arc::clone(&self.conflicts),
            config: self.config.clone(),
        }
    }
}

impl<B, D> CheckoutEnvironment<B, D>
where
    B: CheckoutBackend,
    D: DraftStore,
{
    /// Festival catalog and team table, no conflict check, default config
    #[must_use]
    pub fn new(backend: B, drafts: D, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog: Arc::new(Catalog::festival()),
            team_table: Arc::new(TeamSizeTable::festival()),
            backend: Arc::new(backend),
            drafts: Arc::new(drafts),
            clock,
            conflicts: Arc::new(NoConflicts),
            config: CheckoutConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: CheckoutConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// Replace the team table.
    #[must_use]
    pub fn with_team_table(mut self, table: TeamSizeTable) -> Self {
        self.team_table = Arc::new(table);
        self
    }

    /// Install a conflict check.
    #[must_use]
    pub fn with_conflict_check(mut self, conflicts: Arc<dyn ConflictCheck>) -> Self {
        self.conflicts = conflicts;
        self
    }
}
