//! Per-account action sequencing.
//!
//! A workflow describes what happens for one account as an
//! [`AccountAction`]; [`drive_account_run`] applies it to every target in
//! order, classifying each attempt into an
//! [`AccountOutcome`](daoscript_types::AccountOutcome).

mod runner;

use std::time::Duration;

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use daoscript_chain::{ChainError, LedgerClient, Settlement};

pub use runner::{drive_account_run, outcome_from_error};
pub(crate) use runner::{RunRecorder, reverted_outcome, verified_outcome};

/// One row of a run: the account (or invitee, or recipient) being acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub index: usize,
    pub address: Address,
}

impl Target {
    pub fn list(addresses: impl IntoIterator<Item = Address>) -> Vec<Target> {
        addresses
            .into_iter()
            .enumerate()
            .map(|(index, address)| Target { index, address })
            .collect()
    }
}

/// Result of a read-only precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    Proceed,
    /// Already in the desired state, or not eligible. Nothing is sent.
    Skip(String),
}

/// Result of re-reading state after a settled submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub state_matches: bool,
    /// Read-backs worth reporting (new ids, executors, balances).
    pub notes: Vec<String>,
}

impl Verification {
    pub fn matches(state_matches: bool) -> Self {
        Self {
            state_matches,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// What a workflow does for a single target.
#[async_trait]
pub trait AccountAction: Send + Sync {
    /// Contract operation label, used in logs.
    fn operation(&self) -> &'static str;

    /// Account that signs the submission for `target`.
    fn signer(&self, target: &Target) -> Address {
        target.address
    }

    async fn precondition(&self, _ledger: &dyn LedgerClient, _target: &Target) -> Result<Precondition, ChainError> {
        Ok(Precondition::Proceed)
    }

    async fn submit(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Settlement, ChainError>;

    /// Topic0 of the confirmation event, or `None` when the contract
    /// defines no event for this operation.
    fn confirmation(&self) -> Option<B256>;

    async fn verify(
        &self,
        ledger: &dyn LedgerClient,
        target: &Target,
        settlement: &Settlement,
    ) -> Result<Verification, ChainError>;
}

/// Run-level knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Pause between successive submissions.
    pub delay: Option<Duration>,
}
