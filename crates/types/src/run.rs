//! Per-account outcomes and run progress events.

use std::fmt;

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};

use crate::RejectionReason;

/// Verdict for one account in one workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountOutcome {
    /// A read-only precondition held; no transaction was sent.
    Skipped { reason: String },
    /// Receipt carried the confirmation event and the re-read agreed.
    Succeeded {
        transaction: B256,
        block_number: Option<u64>,
        gas_used: u64,
    },
    /// The transaction settled but the event or the re-read disagreed.
    VerificationFailed {
        transaction: B256,
        event_present: bool,
        state_matches: bool,
    },
    /// The remote system refused the call.
    Rejected { reason: RejectionReason, detail: String },
    /// Anything else: transport failure, reverted receipt, decode error.
    Failed { error: String },
}

impl AccountOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AccountOutcome::Succeeded { .. })
    }

    /// Whether this outcome involved a state-changing submission.
    pub fn attempted_submission(&self) -> bool {
        !matches!(self, AccountOutcome::Skipped { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccountOutcome::Skipped { .. } => "skipped",
            AccountOutcome::Succeeded { .. } => "succeeded",
            AccountOutcome::VerificationFailed { .. } => "verification-failed",
            AccountOutcome::Rejected { .. } => "rejected",
            AccountOutcome::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for AccountOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountOutcome::Skipped { reason } => write!(f, "skipped: {reason}"),
            AccountOutcome::Succeeded {
                transaction,
                block_number,
                gas_used,
            } => {
                write!(f, "succeeded in {transaction}")?;
                if let Some(block) = block_number {
                    write!(f, " (block {block}")?;
                    write!(f, ", gas {gas_used})")
                } else {
                    write!(f, " (gas {gas_used})")
                }
            }
            AccountOutcome::VerificationFailed {
                transaction,
                event_present,
                state_matches,
            } => write!(
                f,
                "verification failed for {transaction} (event present: {event_present}, state matches: {state_matches})"
            ),
            AccountOutcome::Rejected { reason, detail } => write!(f, "rejected ({reason}): {detail}"),
            AccountOutcome::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// One account's row in a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountResult {
    pub index: usize,
    pub address: Address,
    pub outcome: AccountOutcome,
}

/// Everything a workflow run produced, in account order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub workflow: String,
    pub results: Vec<AccountResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.results.len(),
            ..RunSummary::default()
        };
        for result in &self.results {
            match result.outcome {
                AccountOutcome::Skipped { .. } => summary.skipped += 1,
                AccountOutcome::Succeeded { .. } => summary.succeeded += 1,
                AccountOutcome::VerificationFailed { .. } => summary.verification_failed += 1,
                AccountOutcome::Rejected { .. } => summary.rejected += 1,
                AccountOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    pub fn outcome_for(&self, address: Address) -> Option<&AccountOutcome> {
        self.results.iter().find(|r| r.address == address).map(|r| &r.outcome)
    }

    pub fn succeeded_addresses(&self) -> Vec<Address> {
        self.results
            .iter()
            .filter(|r| r.outcome.is_success())
            .map(|r| r.address)
            .collect()
    }
}

/// Outcome counts for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub verification_failed: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} accounts: {} succeeded, {} skipped, {} verification failed, {} rejected, {} failed",
            self.total, self.succeeded, self.skipped, self.verification_failed, self.rejected, self.failed
        )
    }
}

/// Progress notifications emitted while a run is in flight.
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        workflow: String,
        accounts: usize,
        at: DateTime<Utc>,
    },
    AccountStarted {
        index: usize,
        address: Address,
    },
    /// Free-form progress line from a workflow (counts, read-backs).
    Note {
        message: String,
    },
    AccountFinished {
        index: usize,
        address: Address,
        outcome: AccountOutcome,
    },
    RunCompleted {
        workflow: String,
        summary: RunSummary,
        at: DateTime<Utc>,
    },
}
