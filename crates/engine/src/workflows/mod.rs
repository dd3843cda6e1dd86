//! Workflow entry points.
//!
//! Each workflow validates configuration for itself, performs any run-level
//! precondition (for example the inviter's own membership), and hands the
//! per-account work to [`drive_account_run`](crate::executor::drive_account_run).

mod funding;
mod invites;
mod membership;
mod profiles;
mod proposals;
mod voting;

use std::{fmt, sync::Arc};

use anyhow::Result;
use daoscript_chain::LedgerClient;
use daoscript_types::{RunEvent, RunReport};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

pub use funding::DEFAULT_FUNDING_AMOUNT;
pub use membership::JoinSpaceRun;
pub use profiles::ProfileOperation;
pub use proposals::{
    DAY_SECS, DEFAULT_EDIT_VOTING_DURATION, DEFAULT_VOTING_DURATION, ProposalDraft, ProposalPayload, ProposalRun,
    development_task, updated_development_task,
};
pub use voting::DEFAULT_VOTE_DELAY;

use crate::{
    accounts::Account,
    config::{HarnessConfig, validate_config},
    executor::{AccountAction, RunOptions, Target, drive_account_run},
};

/// Every workflow the harness can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowKind {
    JoinSpace,
    CreateSpace,
    Invite,
    BatchInvite,
    CreateProfile,
    EditProfile,
    DeleteProfile,
    CreateProposal,
    EditProposal,
    Vote,
    Fund,
}

impl WorkflowKind {
    pub fn name(self) -> &'static str {
        match self {
            WorkflowKind::JoinSpace => "join-space",
            WorkflowKind::CreateSpace => "create-space",
            WorkflowKind::Invite => "invite",
            WorkflowKind::BatchInvite => "batch-invite",
            WorkflowKind::CreateProfile => "profile-create",
            WorkflowKind::EditProfile => "profile-edit",
            WorkflowKind::DeleteProfile => "profile-delete",
            WorkflowKind::CreateProposal => "proposal-create",
            WorkflowKind::EditProposal => "proposal-edit",
            WorkflowKind::Vote => "vote",
            WorkflowKind::Fund => "fund",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A run-level precondition failed; nothing was submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{workflow} aborted: {reason}")]
pub struct Aborted {
    pub workflow: WorkflowKind,
    pub reason: String,
}

/// Shared context for running workflows against one ledger.
pub struct Harness {
    config: HarnessConfig,
    ledger: Arc<dyn LedgerClient>,
    accounts: Vec<Account>,
    events: Option<UnboundedSender<RunEvent>>,
}

impl Harness {
    pub fn new(config: HarnessConfig, ledger: Arc<dyn LedgerClient>, accounts: Vec<Account>) -> Self {
        Self {
            config,
            ledger,
            accounts,
            events: None,
        }
    }

    /// Stream progress to `events` as runs proceed.
    pub fn with_events(mut self, events: UnboundedSender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    fn ledger(&self) -> &dyn LedgerClient {
        self.ledger.as_ref()
    }

    fn prepare(&self, workflow: WorkflowKind) -> Result<()> {
        validate_config(&self.config, workflow)?;
        Ok(())
    }

    /// First account; the actor for single-actor workflows.
    fn lead(&self, workflow: WorkflowKind) -> Result<&Account> {
        self.accounts.first().ok_or_else(|| {
            Aborted {
                workflow,
                reason: "the accounts file has no entries".to_string(),
            }
            .into()
        })
    }

    fn every_account(&self) -> Vec<Target> {
        Target::list(self.accounts.iter().map(|account| account.address))
    }

    fn abort(&self, workflow: WorkflowKind, reason: impl Into<String>) -> anyhow::Error {
        let aborted = Aborted {
            workflow,
            reason: reason.into(),
        };
        info!(workflow = workflow.name(), reason = %aborted.reason, "workflow aborted");
        aborted.into()
    }

    fn note(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        if let Some(events) = &self.events {
            let _ = events.send(RunEvent::Note { message });
        }
    }

    async fn drive(
        &self,
        workflow: WorkflowKind,
        action: &dyn AccountAction,
        targets: &[Target],
        options: RunOptions,
    ) -> RunReport {
        drive_account_run(
            workflow.name(),
            action,
            self.ledger(),
            targets,
            options,
            self.events.as_ref(),
        )
        .await
    }
}
