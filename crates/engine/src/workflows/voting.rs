//! Voting on an existing proposal with every account.

use std::time::Duration;

use alloy::{primitives::B256, sol_types::SolEvent};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use daoscript_chain::{ChainError, LedgerClient, Settlement, bindings::DaoProposals, client::ops};
use daoscript_types::{ProposalCore, ProposalId, RunReport, VotingState};

use crate::{
    config::{require, vars},
    executor::{AccountAction, Precondition, RunOptions, Target, Verification},
    workflows::{Harness, WorkflowKind},
};

/// Pause between voters.
pub const DEFAULT_VOTE_DELAY: Duration = Duration::from_millis(1000);

struct CastVote {
    proposal_id: ProposalId,
    core: ProposalCore,
    support: bool,
}

#[async_trait]
impl AccountAction for CastVote {
    fn operation(&self) -> &'static str {
        ops::VOTE
    }

    async fn precondition(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Precondition, ChainError> {
        if !ledger.is_member(self.core.space_id, target.address).await? {
            return Ok(Precondition::Skip(format!(
                "not a member of space {}",
                self.core.space_id
            )));
        }
        if ledger.has_voted(self.proposal_id, target.address).await? {
            return Ok(Precondition::Skip(format!("already voted on proposal {}", self.proposal_id)));
        }
        Ok(Precondition::Proceed)
    }

    async fn submit(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Settlement, ChainError> {
        ledger.vote(target.address, self.proposal_id, self.support).await
    }

    fn confirmation(&self) -> Option<B256> {
        Some(DaoProposals::VoteCast::SIGNATURE_HASH)
    }

    async fn verify(
        &self,
        ledger: &dyn LedgerClient,
        target: &Target,
        _settlement: &Settlement,
    ) -> Result<Verification, ChainError> {
        Ok(Verification::matches(
            ledger.has_voted(self.proposal_id, target.address).await?,
        ))
    }
}

fn describe(proposal_id: ProposalId, core: &ProposalCore) -> String {
    format!(
        "proposal {proposal_id} in space {} by {}: \"{}\", yes {}, no {}, voting power {}, window {}..{}",
        core.space_id,
        core.creator,
        core.question,
        core.yes_votes,
        core.no_votes,
        core.total_voting_power,
        core.start_time,
        core.end_time
    )
}

impl Harness {
    /// Every eligible account votes `support` on the configured proposal,
    /// waiting `delay` between voters.
    pub async fn vote(&self, support: bool, delay: Duration) -> Result<RunReport> {
        let workflow = WorkflowKind::Vote;
        self.prepare(workflow)?;
        let proposal_id = require(self.config.proposal_id, vars::PROPOSAL_ID, workflow)?;

        let core = self.ledger().proposal_core(proposal_id).await?;
        self.note(describe(proposal_id, &core));

        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        match core.voting_state(now) {
            VotingState::Open => {}
            VotingState::NotStarted => {
                return Err(self.abort(workflow, format!("voting on proposal {proposal_id} has not started")));
            }
            VotingState::Ended => {
                return Err(self.abort(workflow, format!("voting on proposal {proposal_id} has ended")));
            }
            VotingState::Executed => {
                return Err(self.abort(workflow, format!("proposal {proposal_id} was already executed")));
            }
        }

        let action = CastVote {
            proposal_id,
            core,
            support,
        };
        let report = self
            .drive(
                workflow,
                &action,
                &self.every_account(),
                RunOptions { delay: Some(delay) },
            )
            .await;

        let tallied = self.ledger().proposal_core(proposal_id).await?;
        self.note(format!(
            "proposal {proposal_id} tally: yes {}, no {}",
            tallied.yes_votes, tallied.no_votes
        ));
        Ok(report)
    }
}
