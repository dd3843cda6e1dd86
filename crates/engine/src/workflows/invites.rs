//! Invite creation, one invitee at a time or as a single batch.
//!
//! The first account is the inviter; every other account is an invitee.

use alloy::{
    primitives::{Address, B256},
    sol_types::SolEvent,
};
use anyhow::Result;
use async_trait::async_trait;
use daoscript_chain::{ChainError, LedgerClient, Settlement, bindings::InviteSystem, client::ops};
use daoscript_types::{AccountOutcome, RunReport, SpaceId};
use tracing::warn;

use crate::{
    config::{require, vars},
    executor::{
        AccountAction, Precondition, RunOptions, RunRecorder, Target, Verification, reverted_outcome, verified_outcome,
    },
    workflows::{Harness, WorkflowKind},
};

struct CreateInvite {
    inviter: Address,
    space_id: SpaceId,
}

#[async_trait]
impl AccountAction for CreateInvite {
    fn operation(&self) -> &'static str {
        ops::CREATE_INVITE
    }

    fn signer(&self, _target: &Target) -> Address {
        self.inviter
    }

    async fn precondition(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Precondition, ChainError> {
        if ledger.has_invite(target.address, self.space_id).await? {
            return Ok(Precondition::Skip(format!("already invited to space {}", self.space_id)));
        }
        Ok(Precondition::Proceed)
    }

    async fn submit(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Settlement, ChainError> {
        ledger.create_invite(self.inviter, target.address, self.space_id).await
    }

    fn confirmation(&self) -> Option<B256> {
        Some(InviteSystem::InviteCreated::SIGNATURE_HASH)
    }

    async fn verify(
        &self,
        ledger: &dyn LedgerClient,
        target: &Target,
        _settlement: &Settlement,
    ) -> Result<Verification, ChainError> {
        Ok(Verification::matches(
            ledger.has_invite(target.address, self.space_id).await?,
        ))
    }
}

impl Harness {
    /// Returns the inviter and the space once the inviter's membership is
    /// confirmed.
    async fn inviter(&self, workflow: WorkflowKind) -> Result<(Address, SpaceId)> {
        self.prepare(workflow)?;
        let space_id = require(self.config.space_id, vars::TEST_SPACE_ID, workflow)?;
        let inviter = self.lead(workflow)?.address;

        if !self.ledger().is_member(space_id, inviter).await? {
            return Err(self.abort(workflow, format!("inviter {inviter} is not a member of space {space_id}")));
        }
        Ok((inviter, space_id))
    }

    fn invitees(&self) -> Vec<Target> {
        self.every_account().into_iter().skip(1).collect()
    }

    /// One `createInvite` per invitee.
    pub async fn invite(&self) -> Result<RunReport> {
        let workflow = WorkflowKind::Invite;
        let (inviter, space_id) = self.inviter(workflow).await?;
        let action = CreateInvite { inviter, space_id };
        Ok(self
            .drive(workflow, &action, &self.invitees(), RunOptions::default())
            .await)
    }

    /// A single `createBatchInvites` for every invitee, then one
    /// `checkJoin` read per invitee.
    pub async fn batch_invite(&self) -> Result<RunReport> {
        let workflow = WorkflowKind::BatchInvite;
        let (inviter, space_id) = self.inviter(workflow).await?;
        let invitees = self.invitees();
        if invitees.is_empty() {
            return Err(self.abort(workflow, "no invitees besides the inviter"));
        }

        let addresses: Vec<Address> = invitees.iter().map(|target| target.address).collect();
        let mut recorder = RunRecorder::start(
            workflow.name(),
            ops::CREATE_BATCH_INVITES,
            invitees.len(),
            self.events.as_ref(),
        );
        let submitted = self.ledger().create_batch_invites(inviter, &addresses, space_id).await;

        for target in &invitees {
            recorder.begin_target(target);
            let outcome = match &submitted {
                Ok(settlement) => self.batch_outcome(settlement, space_id, target.address).await,
                Err(error) => shared_failure(error),
            };
            recorder.record(self.ledger(), inviter, target, outcome).await;
        }

        Ok(recorder.finish())
    }

    async fn batch_outcome(&self, settlement: &Settlement, space_id: SpaceId, invitee: Address) -> AccountOutcome {
        if !settlement.succeeded {
            return reverted_outcome(ops::CREATE_BATCH_INVITES, settlement);
        }

        let event_present = settlement.has_event(InviteSystem::BatchInvitesCreated::SIGNATURE_HASH);
        let state_matches = match self.ledger().has_invite(invitee, space_id).await {
            Ok(invited) => invited,
            Err(error) => {
                warn!(account = %invitee, %error, "verification read failed");
                false
            }
        };
        verified_outcome(settlement, event_present, state_matches)
    }
}

/// The batch call failed as a whole; every invitee shares its outcome.
fn shared_failure(error: &ChainError) -> AccountOutcome {
    match error.rejection() {
        Some(rejection) => AccountOutcome::Rejected {
            reason: rejection.reason.clone(),
            detail: rejection.detail.clone(),
        },
        None => AccountOutcome::Failed {
            error: error.to_string(),
        },
    }
}
