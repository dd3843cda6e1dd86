//! Space membership: joining a space and creating spaces.

use alloy::{
    primitives::{B256, U256},
    sol_types::SolEvent,
};
use anyhow::Result;
use async_trait::async_trait;
use daoscript_chain::{ChainError, EventLog, LedgerClient, Settlement, bindings::DaoSpaceFactory, client::ops};
use daoscript_types::{RunReport, SpaceId, SpaceRequest};

use crate::{
    config::{require, vars},
    executor::{AccountAction, Precondition, RunOptions, Target, Verification},
    workflows::{Harness, WorkflowKind},
};

/// Join-space report plus the member counts read around it.
#[derive(Debug, Clone)]
pub struct JoinSpaceRun {
    pub report: RunReport,
    pub initial_members: usize,
    pub final_members: usize,
}

impl JoinSpaceRun {
    pub fn added(&self) -> usize {
        self.final_members.saturating_sub(self.initial_members)
    }
}

struct JoinSpace {
    space_id: SpaceId,
    join_method: Option<U256>,
}

#[async_trait]
impl AccountAction for JoinSpace {
    fn operation(&self) -> &'static str {
        ops::JOIN_SPACE
    }

    async fn precondition(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Precondition, ChainError> {
        if ledger.is_member(self.space_id, target.address).await? {
            return Ok(Precondition::Skip(format!("already a member of space {}", self.space_id)));
        }
        if let Some(method) = self.join_method
            && !ledger.join_check(self.space_id, method, target.address).await?
        {
            return Ok(Precondition::Skip(format!("does not meet join method {method}")));
        }
        Ok(Precondition::Proceed)
    }

    async fn submit(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Settlement, ChainError> {
        ledger.join_space(target.address, self.space_id).await
    }

    fn confirmation(&self) -> Option<B256> {
        Some(DaoSpaceFactory::MemberJoined::SIGNATURE_HASH)
    }

    async fn verify(
        &self,
        ledger: &dyn LedgerClient,
        target: &Target,
        _settlement: &Settlement,
    ) -> Result<Verification, ChainError> {
        let member = ledger.is_member(self.space_id, target.address).await?;
        Ok(Verification::matches(member))
    }
}

struct CreateSpace;

#[async_trait]
impl AccountAction for CreateSpace {
    fn operation(&self) -> &'static str {
        ops::CREATE_SPACE
    }

    async fn submit(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Settlement, ChainError> {
        ledger
            .create_space(target.address, &SpaceRequest::numbered(target.index + 1))
            .await
    }

    fn confirmation(&self) -> Option<B256> {
        Some(DaoSpaceFactory::SpaceCreated::SIGNATURE_HASH)
    }

    async fn verify(
        &self,
        ledger: &dyn LedgerClient,
        target: &Target,
        settlement: &Settlement,
    ) -> Result<Verification, ChainError> {
        let Some(space_id) = settlement
            .find_event(DaoSpaceFactory::SpaceCreated::SIGNATURE_HASH)
            .and_then(EventLog::leading_id)
        else {
            return Ok(Verification::matches(false));
        };

        let members = ledger.space_members(space_id).await?;
        let executor = ledger.space_executor(space_id).await?;
        Ok(Verification::matches(members.first() == Some(&target.address))
            .with_note(format!("space {space_id} created with executor {executor}")))
    }
}

impl Harness {
    /// Every account joins the configured space.
    pub async fn join_space(&self) -> Result<JoinSpaceRun> {
        let workflow = WorkflowKind::JoinSpace;
        self.prepare(workflow)?;
        let space_id = require(self.config.space_id, vars::TEST_SPACE_ID, workflow)?;

        let initial_members = self.ledger().space_members(space_id).await?.len();
        self.note(format!("space {space_id} has {initial_members} members"));

        let action = JoinSpace {
            space_id,
            join_method: self.config.join_method,
        };
        let report = self
            .drive(workflow, &action, &self.every_account(), RunOptions::default())
            .await;

        let final_members = self.ledger().space_members(space_id).await?.len();
        let run = JoinSpaceRun {
            report,
            initial_members,
            final_members,
        };
        self.note(format!(
            "space {space_id} members: initial {initial_members}, final {final_members}, added {}",
            run.added()
        ));
        Ok(run)
    }

    /// Every account creates its own numbered space.
    pub async fn create_spaces(&self) -> Result<RunReport> {
        let workflow = WorkflowKind::CreateSpace;
        self.prepare(workflow)?;
        Ok(self
            .drive(workflow, &CreateSpace, &self.every_account(), RunOptions::default())
            .await)
    }
}
