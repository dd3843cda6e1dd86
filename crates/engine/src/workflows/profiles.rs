//! Profile create, edit and delete.
//!
//! The profile manager defines no confirmation events, so these runs are
//! verified by re-reading `hasProfile` alone.

use alloy::primitives::B256;
use anyhow::Result;
use async_trait::async_trait;
use daoscript_chain::{ChainError, LedgerClient, Settlement, client::ops};
use daoscript_types::{ProfileFields, RunReport};

use crate::{
    executor::{AccountAction, Precondition, RunOptions, Target, Verification},
    workflows::{Harness, WorkflowKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileOperation {
    Create,
    Edit,
    Delete,
}

impl ProfileOperation {
    fn workflow(self) -> WorkflowKind {
        match self {
            ProfileOperation::Create => WorkflowKind::CreateProfile,
            ProfileOperation::Edit => WorkflowKind::EditProfile,
            ProfileOperation::Delete => WorkflowKind::DeleteProfile,
        }
    }
}

struct ProfileAction(ProfileOperation);

#[async_trait]
impl AccountAction for ProfileAction {
    fn operation(&self) -> &'static str {
        match self.0 {
            ProfileOperation::Create => ops::CREATE_PROFILE,
            ProfileOperation::Edit => ops::EDIT_PROFILE,
            ProfileOperation::Delete => ops::DELETE_PROFILE,
        }
    }

    async fn precondition(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Precondition, ChainError> {
        let exists = ledger.has_profile(target.address).await?;
        Ok(match (self.0, exists) {
            (ProfileOperation::Create, true) => Precondition::Skip("profile already exists".into()),
            (ProfileOperation::Edit | ProfileOperation::Delete, false) => Precondition::Skip("no profile".into()),
            _ => Precondition::Proceed,
        })
    }

    async fn submit(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Settlement, ChainError> {
        let number = target.index + 1;
        match self.0 {
            ProfileOperation::Create => ledger.create_profile(target.address, &ProfileFields::created(number)).await,
            ProfileOperation::Edit => ledger.edit_profile(target.address, &ProfileFields::updated(number)).await,
            ProfileOperation::Delete => ledger.delete_profile(target.address).await,
        }
    }

    fn confirmation(&self) -> Option<B256> {
        None
    }

    async fn verify(
        &self,
        ledger: &dyn LedgerClient,
        target: &Target,
        _settlement: &Settlement,
    ) -> Result<Verification, ChainError> {
        let exists = ledger.has_profile(target.address).await?;
        Ok(Verification::matches(exists == (self.0 != ProfileOperation::Delete)))
    }
}

impl Harness {
    pub async fn profiles(&self, operation: ProfileOperation) -> Result<RunReport> {
        let workflow = operation.workflow();
        self.prepare(workflow)?;
        Ok(self
            .drive(workflow, &ProfileAction(operation), &self.every_account(), RunOptions::default())
            .await)
    }
}
