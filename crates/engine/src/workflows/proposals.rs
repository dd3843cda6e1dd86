//! Proposal creation and editing.
//!
//! A proposal carries a nested call (`targetContract` + `executionData` +
//! `value`) that the space executor performs once the proposal passes. The
//! payload kinds below build that nested call; the proposals contract ABI
//! revision is chosen by the ledger client from configuration.

use std::sync::{Mutex, PoisonError};

use alloy::{
    primitives::{Address, B256, Bytes, U256},
    sol_types::SolEvent,
};
use anyhow::Result;
use async_trait::async_trait;
use daoscript_chain::{
    ChainError, EventLog, LedgerClient, Settlement,
    bindings::DaoProposals,
    client::ops,
    payload::{self, WorkAssignment},
    units::{NATIVE_DECIMALS, USDC_DECIMALS, format_amount},
};
use daoscript_types::{ProposalId, ProposalRequest, RunReport, SpaceId};

use crate::{
    config::{require, validate_proposal_value, vars},
    executor::{AccountAction, RunOptions, Target, Verification},
    workflows::{Harness, WorkflowKind},
};

pub const DAY_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_VOTING_DURATION: u64 = 7 * DAY_SECS;
pub const DEFAULT_EDIT_VOTING_DURATION: u64 = 10 * DAY_SECS;

/// The nested call a proposal executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalPayload {
    /// ERC20 `transfer` from the space treasury, targeted at the token.
    Erc20Transfer {
        token: Address,
        to: Address,
        amount: U256,
        symbol: String,
        decimals: u8,
    },
    /// Token `mint`, targeted at the token.
    Mint { token: Address, to: Address, amount: U256 },
    /// `removeMember` on the space factory. The member must belong to the
    /// space when the proposal is created.
    RemoveMember { member: Address },
    /// `joinSpace` on the space factory, joining `target_space` as the
    /// proposing space's executor.
    JoinSpace { target_space: SpaceId },
    /// `assignWork` on a work-proposal contract.
    AssignWork { contract: Address, work: WorkAssignment },
    /// Native transfer performed by the space executor: the executor is the
    /// target and the call data is `abi.encode(to, amount, "")`.
    NativeTransfer { to: Address, amount: U256 },
    /// Native value sent straight to `to` with the proposal's `value`.
    ValueTransfer { to: Address, amount: U256 },
}

impl ProposalPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            ProposalPayload::Erc20Transfer { .. } => "erc20-transfer",
            ProposalPayload::Mint { .. } => "mint",
            ProposalPayload::RemoveMember { .. } => "remove-member",
            ProposalPayload::JoinSpace { .. } => "join-space",
            ProposalPayload::AssignWork { .. } => "assign-work",
            ProposalPayload::NativeTransfer { .. } => "native-transfer",
            ProposalPayload::ValueTransfer { .. } => "value-transfer",
        }
    }

    fn default_question(&self) -> String {
        match self {
            ProposalPayload::Erc20Transfer { symbol, .. } => format!("{symbol} Transfer Proposal"),
            ProposalPayload::Mint { .. } => "Token Mint Proposal".to_string(),
            ProposalPayload::RemoveMember { .. } => "Remove Member Proposal".to_string(),
            ProposalPayload::JoinSpace { .. } => "Join Space Proposal".to_string(),
            ProposalPayload::AssignWork { .. } => "Assign Development Work".to_string(),
            ProposalPayload::NativeTransfer { .. } | ProposalPayload::ValueTransfer { .. } => {
                "ETH Transfer Proposal".to_string()
            }
        }
    }

    fn default_description(&self, space_id: SpaceId) -> String {
        match self {
            ProposalPayload::Erc20Transfer {
                to,
                amount,
                symbol,
                decimals,
                ..
            } => format!(
                "Proposal to transfer {} {symbol} from treasury to {to}",
                format_amount(*amount, *decimals)
            ),
            ProposalPayload::Mint { to, amount, .. } => format!(
                "Proposal to mint {} tokens to {to}",
                format_amount(*amount, NATIVE_DECIMALS)
            ),
            ProposalPayload::RemoveMember { member } => format!("Proposal to remove member {member} from the space"),
            ProposalPayload::JoinSpace { target_space } => {
                format!("Proposal for space {space_id} to join space {target_space}")
            }
            ProposalPayload::AssignWork { work, .. } => format!(
                "Proposal to assign work to {} for {} {}",
                work.worker,
                format_amount(work.amount, USDC_DECIMALS),
                work.token_symbol
            ),
            ProposalPayload::NativeTransfer { to, amount } | ProposalPayload::ValueTransfer { to, amount } => {
                format!("Proposal to transfer {} ETH to {to}", format_amount(*amount, NATIVE_DECIMALS))
            }
        }
    }
}

/// Work assignment used by the assign-work payload.
pub fn development_task(space_id: SpaceId, worker: Address, amount: U256, duration_secs: u64) -> WorkAssignment {
    WorkAssignment {
        space_id,
        worker,
        title: "Development Task".to_string(),
        description: "Implement new feature XYZ".to_string(),
        duration: U256::from(duration_secs),
        amount,
        token_symbol: "USDC".to_string(),
        responsibilities: [
            "Design system architecture",
            "Implement core functionality",
            "Write tests",
            "Document code",
        ]
        .map(String::from)
        .to_vec(),
    }
}

/// Revised work assignment used when editing an assign-work proposal.
pub fn updated_development_task(space_id: SpaceId, worker: Address, amount: U256, duration_secs: u64) -> WorkAssignment {
    WorkAssignment {
        title: "Updated Development Task".to_string(),
        description: "Updated implementation of feature XYZ with additional requirements".to_string(),
        responsibilities: [
            "Updated system architecture design",
            "Implementation of enhanced functionality",
            "Comprehensive testing suite",
            "Detailed documentation",
            "Performance optimization",
        ]
        .map(String::from)
        .to_vec(),
        ..development_task(space_id, worker, amount, duration_secs)
    }
}

/// Everything needed to submit a proposal except where it is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalDraft {
    pub payload: ProposalPayload,
    /// Defaults to a per-payload question.
    pub question: Option<String>,
    /// Defaults to a per-payload description.
    pub description: Option<String>,
    /// Voting window in seconds.
    pub voting_duration: u64,
}

impl ProposalDraft {
    pub fn new(payload: ProposalPayload) -> Self {
        Self {
            payload,
            question: None,
            description: None,
            voting_duration: DEFAULT_VOTING_DURATION,
        }
    }
}

/// Proposal run report plus the id the run created or edited.
#[derive(Debug, Clone)]
pub struct ProposalRun {
    pub report: RunReport,
    pub proposal_id: Option<ProposalId>,
}

struct CreateProposal {
    request: ProposalRequest,
    created: Mutex<Option<ProposalId>>,
}

#[async_trait]
impl AccountAction for CreateProposal {
    fn operation(&self) -> &'static str {
        ops::CREATE_PROPOSAL
    }

    async fn submit(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Settlement, ChainError> {
        ledger.create_proposal(target.address, &self.request).await
    }

    fn confirmation(&self) -> Option<B256> {
        Some(DaoProposals::ProposalCreated::SIGNATURE_HASH)
    }

    async fn verify(
        &self,
        ledger: &dyn LedgerClient,
        target: &Target,
        settlement: &Settlement,
    ) -> Result<Verification, ChainError> {
        let Some(proposal_id) = settlement
            .find_event(DaoProposals::ProposalCreated::SIGNATURE_HASH)
            .and_then(EventLog::leading_id)
        else {
            return Ok(Verification::matches(false));
        };
        *self.created.lock().unwrap_or_else(PoisonError::into_inner) = Some(proposal_id);

        let core = ledger.proposal_core(proposal_id).await?;
        let matches = core.space_id == self.request.space_id && core.creator == target.address;
        Ok(Verification::matches(matches).with_note(format!(
            "proposal {proposal_id} created in space {}: voting {} to {}",
            core.space_id, core.start_time, core.end_time
        )))
    }
}

struct EditProposal {
    proposal_id: ProposalId,
    request: ProposalRequest,
}

#[async_trait]
impl AccountAction for EditProposal {
    fn operation(&self) -> &'static str {
        ops::EDIT_PROPOSAL
    }

    async fn submit(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Settlement, ChainError> {
        ledger
            .edit_proposal(target.address, self.proposal_id, &self.request)
            .await
    }

    fn confirmation(&self) -> Option<B256> {
        Some(DaoProposals::ProposalEdited::SIGNATURE_HASH)
    }

    async fn verify(
        &self,
        ledger: &dyn LedgerClient,
        _target: &Target,
        _settlement: &Settlement,
    ) -> Result<Verification, ChainError> {
        let core = ledger.proposal_core(self.proposal_id).await?;
        Ok(Verification::matches(core.question == self.request.question))
    }
}

impl Harness {
    /// The first account proposes `draft` in the configured space.
    pub async fn create_proposal(&self, draft: ProposalDraft) -> Result<ProposalRun> {
        let workflow = WorkflowKind::CreateProposal;
        self.prepare(workflow)?;
        let space_id = require(self.config.space_id, vars::TEST_SPACE_ID, workflow)?;
        let proposer = self.lead(workflow)?.address;

        if !self.ledger().is_member(space_id, proposer).await? {
            return Err(self.abort(workflow, format!("proposer {proposer} is not a member of space {space_id}")));
        }

        let request = self.proposal_request(workflow, space_id, &draft).await?;
        let action = CreateProposal {
            request,
            created: Mutex::new(None),
        };
        let report = self
            .drive(workflow, &action, &Target::list([proposer]), RunOptions::default())
            .await;
        let proposal_id = action.created.into_inner().unwrap_or_else(PoisonError::into_inner);
        Ok(ProposalRun { report, proposal_id })
    }

    /// The first account replaces the configured proposal's parameters.
    pub async fn edit_proposal(&self, draft: ProposalDraft) -> Result<ProposalRun> {
        let workflow = WorkflowKind::EditProposal;
        self.prepare(workflow)?;
        let space_id = require(self.config.space_id, vars::TEST_SPACE_ID, workflow)?;
        let proposal_id = require(self.config.proposal_id, vars::PROPOSAL_ID, workflow)?;
        let editor = self.lead(workflow)?.address;

        let request = self.proposal_request(workflow, space_id, &draft).await?;
        let action = EditProposal { proposal_id, request };
        let report = self
            .drive(workflow, &action, &Target::list([editor]), RunOptions::default())
            .await;
        Ok(ProposalRun {
            report,
            proposal_id: Some(proposal_id),
        })
    }

    async fn proposal_request(
        &self,
        workflow: WorkflowKind,
        space_id: SpaceId,
        draft: &ProposalDraft,
    ) -> Result<ProposalRequest> {
        let (target, execution_data, value) = self.execution_call(workflow, space_id, &draft.payload).await?;
        validate_proposal_value(self.config.proposal_interface, value)?;

        let request = ProposalRequest {
            space_id,
            question: draft
                .question
                .clone()
                .unwrap_or_else(|| draft.payload.default_question()),
            description: draft
                .description
                .clone()
                .unwrap_or_else(|| draft.payload.default_description(space_id)),
            duration: U256::from(draft.voting_duration),
            target,
            execution_data,
            value,
        };
        self.note(format!(
            "{} proposal: target {target}, value {value}, voting {}s, interface {}",
            draft.payload.kind(),
            draft.voting_duration,
            self.config.proposal_interface
        ));
        Ok(request)
    }

    /// Resolve a payload into `(target, executionData, value)`.
    async fn execution_call(
        &self,
        workflow: WorkflowKind,
        space_id: SpaceId,
        payload: &ProposalPayload,
    ) -> Result<(Address, Bytes, U256)> {
        let call = match payload {
            ProposalPayload::Erc20Transfer { token, to, amount, .. } => {
                (*token, payload::erc20_transfer(*to, *amount), U256::ZERO)
            }
            ProposalPayload::Mint { token, to, amount } => (*token, payload::mint(*to, *amount), U256::ZERO),
            ProposalPayload::RemoveMember { member } => {
                let factory = require(
                    self.config.contracts.space_factory,
                    vars::DAO_SPACE_FACTORY_ADDRESS,
                    workflow,
                )?;
                if !self.ledger().is_member(space_id, *member).await? {
                    return Err(self.abort(workflow, format!("{member} is not a member of space {space_id}")));
                }
                (factory, payload::remove_member(space_id, *member), U256::ZERO)
            }
            ProposalPayload::JoinSpace { target_space } => {
                let factory = require(
                    self.config.contracts.space_factory,
                    vars::DAO_SPACE_FACTORY_ADDRESS,
                    workflow,
                )?;
                (factory, payload::join_space(*target_space), U256::ZERO)
            }
            ProposalPayload::AssignWork { contract, work } => (*contract, payload::assign_work(work), U256::ZERO),
            ProposalPayload::NativeTransfer { to, amount } => {
                let executor = self.ledger().space_executor(space_id).await?;
                if executor.is_zero() {
                    return Err(self.abort(workflow, format!("space {space_id} has no executor")));
                }
                self.note(format!("space {space_id} executor: {executor}"));
                (executor, payload::native_transfer(*to, *amount), U256::ZERO)
            }
            ProposalPayload::ValueTransfer { to, amount } => (*to, payload::value_transfer(), *amount),
        };
        Ok(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_texts_follow_the_payload() {
        let to = Address::with_last_byte(7);
        let usdc = ProposalPayload::Erc20Transfer {
            token: Address::with_last_byte(1),
            to,
            amount: U256::from(100u64),
            symbol: "USDC".into(),
            decimals: USDC_DECIMALS,
        };
        assert_eq!(usdc.default_question(), "USDC Transfer Proposal");
        assert!(usdc.default_description(U256::from(9u64)).contains("0.000100 USDC"));

        let join = ProposalPayload::JoinSpace {
            target_space: U256::from(12u64),
        };
        assert_eq!(
            join.default_description(U256::from(9u64)),
            "Proposal for space 9 to join space 12"
        );
    }

    #[test]
    fn updated_task_keeps_worker_and_terms() {
        let worker = Address::with_last_byte(3);
        let task = updated_development_task(U256::from(9u64), worker, U256::from(150_000_000u64), 45 * DAY_SECS);
        assert_eq!(task.worker, worker);
        assert_eq!(task.token_symbol, "USDC");
        assert_eq!(task.duration, U256::from(45 * DAY_SECS));
        assert_eq!(task.responsibilities.len(), 5);
        assert!(task.title.starts_with("Updated"));
    }
}
