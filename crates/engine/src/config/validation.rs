//! Per-workflow configuration validation.

use alloy::primitives::U256;
use daoscript_chain::rpc::validate_endpoint;
use daoscript_types::ProposalInterface;
use thiserror::Error;
use tracing::debug;

use crate::{
    config::{HarnessConfig, vars},
    workflows::WorkflowKind,
};

/// Validate that `config` carries everything `workflow` needs.
///
/// Runs before any call is made; a failure here aborts the workflow with
/// nothing sent.
pub fn validate_config(config: &HarnessConfig, workflow: WorkflowKind) -> Result<(), ValidationError> {
    if config.rpc_url.trim().is_empty() {
        return Err(ValidationError::missing(vars::RPC_URL, workflow));
    }
    validate_endpoint(&config.rpc_url).map_err(|error| ValidationError::InvalidEndpoint {
        reason: error.to_string(),
    })?;

    let contracts = &config.contracts;
    match workflow {
        WorkflowKind::JoinSpace => {
            require(contracts.space_factory, vars::DAO_SPACE_FACTORY_ADDRESS, workflow)?;
            require(config.space_id, vars::TEST_SPACE_ID, workflow)?;
            if config.join_method.is_some() {
                require(contracts.join_method_directory, vars::JOIN_METHOD_DIRECTORY_ADDRESS, workflow)?;
            }
        }
        WorkflowKind::CreateSpace => {
            require(contracts.space_factory, vars::DAO_SPACE_FACTORY_ADDRESS, workflow)?;
        }
        WorkflowKind::Invite | WorkflowKind::BatchInvite => {
            require(contracts.space_factory, vars::DAO_SPACE_FACTORY_ADDRESS, workflow)?;
            require(contracts.invite_system, vars::INVITE_SYSTEM_ADDRESS, workflow)?;
            require(config.space_id, vars::TEST_SPACE_ID, workflow)?;
        }
        WorkflowKind::CreateProfile | WorkflowKind::EditProfile | WorkflowKind::DeleteProfile => {
            require(contracts.profile_manager, vars::PROFILE_CONTRACT_ADDRESS, workflow)?;
        }
        WorkflowKind::CreateProposal => {
            require(contracts.space_factory, vars::DAO_SPACE_FACTORY_ADDRESS, workflow)?;
            require(contracts.proposals, vars::DAO_PROPOSALS_ADDRESS, workflow)?;
            require(config.space_id, vars::TEST_SPACE_ID, workflow)?;
        }
        WorkflowKind::EditProposal => {
            require(contracts.proposals, vars::DAO_PROPOSALS_ADDRESS, workflow)?;
            require(config.space_id, vars::TEST_SPACE_ID, workflow)?;
            require(config.proposal_id, vars::PROPOSAL_ID, workflow)?;
            if !config.proposal_interface.supports_edit() {
                return Err(ValidationError::UnsupportedInterface {
                    workflow: workflow.name(),
                    interface: config.proposal_interface,
                });
            }
        }
        WorkflowKind::Vote => {
            require(contracts.space_factory, vars::DAO_SPACE_FACTORY_ADDRESS, workflow)?;
            require(contracts.proposals, vars::DAO_PROPOSALS_ADDRESS, workflow)?;
            require(config.proposal_id, vars::PROPOSAL_ID, workflow)?;
        }
        WorkflowKind::Fund => {
            if config.funder.is_none() {
                return Err(ValidationError::missing(vars::PRIVATE_KEY, workflow));
            }
        }
    }

    debug!(workflow = workflow.name(), "validated configuration");
    Ok(())
}

/// Unwrap a required setting or name it in the error.
pub fn require<T: Copy>(value: Option<T>, setting: &'static str, workflow: WorkflowKind) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::missing(setting, workflow))
}

/// Proposals carrying native value need an interface with a `value` slot.
pub fn validate_proposal_value(interface: ProposalInterface, value: U256) -> Result<(), ValidationError> {
    if !interface.carries_value() && !value.is_zero() {
        return Err(ValidationError::ValueNotSupported { interface });
    }
    Ok(())
}

/// Errors that can occur during validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{setting} is required for {workflow}")]
    MissingSetting {
        setting: &'static str,
        workflow: &'static str,
    },

    #[error("invalid RPC endpoint: {reason}")]
    InvalidEndpoint { reason: String },

    #[error("{workflow} is not available on the {interface} proposal interface")]
    UnsupportedInterface {
        workflow: &'static str,
        interface: ProposalInterface,
    },

    #[error("the {interface} proposal interface cannot carry a native value; set PROPOSAL_INTERFACE to flat-v2 or struct-v3")]
    ValueNotSupported { interface: ProposalInterface },
}

impl ValidationError {
    fn missing(setting: &'static str, workflow: WorkflowKind) -> Self {
        Self::MissingSetting {
            setting,
            workflow: workflow.name(),
        }
    }
}
