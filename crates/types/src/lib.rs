//! Shared type definitions for the daoscript workspace.
//!
//! Everything here is a local view of state owned by the remote contracts:
//! requests the harness sends, tuples it reads back, and the per-account
//! outcomes it reports. Nothing in this crate talks to the network.

use std::{fmt, str::FromStr};

use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

pub mod rejection;
pub mod run;

pub use rejection::RejectionReason;
pub use run::{AccountOutcome, AccountResult, RunEvent, RunReport, RunSummary};

/// Identifier of a space on the space factory contract.
pub type SpaceId = U256;
/// Identifier of a proposal on the proposals contract.
pub type ProposalId = U256;

/// Selects which `createProposal`/`editProposal` ABI the deployed proposals
/// contract exposes.
///
/// Deployments differ in argument shape: the first revision takes six flat
/// arguments, the second appends a trailing `value`, and the current one
/// takes a single params struct (and is the only one with `editProposal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProposalInterface {
    /// `createProposal(uint256,string,string,uint256,address,bytes)`
    FlatV1,
    /// `createProposal(uint256,string,string,uint256,address,bytes,uint256)`
    FlatV2,
    /// `createProposal((uint256,string,string,uint256,address,bytes,uint256))`
    #[default]
    StructV3,
}

impl ProposalInterface {
    /// Whether proposals encoded for this revision carry a native `value`.
    pub fn carries_value(self) -> bool {
        !matches!(self, ProposalInterface::FlatV1)
    }

    /// Whether the revision exposes `editProposal`.
    pub fn supports_edit(self) -> bool {
        matches!(self, ProposalInterface::StructV3)
    }
}

impl fmt::Display for ProposalInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalInterface::FlatV1 => write!(f, "flat-v1"),
            ProposalInterface::FlatV2 => write!(f, "flat-v2"),
            ProposalInterface::StructV3 => write!(f, "struct-v3"),
        }
    }
}

impl FromStr for ProposalInterface {
    type Err = ParseInterfaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat-v1" | "v1" => Ok(ProposalInterface::FlatV1),
            "flat-v2" | "v2" => Ok(ProposalInterface::FlatV2),
            "struct-v3" | "v3" | "struct" => Ok(ProposalInterface::StructV3),
            other => Err(ParseInterfaceError::new("proposal", other)),
        }
    }
}

/// Selects which `createSpace` ABI the deployed space factory exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpaceInterface {
    /// Eight flat arguments, no token creation.
    Legacy,
    /// Single params struct including the token fields.
    #[default]
    Struct,
}

impl fmt::Display for SpaceInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpaceInterface::Legacy => write!(f, "legacy"),
            SpaceInterface::Struct => write!(f, "struct"),
        }
    }
}

impl FromStr for SpaceInterface {
    type Err = ParseInterfaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "flat" => Ok(SpaceInterface::Legacy),
            "struct" => Ok(SpaceInterface::Struct),
            other => Err(ParseInterfaceError::new("space", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} interface version '{value}'")]
pub struct ParseInterfaceError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseInterfaceError {
    fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self { kind, value: value.into() }
    }
}

/// Parameters for creating a space.
///
/// The legacy interface ignores the token fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceRequest {
    pub name: String,
    pub description: String,
    pub image_url: String,
    /// Unity requirement in percent.
    pub unity: U256,
    /// Quorum requirement in percent.
    pub quorum: U256,
    pub voting_power_source: U256,
    pub exit_method: U256,
    pub join_method: U256,
    pub create_token: bool,
    pub token_name: String,
    pub token_symbol: String,
}

impl SpaceRequest {
    /// Test fixture used when every account in a batch creates its own space.
    pub fn numbered(index: usize) -> Self {
        Self {
            name: format!("Test Space {index}"),
            description: format!("This is a test space number {index}"),
            image_url: format!("https://example.com/space-{index}.jpg"),
            unity: U256::from(51u64),
            quorum: U256::from(51u64),
            voting_power_source: U256::from(1u64),
            exit_method: U256::from(2u64),
            join_method: U256::from(2u64),
            create_token: true,
            token_name: "token".to_string(),
            token_symbol: "SPS".to_string(),
        }
    }
}

/// Username, description and image reference stored by the profile manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFields {
    pub username: String,
    pub description: String,
    pub image: String,
}

impl ProfileFields {
    pub fn created(index: usize) -> Self {
        Self {
            username: format!("TestUser{index}"),
            description: format!("Test description for user {index}"),
            image: format!("ipfs://test-hash-{index}"),
        }
    }

    pub fn updated(index: usize) -> Self {
        Self {
            username: format!("UpdatedUser{index}"),
            description: format!("Updated description for user {index}"),
            image: format!("ipfs://updated-hash-{index}"),
        }
    }
}

/// Version-independent proposal parameters.
///
/// Encoding into the flat or struct ABI happens in the chain bindings,
/// selected by [`ProposalInterface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRequest {
    pub space_id: SpaceId,
    pub question: String,
    pub description: String,
    /// Voting window length in seconds.
    pub duration: U256,
    /// Contract the executor calls once the proposal passes.
    pub target: Address,
    /// ABI-encoded call the executor performs against `target`.
    pub execution_data: Bytes,
    /// Native value forwarded with the execution.
    pub value: U256,
}

/// Read-back of `getProposalCore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalCore {
    pub space_id: SpaceId,
    pub question: String,
    pub description: String,
    /// Unix seconds.
    pub start_time: u64,
    /// Unix seconds.
    pub end_time: u64,
    pub executed: bool,
    pub expired: bool,
    pub yes_votes: U256,
    pub no_votes: U256,
    pub total_voting_power: U256,
    pub creator: Address,
}

/// Where a proposal sits relative to its voting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotingState {
    NotStarted,
    Open,
    Ended,
    Executed,
}

impl ProposalCore {
    /// Classify the proposal against `now` (unix seconds).
    ///
    /// Execution wins over the window: an executed proposal is never open.
    pub fn voting_state(&self, now: u64) -> VotingState {
        if self.executed {
            VotingState::Executed
        } else if now < self.start_time {
            VotingState::NotStarted
        } else if now > self.end_time || self.expired {
            VotingState::Ended
        } else {
            VotingState::Open
        }
    }
}
