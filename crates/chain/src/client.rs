//! The ledger seam the workflows are written against.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use daoscript_types::{ProfileFields, ProposalCore, ProposalId, ProposalRequest, SpaceId, SpaceRequest};

use crate::{ChainError, Settlement};

/// Operation labels, named after the contract entry point they drive.
pub mod ops {
    pub const IS_MEMBER: &str = "isMember";
    pub const GET_SPACE_MEMBERS: &str = "getSpaceMembers";
    pub const GET_SPACE_EXECUTOR: &str = "getSpaceExecutor";
    pub const CREATE_SPACE: &str = "createSpace";
    pub const JOIN_SPACE: &str = "joinSpace";
    pub const JOIN_CHECK: &str = "joinCheck";
    pub const CHECK_JOIN: &str = "checkJoin";
    pub const CREATE_INVITE: &str = "createInvite";
    pub const CREATE_BATCH_INVITES: &str = "createBatchInvites";
    pub const HAS_PROFILE: &str = "hasProfile";
    pub const CREATE_PROFILE: &str = "createProfile";
    pub const EDIT_PROFILE: &str = "editProfile";
    pub const DELETE_PROFILE: &str = "deleteProfile";
    pub const GET_PROPOSAL_CORE: &str = "getProposalCore";
    pub const HAS_VOTED: &str = "hasVoted";
    pub const CREATE_PROPOSAL: &str = "createProposal";
    pub const EDIT_PROPOSAL: &str = "editProposal";
    pub const VOTE: &str = "vote";
    pub const GET_BALANCE: &str = "getBalance";
    pub const TRANSFER: &str = "transfer";
}

/// Read and write access to the deployed contract suite.
///
/// Reads are view calls. Writes are signed by the account registered for
/// `from`, block until the receipt is available, and return it as a
/// [`Settlement`]; a reverted receipt is returned, not raised.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn is_member(&self, space_id: SpaceId, user: Address) -> Result<bool, ChainError>;

    async fn space_members(&self, space_id: SpaceId) -> Result<Vec<Address>, ChainError>;

    async fn space_executor(&self, space_id: SpaceId) -> Result<Address, ChainError>;

    async fn create_space(&self, from: Address, request: &SpaceRequest) -> Result<Settlement, ChainError>;

    async fn join_space(&self, from: Address, space_id: SpaceId) -> Result<Settlement, ChainError>;

    /// Ask the join-method directory whether `user` satisfies `join_method`
    /// for the space.
    async fn join_check(&self, space_id: SpaceId, join_method: U256, user: Address) -> Result<bool, ChainError>;

    /// Whether an invite exists for `invitee` in the space.
    async fn has_invite(&self, invitee: Address, space_id: SpaceId) -> Result<bool, ChainError>;

    async fn create_invite(&self, from: Address, invitee: Address, space_id: SpaceId) -> Result<Settlement, ChainError>;

    async fn create_batch_invites(
        &self,
        from: Address,
        invitees: &[Address],
        space_id: SpaceId,
    ) -> Result<Settlement, ChainError>;

    async fn has_profile(&self, user: Address) -> Result<bool, ChainError>;

    async fn create_profile(&self, from: Address, profile: &ProfileFields) -> Result<Settlement, ChainError>;

    async fn edit_profile(&self, from: Address, profile: &ProfileFields) -> Result<Settlement, ChainError>;

    async fn delete_profile(&self, from: Address) -> Result<Settlement, ChainError>;

    async fn proposal_core(&self, proposal_id: ProposalId) -> Result<ProposalCore, ChainError>;

    async fn has_voted(&self, proposal_id: ProposalId, voter: Address) -> Result<bool, ChainError>;

    async fn create_proposal(&self, from: Address, request: &ProposalRequest) -> Result<Settlement, ChainError>;

    async fn edit_proposal(
        &self,
        from: Address,
        proposal_id: ProposalId,
        request: &ProposalRequest,
    ) -> Result<Settlement, ChainError>;

    async fn vote(&self, from: Address, proposal_id: ProposalId, support: bool) -> Result<Settlement, ChainError>;

    async fn balance(&self, account: Address) -> Result<U256, ChainError>;

    /// Plain native-token transfer, no call data.
    async fn transfer_native(&self, from: Address, to: Address, amount: U256) -> Result<Settlement, ChainError>;
}
