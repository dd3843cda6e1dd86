//! Execution payloads a passed proposal hands to its executor.
//!
//! These are ABI-encoded and embedded in a proposal's `executionData`; they
//! are never sent as transactions themselves.

use alloy::{
    primitives::{Address, Bytes, U256},
    sol_types::{SolCall, SolValue},
};

use crate::bindings::{DaoSpaceFactory, Erc20, MintableToken, WorkProposal};

/// ERC20 `transfer(to, amount)` against the token contract.
pub fn erc20_transfer(to: Address, amount: U256) -> Bytes {
    Erc20::transferCall { to, amount }.abi_encode().into()
}

/// Token `mint(to, amount)` against a mintable token.
pub fn mint(to: Address, amount: U256) -> Bytes {
    MintableToken::mintCall { to, amount }.abi_encode().into()
}

/// Space factory `removeMember(spaceId, member)`.
pub fn remove_member(space_id: U256, member: Address) -> Bytes {
    DaoSpaceFactory::removeMemberCall {
        _spaceId: space_id,
        _memberToRemove: member,
    }
    .abi_encode()
    .into()
}

/// Space factory `joinSpace(spaceId)`, executed by the proposing space's
/// executor to join another space.
pub fn join_space(space_id: U256) -> Bytes {
    DaoSpaceFactory::joinSpaceCall { _spaceId: space_id }.abi_encode().into()
}

/// Work assignment parameters for [`assign_work`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkAssignment {
    pub space_id: U256,
    pub worker: Address,
    pub title: String,
    pub description: String,
    /// Seconds.
    pub duration: U256,
    pub amount: U256,
    pub token_symbol: String,
    pub responsibilities: Vec<String>,
}

pub fn assign_work(work: &WorkAssignment) -> Bytes {
    WorkProposal::assignWorkCall {
        _spaceId: work.space_id,
        _worker: work.worker,
        _title: work.title.clone(),
        _description: work.description.clone(),
        _duration: work.duration,
        _amount: work.amount,
        _tokenSymbol: work.token_symbol.clone(),
        _responsibilities: work.responsibilities.clone(),
    }
    .abi_encode()
    .into()
}

/// Native-token transfer decoded by the space executor: the plain tuple
/// `(address recipient, uint256 amount, bytes data)` with empty call data,
/// no selector.
pub fn native_transfer(recipient: Address, amount: U256) -> Bytes {
    (recipient, amount, Bytes::new()).abi_encode_params().into()
}

/// Minimal non-empty call data for a proposal whose target is a plain
/// recipient and whose `value` carries the transfer.
pub fn value_transfer() -> Bytes {
    Bytes::from_static(&[0x00])
}
