//! In-memory [`LedgerClient`] for tests.
//!
//! The simulated contracts enforce the same rules the deployed ones reject
//! on (membership, duplicate invites, double votes), emit real ABI-encoded
//! logs, and record every read and write so callers can assert on exactly
//! which calls a workflow issued. Individual calls can be scripted to be
//! refused, to settle without their event, or to settle without their
//! effect.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
    time::{SystemTime, UNIX_EPOCH},
};

use alloy::{
    primitives::{Address, B256, U256, keccak256},
    sol_types::SolEvent,
};
use async_trait::async_trait;
use daoscript_types::{
    ProfileFields, ProposalCore, ProposalId, ProposalInterface, ProposalRequest, SpaceId, SpaceRequest,
};

use crate::{
    ChainError, EventLog, LedgerClient, Settlement,
    bindings::{DaoProposals, DaoSpaceFactory, InviteSystem},
    client::ops,
};

/// JSON-RPC error code nodes use for execution reverts.
const REVERT_CODE: i64 = 3;
const INVITE_LIFETIME_SECS: u64 = 7 * 24 * 60 * 60;

const SPACE_FACTORY: Address = Address::new([0xfa; 20]);
const INVITE_SYSTEM: Address = Address::new([0x1e; 20]);
const PROPOSALS: Address = Address::new([0xd0; 20]);

/// Scripted behavior for a matching call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// Refuse the call as the node would: an error response carrying an
    /// optional decoded revert reason and a message.
    Reject {
        revert_reason: Option<String>,
        message: String,
    },
    /// Settle successfully but omit the confirmation event.
    DropEvent,
    /// Settle and emit the event, but leave state unchanged.
    DropEffect,
    /// Settle with a failed receipt: no event, no effect.
    RevertReceipt,
}

impl Scripted {
    /// Refusal with a decoded revert reason.
    pub fn revert(reason: impl Into<String>) -> Self {
        Scripted::Reject {
            revert_reason: Some(reason.into()),
            message: "execution reverted".to_string(),
        }
    }

    /// Refusal with only a node message.
    pub fn error(message: impl Into<String>) -> Self {
        Scripted::Reject {
            revert_reason: None,
            message: message.into(),
        }
    }
}

/// One call observed by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub operation: &'static str,
    /// Signer for writes; `None` for view calls.
    pub from: Option<Address>,
}

#[derive(Debug, Clone)]
struct Rule {
    operation: &'static str,
    account: Option<Address>,
    action: Scripted,
}

#[derive(Debug, Clone, Default)]
struct Space {
    members: Vec<Address>,
    executor: Address,
    join_blocked: HashSet<Address>,
    join_check_denied: HashSet<Address>,
}

/// Contract-owned state. Cloned as a scratch copy for every write so a
/// refused or effect-less call can be discarded.
#[derive(Debug, Clone, Default)]
struct Contracts {
    spaces: BTreeMap<U256, Space>,
    next_space_id: u64,
    invites: HashSet<(U256, Address)>,
    profiles: HashMap<Address, ProfileFields>,
    proposals: BTreeMap<U256, ProposalCore>,
    next_proposal_id: u64,
    votes: HashSet<(U256, Address)>,
    balances: HashMap<Address, U256>,
}

#[derive(Debug)]
struct State {
    contracts: Contracts,
    proposal_interface: ProposalInterface,
    now: u64,
    block: u64,
    rules: Vec<Rule>,
    writes: Vec<CallRecord>,
    reads: Vec<CallRecord>,
}

/// In-memory stand-in for the deployed contract suite.
#[derive(Debug)]
pub struct SimulatedLedger {
    state: Mutex<State>,
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLedger {
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        Self {
            state: Mutex::new(State {
                contracts: Contracts {
                    next_space_id: 1,
                    next_proposal_id: 1,
                    ..Contracts::default()
                },
                proposal_interface: ProposalInterface::default(),
                now,
                block: 1,
                rules: Vec::new(),
                writes: Vec::new(),
                reads: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a space with an initial member list. The first member is the
    /// creator; the executor address is derived from the id.
    pub fn with_space(self, space_id: SpaceId, members: &[Address]) -> Self {
        {
            let mut state = self.lock();
            let contracts = &mut state.contracts;
            contracts.spaces.insert(
                space_id,
                Space {
                    members: members.to_vec(),
                    executor: executor_for(space_id),
                    ..Space::default()
                },
            );
            let next = u64::try_from(space_id).unwrap_or(u64::MAX).saturating_add(1);
            contracts.next_space_id = contracts.next_space_id.max(next);
        }
        self
    }

    pub fn with_proposal_interface(self, interface: ProposalInterface) -> Self {
        self.lock().proposal_interface = interface;
        self
    }

    /// Pin the ledger clock (unix seconds).
    pub fn with_now(self, now: u64) -> Self {
        self.lock().now = now;
        self
    }

    /// Script every matching call. `account` of `None` matches any signer
    /// (and every view call).
    pub fn script(&self, operation: &'static str, account: Option<Address>, action: Scripted) {
        self.lock().rules.push(Rule {
            operation,
            account,
            action,
        });
    }

    pub fn set_executor(&self, space_id: SpaceId, executor: Address) {
        if let Some(space) = self.lock().contracts.spaces.get_mut(&space_id) {
            space.executor = executor;
        }
    }

    /// Make `joinSpace` revert with "Join criteria not met" for `user`.
    pub fn block_join(&self, space_id: SpaceId, user: Address) {
        if let Some(space) = self.lock().contracts.spaces.get_mut(&space_id) {
            space.join_blocked.insert(user);
        }
    }

    /// Make the join-method directory report `user` as ineligible.
    pub fn deny_join_check(&self, space_id: SpaceId, user: Address) {
        if let Some(space) = self.lock().contracts.spaces.get_mut(&space_id) {
            space.join_check_denied.insert(user);
        }
    }

    pub fn add_invite(&self, space_id: SpaceId, invitee: Address) {
        self.lock().contracts.invites.insert((space_id, invitee));
    }

    pub fn add_profile(&self, user: Address, profile: ProfileFields) {
        self.lock().contracts.profiles.insert(user, profile);
    }

    pub fn insert_proposal(&self, proposal_id: ProposalId, core: ProposalCore) {
        let mut state = self.lock();
        let next = u64::try_from(proposal_id).unwrap_or(u64::MAX).saturating_add(1);
        state.contracts.next_proposal_id = state.contracts.next_proposal_id.max(next);
        state.contracts.proposals.insert(proposal_id, core);
    }

    pub fn record_vote(&self, proposal_id: ProposalId, voter: Address) {
        self.lock().contracts.votes.insert((proposal_id, voter));
    }

    pub fn set_balance(&self, account: Address, balance: U256) {
        self.lock().contracts.balances.insert(account, balance);
    }

    pub fn members(&self, space_id: SpaceId) -> Vec<Address> {
        self.lock()
            .contracts
            .spaces
            .get(&space_id)
            .map(|space| space.members.clone())
            .unwrap_or_default()
    }

    pub fn profile(&self, user: Address) -> Option<ProfileFields> {
        self.lock().contracts.profiles.get(&user).cloned()
    }

    pub fn proposal(&self, proposal_id: ProposalId) -> Option<ProposalCore> {
        self.lock().contracts.proposals.get(&proposal_id).cloned()
    }

    pub fn writes(&self) -> Vec<CallRecord> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self, operation: &str) -> usize {
        self.lock().writes.iter().filter(|w| w.operation == operation).count()
    }

    pub fn writes_from(&self, account: Address) -> usize {
        self.lock().writes.iter().filter(|w| w.from == Some(account)).count()
    }

    pub fn read_count(&self, operation: &str) -> usize {
        self.lock().reads.iter().filter(|r| r.operation == operation).count()
    }

    fn read<T>(
        &self,
        operation: &'static str,
        query: impl FnOnce(&Contracts) -> Result<T, &'static str>,
    ) -> Result<T, ChainError> {
        let mut state = self.lock();
        state.reads.push(CallRecord { operation, from: None });
        if let Some(Scripted::Reject {
            revert_reason,
            message,
        }) = state.rule_for(operation, None)
        {
            return Err(ChainError::from_refusal(operation, revert_reason.as_deref(), &message, REVERT_CODE));
        }
        query(&state.contracts).map_err(|reason| refusal(operation, reason))
    }

    fn write(
        &self,
        operation: &'static str,
        from: Address,
        apply: impl FnOnce(&mut Contracts, &Env) -> Result<Vec<EventLog>, &'static str>,
    ) -> Result<Settlement, ChainError> {
        let mut state = self.lock();
        state.writes.push(CallRecord {
            operation,
            from: Some(from),
        });

        let scripted = state.rule_for(operation, Some(from));
        if let Some(Scripted::Reject {
            revert_reason,
            message,
        }) = &scripted
        {
            return Err(ChainError::from_refusal(operation, revert_reason.as_deref(), message, REVERT_CODE));
        }

        state.block += 1;
        let env = Env {
            from,
            now: state.now,
            proposal_interface: state.proposal_interface,
        };
        let transaction = keccak256(format!("{operation}:{}:{from}", state.writes.len()));

        if scripted == Some(Scripted::RevertReceipt) {
            return Ok(state.settle(transaction, false, Vec::new()));
        }

        let mut scratch = state.contracts.clone();
        let mut logs = apply(&mut scratch, &env).map_err(|reason| refusal(operation, reason))?;

        if scripted != Some(Scripted::DropEffect) {
            state.contracts = scratch;
        }
        if scripted == Some(Scripted::DropEvent) {
            logs.clear();
        }
        Ok(state.settle(transaction, true, logs))
    }
}

impl State {
    fn rule_for(&self, operation: &str, account: Option<Address>) -> Option<Scripted> {
        self.rules
            .iter()
            .find(|rule| rule.operation == operation && (rule.account.is_none() || rule.account == account))
            .map(|rule| rule.action.clone())
    }

    fn settle(&self, transaction: B256, succeeded: bool, logs: Vec<EventLog>) -> Settlement {
        Settlement {
            transaction,
            block_number: Some(self.block),
            gas_used: if succeeded { 85_000 } else { 42_000 },
            succeeded,
            logs,
        }
    }
}

struct Env {
    from: Address,
    now: u64,
    proposal_interface: ProposalInterface,
}

fn refusal(operation: &str, reason: &str) -> ChainError {
    ChainError::from_refusal(operation, Some(reason), "execution reverted", REVERT_CODE)
}

fn log<E: SolEvent>(address: Address, event: &E) -> EventLog {
    let data = event.encode_log_data();
    EventLog {
        address,
        topics: data.topics().to_vec(),
        data: data.data,
    }
}

fn executor_for(space_id: SpaceId) -> Address {
    let word = keccak256(space_id.to_be_bytes::<32>());
    Address::from_slice(&word[12..])
}

impl Contracts {
    fn space(&self, space_id: SpaceId) -> Result<&Space, &'static str> {
        self.spaces.get(&space_id).ok_or("Space does not exist")
    }

    fn space_mut(&mut self, space_id: SpaceId) -> Result<&mut Space, &'static str> {
        self.spaces.get_mut(&space_id).ok_or("Space does not exist")
    }

    fn require_member(&self, space_id: SpaceId, user: Address) -> Result<(), &'static str> {
        if self.space(space_id)?.members.contains(&user) {
            Ok(())
        } else {
            Err("Not a member of the space")
        }
    }

    fn proposal_mut(&mut self, proposal_id: ProposalId) -> Result<&mut ProposalCore, &'static str> {
        self.proposals.get_mut(&proposal_id).ok_or("Proposal does not exist")
    }
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    async fn is_member(&self, space_id: SpaceId, user: Address) -> Result<bool, ChainError> {
        self.read(ops::IS_MEMBER, |c| {
            Ok(c.spaces
                .get(&space_id)
                .is_some_and(|space| space.members.contains(&user)))
        })
    }

    async fn space_members(&self, space_id: SpaceId) -> Result<Vec<Address>, ChainError> {
        self.read(ops::GET_SPACE_MEMBERS, |c| Ok(c.space(space_id)?.members.clone()))
    }

    async fn space_executor(&self, space_id: SpaceId) -> Result<Address, ChainError> {
        self.read(ops::GET_SPACE_EXECUTOR, |c| Ok(c.space(space_id)?.executor))
    }

    async fn create_space(&self, from: Address, request: &SpaceRequest) -> Result<Settlement, ChainError> {
        let request = request.clone();
        self.write(ops::CREATE_SPACE, from, move |c, env| {
            let space_id = U256::from(c.next_space_id);
            c.next_space_id += 1;
            let executor = executor_for(space_id);
            c.spaces.insert(
                space_id,
                Space {
                    members: vec![env.from],
                    executor,
                    ..Space::default()
                },
            );
            let event = DaoSpaceFactory::SpaceCreated {
                spaceId: space_id,
                name: request.name,
                description: request.description,
                imageUrl: request.image_url,
                unity: request.unity,
                quorum: request.quorum,
                votingPowerSource: request.voting_power_source,
                exitMethod: request.exit_method,
                joinMethod: request.join_method,
                creator: env.from,
                executor,
            };
            Ok(vec![log(SPACE_FACTORY, &event)])
        })
    }

    async fn join_space(&self, from: Address, space_id: SpaceId) -> Result<Settlement, ChainError> {
        self.write(ops::JOIN_SPACE, from, move |c, env| {
            let space = c.space_mut(space_id)?;
            if space.members.contains(&env.from) {
                return Err("Already a member");
            }
            if space.join_blocked.contains(&env.from) {
                return Err("Join criteria not met");
            }
            space.members.push(env.from);
            let event = DaoSpaceFactory::MemberJoined {
                spaceId: space_id,
                member: env.from,
            };
            Ok(vec![log(SPACE_FACTORY, &event)])
        })
    }

    async fn join_check(&self, space_id: SpaceId, _join_method: U256, user: Address) -> Result<bool, ChainError> {
        self.read(ops::JOIN_CHECK, |c| Ok(!c.space(space_id)?.join_check_denied.contains(&user)))
    }

    async fn has_invite(&self, invitee: Address, space_id: SpaceId) -> Result<bool, ChainError> {
        self.read(ops::CHECK_JOIN, |c| Ok(c.invites.contains(&(space_id, invitee))))
    }

    async fn create_invite(&self, from: Address, invitee: Address, space_id: SpaceId) -> Result<Settlement, ChainError> {
        self.write(ops::CREATE_INVITE, from, move |c, env| {
            c.require_member(space_id, env.from)?;
            if c.space(space_id)?.members.contains(&invitee) {
                return Err("Already a member");
            }
            if !c.invites.insert((space_id, invitee)) {
                return Err("Invite already exists");
            }
            let event = InviteSystem::InviteCreated {
                spaceId: space_id,
                inviter: env.from,
                invitee,
                expiresAt: U256::from(env.now + INVITE_LIFETIME_SECS),
            };
            Ok(vec![log(INVITE_SYSTEM, &event)])
        })
    }

    async fn create_batch_invites(
        &self,
        from: Address,
        invitees: &[Address],
        space_id: SpaceId,
    ) -> Result<Settlement, ChainError> {
        let invitees = invitees.to_vec();
        self.write(ops::CREATE_BATCH_INVITES, from, move |c, env| {
            c.require_member(space_id, env.from)?;
            for invitee in &invitees {
                c.invites.insert((space_id, *invitee));
            }
            let event = InviteSystem::BatchInvitesCreated {
                spaceId: space_id,
                inviter: env.from,
                invitees,
                expiresAt: U256::from(env.now + INVITE_LIFETIME_SECS),
            };
            Ok(vec![log(INVITE_SYSTEM, &event)])
        })
    }

    async fn has_profile(&self, user: Address) -> Result<bool, ChainError> {
        self.read(ops::HAS_PROFILE, |c| Ok(c.profiles.contains_key(&user)))
    }

    async fn create_profile(&self, from: Address, profile: &ProfileFields) -> Result<Settlement, ChainError> {
        let profile = profile.clone();
        self.write(ops::CREATE_PROFILE, from, move |c, env| {
            if c.profiles.contains_key(&env.from) {
                return Err("Profile already exists");
            }
            c.profiles.insert(env.from, profile);
            Ok(Vec::new())
        })
    }

    async fn edit_profile(&self, from: Address, profile: &ProfileFields) -> Result<Settlement, ChainError> {
        let profile = profile.clone();
        self.write(ops::EDIT_PROFILE, from, move |c, env| {
            let existing = c.profiles.get_mut(&env.from).ok_or("Profile does not exist")?;
            *existing = profile;
            Ok(Vec::new())
        })
    }

    async fn delete_profile(&self, from: Address) -> Result<Settlement, ChainError> {
        self.write(ops::DELETE_PROFILE, from, move |c, env| {
            c.profiles.remove(&env.from).ok_or("Profile does not exist")?;
            Ok(Vec::new())
        })
    }

    async fn proposal_core(&self, proposal_id: ProposalId) -> Result<ProposalCore, ChainError> {
        self.read(ops::GET_PROPOSAL_CORE, |c| {
            c.proposals.get(&proposal_id).cloned().ok_or("Proposal does not exist")
        })
    }

    async fn has_voted(&self, proposal_id: ProposalId, voter: Address) -> Result<bool, ChainError> {
        self.read(ops::HAS_VOTED, |c| Ok(c.votes.contains(&(proposal_id, voter))))
    }

    async fn create_proposal(&self, from: Address, request: &ProposalRequest) -> Result<Settlement, ChainError> {
        if self.lock().proposal_interface == ProposalInterface::FlatV1 && !request.value.is_zero() {
            return Err(ChainError::unsupported(
                ops::CREATE_PROPOSAL,
                "the flat-v1 interface cannot carry a proposal value",
            ));
        }
        let request = request.clone();
        self.write(ops::CREATE_PROPOSAL, from, move |c, env| {
            c.require_member(request.space_id, env.from)?;
            let proposal_id = U256::from(c.next_proposal_id);
            c.next_proposal_id += 1;

            let duration = u64::try_from(request.duration).unwrap_or(u64::MAX);
            let core = ProposalCore {
                space_id: request.space_id,
                question: request.question,
                description: request.description,
                start_time: env.now,
                end_time: env.now.saturating_add(duration),
                executed: false,
                expired: false,
                yes_votes: U256::ZERO,
                no_votes: U256::ZERO,
                total_voting_power: U256::from(c.space(request.space_id)?.members.len()),
                creator: env.from,
            };
            let event = DaoProposals::ProposalCreated {
                proposalId: proposal_id,
                spaceId: core.space_id,
                startTime: U256::from(core.start_time),
                endTime: U256::from(core.end_time),
                creator: env.from,
                targetContract: request.target,
            };
            c.proposals.insert(proposal_id, core);
            Ok(vec![log(PROPOSALS, &event)])
        })
    }

    async fn edit_proposal(
        &self,
        from: Address,
        proposal_id: ProposalId,
        request: &ProposalRequest,
    ) -> Result<Settlement, ChainError> {
        let interface = self.lock().proposal_interface;
        if !interface.supports_edit() {
            return Err(ChainError::unsupported(
                ops::EDIT_PROPOSAL,
                format!("the {interface} interface has no editProposal entry point"),
            ));
        }
        let request = request.clone();
        self.write(ops::EDIT_PROPOSAL, from, move |c, env| {
            let proposal = c.proposal_mut(proposal_id)?;
            if proposal.creator != env.from {
                return Err("Only the proposal creator can edit");
            }
            if !proposal.yes_votes.is_zero() || !proposal.no_votes.is_zero() {
                return Err("Cannot edit after voting has started");
            }
            let duration = u64::try_from(request.duration).unwrap_or(u64::MAX);
            proposal.question = request.question.clone();
            proposal.description = request.description.clone();
            proposal.end_time = proposal.start_time.saturating_add(duration);

            let event = DaoProposals::ProposalEdited {
                proposalId: proposal_id,
                spaceId: proposal.space_id,
                endTime: U256::from(proposal.end_time),
                targetContract: request.target,
                executionData: request.execution_data,
                question: request.question,
                description: request.description,
                value: request.value,
                editor: env.from,
            };
            Ok(vec![log(PROPOSALS, &event)])
        })
    }

    async fn vote(&self, from: Address, proposal_id: ProposalId, support: bool) -> Result<Settlement, ChainError> {
        self.write(ops::VOTE, from, move |c, env| {
            let proposal = c.proposals.get(&proposal_id).ok_or("Proposal does not exist")?;
            if proposal.executed {
                return Err("Proposal already executed");
            }
            if env.now < proposal.start_time || env.now > proposal.end_time || proposal.expired {
                return Err("Voting is not active");
            }
            c.require_member(proposal.space_id, env.from)?;
            if !c.votes.insert((proposal_id, env.from)) {
                return Err("Already voted");
            }

            let proposal = c.proposal_mut(proposal_id)?;
            if support {
                proposal.yes_votes += U256::from(1u64);
            } else {
                proposal.no_votes += U256::from(1u64);
            }
            let event = DaoProposals::VoteCast {
                proposalId: proposal_id,
                voter: env.from,
                support,
                votingPower: U256::from(1u64),
            };
            Ok(vec![log(PROPOSALS, &event)])
        })
    }

    async fn balance(&self, account: Address) -> Result<U256, ChainError> {
        self.read(ops::GET_BALANCE, |c| Ok(c.balances.get(&account).copied().unwrap_or_default()))
    }

    async fn transfer_native(&self, from: Address, to: Address, amount: U256) -> Result<Settlement, ChainError> {
        let available = self.lock().contracts.balances.get(&from).copied().unwrap_or_default();
        if available < amount {
            self.lock().writes.push(CallRecord {
                operation: ops::TRANSFER,
                from: Some(from),
            });
            return Err(ChainError::from_refusal(
                ops::TRANSFER,
                None,
                "insufficient funds for gas * price + value",
                -32000,
            ));
        }
        self.write(ops::TRANSFER, from, move |c, env| {
            let sender = c.balances.entry(env.from).or_default();
            *sender = sender.saturating_sub(amount);
            let recipient = c.balances.entry(to).or_default();
            *recipient = recipient.saturating_add(amount);
            Ok(Vec::new())
        })
    }
}
