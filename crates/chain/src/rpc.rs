//! JSON-RPC backed [`LedgerClient`].
//!
//! One provider is shared by every workflow step. All account signers are
//! registered in a single wallet, and each write selects its signer through
//! `from`, so there is exactly one connection regardless of account count.

use alloy::{
    contract::SolCallBuilder,
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
};
use async_trait::async_trait;
use daoscript_types::{
    ProfileFields, ProposalCore, ProposalId, ProposalInterface, ProposalRequest, SpaceId, SpaceInterface, SpaceRequest,
};
use daoscript_util::redact_sensitive;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    ChainError, LedgerClient, Settlement,
    bindings::{
        DaoProposals, DaoProposalsFlatV1, DaoProposalsFlatV2, DaoSpaceFactory, DaoSpaceFactoryLegacy, InviteSystem,
        JoinMethodDirectory, ProfileManager,
    },
    client::ops,
};

/// Hostnames treated as local development nodes.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0"];

/// Endpoint, contract addresses and interface revisions for [`RpcLedger`].
#[derive(Debug, Clone, Default)]
pub struct RpcSettings {
    pub rpc_url: String,
    pub space_factory: Option<Address>,
    pub proposals: Option<Address>,
    pub invite_system: Option<Address>,
    pub profile_manager: Option<Address>,
    pub join_method_directory: Option<Address>,
    pub proposal_interface: ProposalInterface,
    pub space_interface: SpaceInterface,
    /// Fixed gas limit for every write; estimated per call when unset.
    pub gas_limit: Option<u64>,
}

/// [`LedgerClient`] over a remote JSON-RPC node.
pub struct RpcLedger {
    provider: DynProvider,
    settings: RpcSettings,
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("endpoint", &redact_sensitive(&self.settings.rpc_url))
            .field("proposal_interface", &self.settings.proposal_interface)
            .field("space_interface", &self.settings.space_interface)
            .finish_non_exhaustive()
    }
}

impl RpcLedger {
    /// Connect to `settings.rpc_url` with every signer in `signers`
    /// available for writes.
    pub fn connect(
        settings: RpcSettings,
        signers: impl IntoIterator<Item = PrivateKeySigner>,
    ) -> Result<Self, ChainError> {
        let url = validate_endpoint(&settings.rpc_url)?;

        let mut signers = signers.into_iter();
        let mut registered = 0usize;
        let provider = match signers.next() {
            Some(first) => {
                let mut wallet = EthereumWallet::new(first);
                registered += 1;
                for signer in signers {
                    wallet.register_signer(signer);
                    registered += 1;
                }
                ProviderBuilder::new().wallet(wallet).connect_http(url).erased()
            }
            None => ProviderBuilder::new().connect_http(url).erased(),
        };

        info!(
            endpoint = %redact_sensitive(&settings.rpc_url),
            signers = registered,
            proposal_interface = %settings.proposal_interface,
            space_interface = %settings.space_interface,
            "connected ledger client"
        );

        Ok(Self { provider, settings })
    }

    pub fn settings(&self) -> &RpcSettings {
        &self.settings
    }

    fn space_factory(&self) -> Result<DaoSpaceFactory::DaoSpaceFactoryInstance<DynProvider>, ChainError> {
        let address = require(self.settings.space_factory, "DAO_SPACE_FACTORY_ADDRESS")?;
        Ok(DaoSpaceFactory::new(address, self.provider.clone()))
    }

    fn proposals(&self) -> Result<Address, ChainError> {
        require(self.settings.proposals, "DAO_PROPOSALS_ADDRESS")
    }

    fn invite_system(&self) -> Result<InviteSystem::InviteSystemInstance<DynProvider>, ChainError> {
        let address = require(self.settings.invite_system, "INVITE_SYSTEM_ADDRESS")?;
        Ok(InviteSystem::new(address, self.provider.clone()))
    }

    fn profile_manager(&self) -> Result<ProfileManager::ProfileManagerInstance<DynProvider>, ChainError> {
        let address = require(self.settings.profile_manager, "PROFILE_CONTRACT_ADDRESS")?;
        Ok(ProfileManager::new(address, self.provider.clone()))
    }

    fn join_directory(&self) -> Result<JoinMethodDirectory::JoinMethodDirectoryInstance<DynProvider>, ChainError> {
        let address = require(self.settings.join_method_directory, "JOIN_METHOD_DIRECTORY_ADDRESS")?;
        Ok(JoinMethodDirectory::new(address, self.provider.clone()))
    }

    /// Sign, send and wait for the receipt of a contract write.
    async fn submit<P, C>(
        &self,
        operation: &'static str,
        from: Address,
        call: SolCallBuilder<P, C>,
    ) -> Result<Settlement, ChainError>
    where
        P: Provider,
        C: SolCall,
    {
        let mut call = call.from(from);
        if let Some(gas) = self.settings.gas_limit {
            call = call.gas(gas);
        }

        let pending = call
            .send()
            .await
            .map_err(|error| ChainError::from_contract(operation, error))?;
        debug!(operation, account = %from, transaction = %pending.tx_hash(), "submitted transaction");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|error| ChainError::from_pending(operation, error))?;
        let settlement = Settlement::from_receipt(&receipt);
        debug!(
            operation,
            account = %from,
            block = ?settlement.block_number,
            gas_used = settlement.gas_used,
            status = settlement.succeeded,
            "transaction settled"
        );
        Ok(settlement)
    }
}

fn require(address: Option<Address>, variable: &str) -> Result<Address, ChainError> {
    address.ok_or_else(|| ChainError::unsupported("contract binding", format!("{variable} is not configured")))
}

fn read_error(operation: &'static str) -> impl FnOnce(alloy::contract::Error) -> ChainError {
    move |error| ChainError::from_contract(operation, error)
}

/// Validate that an RPC endpoint is acceptable.
///
/// Rules:
/// - the URL must parse and include a host
/// - scheme must be `http` or `https`
/// - plain `http` to a non-local host is allowed but logged, since it would
///   carry signed transactions in clear text
pub fn validate_endpoint(endpoint: &str) -> Result<Url, ChainError> {
    let parsed = Url::parse(endpoint.trim()).map_err(|e| ChainError::invalid_endpoint(endpoint, e.to_string()))?;

    let host_name = parsed
        .host_str()
        .ok_or_else(|| ChainError::invalid_endpoint(endpoint, "URL must include a host"))?
        .to_string();

    match parsed.scheme() {
        "https" => {}
        "http" => {
            let is_local = LOCALHOST_DOMAINS
                .iter()
                .any(|&allowed| host_name.eq_ignore_ascii_case(allowed));
            if !is_local {
                warn!(host = %host_name, "RPC endpoint uses plain http for a non-local host");
            }
        }
        other => {
            return Err(ChainError::invalid_endpoint(
                endpoint,
                format!("scheme must be http or https; got '{other}://'"),
            ));
        }
    }

    Ok(parsed)
}

#[async_trait]
impl LedgerClient for RpcLedger {
    async fn is_member(&self, space_id: SpaceId, user: Address) -> Result<bool, ChainError> {
        let factory = self.space_factory()?;
        factory
            .isMember(space_id, user)
            .call()
            .await
            .map_err(read_error(ops::IS_MEMBER))
    }

    async fn space_members(&self, space_id: SpaceId) -> Result<Vec<Address>, ChainError> {
        let factory = self.space_factory()?;
        factory
            .getSpaceMembers(space_id)
            .call()
            .await
            .map_err(read_error(ops::GET_SPACE_MEMBERS))
    }

    async fn space_executor(&self, space_id: SpaceId) -> Result<Address, ChainError> {
        let factory = self.space_factory()?;
        factory
            .getSpaceExecutor(space_id)
            .call()
            .await
            .map_err(read_error(ops::GET_SPACE_EXECUTOR))
    }

    async fn create_space(&self, from: Address, request: &SpaceRequest) -> Result<Settlement, ChainError> {
        let address = require(self.settings.space_factory, "DAO_SPACE_FACTORY_ADDRESS")?;
        match self.settings.space_interface {
            SpaceInterface::Legacy => {
                let factory = DaoSpaceFactoryLegacy::new(address, self.provider.clone());
                let call = factory.createSpace(
                    request.name.clone(),
                    request.description.clone(),
                    request.image_url.clone(),
                    request.unity,
                    request.quorum,
                    request.voting_power_source,
                    request.exit_method,
                    request.join_method,
                );
                self.submit(ops::CREATE_SPACE, from, call).await
            }
            SpaceInterface::Struct => {
                let factory = DaoSpaceFactory::new(address, self.provider.clone());
                let params = DaoSpaceFactory::SpaceCreationParams {
                    name: request.name.clone(),
                    description: request.description.clone(),
                    imageUrl: request.image_url.clone(),
                    unity: request.unity,
                    quorum: request.quorum,
                    votingPowerSource: request.voting_power_source,
                    exitMethod: request.exit_method,
                    joinMethod: request.join_method,
                    createToken: request.create_token,
                    tokenName: request.token_name.clone(),
                    tokenSymbol: request.token_symbol.clone(),
                };
                self.submit(ops::CREATE_SPACE, from, factory.createSpace(params)).await
            }
        }
    }

    async fn join_space(&self, from: Address, space_id: SpaceId) -> Result<Settlement, ChainError> {
        let factory = self.space_factory()?;
        self.submit(ops::JOIN_SPACE, from, factory.joinSpace(space_id)).await
    }

    async fn join_check(&self, space_id: SpaceId, join_method: U256, user: Address) -> Result<bool, ChainError> {
        let directory = self.join_directory()?;
        directory
            .joinCheck(space_id, join_method, user)
            .call()
            .await
            .map_err(read_error(ops::JOIN_CHECK))
    }

    async fn has_invite(&self, invitee: Address, space_id: SpaceId) -> Result<bool, ChainError> {
        let invites = self.invite_system()?;
        invites
            .checkJoin(invitee, space_id)
            .call()
            .await
            .map_err(read_error(ops::CHECK_JOIN))
    }

    async fn create_invite(&self, from: Address, invitee: Address, space_id: SpaceId) -> Result<Settlement, ChainError> {
        let invites = self.invite_system()?;
        self.submit(ops::CREATE_INVITE, from, invites.createInvite(invitee, space_id))
            .await
    }

    async fn create_batch_invites(
        &self,
        from: Address,
        invitees: &[Address],
        space_id: SpaceId,
    ) -> Result<Settlement, ChainError> {
        let invites = self.invite_system()?;
        self.submit(
            ops::CREATE_BATCH_INVITES,
            from,
            invites.createBatchInvites(invitees.to_vec(), space_id),
        )
        .await
    }

    async fn has_profile(&self, user: Address) -> Result<bool, ChainError> {
        let profiles = self.profile_manager()?;
        profiles
            .hasProfile(user)
            .call()
            .await
            .map_err(read_error(ops::HAS_PROFILE))
    }

    async fn create_profile(&self, from: Address, profile: &ProfileFields) -> Result<Settlement, ChainError> {
        let profiles = self.profile_manager()?;
        let call = profiles.createProfile(
            profile.username.clone(),
            profile.description.clone(),
            profile.image.clone(),
        );
        self.submit(ops::CREATE_PROFILE, from, call).await
    }

    async fn edit_profile(&self, from: Address, profile: &ProfileFields) -> Result<Settlement, ChainError> {
        let profiles = self.profile_manager()?;
        let call = profiles.editProfile(
            profile.username.clone(),
            profile.description.clone(),
            profile.image.clone(),
        );
        self.submit(ops::EDIT_PROFILE, from, call).await
    }

    async fn delete_profile(&self, from: Address) -> Result<Settlement, ChainError> {
        let profiles = self.profile_manager()?;
        self.submit(ops::DELETE_PROFILE, from, profiles.deleteProfile()).await
    }

    async fn proposal_core(&self, proposal_id: ProposalId) -> Result<ProposalCore, ChainError> {
        let proposals = DaoProposals::new(self.proposals()?, self.provider.clone());
        let core = proposals
            .getProposalCore(proposal_id)
            .call()
            .await
            .map_err(read_error(ops::GET_PROPOSAL_CORE))?;

        Ok(ProposalCore {
            space_id: core.spaceId,
            question: core.question,
            description: core.description,
            start_time: saturating_seconds(core.startTime),
            end_time: saturating_seconds(core.endTime),
            executed: core.executed,
            expired: core.expired,
            yes_votes: core.yesVotes,
            no_votes: core.noVotes,
            total_voting_power: core.totalVotingPowerAtSnapshot,
            creator: core.creator,
        })
    }

    async fn has_voted(&self, proposal_id: ProposalId, voter: Address) -> Result<bool, ChainError> {
        let proposals = DaoProposals::new(self.proposals()?, self.provider.clone());
        proposals
            .hasVoted(proposal_id, voter)
            .call()
            .await
            .map_err(read_error(ops::HAS_VOTED))
    }

    async fn create_proposal(&self, from: Address, request: &ProposalRequest) -> Result<Settlement, ChainError> {
        let address = self.proposals()?;
        match self.settings.proposal_interface {
            ProposalInterface::FlatV1 => {
                if !request.value.is_zero() {
                    return Err(ChainError::unsupported(
                        ops::CREATE_PROPOSAL,
                        "the flat-v1 interface cannot carry a proposal value",
                    ));
                }
                let proposals = DaoProposalsFlatV1::new(address, self.provider.clone());
                let call = proposals.createProposal(
                    request.space_id,
                    request.question.clone(),
                    request.description.clone(),
                    request.duration,
                    request.target,
                    request.execution_data.clone(),
                );
                self.submit(ops::CREATE_PROPOSAL, from, call).await
            }
            ProposalInterface::FlatV2 => {
                let proposals = DaoProposalsFlatV2::new(address, self.provider.clone());
                let call = proposals.createProposal(
                    request.space_id,
                    request.question.clone(),
                    request.description.clone(),
                    request.duration,
                    request.target,
                    request.execution_data.clone(),
                    request.value,
                );
                self.submit(ops::CREATE_PROPOSAL, from, call).await
            }
            ProposalInterface::StructV3 => {
                let proposals = DaoProposals::new(address, self.provider.clone());
                let call = proposals.createProposal(proposal_params(request));
                self.submit(ops::CREATE_PROPOSAL, from, call).await
            }
        }
    }

    async fn edit_proposal(
        &self,
        from: Address,
        proposal_id: ProposalId,
        request: &ProposalRequest,
    ) -> Result<Settlement, ChainError> {
        if !self.settings.proposal_interface.supports_edit() {
            return Err(ChainError::unsupported(
                ops::EDIT_PROPOSAL,
                format!(
                    "the {} interface has no editProposal entry point",
                    self.settings.proposal_interface
                ),
            ));
        }
        let proposals = DaoProposals::new(self.proposals()?, self.provider.clone());
        let call = proposals.editProposal(proposal_id, proposal_params(request));
        self.submit(ops::EDIT_PROPOSAL, from, call).await
    }

    async fn vote(&self, from: Address, proposal_id: ProposalId, support: bool) -> Result<Settlement, ChainError> {
        let proposals = DaoProposals::new(self.proposals()?, self.provider.clone());
        self.submit(ops::VOTE, from, proposals.vote(proposal_id, support)).await
    }

    async fn balance(&self, account: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(account)
            .await
            .map_err(|error| ChainError::from_transport(ops::GET_BALANCE, &error))
    }

    async fn transfer_native(&self, from: Address, to: Address, amount: U256) -> Result<Settlement, ChainError> {
        let mut request = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(amount);
        if let Some(gas) = self.settings.gas_limit {
            request = request.with_gas_limit(gas);
        }

        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|error| ChainError::from_transport(ops::TRANSFER, &error))?;
        debug!(operation = ops::TRANSFER, account = %from, transaction = %pending.tx_hash(), "submitted transaction");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|error| ChainError::from_pending(ops::TRANSFER, error))?;
        Ok(Settlement::from_receipt(&receipt))
    }
}

fn proposal_params(request: &ProposalRequest) -> DaoProposals::ProposalParams {
    DaoProposals::ProposalParams {
        spaceId: request.space_id,
        question: request.question.clone(),
        description: request.description.clone(),
        duration: request.duration,
        targetContract: request.target,
        executionData: request.execution_data.clone(),
        value: request.value,
    }
}

fn saturating_seconds(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
