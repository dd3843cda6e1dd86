//! `sol!` bindings for the deployed DAO contracts.
//!
//! Only the entry points and events the harness drives are declared. Where
//! deployments disagree on an argument shape (space creation, proposal
//! creation) each revision gets its own interface so the selector is always
//! derived from the exact signature being called.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface DaoSpaceFactory {
        struct SpaceCreationParams {
            string name;
            string description;
            string imageUrl;
            uint256 unity;
            uint256 quorum;
            uint256 votingPowerSource;
            uint256 exitMethod;
            uint256 joinMethod;
            bool createToken;
            string tokenName;
            string tokenSymbol;
        }

        event MemberJoined(uint256 indexed spaceId, address indexed member);

        event SpaceCreated(
            uint256 indexed spaceId,
            string name,
            string description,
            string imageUrl,
            uint256 unity,
            uint256 quorum,
            uint256 votingPowerSource,
            uint256 exitMethod,
            uint256 joinMethod,
            address indexed creator,
            address executor
        );

        function createSpace(SpaceCreationParams params) external returns (uint256);
        function joinSpace(uint256 _spaceId) external;
        function removeMember(uint256 _spaceId, address _memberToRemove) external;
        function isMember(uint256 _spaceId, address _userAddress) external view returns (bool);
        function getSpaceMembers(uint256 _spaceId) external view returns (address[] memory);
        function getSpaceExecutor(uint256 _spaceId) external view returns (address);
    }

    #[sol(rpc)]
    interface DaoSpaceFactoryLegacy {
        function createSpace(
            string _name,
            string _description,
            string _imageUrl,
            uint256 _unity,
            uint256 _quorum,
            uint256 _votingPowerSource,
            uint256 _exitMethod,
            uint256 _joinMethod
        ) external returns (uint256);
    }

    #[sol(rpc)]
    interface JoinMethodDirectory {
        function joinMethods(uint256 _methodId) external view returns (address);
        function joinCheck(uint256 _spaceId, uint256 _joinMethod, address _userAddress) external view returns (bool);
    }

    #[sol(rpc)]
    interface InviteSystem {
        event InviteCreated(uint256 indexed spaceId, address indexed inviter, address indexed invitee, uint256 expiresAt);
        event BatchInvitesCreated(uint256 indexed spaceId, address indexed inviter, address[] invitees, uint256 expiresAt);

        function createInvite(address _invitee, uint256 _spaceId) external returns (bool);
        function createBatchInvites(address[] _invitees, uint256 _spaceId) external returns (bool);
        function checkJoin(address _userAddress, uint256 _spaceId) external view returns (bool);
    }

    #[sol(rpc)]
    interface ProfileManager {
        function createProfile(string _username, string _description, string _profileImg) external;
        function editProfile(string _username, string _description, string _profileImg) external;
        function deleteProfile() external;
        function hasProfile(address _user) external view returns (bool);
    }

    #[sol(rpc)]
    interface DaoProposals {
        struct ProposalParams {
            uint256 spaceId;
            string question;
            string description;
            uint256 duration;
            address targetContract;
            bytes executionData;
            uint256 value;
        }

        event ProposalCreated(
            uint256 indexed proposalId,
            uint256 indexed spaceId,
            uint256 startTime,
            uint256 endTime,
            address indexed creator,
            address targetContract
        );

        event ProposalEdited(
            uint256 indexed proposalId,
            uint256 indexed spaceId,
            uint256 endTime,
            address targetContract,
            bytes executionData,
            string question,
            string description,
            uint256 value,
            address indexed editor
        );

        event VoteCast(uint256 indexed proposalId, address indexed voter, bool support, uint256 votingPower);

        function createProposal(ProposalParams params) external returns (uint256);
        function editProposal(uint256 _proposalId, ProposalParams params) external;
        function vote(uint256 _proposalId, bool _support) external;
        function hasVoted(uint256 _proposalId, address _voter) external view returns (bool);
        function getProposalCore(uint256 _proposalId) external view returns (
            uint256 spaceId,
            string question,
            string description,
            uint256 startTime,
            uint256 endTime,
            bool executed,
            bool expired,
            uint256 yesVotes,
            uint256 noVotes,
            uint256 totalVotingPowerAtSnapshot,
            address creator
        );
    }

    #[sol(rpc)]
    interface DaoProposalsFlatV1 {
        function createProposal(
            uint256 _spaceId,
            string _question,
            string _description,
            uint256 _duration,
            address _targetContract,
            bytes _executionData
        ) external returns (uint256);
    }

    #[sol(rpc)]
    interface DaoProposalsFlatV2 {
        function createProposal(
            uint256 _spaceId,
            string _question,
            string _description,
            uint256 _duration,
            address _targetContract,
            bytes _executionData,
            uint256 _value
        ) external returns (uint256);
    }

    interface Erc20 {
        function transfer(address to, uint256 amount) external returns (bool);
    }

    interface MintableToken {
        function mint(address to, uint256 amount) external;
    }

    interface WorkProposal {
        function assignWork(
            uint256 _spaceId,
            address _worker,
            string _title,
            string _description,
            uint256 _duration,
            uint256 _amount,
            string _tokenSymbol,
            string[] _responsibilities
        ) external returns (uint256);
    }
}
