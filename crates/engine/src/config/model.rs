//! Data models for harness configuration.

use std::{fmt, path::PathBuf, str::FromStr};

use alloy::{
    primitives::{Address, U256},
    signers::local::PrivateKeySigner,
};
use daoscript_chain::RpcSettings;
use daoscript_types::{ParseInterfaceError, ProposalId, ProposalInterface, SpaceId, SpaceInterface};
use daoscript_util::{expand_tilde, redact_sensitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ValidationError;

pub const DEFAULT_ACCOUNTS_PATH: &str = "accounts.json";

/// Environment variable names. Also used as setting names in errors.
pub mod vars {
    pub const RPC_URL: &str = "RPC_URL";
    pub const DAO_SPACE_FACTORY_ADDRESS: &str = "DAO_SPACE_FACTORY_ADDRESS";
    pub const DAO_PROPOSALS_ADDRESS: &str = "DAO_PROPOSALS_ADDRESS";
    pub const INVITE_SYSTEM_ADDRESS: &str = "INVITE_SYSTEM_ADDRESS";
    pub const PROFILE_CONTRACT_ADDRESS: &str = "PROFILE_CONTRACT_ADDRESS";
    pub const JOIN_METHOD_DIRECTORY_ADDRESS: &str = "JOIN_METHOD_DIRECTORY_ADDRESS";
    pub const TEST_SPACE_ID: &str = "TEST_SPACE_ID";
    pub const TARGET_SPACE_ID: &str = "TARGET_SPACE_ID";
    pub const PROPOSAL_ID: &str = "PROPOSAL_ID";
    pub const TEST_PROPOSAL_ID: &str = "TEST_PROPOSAL_ID";
    pub const JOIN_METHOD: &str = "JOIN_METHOD";
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const PROPOSAL_INTERFACE: &str = "PROPOSAL_INTERFACE";
    pub const SPACE_INTERFACE: &str = "SPACE_INTERFACE";
    pub const GAS_LIMIT: &str = "GAS_LIMIT";
}

/// Unresolved configuration as read from the config file and environment.
///
/// Everything is kept as text here so file and environment values merge the
/// same way; parsing happens once in [`HarnessConfig::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub contracts: ContractSettings,
    pub space_id: Option<String>,
    pub target_space_id: Option<String>,
    pub proposal_id: Option<String>,
    pub join_method: Option<String>,
    pub proposal_interface: Option<String>,
    pub space_interface: Option<String>,
    pub gas_limit: Option<String>,
    pub accounts_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContractSettings {
    pub space_factory: Option<String>,
    pub proposals: Option<String>,
    pub invite_system: Option<String>,
    pub profile_manager: Option<String>,
    pub join_method_directory: Option<String>,
}

/// Deployed contract addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Contracts {
    pub space_factory: Option<Address>,
    pub proposals: Option<Address>,
    pub invite_system: Option<Address>,
    pub profile_manager: Option<Address>,
    pub join_method_directory: Option<Address>,
}

/// Resolved configuration handed to the harness at construction.
#[derive(Clone)]
pub struct HarnessConfig {
    pub rpc_url: String,
    pub contracts: Contracts,
    pub space_id: Option<SpaceId>,
    pub target_space_id: Option<SpaceId>,
    pub proposal_id: Option<ProposalId>,
    /// When set, join-space checks eligibility against this method first.
    pub join_method: Option<U256>,
    pub proposal_interface: ProposalInterface,
    pub space_interface: SpaceInterface,
    pub gas_limit: Option<u64>,
    pub accounts_path: PathBuf,
    /// Single-actor signer (`PRIVATE_KEY`) used by the fund workflow.
    pub funder: Option<PrivateKeySigner>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            contracts: Contracts::default(),
            space_id: None,
            target_space_id: None,
            proposal_id: None,
            join_method: None,
            proposal_interface: ProposalInterface::default(),
            space_interface: SpaceInterface::default(),
            gas_limit: None,
            accounts_path: PathBuf::from(DEFAULT_ACCOUNTS_PATH),
            funder: None,
        }
    }
}

impl fmt::Debug for HarnessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarnessConfig")
            .field("rpc_url", &redact_sensitive(&self.rpc_url))
            .field("contracts", &self.contracts)
            .field("space_id", &self.space_id)
            .field("target_space_id", &self.target_space_id)
            .field("proposal_id", &self.proposal_id)
            .field("join_method", &self.join_method)
            .field("proposal_interface", &self.proposal_interface)
            .field("space_interface", &self.space_interface)
            .field("gas_limit", &self.gas_limit)
            .field("accounts_path", &self.accounts_path)
            .field("funder", &self.funder.as_ref().map(|signer| signer.address()))
            .finish()
    }
}

impl HarnessConfig {
    /// Parse every textual setting. The funder key is passed separately so
    /// it never sits in the serializable layer.
    pub fn resolve(file: ConfigFile, funder_key: Option<&str>) -> Result<Self, ConfigError> {
        let contracts = Contracts {
            space_factory: parse_address(vars::DAO_SPACE_FACTORY_ADDRESS, file.contracts.space_factory.as_deref())?,
            proposals: parse_address(vars::DAO_PROPOSALS_ADDRESS, file.contracts.proposals.as_deref())?,
            invite_system: parse_address(vars::INVITE_SYSTEM_ADDRESS, file.contracts.invite_system.as_deref())?,
            profile_manager: parse_address(vars::PROFILE_CONTRACT_ADDRESS, file.contracts.profile_manager.as_deref())?,
            join_method_directory: parse_address(
                vars::JOIN_METHOD_DIRECTORY_ADDRESS,
                file.contracts.join_method_directory.as_deref(),
            )?,
        };

        let gas_limit = match non_empty(file.gas_limit.as_deref()) {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                name: vars::GAS_LIMIT,
                value: raw.to_string(),
            })?),
            None => None,
        };

        let funder = match non_empty(funder_key) {
            Some(key) => Some(
                key.parse::<PrivateKeySigner>()
                    .map_err(|_| ConfigError::InvalidKey { name: vars::PRIVATE_KEY })?,
            ),
            None => None,
        };

        Ok(Self {
            rpc_url: non_empty(file.rpc_url.as_deref()).unwrap_or_default().to_string(),
            contracts,
            space_id: parse_number(vars::TEST_SPACE_ID, file.space_id.as_deref())?,
            target_space_id: parse_number(vars::TARGET_SPACE_ID, file.target_space_id.as_deref())?,
            proposal_id: parse_number(vars::PROPOSAL_ID, file.proposal_id.as_deref())?,
            join_method: parse_number(vars::JOIN_METHOD, file.join_method.as_deref())?,
            proposal_interface: non_empty(file.proposal_interface.as_deref())
                .map(str::parse::<ProposalInterface>)
                .transpose()?
                .unwrap_or_default(),
            space_interface: non_empty(file.space_interface.as_deref())
                .map(str::parse::<SpaceInterface>)
                .transpose()?
                .unwrap_or_default(),
            gas_limit,
            accounts_path: non_empty(file.accounts_path.as_deref())
                .map(expand_tilde)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ACCOUNTS_PATH)),
            funder,
        })
    }

    pub fn rpc_settings(&self) -> RpcSettings {
        RpcSettings {
            rpc_url: self.rpc_url.clone(),
            space_factory: self.contracts.space_factory,
            proposals: self.contracts.proposals,
            invite_system: self.contracts.invite_system,
            profile_manager: self.contracts.profile_manager,
            join_method_directory: self.contracts.join_method_directory,
            proposal_interface: self.proposal_interface,
            space_interface: self.space_interface,
            gas_limit: self.gas_limit,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_address(name: &'static str, value: Option<&str>) -> Result<Option<Address>, ConfigError> {
    non_empty(value)
        .map(|raw| {
            Address::from_str(raw).map_err(|_| ConfigError::InvalidAddress {
                name,
                value: raw.to_string(),
            })
        })
        .transpose()
}

fn parse_number(name: &'static str, value: Option<&str>) -> Result<Option<U256>, ConfigError> {
    non_empty(value)
        .map(|raw| {
            U256::from_str(raw).map_err(|_| ConfigError::InvalidNumber {
                name,
                value: raw.to_string(),
            })
        })
        .transpose()
}

/// Errors raised while loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error("{name} is not a valid address: '{value}'")]
    InvalidAddress { name: &'static str, value: String },

    #[error("{name} is not a valid integer: '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error(transparent)]
    InvalidInterface(#[from] ParseInterfaceError),

    #[error("{name} is not a valid private key")]
    InvalidKey { name: &'static str },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn deserializes_camel_case_file() {
        let json = r#"{
          "rpcUrl": "https://sepolia.base.org",
          "contracts": {
            "spaceFactory": "0x2222222222222222222222222222222222222222",
            "proposals": "0x3333333333333333333333333333333333333333"
          },
          "spaceId": "9",
          "proposalInterface": "flat-v2"
        }"#;

        let file: ConfigFile = serde_json::from_str(json).expect("config deserializes");
        let config = HarnessConfig::resolve(file, None).expect("config resolves");

        assert_eq!(config.rpc_url, "https://sepolia.base.org");
        assert_eq!(config.contracts.space_factory, Some(Address::repeat_byte(0x22)));
        assert_eq!(config.contracts.invite_system, None);
        assert_eq!(config.space_id, Some(U256::from(9u64)));
        assert_eq!(config.proposal_interface, ProposalInterface::FlatV2);
        assert_eq!(config.space_interface, SpaceInterface::Struct);
        assert_eq!(config.accounts_path, PathBuf::from(DEFAULT_ACCOUNTS_PATH));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(serde_json::from_str::<ConfigFile>(r#"{"rpc": "x"}"#).is_err());
    }

    #[test]
    fn blank_values_are_unset() {
        let file = ConfigFile {
            space_id: Some("  ".into()),
            contracts: ContractSettings {
                proposals: Some(String::new()),
                ..ContractSettings::default()
            },
            ..ConfigFile::default()
        };
        let config = HarnessConfig::resolve(file, Some(" ")).unwrap();
        assert_eq!(config.space_id, None);
        assert_eq!(config.contracts.proposals, None);
        assert!(config.funder.is_none());
    }

    #[test]
    fn malformed_values_name_their_setting() {
        let file = ConfigFile {
            contracts: ContractSettings {
                invite_system: Some("0x1234".into()),
                ..ContractSettings::default()
            },
            ..ConfigFile::default()
        };
        let error = HarnessConfig::resolve(file, None).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidAddress { name: vars::INVITE_SYSTEM_ADDRESS, .. }));

        let file = ConfigFile {
            gas_limit: Some("lots".into()),
            ..ConfigFile::default()
        };
        assert!(matches!(
            HarnessConfig::resolve(file, None),
            Err(ConfigError::InvalidNumber { name: vars::GAS_LIMIT, .. })
        ));

        let file = ConfigFile {
            proposal_interface: Some("v9".into()),
            ..ConfigFile::default()
        };
        assert!(matches!(
            HarnessConfig::resolve(file, None),
            Err(ConfigError::InvalidInterface(_))
        ));
    }

    #[test]
    fn funder_key_is_parsed_and_never_printed() {
        let config = HarnessConfig::resolve(ConfigFile::default(), Some(ANVIL_KEY)).unwrap();
        let funder = config.funder.as_ref().unwrap();
        assert_eq!(funder.address(), "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap());

        let printed = format!("{config:?}");
        assert!(!printed.contains(&ANVIL_KEY[2..]));

        assert!(matches!(
            HarnessConfig::resolve(ConfigFile::default(), Some("0xnope")),
            Err(ConfigError::InvalidKey { .. })
        ));
    }

    #[test]
    fn rpc_settings_carry_addresses_and_versions() {
        let config = HarnessConfig {
            rpc_url: "http://127.0.0.1:8545".into(),
            contracts: Contracts {
                proposals: Some(Address::repeat_byte(0x33)),
                ..Contracts::default()
            },
            proposal_interface: ProposalInterface::FlatV1,
            gas_limit: Some(500_000),
            ..HarnessConfig::default()
        };
        let settings = config.rpc_settings();
        assert_eq!(settings.proposals, Some(Address::repeat_byte(0x33)));
        assert_eq!(settings.proposal_interface, ProposalInterface::FlatV1);
        assert_eq!(settings.gas_limit, Some(500_000));
    }
}
