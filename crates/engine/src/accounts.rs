//! Test account source.
//!
//! Accounts come from a JSON array of `{ "address", "privateKey" }` records.
//! The signer derived from the key is authoritative; a disagreeing address
//! field is logged and ignored.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    address: String,
    private_key: String,
}

/// One funded test account.
#[derive(Clone)]
pub struct Account {
    pub address: Address,
    signer: PrivateKeySigner,
}

impl Account {
    pub fn from_signer(signer: PrivateKeySigner) -> Self {
        Self {
            address: signer.address(),
            signer,
        }
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account").field("address", &self.address).finish_non_exhaustive()
    }
}

/// Load accounts from `path`.
pub fn load_accounts(path: &Path) -> Result<Vec<Account>, AccountsError> {
    let content = fs::read_to_string(path).map_err(|source| AccountsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let accounts = parse_accounts(&content).map_err(|error| match error {
        AccountsError::Malformed { source, .. } => AccountsError::Malformed {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;
    info!(path = %path.display(), accounts = accounts.len(), "loaded accounts");
    Ok(accounts)
}

/// Parse an accounts document.
pub fn parse_accounts(content: &str) -> Result<Vec<Account>, AccountsError> {
    let records: Vec<AccountRecord> = serde_json::from_str(content).map_err(|source| AccountsError::Malformed {
        path: PathBuf::new(),
        source,
    })?;
    if records.is_empty() {
        return Err(AccountsError::Empty);
    }

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let signer = PrivateKeySigner::from_str(record.private_key.trim())
                .map_err(|_| AccountsError::InvalidKey { index })?;
            let account = Account::from_signer(signer);
            match Address::from_str(record.address.trim()) {
                Ok(listed) if listed == account.address => {}
                Ok(listed) => warn!(
                    index,
                    listed = %listed,
                    derived = %account.address,
                    "account address does not match its key; using the derived address"
                ),
                Err(_) => warn!(index, derived = %account.address, "account address is malformed; using the derived address"),
            }
            Ok(account)
        })
        .collect()
}

/// Every account's signer, in file order.
pub fn signers(accounts: &[Account]) -> Vec<PrivateKeySigner> {
    accounts.iter().map(|account| account.signer.clone()).collect()
}

#[derive(Debug, Error)]
pub enum AccountsError {
    #[error("failed to read accounts file {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("accounts file {} is not a JSON array of {{address, privateKey}}: {source}", .path.display())]
    Malformed { path: PathBuf, source: serde_json::Error },

    #[error("account {index} has an invalid private key")]
    InvalidKey { index: usize },

    #[error("accounts file is empty")]
    Empty,
}
