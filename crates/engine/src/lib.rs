//! Workflow engine for exercising a deployed DAO contract suite with a set
//! of test accounts.
//!
//! Configuration and accounts are loaded by [`config`] and [`accounts`];
//! [`workflows::Harness`] runs each workflow through the shared per-account
//! runner in [`executor`] and reports one outcome per account.

pub mod accounts;
pub mod config;
pub mod executor;
pub mod workflows;

pub use accounts::{Account, AccountsError, load_accounts, signers};
pub use config::{ConfigError, HarnessConfig, ValidationError, load_config, validate_config};
pub use workflows::{Aborted, Harness, WorkflowKind};
