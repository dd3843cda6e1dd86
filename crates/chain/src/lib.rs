//! Contract bindings and ledger clients for the DAO contract suite.
//!
//! [`LedgerClient`] is the seam workflows are written against. [`RpcLedger`]
//! implements it over a single JSON-RPC endpoint with every test account
//! registered as a signer. With the `test-util` feature, `SimulatedLedger`
//! implements it in memory for tests.

pub mod bindings;
pub mod client;
pub mod error;
pub mod payload;
pub mod receipt;
pub mod rpc;
#[cfg(any(test, feature = "test-util"))]
pub mod simulated;
pub mod units;

pub use client::LedgerClient;
pub use error::{ChainError, Rejection};
pub use receipt::{EventLog, Settlement};
pub use rpc::{RpcLedger, RpcSettings};
#[cfg(any(test, feature = "test-util"))]
pub use simulated::SimulatedLedger;
