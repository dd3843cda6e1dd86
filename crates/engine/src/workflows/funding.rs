//! Native-token top-ups from the funding key to every test account.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use alloy::primitives::{Address, B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use daoscript_chain::{
    ChainError, LedgerClient, Settlement,
    client::ops,
    units::{NATIVE_DECIMALS, format_amount},
};
use daoscript_types::RunReport;
use tracing::debug;

use crate::{
    executor::{AccountAction, Precondition, RunOptions, Target, Verification},
    workflows::{Harness, WorkflowKind},
};

/// Amount sent to each account, in ETH.
pub const DEFAULT_FUNDING_AMOUNT: &str = "0.0002";

struct Fund {
    funder: Address,
    amount: U256,
    before: Mutex<HashMap<Address, U256>>,
}

#[async_trait]
impl AccountAction for Fund {
    fn operation(&self) -> &'static str {
        ops::TRANSFER
    }

    fn signer(&self, _target: &Target) -> Address {
        self.funder
    }

    async fn precondition(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Precondition, ChainError> {
        if target.address == self.funder {
            return Ok(Precondition::Skip("account is the funder".into()));
        }
        let balance = ledger.balance(target.address).await?;
        debug!(account = %target.address, balance = %format_amount(balance, NATIVE_DECIMALS), "balance before funding");
        self.before
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(target.address, balance);
        Ok(Precondition::Proceed)
    }

    async fn submit(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Settlement, ChainError> {
        ledger.transfer_native(self.funder, target.address, self.amount).await
    }

    fn confirmation(&self) -> Option<B256> {
        None
    }

    async fn verify(
        &self,
        ledger: &dyn LedgerClient,
        target: &Target,
        _settlement: &Settlement,
    ) -> Result<Verification, ChainError> {
        let before = self
            .before
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&target.address)
            .copied()
            .unwrap_or_default();
        let after = ledger.balance(target.address).await?;
        Ok(
            Verification::matches(after == before.saturating_add(self.amount)).with_note(format!(
                "{} balance: {} ETH",
                target.address,
                format_amount(after, NATIVE_DECIMALS)
            )),
        )
    }
}

impl Harness {
    /// Send `amount` wei from the funding key to every account.
    pub async fn fund(&self, amount: U256) -> Result<RunReport> {
        let workflow = WorkflowKind::Fund;
        self.prepare(workflow)?;
        let Some(funder) = self.config.funder.as_ref().map(|signer| signer.address()) else {
            return Err(self.abort(workflow, "no funding key configured"));
        };
        if self.accounts.is_empty() {
            return Err(self.abort(workflow, "the accounts file has no entries"));
        }

        let balance = self.ledger().balance(funder).await?;
        self.note(format!(
            "funding {} accounts with {} ETH each from {funder} (balance {} ETH)",
            self.accounts.len(),
            format_amount(amount, NATIVE_DECIMALS),
            format_amount(balance, NATIVE_DECIMALS)
        ));

        let action = Fund {
            funder,
            amount,
            before: Mutex::new(HashMap::new()),
        };
        Ok(self
            .drive(workflow, &action, &self.every_account(), RunOptions::default())
            .await)
    }
}
