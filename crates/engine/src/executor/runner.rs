//! Sequential account runner that streams [`RunEvent`]s.
//!
//! Every target is awaited to completion before the next one starts. Errors
//! stop at the target boundary: they become that target's outcome and the
//! loop moves on.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use daoscript_chain::{ChainError, LedgerClient, Settlement, units};
use daoscript_types::{AccountOutcome, AccountResult, RejectionReason, RunEvent, RunReport};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::executor::{AccountAction, Precondition, RunOptions, Target};

/// Drive `action` over `targets` and collect one outcome per target.
pub async fn drive_account_run(
    workflow: &str,
    action: &dyn AccountAction,
    ledger: &dyn LedgerClient,
    targets: &[Target],
    options: RunOptions,
    events: Option<&UnboundedSender<RunEvent>>,
) -> RunReport {
    let mut recorder = RunRecorder::start(workflow, action.operation(), targets.len(), events);

    for (position, target) in targets.iter().enumerate() {
        recorder.begin_target(target);
        let outcome = run_target(action, ledger, target, events).await;
        let attempted = recorder.record(ledger, action.signer(target), target, outcome).await;

        if let Some(delay) = options.delay
            && attempted
            && position + 1 < targets.len()
        {
            tokio::time::sleep(delay).await;
        }
    }

    recorder.finish()
}

/// Bookkeeping shared by every run: lifecycle events, per-target logging and
/// the final report.
pub(crate) struct RunRecorder<'a> {
    workflow: &'a str,
    operation: &'static str,
    events: Option<&'a UnboundedSender<RunEvent>>,
    started_at: DateTime<Utc>,
    results: Vec<AccountResult>,
}

impl<'a> RunRecorder<'a> {
    pub(crate) fn start(
        workflow: &'a str,
        operation: &'static str,
        accounts: usize,
        events: Option<&'a UnboundedSender<RunEvent>>,
    ) -> Self {
        let started_at = Utc::now();
        emit(
            events,
            RunEvent::RunStarted {
                workflow: workflow.to_string(),
                accounts,
                at: started_at,
            },
        );
        info!(workflow, operation, targets = accounts, "run started");
        Self {
            workflow,
            operation,
            events,
            started_at,
            results: Vec::with_capacity(accounts),
        }
    }

    pub(crate) fn begin_target(&self, target: &Target) {
        emit(
            self.events,
            RunEvent::AccountStarted {
                index: target.index,
                address: target.address,
            },
        );
    }

    /// Log and stream `outcome`, reporting `signer`'s balance when it ran out
    /// of funds. Returns whether a submission was attempted.
    pub(crate) async fn record(
        &mut self,
        ledger: &dyn LedgerClient,
        signer: Address,
        target: &Target,
        outcome: AccountOutcome,
    ) -> bool {
        log_outcome(self.workflow, self.operation, target, &outcome);

        if let AccountOutcome::Rejected {
            reason: RejectionReason::InsufficientFunds,
            ..
        } = &outcome
        {
            report_balance(ledger, signer, self.events).await;
        }

        emit(
            self.events,
            RunEvent::AccountFinished {
                index: target.index,
                address: target.address,
                outcome: outcome.clone(),
            },
        );

        let attempted = outcome.attempted_submission();
        self.results.push(AccountResult {
            index: target.index,
            address: target.address,
            outcome,
        });
        attempted
    }

    pub(crate) fn finish(self) -> RunReport {
        let report = RunReport {
            workflow: self.workflow.to_string(),
            results: self.results,
            started_at: self.started_at,
            finished_at: Utc::now(),
        };
        let summary = report.summary();
        info!(workflow = self.workflow, %summary, "run completed");
        emit(
            self.events,
            RunEvent::RunCompleted {
                workflow: self.workflow.to_string(),
                summary,
                at: report.finished_at,
            },
        );
        report
    }
}

async fn run_target(
    action: &dyn AccountAction,
    ledger: &dyn LedgerClient,
    target: &Target,
    events: Option<&UnboundedSender<RunEvent>>,
) -> AccountOutcome {
    match action.precondition(ledger, target).await {
        Ok(Precondition::Proceed) => {}
        Ok(Precondition::Skip(reason)) => return AccountOutcome::Skipped { reason },
        Err(error) => return outcome_from_error(error),
    }

    let settlement = match action.submit(ledger, target).await {
        Ok(settlement) => settlement,
        Err(error) => return outcome_from_error(error),
    };
    if !settlement.succeeded {
        return reverted_outcome(action.operation(), &settlement);
    }

    let event_present = action.confirmation().is_none_or(|topic| settlement.has_event(topic));
    let state_matches = match action.verify(ledger, target, &settlement).await {
        Ok(verification) => {
            for note in verification.notes {
                info!(account = %target.address, "{note}");
                emit(events, RunEvent::Note { message: note });
            }
            verification.state_matches
        }
        Err(error) => {
            warn!(account = %target.address, %error, "verification read failed");
            false
        }
    };

    verified_outcome(&settlement, event_present, state_matches)
}

/// Outcome of a mined transaction whose receipt reports failure.
pub(crate) fn reverted_outcome(operation: &str, settlement: &Settlement) -> AccountOutcome {
    AccountOutcome::Failed {
        error: ChainError::Reverted {
            operation: operation.to_string(),
            transaction: settlement.transaction.to_string(),
        }
        .to_string(),
    }
}

/// Success only when the confirmation event and the re-read state agree.
pub(crate) fn verified_outcome(settlement: &Settlement, event_present: bool, state_matches: bool) -> AccountOutcome {
    if event_present && state_matches {
        AccountOutcome::Succeeded {
            transaction: settlement.transaction,
            block_number: settlement.block_number,
            gas_used: settlement.gas_used,
        }
    } else {
        AccountOutcome::VerificationFailed {
            transaction: settlement.transaction,
            event_present,
            state_matches,
        }
    }
}

/// Classify an error raised inside the account boundary.
pub fn outcome_from_error(error: ChainError) -> AccountOutcome {
    match error {
        ChainError::Rejected { rejection, .. } => AccountOutcome::Rejected {
            reason: rejection.reason,
            detail: rejection.detail,
        },
        other => AccountOutcome::Failed {
            error: other.to_string(),
        },
    }
}

async fn report_balance(
    ledger: &dyn LedgerClient,
    account: Address,
    events: Option<&UnboundedSender<RunEvent>>,
) {
    match ledger.balance(account).await {
        Ok(balance) => {
            let message = format!(
                "current balance of {account}: {} ETH",
                units::format_amount(balance, units::NATIVE_DECIMALS)
            );
            info!(account = %account, "{message}");
            emit(events, RunEvent::Note { message });
        }
        Err(error) => warn!(account = %account, %error, "could not read balance"),
    }
}

fn log_outcome(workflow: &str, operation: &str, target: &Target, outcome: &AccountOutcome) {
    match outcome {
        AccountOutcome::Skipped { reason } => {
            info!(workflow, operation, account = %target.address, %reason, "skipped")
        }
        AccountOutcome::Succeeded { transaction, .. } => {
            info!(workflow, operation, account = %target.address, %transaction, "succeeded")
        }
        AccountOutcome::VerificationFailed {
            transaction,
            event_present,
            state_matches,
        } => warn!(
            workflow,
            operation,
            account = %target.address,
            %transaction,
            event_present,
            state_matches,
            "verification failed"
        ),
        AccountOutcome::Rejected { reason, detail } => {
            warn!(workflow, operation, account = %target.address, %reason, %detail, "rejected")
        }
        AccountOutcome::Failed { error } => {
            warn!(workflow, operation, account = %target.address, %error, "failed")
        }
    }
}

fn emit(events: Option<&UnboundedSender<RunEvent>>, event: RunEvent) {
    if let Some(sender) = events {
        let _ = sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use alloy::primitives::{B256, U256};
    use async_trait::async_trait;
    use daoscript_chain::{
        SimulatedLedger,
        bindings::DaoSpaceFactory,
        client::ops,
        simulated::Scripted,
    };
    use tokio::sync::mpsc::unbounded_channel;

    use super::*;
    use crate::executor::Verification;

    struct Join {
        space_id: U256,
    }

    #[async_trait]
    impl AccountAction for Join {
        fn operation(&self) -> &'static str {
            ops::JOIN_SPACE
        }

        async fn precondition(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Precondition, ChainError> {
            if ledger.is_member(self.space_id, target.address).await? {
                return Ok(Precondition::Skip("already a member".into()));
            }
            Ok(Precondition::Proceed)
        }

        async fn submit(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Settlement, ChainError> {
            ledger.join_space(target.address, self.space_id).await
        }

        fn confirmation(&self) -> Option<B256> {
            Some(<DaoSpaceFactory::MemberJoined as alloy::sol_types::SolEvent>::SIGNATURE_HASH)
        }

        async fn verify(
            &self,
            ledger: &dyn LedgerClient,
            target: &Target,
            _settlement: &Settlement,
        ) -> Result<Verification, ChainError> {
            Ok(Verification::matches(ledger.is_member(self.space_id, target.address).await?))
        }
    }

    fn space() -> U256 {
        U256::from(9u64)
    }

    fn targets(n: u8) -> Vec<Target> {
        Target::list((1..=n).map(Address::with_last_byte))
    }

    #[tokio::test]
    async fn classifies_each_target_independently() {
        let ledger = SimulatedLedger::new().with_space(space(), &[Address::with_last_byte(1)]);
        ledger.script(ops::JOIN_SPACE, Some(Address::with_last_byte(2)), Scripted::error("nonce too low"));
        ledger.script(ops::JOIN_SPACE, Some(Address::with_last_byte(3)), Scripted::DropEvent);
        ledger.script(ops::JOIN_SPACE, Some(Address::with_last_byte(4)), Scripted::RevertReceipt);

        let report = drive_account_run(
            "join-space",
            &Join { space_id: space() },
            &ledger,
            &targets(5),
            RunOptions::default(),
            None,
        )
        .await;

        let labels: Vec<_> = report.results.iter().map(|r| r.outcome.label()).collect();
        assert_eq!(labels, ["skipped", "failed", "verification-failed", "failed", "succeeded"]);
        assert_eq!(ledger.writes_from(Address::with_last_byte(1)), 0);
    }

    #[tokio::test]
    async fn streams_lifecycle_events() {
        let ledger = SimulatedLedger::new().with_space(space(), &[]);
        let (tx, mut rx) = unbounded_channel();

        drive_account_run(
            "join-space",
            &Join { space_id: space() },
            &ledger,
            &targets(2),
            RunOptions::default(),
            Some(&tx),
        )
        .await;
        drop(tx);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(match event {
                RunEvent::RunStarted { .. } => "run-started",
                RunEvent::AccountStarted { .. } => "account-started",
                RunEvent::Note { .. } => "note",
                RunEvent::AccountFinished { .. } => "account-finished",
                RunEvent::RunCompleted { .. } => "run-completed",
            });
        }
        assert_eq!(
            kinds,
            [
                "run-started",
                "account-started",
                "account-finished",
                "account-started",
                "account-finished",
                "run-completed"
            ]
        );
    }

    struct Broke {
        verifications: AtomicUsize,
        funder: Address,
        seen: Mutex<Vec<Address>>,
    }

    #[async_trait]
    impl AccountAction for Broke {
        fn operation(&self) -> &'static str {
            ops::TRANSFER
        }

        fn signer(&self, _target: &Target) -> Address {
            self.funder
        }

        async fn submit(&self, ledger: &dyn LedgerClient, target: &Target) -> Result<Settlement, ChainError> {
            self.seen.lock().unwrap().push(target.address);
            ledger.transfer_native(self.funder, target.address, U256::from(1u64)).await
        }

        fn confirmation(&self) -> Option<B256> {
            None
        }

        async fn verify(
            &self,
            _ledger: &dyn LedgerClient,
            _target: &Target,
            _settlement: &Settlement,
        ) -> Result<Verification, ChainError> {
            self.verifications.fetch_add(1, Ordering::SeqCst);
            Ok(Verification::matches(true))
        }
    }

    #[tokio::test]
    async fn insufficient_funds_reports_the_signer_balance() {
        let ledger = SimulatedLedger::new();
        let funder = Address::with_last_byte(0xf0);
        let action = Broke {
            verifications: AtomicUsize::new(0),
            funder,
            seen: Mutex::new(Vec::new()),
        };
        let (tx, mut rx) = unbounded_channel();

        let report = drive_account_run("fund", &action, &ledger, &targets(2), RunOptions::default(), Some(&tx)).await;
        drop(tx);

        assert_eq!(report.summary().rejected, 2);
        assert_eq!(action.seen.lock().unwrap().len(), 2);
        assert_eq!(action.verifications.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.read_count(ops::GET_BALANCE), 2);

        let mut notes = Vec::new();
        while let Some(event) = rx.recv().await {
            if let RunEvent::Note { message } = event {
                notes.push(message);
            }
        }
        assert_eq!(notes.len(), 2);
        assert!(notes[0].contains(&funder.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn delays_only_between_submissions() {
        let ledger = SimulatedLedger::new().with_space(space(), &[Address::with_last_byte(3)]);
        let options = RunOptions {
            delay: Some(std::time::Duration::from_secs(1)),
        };
        let started = tokio::time::Instant::now();

        drive_account_run("join-space", &Join { space_id: space() }, &ledger, &targets(3), options, None).await;

        // 1 and 2 submit and each has a successor; 3 is skipped.
        assert_eq!(started.elapsed(), std::time::Duration::from_secs(2));
    }
}
