use std::{sync::Arc, time::Duration};

use alloy::{
    primitives::{Address, B256, U256},
    signers::local::PrivateKeySigner,
};
use daoscript_chain::{
    SimulatedLedger,
    client::ops,
    simulated::Scripted,
    units::{NATIVE_DECIMALS, parse_amount},
};
use daoscript_engine::{
    Aborted, Account, Harness, HarnessConfig, ValidationError,
    config::Contracts,
    workflows::{ProfileOperation, ProposalDraft, ProposalPayload},
};
use daoscript_types::{AccountOutcome, ProposalCore, ProposalInterface, RejectionReason, RunEvent};
use tokio::sync::mpsc;

const SPACE: u64 = 42;

fn space() -> U256 {
    U256::from(SPACE)
}

fn signer(n: u8) -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&B256::with_last_byte(n)).expect("valid test key")
}

fn accounts(count: u8) -> Vec<Account> {
    (1..=count).map(|n| Account::from_signer(signer(n))).collect()
}

fn addresses(accounts: &[Account]) -> Vec<Address> {
    accounts.iter().map(|account| account.address).collect()
}

fn config() -> HarnessConfig {
    HarnessConfig {
        rpc_url: "http://127.0.0.1:8545".into(),
        contracts: Contracts {
            space_factory: Some(Address::with_last_byte(0xa1)),
            proposals: Some(Address::with_last_byte(0xa2)),
            invite_system: Some(Address::with_last_byte(0xa3)),
            profile_manager: Some(Address::with_last_byte(0xa4)),
            join_method_directory: Some(Address::with_last_byte(0xa5)),
        },
        space_id: Some(space()),
        ..HarnessConfig::default()
    }
}

fn harness(config: HarnessConfig, ledger: &Arc<SimulatedLedger>, accounts: Vec<Account>) -> Harness {
    Harness::new(config, ledger.clone(), accounts)
}

fn outsider() -> Address {
    Address::with_last_byte(0xee)
}

#[tokio::test]
async fn three_accounts_join_an_existing_space() {
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[outsider()]));
    let accounts = accounts(3);
    let joined = addresses(&accounts);

    let run = harness(config(), &ledger, accounts).join_space().await.unwrap();

    assert_eq!(run.initial_members, 1);
    assert_eq!(run.final_members, 4);
    assert_eq!(run.added(), 3);
    assert_eq!(run.report.summary().succeeded, 3);
    assert_eq!(run.report.succeeded_addresses(), joined);
    assert_eq!(ledger.write_count(ops::JOIN_SPACE), 3);
}

#[tokio::test]
async fn member_count_grows_by_the_successful_joins() {
    let accounts = accounts(3);
    let existing = accounts[0].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[outsider(), existing]));

    let run = harness(config(), &ledger, accounts).join_space().await.unwrap();

    let summary = run.report.summary();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(ledger.write_count(ops::JOIN_SPACE), 2);
    assert_eq!(run.final_members, run.initial_members + summary.succeeded);
    assert_eq!(ledger.members(space()).len(), 4);
}

#[tokio::test]
async fn existing_members_are_skipped_without_a_write() {
    let accounts = accounts(2);
    let member = accounts[0].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[member]));

    let run = harness(config(), &ledger, accounts).join_space().await.unwrap();

    assert!(matches!(run.report.outcome_for(member), Some(AccountOutcome::Skipped { .. })));
    assert_eq!(ledger.writes_from(member), 0);
    assert_eq!(ledger.write_count(ops::JOIN_SPACE), 1);
}

#[tokio::test]
async fn accounts_failing_the_join_check_are_skipped() {
    let accounts = accounts(2);
    let denied = accounts[1].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[outsider()]));
    ledger.deny_join_check(space(), denied);
    let config = HarnessConfig {
        join_method: Some(U256::from(1u64)),
        ..config()
    };

    let run = harness(config, &ledger, accounts).join_space().await.unwrap();

    assert!(matches!(run.report.outcome_for(denied), Some(AccountOutcome::Skipped { .. })));
    assert_eq!(ledger.read_count(ops::JOIN_CHECK), 2);
    assert_eq!(ledger.write_count(ops::JOIN_SPACE), 1);
}

#[tokio::test]
async fn known_rejection_is_recorded_and_the_run_continues() {
    let accounts = accounts(3);
    let rejected = accounts[1].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[outsider()]));
    ledger.script(ops::JOIN_SPACE, Some(rejected), Scripted::revert("Join criteria not met"));

    let run = harness(config(), &ledger, accounts).join_space().await.unwrap();

    match run.report.outcome_for(rejected) {
        Some(AccountOutcome::Rejected { reason, .. }) => assert_eq!(*reason, RejectionReason::JoinCriteriaNotMet),
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert_eq!(run.report.summary().succeeded, 2);
    assert_eq!(run.added(), 2);
}

#[tokio::test]
async fn unclassified_node_errors_fail_the_account_only() {
    let accounts = accounts(2);
    let failing = accounts[0].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[outsider()]));
    ledger.script(ops::JOIN_SPACE, Some(failing), Scripted::error("nonce too low"));

    let run = harness(config(), &ledger, accounts).join_space().await.unwrap();

    assert!(matches!(run.report.outcome_for(failing), Some(AccountOutcome::Failed { .. })));
    assert_eq!(run.report.summary().succeeded, 1);
}

#[tokio::test]
async fn missing_confirmation_event_fails_verification() {
    let accounts = accounts(1);
    let account = accounts[0].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[outsider()]));
    ledger.script(ops::JOIN_SPACE, Some(account), Scripted::DropEvent);

    let run = harness(config(), &ledger, accounts).join_space().await.unwrap();

    match run.report.outcome_for(account) {
        Some(AccountOutcome::VerificationFailed {
            event_present,
            state_matches,
            ..
        }) => {
            assert!(!event_present);
            assert!(state_matches);
        }
        other => panic!("expected a verification failure, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_settings_abort_before_any_call() {
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[]));
    let config = HarnessConfig {
        space_id: None,
        ..config()
    };

    let error = harness(config, &ledger, accounts(2)).join_space().await.unwrap_err();

    assert!(matches!(
        error.downcast_ref::<ValidationError>(),
        Some(ValidationError::MissingSetting { setting: "TEST_SPACE_ID", .. })
    ));
    assert_eq!(ledger.read_count(ops::GET_SPACE_MEMBERS), 0);
    assert!(ledger.writes().is_empty());
}

#[tokio::test]
async fn each_account_creates_its_own_space() {
    let ledger = Arc::new(SimulatedLedger::new());
    let accounts = accounts(2);
    let creators = addresses(&accounts);

    let report = harness(config(), &ledger, accounts).create_spaces().await.unwrap();

    assert_eq!(report.summary().succeeded, 2);
    assert_eq!(report.succeeded_addresses(), creators);
    assert_eq!(ledger.write_count(ops::CREATE_SPACE), 2);
}

#[tokio::test]
async fn invite_aborts_when_the_inviter_is_not_a_member() {
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[outsider()]));

    let error = harness(config(), &ledger, accounts(3)).invite().await.unwrap_err();

    assert!(error.downcast_ref::<Aborted>().is_some());
    assert!(ledger.writes().is_empty());
}

#[tokio::test]
async fn invites_skip_accounts_already_invited() {
    let accounts = accounts(3);
    let inviter = accounts[0].address;
    let invited = accounts[1].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[inviter]));
    ledger.add_invite(space(), invited);

    let report = harness(config(), &ledger, accounts).invite().await.unwrap();

    assert_eq!(report.results.len(), 2);
    assert!(matches!(report.outcome_for(invited), Some(AccountOutcome::Skipped { .. })));
    assert_eq!(report.summary().succeeded, 1);
    assert_eq!(ledger.write_count(ops::CREATE_INVITE), 1);
    assert_eq!(ledger.writes_from(inviter), 1);
}

#[tokio::test]
async fn batch_invite_is_one_write_and_one_read_per_invitee() {
    let accounts = accounts(4);
    let inviter = accounts[0].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[inviter]));

    let report = harness(config(), &ledger, accounts).batch_invite().await.unwrap();

    assert_eq!(report.summary().succeeded, 3);
    assert_eq!(ledger.write_count(ops::CREATE_BATCH_INVITES), 1);
    assert_eq!(ledger.writes().len(), 1);
    assert_eq!(ledger.read_count(ops::CHECK_JOIN), 3);
}

#[tokio::test]
async fn batch_rejection_is_shared_by_every_invitee() {
    let accounts = accounts(3);
    let inviter = accounts[0].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[inviter]));
    ledger.script(
        ops::CREATE_BATCH_INVITES,
        Some(inviter),
        Scripted::revert("Invite already exists"),
    );

    let report = harness(config(), &ledger, accounts).batch_invite().await.unwrap();

    assert_eq!(report.summary().rejected, 2);
    assert!(report.results.iter().all(|result| matches!(
        &result.outcome,
        AccountOutcome::Rejected {
            reason: RejectionReason::InviteAlreadyExists,
            ..
        }
    )));
}

#[tokio::test]
async fn batch_insufficient_funds_reports_the_inviter_balance() {
    let accounts = accounts(3);
    let inviter = accounts[0].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[inviter]));
    ledger.script(
        ops::CREATE_BATCH_INVITES,
        Some(inviter),
        Scripted::error("insufficient funds for gas * price + value"),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();

    let report = harness(config(), &ledger, accounts)
        .with_events(tx)
        .batch_invite()
        .await
        .unwrap();

    assert_eq!(report.summary().rejected, 2);
    assert!(report.results.iter().all(|result| matches!(
        &result.outcome,
        AccountOutcome::Rejected {
            reason: RejectionReason::InsufficientFunds,
            ..
        }
    )));
    assert_eq!(ledger.read_count(ops::GET_BALANCE), 2);

    let mut balance_notes = 0;
    while let Ok(event) = rx.try_recv() {
        if let RunEvent::Note { message } = event
            && message.contains(&format!("current balance of {inviter}"))
        {
            balance_notes += 1;
        }
    }
    assert_eq!(balance_notes, 2);
}

#[tokio::test]
async fn profile_lifecycle_is_verified_by_state() {
    let ledger = Arc::new(SimulatedLedger::new());
    let accounts = accounts(2);
    let first = accounts[0].address;
    let harness = harness(config(), &ledger, accounts);

    let created = harness.profiles(ProfileOperation::Create).await.unwrap();
    assert_eq!(created.summary().succeeded, 2);
    assert_eq!(ledger.profile(first).unwrap().username, "TestUser1");

    let again = harness.profiles(ProfileOperation::Create).await.unwrap();
    assert_eq!(again.summary().skipped, 2);

    let edited = harness.profiles(ProfileOperation::Edit).await.unwrap();
    assert_eq!(edited.summary().succeeded, 2);
    assert_eq!(ledger.profile(first).unwrap().username, "UpdatedUser1");

    let deleted = harness.profiles(ProfileOperation::Delete).await.unwrap();
    assert_eq!(deleted.summary().succeeded, 2);
    assert!(ledger.profile(first).is_none());
    assert_eq!(ledger.write_count(ops::CREATE_PROFILE), 2);
}

fn mint_draft(to: Address) -> ProposalDraft {
    ProposalDraft::new(ProposalPayload::Mint {
        token: Address::with_last_byte(0xb1),
        to,
        amount: parse_amount("5", NATIVE_DECIMALS).unwrap(),
    })
}

#[tokio::test]
async fn proposal_is_created_and_read_back() {
    let accounts = accounts(1);
    let proposer = accounts[0].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[proposer]));

    let run = harness(config(), &ledger, accounts)
        .create_proposal(mint_draft(proposer))
        .await
        .unwrap();

    assert_eq!(run.report.summary().succeeded, 1);
    let core = ledger.proposal(run.proposal_id.unwrap()).unwrap();
    assert_eq!(core.question, "Token Mint Proposal");
    assert_eq!(core.creator, proposer);
    assert_eq!(core.end_time - core.start_time, 7 * 24 * 60 * 60);
}

#[tokio::test]
async fn proposal_aborts_when_the_proposer_is_not_a_member() {
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[outsider()]));

    let error = harness(config(), &ledger, accounts(1))
        .create_proposal(mint_draft(outsider()))
        .await
        .unwrap_err();

    assert!(error.downcast_ref::<Aborted>().is_some());
    assert!(ledger.writes().is_empty());
}

#[tokio::test]
async fn remove_member_proposal_requires_a_current_member() {
    let accounts = accounts(1);
    let proposer = accounts[0].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[proposer]));
    let draft = ProposalDraft::new(ProposalPayload::RemoveMember { member: outsider() });

    let error = harness(config(), &ledger, accounts)
        .create_proposal(draft)
        .await
        .unwrap_err();

    assert!(error.downcast_ref::<Aborted>().is_some());
    assert!(ledger.writes().is_empty());
}

#[tokio::test]
async fn flat_v1_rejects_value_transfers_before_submitting() {
    let accounts = accounts(1);
    let proposer = accounts[0].address;
    let ledger = Arc::new(
        SimulatedLedger::new()
            .with_space(space(), &[proposer])
            .with_proposal_interface(ProposalInterface::FlatV1),
    );
    let config = HarnessConfig {
        proposal_interface: ProposalInterface::FlatV1,
        ..config()
    };
    let draft = ProposalDraft::new(ProposalPayload::ValueTransfer {
        to: outsider(),
        amount: U256::from(1u64),
    });

    let error = harness(config, &ledger, accounts)
        .create_proposal(draft)
        .await
        .unwrap_err();

    assert!(matches!(
        error.downcast_ref::<ValidationError>(),
        Some(ValidationError::ValueNotSupported { .. })
    ));
    assert!(ledger.writes().is_empty());
}

#[tokio::test]
async fn executor_transfer_proposal_succeeds_for_a_space_with_an_executor() {
    let accounts = accounts(1);
    let proposer = accounts[0].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[proposer]));
    let draft = ProposalDraft::new(ProposalPayload::NativeTransfer {
        to: outsider(),
        amount: parse_amount("0.001", NATIVE_DECIMALS).unwrap(),
    });

    let run = harness(config(), &ledger, accounts)
        .create_proposal(draft)
        .await
        .unwrap();

    assert_eq!(run.report.summary().succeeded, 1);
    let core = ledger.proposal(run.proposal_id.unwrap()).unwrap();
    assert_eq!(core.question, "ETH Transfer Proposal");
}

#[tokio::test]
async fn executor_transfer_aborts_without_an_executor() {
    let accounts = accounts(1);
    let proposer = accounts[0].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[proposer]));
    ledger.set_executor(space(), Address::ZERO);
    let draft = ProposalDraft::new(ProposalPayload::NativeTransfer {
        to: outsider(),
        amount: U256::from(1u64),
    });

    let error = harness(config(), &ledger, accounts)
        .create_proposal(draft)
        .await
        .unwrap_err();

    assert!(error.downcast_ref::<Aborted>().is_some());
    assert!(ledger.writes().is_empty());
}

#[tokio::test]
async fn edited_proposal_reads_back_the_new_question() {
    let accounts = accounts(1);
    let proposer = accounts[0].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[proposer]));
    let created = harness(config(), &ledger, accounts.clone())
        .create_proposal(mint_draft(proposer))
        .await
        .unwrap();

    let config = HarnessConfig {
        proposal_id: created.proposal_id,
        ..config()
    };
    let draft = ProposalDraft {
        question: Some("Updated: Token Mint Proposal".into()),
        ..mint_draft(proposer)
    };
    let edited = harness(config, &ledger, accounts).edit_proposal(draft).await.unwrap();

    assert_eq!(edited.report.summary().succeeded, 1);
    let core = ledger.proposal(created.proposal_id.unwrap()).unwrap();
    assert_eq!(core.question, "Updated: Token Mint Proposal");
    assert_eq!(ledger.write_count(ops::EDIT_PROPOSAL), 1);
}

#[tokio::test]
async fn editing_requires_the_struct_interface() {
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[outsider()]));
    let config = HarnessConfig {
        proposal_id: Some(U256::from(1u64)),
        proposal_interface: ProposalInterface::FlatV2,
        ..config()
    };

    let error = harness(config, &ledger, accounts(1))
        .edit_proposal(mint_draft(outsider()))
        .await
        .unwrap_err();

    assert!(matches!(
        error.downcast_ref::<ValidationError>(),
        Some(ValidationError::UnsupportedInterface { .. })
    ));
    assert!(ledger.writes().is_empty());
}

#[tokio::test]
async fn members_vote_once_and_others_are_skipped() {
    let accounts = accounts(3);
    let members = [accounts[0].address, accounts[1].address];
    let non_member = accounts[2].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &members));
    let created = harness(config(), &ledger, accounts.clone())
        .create_proposal(mint_draft(members[0]))
        .await
        .unwrap();
    let proposal_id = created.proposal_id.unwrap();
    ledger.record_vote(proposal_id, members[1]);

    let config = HarnessConfig {
        proposal_id: Some(proposal_id),
        ..config()
    };
    let report = harness(config, &ledger, accounts)
        .vote(true, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(report.summary().succeeded, 1);
    assert_eq!(report.summary().skipped, 2);
    assert!(matches!(report.outcome_for(non_member), Some(AccountOutcome::Skipped { .. })));
    assert_eq!(ledger.write_count(ops::VOTE), 1);
    assert_eq!(ledger.proposal(proposal_id).unwrap().yes_votes, U256::from(1u64));
}

#[tokio::test]
async fn voting_aborts_outside_the_window() {
    let accounts = accounts(1);
    let member = accounts[0].address;
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[member]));
    let proposal_id = U256::from(7u64);
    ledger.insert_proposal(
        proposal_id,
        ProposalCore {
            space_id: space(),
            question: "Later".into(),
            description: "Opens in the future".into(),
            start_time: u64::MAX - 1,
            end_time: u64::MAX,
            executed: false,
            expired: false,
            yes_votes: U256::ZERO,
            no_votes: U256::ZERO,
            total_voting_power: U256::from(1u64),
            creator: member,
        },
    );
    let config = HarnessConfig {
        proposal_id: Some(proposal_id),
        ..config()
    };

    let error = harness(config, &ledger, accounts)
        .vote(true, Duration::ZERO)
        .await
        .unwrap_err();

    let aborted = error.downcast_ref::<Aborted>().unwrap();
    assert!(aborted.reason.contains("not started"));
    assert!(ledger.writes().is_empty());
}

#[tokio::test]
async fn funding_tops_up_every_account() {
    let funder = signer(9);
    let ledger = Arc::new(SimulatedLedger::new());
    ledger.set_balance(funder.address(), parse_amount("1", NATIVE_DECIMALS).unwrap());
    let accounts = accounts(2);
    let recipients = addresses(&accounts);
    let amount = parse_amount("0.0002", NATIVE_DECIMALS).unwrap();
    let config = HarnessConfig {
        funder: Some(funder),
        ..config()
    };

    let report = harness(config, &ledger, accounts).fund(amount).await.unwrap();

    assert_eq!(report.summary().succeeded, 2);
    assert_eq!(ledger.write_count(ops::TRANSFER), 2);
    for recipient in recipients {
        assert!(report.outcome_for(recipient).unwrap().is_success());
    }
}

#[tokio::test]
async fn an_empty_funder_is_rejected_for_each_account() {
    let funder = signer(9);
    let ledger = Arc::new(SimulatedLedger::new());
    let config = HarnessConfig {
        funder: Some(funder),
        ..config()
    };

    let report = harness(config, &ledger, accounts(2))
        .fund(U256::from(1u64))
        .await
        .unwrap();

    assert_eq!(report.summary().rejected, 2);
    assert!(report.results.iter().all(|result| matches!(
        &result.outcome,
        AccountOutcome::Rejected {
            reason: RejectionReason::InsufficientFunds,
            ..
        }
    )));
}

#[tokio::test]
async fn progress_is_streamed_in_order() {
    let ledger = Arc::new(SimulatedLedger::new().with_space(space(), &[outsider()]));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let harness = harness(config(), &ledger, accounts(2)).with_events(tx);
    harness.join_space().await.unwrap();
    drop(harness);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    let lifecycle: Vec<_> = events
        .iter()
        .filter(|event| !matches!(event, RunEvent::Note { .. }))
        .collect();
    assert!(matches!(lifecycle.first(), Some(RunEvent::RunStarted { accounts: 2, .. })));
    assert!(matches!(lifecycle.last(), Some(RunEvent::RunCompleted { .. })));
    assert_eq!(
        lifecycle
            .iter()
            .filter(|event| matches!(event, RunEvent::AccountFinished { .. }))
            .count(),
        2
    );
    assert!(matches!(events.first(), Some(RunEvent::Note { .. })));
}
