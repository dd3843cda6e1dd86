mod commands;

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::ArgMatches;
use daoscript_chain::RpcLedger;
use daoscript_engine::{
    Aborted, Harness, HarnessConfig, WorkflowKind, load_accounts, load_config, signers, validate_config,
    workflows::{DEFAULT_VOTE_DELAY, ProfileOperation},
};
use daoscript_types::{RunEvent, RunReport};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::Level;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let matches = commands::build_cli().get_matches();

    match run(&matches).await {
        Err(error) if error.downcast_ref::<Aborted>().is_some() => {
            println!("{error}");
            Ok(())
        }
        other => other,
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .try_init();
}

fn workflow_for(matches: &ArgMatches) -> Result<WorkflowKind> {
    let (name, sub) = matches.subcommand().context("expected a workflow subcommand")?;
    let nested = || sub.subcommand_name().context("expected a nested subcommand");
    Ok(match name {
        "join-space" => WorkflowKind::JoinSpace,
        "create-space" => WorkflowKind::CreateSpace,
        "invite" if sub.get_flag("batch") => WorkflowKind::BatchInvite,
        "invite" => WorkflowKind::Invite,
        "profile" => match nested()? {
            "create" => WorkflowKind::CreateProfile,
            "edit" => WorkflowKind::EditProfile,
            _ => WorkflowKind::DeleteProfile,
        },
        "proposal" => match nested()? {
            "edit" => WorkflowKind::EditProposal,
            _ => WorkflowKind::CreateProposal,
        },
        "vote" => WorkflowKind::Vote,
        "fund" => WorkflowKind::Fund,
        other => anyhow::bail!("unknown workflow: {other}"),
    })
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let workflow = workflow_for(matches)?;

    let config_path = matches.get_one::<String>("config").map(Path::new);
    let mut config = load_config(config_path).context("failed to load configuration")?;
    commands::apply_overrides(&mut config, matches)?;
    validate_config(&config, workflow)?;

    let accounts = load_accounts(&config.accounts_path)
        .with_context(|| format!("failed to load accounts from {}", config.accounts_path.display()))?;
    let mut keys = signers(&accounts);
    keys.extend(config.funder.clone());
    let ledger = RpcLedger::connect(config.rpc_settings(), keys).context("failed to connect to the endpoint")?;

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(rx));
    let harness = Harness::new(config.clone(), Arc::new(ledger), accounts).with_events(tx);

    let outcome = execute(&harness, &config, workflow, matches).await;
    drop(harness);
    let _ = printer.await;

    let report = outcome?;
    println!("{}: {}", report.workflow, report.summary());
    Ok(())
}

async fn execute(
    harness: &Harness,
    config: &HarnessConfig,
    workflow: WorkflowKind,
    matches: &ArgMatches,
) -> Result<RunReport> {
    let (_, sub) = matches.subcommand().context("expected a workflow subcommand")?;
    match workflow {
        WorkflowKind::JoinSpace => Ok(harness.join_space().await?.report),
        WorkflowKind::CreateSpace => harness.create_spaces().await,
        WorkflowKind::Invite => harness.invite().await,
        WorkflowKind::BatchInvite => harness.batch_invite().await,
        WorkflowKind::CreateProfile => harness.profiles(ProfileOperation::Create).await,
        WorkflowKind::EditProfile => harness.profiles(ProfileOperation::Edit).await,
        WorkflowKind::DeleteProfile => harness.profiles(ProfileOperation::Delete).await,
        WorkflowKind::CreateProposal | WorkflowKind::EditProposal => {
            let editing = workflow == WorkflowKind::EditProposal;
            let (_, action) = sub.subcommand().context("expected create or edit")?;
            let draft = commands::proposal_draft(config, editing, action)?;
            let run = if editing {
                harness.edit_proposal(draft).await?
            } else {
                harness.create_proposal(draft).await?
            };
            if let Some(id) = run.proposal_id {
                println!("proposal id: {id}");
            }
            Ok(run.report)
        }
        WorkflowKind::Vote => {
            let delay = sub
                .get_one::<u64>("delay-ms")
                .map(|ms| Duration::from_millis(*ms))
                .unwrap_or(DEFAULT_VOTE_DELAY);
            harness.vote(!sub.get_flag("against"), delay).await
        }
        WorkflowKind::Fund => harness.fund(commands::funding_amount(sub)?).await,
    }
}

async fn print_events(mut rx: UnboundedReceiver<RunEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::RunStarted { workflow, accounts, at } => {
                println!("[{}] {workflow}: {accounts} accounts", at.format("%H:%M:%S"));
            }
            RunEvent::AccountStarted { index, address } => println!("  #{} {address}", index + 1),
            RunEvent::Note { message } => println!("  {message}"),
            RunEvent::AccountFinished { index, outcome, .. } => println!("  #{} {outcome}", index + 1),
            RunEvent::RunCompleted { workflow, summary, at } => {
                println!("[{}] {workflow} finished: {summary}", at.format("%H:%M:%S"));
            }
        }
    }
}
