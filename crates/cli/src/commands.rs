//! Command-line surface and translation of matches into workflow inputs.

use std::str::FromStr;

use alloy::primitives::{Address, U256, address};
use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use daoscript_chain::units::{NATIVE_DECIMALS, USDC_DECIMALS, parse_amount};
use daoscript_engine::{
    HarnessConfig,
    workflows::{
        DAY_SECS, DEFAULT_EDIT_VOTING_DURATION, DEFAULT_FUNDING_AMOUNT, DEFAULT_VOTE_DELAY, DEFAULT_VOTING_DURATION,
        ProposalDraft, ProposalPayload, development_task, updated_development_task,
    },
};

/// USDC on Base.
const USDC_ADDRESS: Address = address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
const WORK_PROPOSAL_ADDRESS: Address = address!("0x228CE0ad604305b0053764De9CBa612d22fCbeD5");

pub fn build_cli() -> Command {
    Command::new("daoscript")
        .about("Drive DAO contract workflows with a set of test accounts")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .action(ArgAction::Set)
                .help("Path to a JSON config file"),
        )
        .arg(
            Arg::new("accounts")
                .long("accounts")
                .global(true)
                .action(ArgAction::Set)
                .help("Path to the accounts file"),
        )
        .arg(
            Arg::new("space")
                .long("space")
                .global(true)
                .action(ArgAction::Set)
                .help("Space id (overrides TEST_SPACE_ID)"),
        )
        .arg(
            Arg::new("proposal")
                .long("proposal")
                .global(true)
                .action(ArgAction::Set)
                .help("Proposal id (overrides PROPOSAL_ID)"),
        )
        .arg(
            Arg::new("gas-limit")
                .long("gas-limit")
                .global(true)
                .action(ArgAction::Set)
                .help("Fixed gas limit for every transaction"),
        )
        .subcommand(Command::new("join-space").about("Every account joins the space"))
        .subcommand(Command::new("create-space").about("Every account creates a numbered space"))
        .subcommand(
            Command::new("invite")
                .about("The first account invites every other account")
                .arg(
                    Arg::new("batch")
                        .long("batch")
                        .action(ArgAction::SetTrue)
                        .help("Send all invites in one transaction"),
                ),
        )
        .subcommand(
            Command::new("profile")
                .about("Manage account profiles")
                .subcommand_required(true)
                .subcommand(Command::new("create").about("Create a profile for every account"))
                .subcommand(Command::new("edit").about("Update every account's profile"))
                .subcommand(Command::new("delete").about("Delete every account's profile")),
        )
        .subcommand(
            Command::new("proposal")
                .about("Create or edit a proposal with the first account")
                .subcommand_required(true)
                .subcommand(payload_commands(Command::new("create").about("Create a proposal")))
                .subcommand(payload_commands(
                    Command::new("edit").about("Edit the configured proposal"),
                )),
        )
        .subcommand(
            Command::new("vote")
                .about("Every member votes on the configured proposal")
                .arg(
                    Arg::new("against")
                        .long("against")
                        .action(ArgAction::SetTrue)
                        .help("Vote no instead of yes"),
                )
                .arg(
                    Arg::new("delay-ms")
                        .long("delay-ms")
                        .action(ArgAction::Set)
                        .value_parser(clap::value_parser!(u64))
                        .help(format!(
                            "Pause between voters in milliseconds [default: {}]",
                            DEFAULT_VOTE_DELAY.as_millis()
                        )),
                ),
        )
        .subcommand(
            Command::new("fund")
                .about("Send ETH from PRIVATE_KEY to every account")
                .arg(
                    Arg::new("amount")
                        .long("amount")
                        .action(ArgAction::Set)
                        .default_value(DEFAULT_FUNDING_AMOUNT)
                        .help("ETH per account"),
                ),
        )
}

fn payload_commands(command: Command) -> Command {
    let text_args = [
        Arg::new("question").long("question").action(ArgAction::Set),
        Arg::new("description").long("description").action(ArgAction::Set),
        Arg::new("voting-days")
            .long("voting-days")
            .action(ArgAction::Set)
            .value_parser(clap::value_parser!(u64))
            .help("Voting window in days [default: 7, or 10 when editing]"),
    ];
    let with_text = |sub: Command| sub.args(text_args.clone());

    command
        .subcommand_required(true)
        .subcommand(with_text(
            Command::new("erc20-transfer")
                .about("Transfer ERC20 tokens from the treasury")
                .arg(Arg::new("token").long("token").action(ArgAction::Set))
                .arg(Arg::new("symbol").long("symbol").default_value("USDC"))
                .arg(
                    Arg::new("decimals")
                        .long("decimals")
                        .value_parser(clap::value_parser!(u8))
                        .default_value("6"),
                )
                .arg(Arg::new("to").long("to").required(true))
                .arg(Arg::new("amount").long("amount").default_value("0.0001")),
        ))
        .subcommand(with_text(
            Command::new("mint")
                .about("Mint tokens to an address")
                .arg(Arg::new("token").long("token").required(true))
                .arg(Arg::new("to").long("to").required(true))
                .arg(Arg::new("amount").long("amount").default_value("100")),
        ))
        .subcommand(with_text(
            Command::new("remove-member")
                .about("Remove a member from the space")
                .arg(Arg::new("member").long("member").required(true)),
        ))
        .subcommand(with_text(
            Command::new("join-space")
                .about("Have the space join another space")
                .arg(
                    Arg::new("target-space")
                        .long("target-space")
                        .help("Space to join (overrides TARGET_SPACE_ID)"),
                ),
        ))
        .subcommand(with_text(
            Command::new("assign-work")
                .about("Assign paid work to a worker")
                .arg(Arg::new("contract").long("contract"))
                .arg(Arg::new("worker").long("worker").required(true))
                .arg(Arg::new("amount").long("amount").help("USDC paid for the work"))
                .arg(
                    Arg::new("work-days")
                        .long("work-days")
                        .value_parser(clap::value_parser!(u64)),
                ),
        ))
        .subcommand(with_text(
            Command::new("native-transfer")
                .about("Transfer ETH through the space executor")
                .arg(Arg::new("to").long("to").required(true))
                .arg(Arg::new("amount").long("amount").default_value("0.0001")),
        ))
        .subcommand(with_text(
            Command::new("value-transfer")
                .about("Send ETH as the proposal's value")
                .arg(Arg::new("to").long("to").required(true))
                .arg(Arg::new("amount").long("amount").default_value("0.0001")),
        ))
}

/// Apply the global overrides on top of file and environment settings.
pub fn apply_overrides(config: &mut HarnessConfig, matches: &ArgMatches) -> Result<()> {
    if let Some(path) = matches.get_one::<String>("accounts") {
        config.accounts_path = path.into();
    }
    if let Some(space) = matches.get_one::<String>("space") {
        config.space_id = Some(parse_u256("--space", space)?);
    }
    if let Some(proposal) = matches.get_one::<String>("proposal") {
        config.proposal_id = Some(parse_u256("--proposal", proposal)?);
    }
    if let Some(limit) = matches.get_one::<String>("gas-limit") {
        let limit = limit
            .parse::<u64>()
            .with_context(|| format!("--gas-limit is not a number: {limit}"))?;
        config.gas_limit = Some(limit);
    }
    Ok(())
}

/// Build the draft for `proposal create|edit <kind>`.
pub fn proposal_draft(config: &HarnessConfig, editing: bool, matches: &ArgMatches) -> Result<ProposalDraft> {
    let (kind, sub) = matches.subcommand().context("expected a proposal kind")?;
    let payload = match kind {
        "erc20-transfer" => {
            let decimals = sub.get_one::<u8>("decimals").copied().unwrap_or(USDC_DECIMALS);
            ProposalPayload::Erc20Transfer {
                token: optional_address(sub, "token")?.unwrap_or(USDC_ADDRESS),
                to: required_address(sub, "to")?,
                amount: amount(sub, "amount", decimals)?,
                symbol: string(sub, "symbol").unwrap_or("USDC").to_string(),
                decimals,
            }
        }
        "mint" => ProposalPayload::Mint {
            token: required_address(sub, "token")?,
            to: required_address(sub, "to")?,
            amount: amount(sub, "amount", NATIVE_DECIMALS)?,
        },
        "remove-member" => ProposalPayload::RemoveMember {
            member: required_address(sub, "member")?,
        },
        "join-space" => {
            let target_space = match string(sub, "target-space") {
                Some(value) => parse_u256("--target-space", value)?,
                None => config
                    .target_space_id
                    .context("a target space is required (--target-space or TARGET_SPACE_ID)")?,
            };
            ProposalPayload::JoinSpace { target_space }
        }
        "assign-work" => {
            let space_id = config
                .space_id
                .context("a space is required (--space or TEST_SPACE_ID)")?;
            let worker = required_address(sub, "worker")?;
            let contract = optional_address(sub, "contract")?.unwrap_or(WORK_PROPOSAL_ADDRESS);
            let (default_amount, default_days) = if editing { ("150", 45) } else { ("100", 30) };
            let amount = parse_amount(string(sub, "amount").unwrap_or(default_amount), USDC_DECIMALS)?;
            let work_days = sub.get_one::<u64>("work-days").copied().unwrap_or(default_days);
            let duration = days_to_secs("--work-days", work_days)?;
            let work = if editing {
                updated_development_task(space_id, worker, amount, duration)
            } else {
                development_task(space_id, worker, amount, duration)
            };
            ProposalPayload::AssignWork { contract, work }
        }
        "native-transfer" => ProposalPayload::NativeTransfer {
            to: required_address(sub, "to")?,
            amount: amount(sub, "amount", NATIVE_DECIMALS)?,
        },
        "value-transfer" => ProposalPayload::ValueTransfer {
            to: required_address(sub, "to")?,
            amount: amount(sub, "amount", NATIVE_DECIMALS)?,
        },
        other => bail!("unknown proposal kind: {other}"),
    };

    let mut draft = ProposalDraft::new(payload);
    draft.question = string(sub, "question").map(str::to_string);
    draft.description = string(sub, "description").map(str::to_string);
    draft.voting_duration = match sub.get_one::<u64>("voting-days") {
        Some(days) => days_to_secs("--voting-days", *days)?,
        None if editing => DEFAULT_EDIT_VOTING_DURATION,
        None => DEFAULT_VOTING_DURATION,
    };
    if editing && draft.question.is_none() && matches!(draft.payload, ProposalPayload::AssignWork { .. }) {
        draft.question = Some("Updated: Assign Development Work".to_string());
    }
    Ok(draft)
}

pub fn funding_amount(matches: &ArgMatches) -> Result<U256> {
    amount(matches, "amount", NATIVE_DECIMALS)
}

fn string<'a>(matches: &'a ArgMatches, name: &str) -> Option<&'a str> {
    matches.get_one::<String>(name).map(String::as_str)
}

fn amount(matches: &ArgMatches, name: &str, decimals: u8) -> Result<U256> {
    let value = string(matches, name).with_context(|| format!("--{name} is required"))?;
    parse_amount(value, decimals).with_context(|| format!("--{name} is not a valid amount: {value}"))
}

fn required_address(matches: &ArgMatches, name: &str) -> Result<Address> {
    optional_address(matches, name)?.with_context(|| format!("--{name} is required"))
}

fn optional_address(matches: &ArgMatches, name: &str) -> Result<Option<Address>> {
    string(matches, name)
        .map(|value| Address::from_str(value).with_context(|| format!("--{name} is not an address: {value}")))
        .transpose()
}

fn days_to_secs(flag: &str, days: u64) -> Result<u64> {
    days.checked_mul(DAY_SECS)
        .with_context(|| format!("{flag} is too large: {days}"))
}

fn parse_u256(flag: &str, value: &str) -> Result<U256> {
    U256::from_str(value).with_context(|| format!("{flag} is not a number: {value}"))
}
