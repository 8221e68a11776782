//! Operator console for the marketplace ledger.
//!
//! Lists pending purchases, deposits and withdrawals, resolves them on
//! behalf of an admin, applies schema migrations, and prints leaderboards.
//! Results are printed as JSON on stdout; logs go to stderr.

mod config;
mod logging;

use std::sync::Arc;

use anyhow::{Error, anyhow, bail};
use config::AdminConfig;
use gamehub_ledger::{Ledger, db::Database, ledger::PageRequest};
use log::info;
use logging::TracingObserver;
use pico_args::Arguments;
use serde::Serialize;

const HELP: &str = "\
Resolve marketplace ledger requests from the command line

USAGE:
  gh_admin [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
  migrate                          Apply pending schema migrations
  pending-purchases                List purchases awaiting approval
  pending-deposits                 List deposit requests awaiting approval
  pending-withdrawals              List withdraw requests awaiting approval
  approve-purchase  ID             Release escrow to the seller and platform
  reject-purchase   ID             Refund the buyer   [--reason TEXT]
  approve-deposit   ID             Credit the user    [--note TEXT]
  reject-deposit    ID             Decline a deposit  [--note TEXT]
  approve-withdraw  ID             Debit the user     [--note TEXT]
  reject-withdraw   ID             Decline a withdraw [--note TEXT]
  leaderboard       DEVELOPER_ID   Top players by points [--limit N]

OPTIONS:
  --db-url            URL     Database connection string  [default: env DATABASE_URL]
  --admin             EMAIL   Acting admin                [default: env ADMIN_EMAIL]
  --platform-account  EMAIL   Fee account                 [default: env PLATFORM_ACCOUNT_EMAIL]
  --page              N       Zero-based page for listings [default: 0]
  --size              N       Page size for listings       [default: env DEFAULT_PAGE_SIZE]

FLAGS:
  -h, --help                  Print help information

ENVIRONMENT:
  DATABASE_URL                PostgreSQL connection string
  RUST_LOG                    Log filter (default: info,sqlx=warn)
  (See .env file for all configuration options)
";

/// One console command and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Migrate,
    PendingPurchases(PageRequest),
    PendingDeposits(PageRequest),
    PendingWithdrawals(PageRequest),
    ApprovePurchase(i64),
    RejectPurchase { id: i64, reason: Option<String> },
    ApproveDeposit { id: i64, note: Option<String> },
    RejectDeposit { id: i64, note: Option<String> },
    ApproveWithdraw { id: i64, note: Option<String> },
    RejectWithdraw { id: i64, note: Option<String> },
    Leaderboard { developer_id: i64, limit: Option<u32> },
}

impl Command {
    /// Whether the command acts on behalf of an admin
    fn needs_admin(&self) -> bool {
        matches!(
            self,
            Command::ApprovePurchase(_)
                | Command::RejectPurchase { .. }
                | Command::ApproveDeposit { .. }
                | Command::RejectDeposit { .. }
                | Command::ApproveWithdraw { .. }
                | Command::RejectWithdraw { .. }
        )
    }
}

#[derive(Debug)]
struct Args {
    database_url: Option<String>,
    admin: Option<String>,
    platform_account: Option<String>,
    command: Command,
}

/// Parse everything after the program name
fn parse_args(mut pargs: Arguments) -> Result<Args, Error> {
    let database_url = pargs.opt_value_from_str("--db-url")?;
    let admin = pargs.opt_value_from_str("--admin")?;
    let platform_account = pargs.opt_value_from_str("--platform-account")?;
    let page = PageRequest::new(
        pargs.opt_value_from_str("--page")?.unwrap_or(0),
        pargs.opt_value_from_str("--size")?.unwrap_or(0),
    );
    let reason: Option<String> = pargs.opt_value_from_str("--reason")?;
    let note: Option<String> = pargs.opt_value_from_str("--note")?;
    let limit = pargs.opt_value_from_str("--limit")?;

    let Some(name) = pargs.subcommand()? else {
        bail!("No command given. Run with --help for usage.");
    };

    let command = match name.as_str() {
        "migrate" => Command::Migrate,
        "pending-purchases" => Command::PendingPurchases(page),
        "pending-deposits" => Command::PendingDeposits(page),
        "pending-withdrawals" => Command::PendingWithdrawals(page),
        "approve-purchase" => Command::ApprovePurchase(pargs.free_from_str()?),
        "reject-purchase" => Command::RejectPurchase {
            id: pargs.free_from_str()?,
            reason,
        },
        "approve-deposit" => Command::ApproveDeposit {
            id: pargs.free_from_str()?,
            note,
        },
        "reject-deposit" => Command::RejectDeposit {
            id: pargs.free_from_str()?,
            note,
        },
        "approve-withdraw" => Command::ApproveWithdraw {
            id: pargs.free_from_str()?,
            note,
        },
        "reject-withdraw" => Command::RejectWithdraw {
            id: pargs.free_from_str()?,
            note,
        },
        "leaderboard" => Command::Leaderboard {
            developer_id: pargs.free_from_str()?,
            limit,
        },
        other => bail!("Unknown command '{other}'. Run with --help for usage."),
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        bail!("Unexpected arguments: {remaining:?}");
    }

    Ok(Args {
        database_url,
        admin,
        platform_account,
        command,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run one ledger command and print its result
async fn run(ledger: &Ledger, command: Command, admin: &str) -> Result<(), Error> {
    match command {
        Command::Migrate => bail!("migrate runs before the ledger is built"),
        Command::PendingPurchases(page) => print_json(&ledger.escrow().pending(page).await?),
        Command::PendingDeposits(page) => {
            print_json(&ledger.payments().pending_deposits(page).await?)
        }
        Command::PendingWithdrawals(page) => {
            print_json(&ledger.payments().pending_withdrawals(page).await?)
        }
        Command::ApprovePurchase(id) => print_json(&ledger.escrow().approve(id, admin).await?),
        Command::RejectPurchase { id, reason } => {
            print_json(&ledger.escrow().reject(id, admin, reason).await?)
        }
        Command::ApproveDeposit { id, note } => {
            print_json(&ledger.payments().approve_deposit(id, admin, note).await?)
        }
        Command::RejectDeposit { id, note } => {
            print_json(&ledger.payments().reject_deposit(id, admin, note).await?)
        }
        Command::ApproveWithdraw { id, note } => {
            print_json(&ledger.payments().approve_withdraw(id, admin, note).await?)
        }
        Command::RejectWithdraw { id, note } => {
            print_json(&ledger.payments().reject_withdraw(id, admin, note).await?)
        }
        Command::Leaderboard {
            developer_id,
            limit,
        } => print_json(&ledger.rewards().leaderboard(developer_id, limit).await?),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let args = parse_args(pargs)?;

    logging::init();

    let config = AdminConfig::from_env(args.database_url, args.admin, args.platform_account)?;
    config.validate()?;

    let admin = if args.command.needs_admin() {
        config.require_admin()?.to_string()
    } else {
        String::new()
    };

    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;
    db.health_check()
        .await
        .map_err(|e| anyhow!("Database health check failed: {}", e))?;

    info!("Database connected successfully");

    if args.command == Command::Migrate {
        let result = db.migrate().await;
        db.close().await;
        result.map_err(|e| anyhow!("Migration failed: {}", e))?;
        info!("Migrations applied");
        return Ok(());
    }

    let ledger = Ledger::new(
        Arc::new(db.store()),
        Arc::new(TracingObserver),
        config.ledger.clone(),
    );

    let result = run(&ledger, args.command, &admin).await;
    db.close().await;
    result
}
