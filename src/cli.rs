use anyhow::{bail, Context as _, Result};
use console::{pad_str, style, Alignment, StyledObject};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::aggregator::Aggregator as _;
use crate::args::{self, Args, Command, SyncArgs};
use crate::clock::{Clock, SystemClock};
use crate::dashboard::{Dashboard, DashboardError, FetchedSnapshot};
use crate::domain::{Balances, Institution, ItemId, LinkedItemSummary, TaggedAccount, UserId};
use crate::plaid_api::Plaid;
use crate::registry::ItemRegistry;
use crate::server;
use crate::snapshot_cache::SnapshotCache;
use crate::store::{Cipher as _, KeyValueStore, XChaCha20Poly1305Cipher};
use crate::sync::ItemFailure;
use crate::terminal::{self, BulletPointPrinter, LineWriter};

pub async fn main(args: Args) -> Result<()> {
    match args.command {
        Command::GenerateKey => main_generate_key(),
        Command::TestConnection => main_test_connection(&args).await,
        Command::Serve {
            address,
            port,
            ref user_header,
            ref sync,
        } => {
            let dashboard = open_dashboard(&args, sync).await?;
            let config = args::server_config(address, port, user_header.clone());
            server::serve(dashboard, &config).await
        }
        Command::ListItems { ref user } => {
            let user = UserId::new(user.as_str())?;
            let store = args.store.config().open().await?;
            let items = ItemRegistry::new(store).list_items(&user).await?;
            let items: Vec<_> = items.iter().map(|item| item.summary()).collect();
            println!("{}", style_header("Linked items:"));
            print_items(&BulletPointPrinter::new_stdout(), &items);
            Ok(())
        }
        Command::RemoveItem {
            ref user,
            ref item,
            yes,
        } => {
            let user = UserId::new(user.as_str())?;
            let item_id = ItemId::new(item.as_str());
            if !yes && !terminal::confirm(&format!("Remove item {item_id} of user {user}?"))? {
                println!("Aborted");
                return Ok(());
            }
            let dashboard = open_dashboard(&args, &SyncArgs::default()).await?;
            match dashboard.remove_item(&user, &item_id).await {
                Ok(()) => {
                    println!("Removed item {item_id}");
                    Ok(())
                }
                Err(DashboardError::NotLinked) => bail!("User {user} has no linked items"),
                Err(err) => Err(err.into()),
            }
        }
        Command::Sync {
            ref user,
            refresh,
            ref sync,
        } => {
            let user = UserId::new(user.as_str())?;
            let dashboard = open_dashboard(&args, sync).await?;
            let fetched = dashboard
                .fetch_snapshot(&user, refresh)
                .await
                .context("Failed to fetch snapshot")?;
            print_snapshot(&BulletPointPrinter::new_stdout(), &fetched);
            Ok(())
        }
    }
}

fn main_generate_key() -> Result<()> {
    let key = XChaCha20Poly1305Cipher::new_key();
    println!("{}", XChaCha20Poly1305Cipher::key_to_base64(&key));
    Ok(())
}

async fn main_test_connection(args: &Args) -> Result<()> {
    let plaid = Plaid::new(&args.plaid.config()?)?;
    let probe_user = UserId::new("connection-test")?;
    plaid
        .create_link_token(&probe_user, plaid.link_settings())
        .await
        .context("Plaid API connection failed")?;
    println!("{}", style("Plaid API connection works").green().bold());
    Ok(())
}

async fn open_dashboard(args: &Args, sync: &SyncArgs) -> Result<Dashboard> {
    let plaid = Plaid::new(&args.plaid.config()?)?;
    let store: Arc<dyn KeyValueStore> = args
        .store
        .config()
        .open()
        .await
        .context("Failed to open store")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let link_settings = plaid.link_settings().clone();
    Ok(Dashboard::new(
        Arc::new(plaid),
        ItemRegistry::new(Arc::clone(&store)),
        SnapshotCache::new(store, Arc::clone(&clock), sync.cache_config()),
        clock,
        sync.sync_config(),
        link_settings,
    ))
}

fn print_items<W: LineWriter + Clone>(printer: &BulletPointPrinter<W>, items: &[LinkedItemSummary]) {
    if items.is_empty() {
        printer.print_item(style("(none)").italic());
        return;
    }
    for item in items {
        printer.print_item(style_institution_name(&item.institution_name));
        let printer = printer.indent();
        printer.print_item(format!("Item {}", item.item_id));
        printer.print_item(format!(
            "Connected {}",
            item.date_connected.format("%Y-%m-%d %H:%M")
        ));
    }
}

fn print_snapshot<W: LineWriter + Clone>(printer: &BulletPointPrinter<W>, fetched: &FetchedSnapshot) {
    let source = if fetched.from_cache {
        "from cache"
    } else {
        "freshly synced"
    };
    let fetched_at = fetched
        .fetched_at
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    printer.print_line(&format!(
        "{} ({source}, fetched at {fetched_at})",
        style_header("Snapshot:")
    ));
    for institution in &fetched.snapshot.institutions {
        print_institution(printer, fetched, institution);
    }
    if !fetched.truncated_items.is_empty() {
        printer.print_line(&style_header("Incomplete items:").to_string());
        for item_id in &fetched.truncated_items {
            print_truncated_item(printer, fetched, item_id);
        }
    }
    if !fetched.item_errors.is_empty() {
        printer.print_line(&style_header("Failed items:").to_string());
        for failure in &fetched.item_errors {
            print_failure(printer, failure);
        }
    }
}

fn print_institution<W: LineWriter + Clone>(
    printer: &BulletPointPrinter<W>,
    fetched: &FetchedSnapshot,
    institution: &Institution,
) {
    printer.print_item(style_institution_name(&institution.name));
    let printer = printer.indent();
    let accounts = fetched
        .snapshot
        .accounts
        .iter()
        .filter(|account| account.institution.institution_id == institution.institution_id);
    for account in accounts {
        print_account(&printer, fetched, account);
    }
}

fn print_account<W: LineWriter + Clone>(
    printer: &BulletPointPrinter<W>,
    fetched: &FetchedSnapshot,
    account: &TaggedAccount,
) {
    let num_transactions = fetched
        .snapshot
        .transactions
        .iter()
        .filter(|transaction| transaction.account_id == account.account.account_id)
        .count();
    printer.print_item(format!(
        "{} {} {}",
        pad_str(
            &style_account(&account.account.name).to_string(),
            30,
            Alignment::Left,
            None
        ),
        pad_str(
            &style_balance(&account.account.balances).to_string(),
            15,
            Alignment::Right,
            None
        ),
        style_transaction_count(num_transactions),
    ));
}

fn print_truncated_item<W: LineWriter + Clone>(
    printer: &BulletPointPrinter<W>,
    fetched: &FetchedSnapshot,
    item_id: &ItemId,
) {
    let institution_name = fetched
        .snapshot
        .accounts
        .iter()
        .find(|account| &account.item_id == item_id)
        .map(|account| account.institution.name.as_str())
        .unwrap_or_else(|| item_id.as_str());
    printer.print_item(format!(
        "{} {}",
        style_institution_name(institution_name),
        style("[only the most recent transactions]").yellow()
    ));
}

fn print_failure<W: LineWriter + Clone>(printer: &BulletPointPrinter<W>, failure: &ItemFailure) {
    let reason = failure
        .error_code
        .clone()
        .unwrap_or_else(|| format!("{:?}", failure.kind));
    printer.print_item(format!(
        "{} {}",
        style_institution_name(&failure.institution_name),
        style(format!("[{reason}]")).red()
    ));
}

fn style_header(header: &str) -> StyledObject<&str> {
    style(header).bold().underlined()
}

fn style_institution_name(name: &str) -> StyledObject<&str> {
    style(name).cyan().bold()
}

fn style_account(name: &str) -> StyledObject<&str> {
    style(name).magenta()
}

fn style_balance(balances: &Balances) -> StyledObject<String> {
    let Some(current) = balances.current else {
        return style("-".to_string()).dim();
    };
    let result = style(format!(
        "{} {}",
        current,
        balances.iso_currency_code.as_deref().unwrap_or("???")
    ))
    .bold();
    if current < Decimal::ZERO {
        result.red()
    } else {
        result.green()
    }
}

fn style_transaction_count(count: usize) -> StyledObject<String> {
    style(format!("{count} transactions")).italic()
}
