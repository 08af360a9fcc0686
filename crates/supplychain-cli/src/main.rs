// ============================================================================
// supplychain — Operator CLI for the supply chain ledger
// ============================================================================
// Usage:
//   supplychain chain                        Show the mined chain
//   supplychain pending                      List pending transactions
//   supplychain create --sender ... ...      Create a pending transaction
//   supplychain edit <ID> [--field value]    Edit a pending transaction
//   supplychain delete <ID>                  Delete a pending transaction
//   supplychain conditions show|set          Manage trigger conditions
//   supplychain check                        Dry-run the mining gate
//   supplychain mine                         Mine if all conditions are met
//   supplychain clear --yes                  Clear the chain
// ============================================================================

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use supplychain_core::{
    ClientConfig, ClientDb, ConditionsForm, HttpSupplyChainClient, MineOutcome, MinedBlock,
    MiningDecision, OperatorSession, PendingTransaction, PendingView, TransactionDraft,
    TransactionId, TransactionStatus,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type Session = OperatorSession<HttpSupplyChainClient, ClientDb>;

/// Supply chain ledger operator client
#[derive(Parser)]
#[command(name = "supplychain", version, about = "Operate a blockchain-backed food supply chain")]
struct Cli {
    /// Ledger server URL (default: $SUPPLYCHAIN_SERVER_URL or http://localhost:5000)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Path to the settings database (default: ~/.supplychain/client.redb)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every mined block
    Chain {
        #[arg(long)]
        json: bool,
    },

    /// List pending transactions and flag those that fail the trigger conditions
    Pending {
        #[arg(long)]
        json: bool,
    },

    /// Create a pending transaction
    Create {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        recipient: String,
        #[arg(long)]
        product: String,
        #[arg(long, allow_hyphen_values = true)]
        quantity: String,
        #[arg(long, default_value = "")]
        location: String,
        /// pending, processing or completed
        #[arg(long, value_parser = parse_status)]
        status: Option<TransactionStatus>,
        #[arg(long, allow_hyphen_values = true)]
        temperature: String,
        /// YYYY-MM-DD
        #[arg(long)]
        delivery_date: String,
    },

    /// Edit a pending transaction; only the given fields change
    Edit {
        id: String,
        #[arg(long)]
        sender: Option<String>,
        #[arg(long)]
        recipient: Option<String>,
        #[arg(long)]
        product: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        quantity: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long, value_parser = parse_status)]
        status: Option<TransactionStatus>,
        #[arg(long, allow_hyphen_values = true)]
        temperature: Option<String>,
        #[arg(long)]
        delivery_date: Option<String>,
    },

    /// Delete a pending transaction
    Delete { id: String },

    /// Show or set the trigger conditions
    Conditions {
        #[command(subcommand)]
        action: ConditionsCommand,
    },

    /// Report whether the pending set may be mined, without mining
    Check {
        #[arg(long)]
        json: bool,
    },

    /// Mine the pending transactions if every one meets the trigger conditions
    Mine,

    /// Clear the entire chain
    Clear {
        /// Confirm the clear
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ConditionsCommand {
    /// Print the saved trigger conditions
    Show {
        #[arg(long)]
        json: bool,
    },

    /// Replace the trigger conditions (all three are required)
    Set {
        #[arg(long)]
        min_quantity: String,
        #[arg(long, allow_hyphen_values = true)]
        max_temperature: String,
        /// YYYY-MM-DD
        #[arg(long)]
        max_delivery_date: String,
    },
}

fn parse_status(s: &str) -> std::result::Result<TransactionStatus, String> {
    TransactionStatus::from_str(s).ok_or_else(|| {
        format!(
            "Unknown status '{}'. Valid values: pending, processing, completed",
            s
        )
    })
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "warn,supplychain_core=info,supplychain=info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn open_session(cli: &Cli) -> Result<Session> {
    let mut config = ClientConfig::from_env().context("Invalid environment configuration")?;
    if let Some(server) = &cli.server {
        config.server_url = server.clone();
        config.validate().context("Invalid --server")?;
    }
    let db_path = cli.db_path.clone().or_else(|| config.db_path.clone());

    let db = ClientDb::open(db_path.as_deref()).context("Failed to open settings database")?;
    let client = HttpSupplyChainClient::new(&config)?;
    debug!("Using ledger at {}", client.base_url());

    Ok(OperatorSession::new(client, db))
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = dotenv {
        debug!("No .env file loaded: {}", e);
    }

    let mut session = open_session(&cli)?;

    match cli.command {
        Commands::Chain { json } => cmd_chain(&mut session, json).await,
        Commands::Pending { json } => cmd_pending(&mut session, json).await,
        Commands::Create {
            sender,
            recipient,
            product,
            quantity,
            location,
            status,
            temperature,
            delivery_date,
        } => {
            let draft = TransactionDraft {
                sender,
                recipient,
                product,
                quantity,
                location,
                status,
                temperature,
                delivery_date,
            };
            cmd_create(&mut session, &draft).await
        }
        Commands::Edit {
            id,
            sender,
            recipient,
            product,
            quantity,
            location,
            status,
            temperature,
            delivery_date,
        } => {
            let edits = TransactionEdits {
                sender,
                recipient,
                product,
                quantity,
                location,
                status,
                temperature,
                delivery_date,
            };
            cmd_edit(&mut session, &TransactionId::new(id), edits).await
        }
        Commands::Delete { id } => cmd_delete(&mut session, &TransactionId::new(id)).await,
        Commands::Conditions { action } => cmd_conditions(&session, action),
        Commands::Check { json } => cmd_check(&mut session, json).await,
        Commands::Mine => cmd_mine(&mut session).await,
        Commands::Clear { yes } => cmd_clear(&mut session, yes).await,
    }
}

// ============================================================================
// Ledger views
// ============================================================================

async fn cmd_chain(session: &mut Session, json: bool) -> Result<()> {
    let chain = session.refresh_chain().await.context("Failed to fetch the chain")?;

    if json {
        println!("{}", serde_json::to_string_pretty(chain)?);
        return Ok(());
    }
    if chain.is_empty() {
        println!("The chain is empty.");
        return Ok(());
    }

    for (i, block) in chain.iter().enumerate() {
        print_block(block);
        if i + 1 < chain.len() {
            println!("    |");
            println!("    v");
        }
    }
    println!("\nTotal: {} blocks", chain.len());
    Ok(())
}

fn print_block(block: &MinedBlock) {
    println!("=== Block #{} ===", block.index);
    println!("Timestamp:     {}", block.timestamp);
    println!("Previous Hash: {}", block.previous_hash);
    println!("Proof:         {}", block.proof);
    if block.transactions.is_empty() {
        println!("Transactions:  (none)");
        return;
    }
    println!("Transactions:");
    for tx in &block.transactions {
        println!(
            "  - {} -> {} | {} x{} | {} | {}",
            tx.sender,
            tx.recipient,
            tx.product,
            tx.quantity,
            or_dash(&tx.location),
            status_label(tx)
        );
    }
}

async fn cmd_pending(session: &mut Session, json: bool) -> Result<()> {
    let views = session
        .pending_with_reports()
        .await
        .context("Failed to fetch pending transactions")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }
    if views.is_empty() {
        println!("No pending transactions.");
        return Ok(());
    }

    print_transaction_header();
    for PendingView { transaction, report } in &views {
        print_transaction_row(transaction);
        if !report.passes() {
            println!(
                "  ! does not meet the trigger conditions: {}",
                report.failures.join("; ")
            );
        }
    }

    let failing = views.iter().filter(|v| !v.report.passes()).count();
    println!("\nTotal: {} pending ({} failing conditions)", views.len(), failing);
    Ok(())
}

fn print_transaction_header() {
    println!(
        "{:<26}  {:<18}  {:<18}  {:<14}  {:>8}  {:>6}  {:<12}  {}",
        "ID", "SENDER", "RECIPIENT", "PRODUCT", "QTY", "TEMP", "DELIVERY", "STATUS"
    );
    println!("{}", "-".repeat(124));
}

fn print_transaction_row(tx: &PendingTransaction) {
    println!(
        "{:<26}  {:<18}  {:<18}  {:<14}  {:>8}  {:>6}  {:<12}  {}",
        clip(&tx.id.as_ref().map(|id| id.to_string()).unwrap_or_else(|| "-".into()), 26),
        clip(&tx.sender, 18),
        clip(&tx.recipient, 18),
        clip(&tx.product, 14),
        clip(or_dash(&tx.quantity), 8),
        clip(or_dash(&tx.temperature), 6),
        clip(or_dash(&tx.delivery_date), 12),
        status_label(tx)
    );
}

fn clip(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}

fn or_dash(s: &str) -> &str {
    if s.trim().is_empty() {
        "-"
    } else {
        s
    }
}

fn status_label(tx: &PendingTransaction) -> &'static str {
    tx.status.map(|s| s.as_str()).unwrap_or("-")
}

// ============================================================================
// Transaction mutations
// ============================================================================

/// Fields given to `edit`; None leaves the current value
struct TransactionEdits {
    sender: Option<String>,
    recipient: Option<String>,
    product: Option<String>,
    quantity: Option<String>,
    location: Option<String>,
    status: Option<TransactionStatus>,
    temperature: Option<String>,
    delivery_date: Option<String>,
}

impl TransactionEdits {
    fn is_empty(&self) -> bool {
        self.sender.is_none()
            && self.recipient.is_none()
            && self.product.is_none()
            && self.quantity.is_none()
            && self.location.is_none()
            && self.status.is_none()
            && self.temperature.is_none()
            && self.delivery_date.is_none()
    }

    fn apply(self, draft: &mut TransactionDraft) {
        if let Some(v) = self.sender {
            draft.sender = v;
        }
        if let Some(v) = self.recipient {
            draft.recipient = v;
        }
        if let Some(v) = self.product {
            draft.product = v;
        }
        if let Some(v) = self.quantity {
            draft.quantity = v;
        }
        if let Some(v) = self.location {
            draft.location = v;
        }
        if let Some(v) = self.status {
            draft.status = Some(v);
        }
        if let Some(v) = self.temperature {
            draft.temperature = v;
        }
        if let Some(v) = self.delivery_date {
            draft.delivery_date = v;
        }
    }
}

async fn cmd_create(session: &mut Session, draft: &TransactionDraft) -> Result<()> {
    let message = session
        .create_transaction(draft)
        .await
        .context("Failed to create transaction")?;
    println!("{}", message);
    Ok(())
}

async fn cmd_edit(session: &mut Session, id: &TransactionId, edits: TransactionEdits) -> Result<()> {
    if edits.is_empty() {
        bail!("Nothing to change. Pass at least one field, e.g. --quantity 12");
    }

    let Some(current) = session.find_pending(id).await? else {
        bail!("No pending transaction with id '{}'", id);
    };
    let mut draft = current.to_draft();
    edits.apply(&mut draft);

    let message = session
        .update_transaction(id, &draft)
        .await
        .with_context(|| format!("Failed to update transaction {}", id))?;
    println!("{}", message);
    Ok(())
}

async fn cmd_delete(session: &mut Session, id: &TransactionId) -> Result<()> {
    let message = session
        .delete_transaction(id)
        .await
        .with_context(|| format!("Failed to delete transaction {}", id))?;
    println!("{}", message);
    Ok(())
}

// ============================================================================
// Trigger conditions
// ============================================================================

fn cmd_conditions(session: &Session, action: ConditionsCommand) -> Result<()> {
    match action {
        ConditionsCommand::Show { json } => {
            let conditions = session.conditions()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&conditions)?);
            } else if conditions.is_unset() {
                println!("No trigger conditions set. Every transaction may be mined.");
            } else {
                println!("Trigger conditions: {}", conditions);
            }
        }
        ConditionsCommand::Set {
            min_quantity,
            max_temperature,
            max_delivery_date,
        } => {
            let form = ConditionsForm::new(min_quantity, max_temperature, max_delivery_date);
            let saved = session
                .save_conditions(&form)
                .context("Trigger conditions not saved")?;
            println!("Trigger conditions saved: {}", saved);
        }
    }
    Ok(())
}

// ============================================================================
// Mining
// ============================================================================

fn print_refusal(decision: &MiningDecision) {
    println!("{}", decision.reason);
    println!();
    print_transaction_header();
    for tx in &decision.offending {
        print_transaction_row(tx);
    }
}

async fn cmd_check(session: &mut Session, json: bool) -> Result<()> {
    let decision = session.check().await.context("Failed to check pending transactions")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else if decision.allowed {
        println!("{}", decision.reason);
    } else {
        print_refusal(&decision);
    }
    Ok(())
}

async fn cmd_mine(session: &mut Session) -> Result<()> {
    match session.mine().await.context("Failed to mine")? {
        MineOutcome::Mined { message } => {
            println!("{}", message);
            if let Some(block) = session.chain().last() {
                println!(
                    "Chain height: {} (latest block #{} with {} transactions)",
                    session.chain().len(),
                    block.index,
                    block.transactions.len()
                );
            }
            Ok(())
        }
        MineOutcome::Refused(decision) => {
            print_refusal(&decision);
            bail!("Mining refused: update or delete the listed transactions first");
        }
    }
}

async fn cmd_clear(session: &mut Session, yes: bool) -> Result<()> {
    if !yes {
        bail!("Clearing removes every block. Re-run with --yes to confirm.");
    }
    let message = session.clear().await.context("Failed to clear the chain")?;
    println!("{}", message);
    Ok(())
}
