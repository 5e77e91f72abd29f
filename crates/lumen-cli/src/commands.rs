//! Subcommands and their rendering

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use clap::Subcommand;
use tracing::info;
use uuid::Uuid;

use lumen_gateway::GatewayClient;
use lumen_sdk::derive::{format_currency, parse_amount};
use lumen_sdk::estimate::ApprovalReport;
use lumen_sdk::{
    ApprovalOptions, ApprovalOutcome, AuthMode, BoardColumn, BoardLane, BypassIdentity,
    DataGateway, EstimateService, EstimateStatus, IdentityProvider, LineItem, LiveIdentity,
    LumenConfig, MutationOutcome, Notifier, ProjectBoard, StatusChange, StatusChangeOutcome,
    Totals, TracingNotifier,
};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Derive subtotal, tax, total and balance from a JSON file of line items
    Totals {
        /// JSON array of {"description", "amount"} objects
        file: PathBuf,

        /// Tax rate in percent (defaults to invoice.default_tax_rate)
        #[arg(short, long)]
        rate: Option<String>,

        /// Non-GST invoice: no tax
        #[arg(long)]
        non_gst: bool,

        /// Amount already paid
        #[arg(long)]
        paid: Option<String>,
    },

    /// Print the project board
    Board,

    /// Move a project to another column
    Move {
        project_id: Uuid,

        /// upcoming, pre_production, shoot, post_production or delivered
        #[arg(value_parser = parse_column)]
        column: BoardColumn,
    },

    /// Approve an estimate and run its follow-up steps
    Approve {
        estimate_id: Uuid,

        /// Leave the linked project where it is
        #[arg(long)]
        no_project: bool,

        /// Do not create an invoice
        #[arg(long)]
        no_invoice: bool,
    },
}

/// Sign-in details for live auth
#[derive(Debug, Default)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Everything a remote command needs
pub struct Session {
    pub gateway: Arc<dyn DataGateway>,
    pub identity: Arc<dyn IdentityProvider>,
    pub notifier: Arc<dyn Notifier>,
}

fn parse_column(raw: &str) -> Result<BoardColumn, String> {
    BoardColumn::parse_id(raw).ok_or_else(|| {
        let known: Vec<&str> = BoardColumn::ALL.iter().map(|c| c.as_id()).collect();
        format!("unknown column '{}' (expected one of: {})", raw, known.join(", "))
    })
}

pub async fn execute(
    config: &LumenConfig,
    credentials: &Credentials,
    command: Commands,
) -> anyhow::Result<String> {
    match command {
        Commands::Totals {
            file,
            rate,
            non_gst,
            paid,
        } => {
            let items = read_items(&file)?;
            let rate = rate.unwrap_or_else(|| config.invoice.default_tax_rate.clone());
            Ok(render_totals(
                &items,
                &rate,
                !non_gst,
                paid.as_deref(),
                &config.invoice.currency_symbol,
            ))
        }
        remote => {
            let session = connect(config, credentials).await?;
            run(&session, remote).await
        }
    }
}

/// Build the gateway and identity from config
pub async fn connect(config: &LumenConfig, credentials: &Credentials) -> anyhow::Result<Session> {
    let client = Arc::new(GatewayClient::new(config.gateway.clone())?);

    let identity: Arc<dyn IdentityProvider> = match config.auth.mode {
        AuthMode::Bypass => Arc::new(BypassIdentity::from_config(&config.auth)?),
        AuthMode::Live => {
            let (Some(email), Some(password)) = (&credentials.email, &credentials.password) else {
                bail!("live auth needs --email and --password (or LUMEN_EMAIL / LUMEN_PASSWORD)");
            };
            client
                .sign_in_with_password(email, password)
                .await
                .context("sign in failed")?;
            info!(email = %email, "signed in");
            Arc::new(LiveIdentity::new(client.clone()))
        }
    };

    Ok(Session {
        gateway: client,
        identity,
        notifier: Arc::new(TracingNotifier),
    })
}

/// Run a command that talks to the store
pub async fn run(session: &Session, command: Commands) -> anyhow::Result<String> {
    match command {
        Commands::Totals { .. } => bail!("totals runs offline"),
        Commands::Board => {
            let board = board(session);
            board.load().await?;
            Ok(render_board(&board.columns()))
        }
        Commands::Move { project_id, column } => {
            let board = board(session);
            board.load().await?;
            let line = match board.move_project(project_id, column).await? {
                MutationOutcome::Committed(column) => {
                    format!("Moved {} to {}", project_id, column.label())
                }
                MutationOutcome::NoOp => {
                    format!("{} is already in {}", project_id, column.label())
                }
                MutationOutcome::Ignored | MutationOutcome::Stale => {
                    format!("{} was not moved", project_id)
                }
            };
            Ok(line)
        }
        Commands::Approve {
            estimate_id,
            no_project,
            no_invoice,
        } => {
            let estimates = EstimateService::new(
                session.gateway.clone(),
                session.identity.clone(),
                session.notifier.clone(),
            );
            estimates.load().await?;
            let change = StatusChange::WithOptions {
                status: EstimateStatus::Approved,
                options: ApprovalOptions {
                    move_project: !no_project,
                    create_invoice: !no_invoice,
                },
            };
            let line = match estimates.change_status(estimate_id, change).await? {
                StatusChangeOutcome::Approval(ApprovalOutcome::Completed(report)) => {
                    render_approval(&report)
                }
                StatusChangeOutcome::Approval(ApprovalOutcome::AlreadyCompleted(_)) => {
                    format!("Estimate {} was already approved", estimate_id)
                }
                StatusChangeOutcome::Approval(ApprovalOutcome::InProgress) => {
                    format!("Estimate {} is being approved elsewhere", estimate_id)
                }
                StatusChangeOutcome::Status(_) => {
                    format!("Estimate {} marked approved", estimate_id)
                }
            };
            Ok(line)
        }
    }
}

fn board(session: &Session) -> ProjectBoard {
    ProjectBoard::new(
        session.gateway.clone(),
        session.identity.clone(),
        session.notifier.clone(),
    )
}

fn read_items(path: &Path) -> anyhow::Result<Vec<LineItem>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn render_totals(
    items: &[LineItem],
    rate: &str,
    taxable: bool,
    paid: Option<&str>,
    symbol: &str,
) -> String {
    let totals = Totals::compute(items, rate, taxable);
    let display = totals.display(symbol);
    let mut out = format!(
        "Subtotal: {}\nTax:      {}\nTotal:    {}",
        display.subtotal, display.tax, display.total
    );
    if let Some(paid) = paid {
        let balance = totals.balance(parse_amount(paid));
        out.push_str(&format!("\nBalance:  {}", format_currency(symbol, balance)));
    }
    out
}

fn render_board(lanes: &[BoardLane]) -> String {
    let mut out = Vec::new();
    for lane in lanes {
        out.push(format!("{} ({})", lane.column.label(), lane.projects.len()));
        for project in &lane.projects {
            out.push(format!("  - {} [{}]", project.title, project.id));
        }
    }
    out.join("\n")
}

fn render_approval(report: &ApprovalReport) -> String {
    let mut out = vec![format!("Estimate {} approved", report.estimate_id)];
    if let Some(project_id) = report.project_id {
        let how = if report.project_created { "created" } else { "linked" };
        out.push(format!("  project {} ({})", project_id, how));
    }
    if let Some(invoice_id) = report.invoice_id {
        out.push(format!("  invoice {} for {}", invoice_id, report.amount));
    }
    out.join("\n")
}
