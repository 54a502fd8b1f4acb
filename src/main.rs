// allotment-pdf: Review, allot and finalize plot applications, and generate their documents

use std::path::PathBuf;

use allotment_pdf::backend::{Backend, DraftFilter, HttpBackend, MemoryBackend};
use allotment_pdf::config::{load_project, BackendConfig, ProjectConfig, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
use allotment_pdf::cost::{self, format_amount, format_rupees, RateOverrides};
use allotment_pdf::delivery::{Delivered, Delivery};
use allotment_pdf::lifecycle::validate_allotment;
use allotment_pdf::signature::{load_strokes, SignaturePad};
use allotment_pdf::ticket::DraftRecord;
use allotment_pdf::{AppError, Booking, Decision, Issued, Result, TicketId, Workflow};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(author, version, about = "Review, allot and finalize plot applications, and generate their documents")]
struct Args {
    /// Backend API base URL
    #[arg(long, global = true, default_value = DEFAULT_API_URL)]
    api: String,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Project file (JSON) with rates, payment schedule and boilerplate
    #[arg(long, global = true)]
    project: Option<String>,

    /// Log debug detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tickets
    List {
        #[arg(long)]
        alloted: Option<bool>,
        #[arg(long)]
        allotment_done: Option<bool>,
        #[arg(long)]
        signed: Option<bool>,
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Approve or reject a pending application
    Review {
        ticket: String,
        /// approved or rejected
        #[arg(long)]
        decision: String,
    },

    /// Allot a unit and gift to an approved ticket
    Allot {
        ticket: String,
        #[arg(long)]
        unit: String,
        #[arg(long)]
        gift: String,
    },

    /// Finalize the allotment; figures default to the cost engine's
    Finalize {
        ticket: String,
        /// Payment mode
        #[arg(long)]
        mode: String,
        /// Allotted area
        #[arg(long)]
        area: f64,
        #[arg(long, requires = "booking_amount")]
        total_cost: Option<f64>,
        #[arg(long, requires = "total_cost")]
        booking_amount: Option<f64>,
        #[command(flatten)]
        rates: RateArgs,
    },

    /// Print the cost breakdown for an area
    Costs {
        #[arg(long)]
        area: f64,
        #[command(flatten)]
        rates: RateArgs,
    },

    /// Generate the allotment letter
    Letter {
        #[command(flatten)]
        source: TicketSource,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        rates: RateArgs,
        /// Upload to the allotment notification endpoint instead of saving
        #[arg(long)]
        send: bool,
    },

    /// Generate a payment receipt
    Receipt {
        #[command(flatten)]
        source: TicketSource,
        #[command(flatten)]
        output: OutputArgs,
        /// Amount received (defaults to the booking amount)
        #[arg(long)]
        amount: Option<f64>,
        /// Upload to the receipt notification endpoint instead of saving
        #[arg(long)]
        send: bool,
    },

    /// Sign the agreement with a stroke file and save it
    Sign {
        #[command(flatten)]
        source: TicketSource,
        #[command(flatten)]
        output: OutputArgs,
        /// Signature strokes (JSON: [[[x, y], ...], ...])
        #[arg(long)]
        strokes: String,
    },

    /// Regenerate the agreement of a signed ticket
    Agreement {
        #[command(flatten)]
        source: TicketSource,
        #[command(flatten)]
        output: OutputArgs,
        /// Signature strokes (JSON: [[[x, y], ...], ...])
        #[arg(long)]
        strokes: String,
    },
}

#[derive(clap::Args, Debug)]
struct TicketSource {
    /// Ticket ID to fetch from the backend
    #[arg(required_unless_present = "ticket_file")]
    ticket: Option<String>,

    /// Draft record (JSON) to work from offline; nothing is persisted
    #[arg(long, conflicts_with = "ticket")]
    ticket_file: Option<String>,
}

/// Rates entered for this ticket; the project file supplies any left out.
#[derive(clap::Args, Debug)]
struct RateArgs {
    /// Basic sale price per area unit
    #[arg(long)]
    bsp: Option<f64>,

    /// EDC/IDC rate per area unit
    #[arg(long)]
    edc_idc: Option<f64>,

    /// Preferential location charges, percent of the basic sale price
    #[arg(long)]
    plc: Option<f64>,
}

impl RateArgs {
    fn overrides(&self) -> RateOverrides {
        RateOverrides {
            basic_sale_price: self.bsp,
            edc_idc_rate: self.edc_idc,
            plc_percent: self.plc,
        }
    }
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Document date (YYYY-MM-DD format, defaults to today)
    #[arg(short, long)]
    date: Option<String>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<()> {
    let project = load_project(&args.project)?;
    let api = BackendConfig::new(args.api, args.timeout);

    match args.command {
        Command::List {
            alloted,
            allotment_done,
            signed,
            user_id,
        } => {
            let filter = DraftFilter {
                alloted,
                allotment_done,
                user_id,
                signed,
            };
            let backend = HttpBackend::new(&api);
            let tickets = Workflow::new(&backend, &project).list(&filter)?;
            for ticket in &tickets {
                println!(
                    "{:<10} {:<20} {:<10} {}",
                    ticket.id.as_str(),
                    ticket.stage.kind().as_str(),
                    ticket.applicant.kind(),
                    ticket.display_name()
                );
            }
            println!("{} ticket(s)", tickets.len());
        }

        Command::Review { ticket, decision } => {
            let decision: Decision = decision.parse()?;
            let backend = HttpBackend::new(&api);
            let workflow = Workflow::new(&backend, &project);
            let mut ticket = workflow.find_ticket(&TicketId::new(ticket))?;
            workflow.review(&mut ticket, decision)?;
            println!("✓ Ticket {} is now {}", ticket.id, ticket.stage.kind());
        }

        Command::Allot { ticket, unit, gift } => {
            validate_allotment(&unit, &gift)?;
            let backend = HttpBackend::new(&api);
            let workflow = Workflow::new(&backend, &project);
            let mut ticket = workflow.find_ticket(&TicketId::new(ticket))?;
            workflow.allot(&mut ticket, &unit, &gift)?;
            println!("✓ Ticket {} allotted {} with {}", ticket.id, unit.trim(), gift.trim());
        }

        Command::Finalize {
            ticket,
            mode,
            area,
            total_cost,
            booking_amount,
            rates,
        } => {
            let backend = HttpBackend::new(&api);
            let workflow = Workflow::new(&backend, &project);
            let mut ticket = workflow.find_ticket(&TicketId::new(ticket))?;
            match (total_cost, booking_amount) {
                (Some(total_cost), Some(booking_amount)) => workflow.finalize(
                    &mut ticket,
                    Booking {
                        mode,
                        area,
                        total_cost,
                        booking_amount,
                    },
                )?,
                _ => {
                    workflow.finalize_with_engine(&mut ticket, &mode, area, &rates.overrides())?;
                }
            }
            if let Some(booking) = ticket.stage.booking() {
                println!("✓ Ticket {} finalized", ticket.id);
                println!("  Total cost: {}", format_rupees(booking.total_cost));
                println!("  Booking amount: {}", format_rupees(booking.booking_amount));
            }
        }

        Command::Costs { area, rates } => print_costs(&project, area, &rates.overrides())?,

        Command::Letter {
            source,
            output,
            rates,
            send,
        } => {
            let date = parse_date(&output.date)?;
            let (backend, ticket_id) = open_ticket_source(&api, &source, send)?;
            let workflow = Workflow::new(backend.as_ref(), &project);
            let ticket = workflow.find_ticket(&ticket_id)?;
            let issued = workflow.issue_letter(
                &ticket,
                &rates.overrides(),
                date,
                &delivery(send, output.output),
            )?;
            report(&issued);
        }

        Command::Receipt {
            source,
            output,
            amount,
            send,
        } => {
            let date = parse_date(&output.date)?;
            let (backend, ticket_id) = open_ticket_source(&api, &source, send)?;
            let workflow = Workflow::new(backend.as_ref(), &project);
            let ticket = workflow.find_ticket(&ticket_id)?;
            let issued =
                workflow.issue_receipt(&ticket, amount, date, &delivery(send, output.output))?;
            report(&issued);
        }

        Command::Sign {
            source,
            output,
            strokes,
        } => {
            let date = parse_date(&output.date)?;
            let mut pad = SignaturePad::new();
            pad.replay(&load_strokes(&strokes)?);
            let (backend, ticket_id) = open_ticket_source(&api, &source, false)?;
            let workflow = Workflow::new(backend.as_ref(), &project);
            let mut ticket = workflow.find_ticket(&ticket_id)?;
            let issued =
                workflow.sign_agreement(&mut ticket, &mut pad, date, &Delivery::Save(output.output))?;
            report(&issued);
        }

        Command::Agreement {
            source,
            output,
            strokes,
        } => {
            let date = parse_date(&output.date)?;
            let mut pad = SignaturePad::new();
            pad.replay(&load_strokes(&strokes)?);
            let signature = pad
                .snapshot()
                .ok_or_else(|| AppError::validation(format!("{}: no ink in stroke file", strokes)))?;
            let (backend, ticket_id) = open_ticket_source(&api, &source, false)?;
            let workflow = Workflow::new(backend.as_ref(), &project);
            let ticket = workflow.find_ticket(&ticket_id)?;
            let issued = workflow.reissue_agreement(
                &ticket,
                &signature,
                date,
                &Delivery::Save(output.output),
            )?;
            report(&issued);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_date(date_str: &Option<String>) -> Result<NaiveDate> {
    match date_str {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| AppError::validation(format!("Invalid date format: {}", s))),
        None => Ok(Local::now().date_naive()),
    }
}

fn load_ticket_file(path: &str) -> Result<DraftRecord> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::validation(format!("{}: {}", path, e)))?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::validation(format!("{}: Invalid JSON: {}", path, e)))
}

/// The live backend for a ticket ID, or an in-memory copy of a ticket file.
fn open_ticket_source(
    api: &BackendConfig,
    source: &TicketSource,
    send: bool,
) -> Result<(Box<dyn Backend>, TicketId)> {
    match (&source.ticket_file, &source.ticket) {
        (Some(path), _) => {
            if send {
                return Err(AppError::validation(
                    "--send needs the live backend; pass a ticket ID instead of --ticket-file",
                ));
            }
            let record = load_ticket_file(path)?;
            let ticket_id = record.ticket_id.clone();
            Ok((Box::new(MemoryBackend::with_drafts([record])), ticket_id))
        }
        (None, Some(id)) => Ok((Box::new(HttpBackend::new(api)), TicketId::new(id.clone()))),
        (None, None) => Err(AppError::validation(
            "a ticket ID or --ticket-file is required",
        )),
    }
}

fn delivery(send: bool, dir: PathBuf) -> Delivery {
    if send {
        Delivery::Transmit
    } else {
        Delivery::Save(dir)
    }
}

fn report(issued: &Issued) {
    match &issued.delivered {
        Delivered::Saved(path) => println!("✓ Generated: {}", path.display()),
        Delivered::Transmitted => println!("✓ Sent: {}", issued.document.file_name),
    }
    println!("  Pages: {}", issued.document.page_count);
    if !issued.document.signed_pages.is_empty() {
        let pages: Vec<String> = issued
            .document
            .signed_pages
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("  Signed pages: {}", pages.join(", "));
    }
}

fn print_costs(project: &ProjectConfig, area: f64, rates: &RateOverrides) -> Result<()> {
    let inputs = rates.apply(project.cost_inputs(area));
    inputs.validate()?;
    let costs = cost::compute(&inputs);

    println!("{} ({})", project.name, project.location);
    println!("  Allotted area:      {} {}", area, project.area_unit);
    println!("  Basic sale price:   {:>16}", format_amount(costs.total_basic_price));
    println!("  EDC/IDC:            {:>16}", format_amount(costs.total_edc_idc));
    println!("  PLC:                {:>16}", format_amount(costs.plc_amount));
    println!("  Total cost:         {:>16}", format_amount(costs.total_cost));
    println!("  Booking amount:     {:>16}", format_amount(costs.booking_amount));
    println!("  Payment schedule:");
    for line in &costs.schedule {
        println!(
            "    {:<32} {:>6}% {:>16}",
            line.label,
            line.percent,
            format_amount(line.amount)
        );
    }
    println!(
        "    {:<32} {:>6}% {:>16}",
        "Total",
        costs.schedule_total_percent,
        format_amount(costs.schedule_total_amount)
    );
    Ok(())
}
