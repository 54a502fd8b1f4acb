//! Allotment / welcome letter: cost sheet on the first page, bank and
//! contact details on the second.

use chrono::NaiveDate;
use tracing::warn;

use super::layout::{Block, Column, Party, Section, Table, Template};
use super::{format_area, format_date, letterhead};
use crate::config::ProjectConfig;
use crate::cost::{self, format_amount, format_rupees, CostBreakdown, CostInputs, RateOverrides};
use crate::error::{AppError, Result};
use crate::ticket::Ticket;

pub const TITLE: &str = "Allotment Letter";

/// Builds the letter for a ticket whose allotment has been finalized.
///
/// The cost sheet is computed for the finalized area at the ticket's own
/// rates, falling back to the project's where `rates` leaves one unset. The
/// total and booking amount quoted to the buyer are the finalized ones.
pub fn allotment_letter(
    ticket: &Ticket,
    project: &ProjectConfig,
    rates: &RateOverrides,
    date: NaiveDate,
) -> Result<Template> {
    let (Some(allotment), Some(booking)) = (ticket.stage.allotment(), ticket.stage.booking()) else {
        return Err(AppError::validation(format!(
            "ticket {} has no finalized allotment ({})",
            ticket.id,
            ticket.stage.kind()
        )));
    };

    let inputs = rates.apply(project.cost_inputs(booking.area));
    inputs.validate()?;
    let costs = cost::compute(&inputs);
    if cost::round_currency(costs.total_cost - booking.total_cost) != 0.0 {
        warn!(
            ticket_id = %ticket.id,
            computed = costs.total_cost,
            finalized = booking.total_cost,
            "Cost sheet total differs from the finalized total"
        );
    }

    let mut template = letterhead(project, TITLE, format!("Ticket {}", ticket.id));

    let greeting = format!(
        "Dear {},\nWe are delighted to welcome you to {}, {}. Your application has been accepted and unit {} has been allotted to you. The cost of the unit and the payment schedule are set out below.",
        ticket.applicant.signatory(),
        project.name,
        project.location,
        allotment.unit
    );

    let first = Section::new()
        .with(Block::Title("Letter of Allotment".into()))
        .with(Block::Fields(vec![
            ("Date".into(), format_date(date)),
            ("Ticket No.".into(), ticket.id.to_string()),
            ("Allottee".into(), ticket.display_name().to_string()),
            ("Address".into(), ticket.contact.address.clone()),
            ("Project".into(), project_name(ticket, project)),
            ("Unit".into(), allotment.unit.clone()),
            ("Allotted Area".into(), format_area(booking.area, &project.area_unit)),
            ("Payment Mode".into(), booking.mode.clone()),
            ("Total Cost".into(), format_rupees(booking.total_cost)),
        ]))
        .with(Block::Spacer(2.0))
        .with(Block::Paragraph(greeting))
        .with(Block::Heading("Cost of the Unit".into()))
        .with(Block::Table(cost_table(&costs, &inputs, project)))
        .with(Block::Heading("Payment Schedule".into()))
        .with(Block::Table(schedule_table(&costs, booking.booking_amount)));

    let bank = &project.bank;
    let company = &project.company;
    let second = Section::new()
        .with(Block::Heading("Bank Details for Payment".into()))
        .with(Block::Paragraph(
            "Please remit all payments by cheque, demand draft or bank transfer to the account below, quoting your ticket number.".into(),
        ))
        .with(Block::Fields(vec![
            ("Account Name".into(), bank.account_name.clone()),
            ("Bank".into(), bank.bank_name.clone()),
            ("Account Number".into(), bank.account_number.clone()),
            ("IFSC".into(), bank.ifsc.clone()),
            ("Branch".into(), bank.branch.clone()),
        ]))
        .with(Block::Heading("Gift".into()))
        .with(Block::Paragraph(format!(
            "As a token of appreciation you are entitled to: {}.",
            allotment.gift
        )))
        .with(Block::Heading("Contact Us".into()))
        .with(Block::Fields(vec![
            ("Office".into(), company.address.clone()),
            ("Phone".into(), company.phone.clone()),
            ("Email".into(), company.email.clone()),
        ]))
        .with(Block::Paragraph(
            "This letter is computer generated. The allotment is subject to the terms of the agreement to be executed between the allottee and the company.".into(),
        ))
        .with(Block::Spacer(6.0))
        .with(Block::Signatures(vec![Party {
            caption: format!("For {}", company.name),
            name: company.signatory.clone(),
            buyer_signature: false,
        }]));

    template.sections = vec![first, second];
    Ok(template)
}

fn project_name(ticket: &Ticket, project: &ProjectConfig) -> String {
    if ticket.selection.project.trim().is_empty() {
        project.name.clone()
    } else {
        ticket.selection.project.clone()
    }
}

fn cost_table(costs: &CostBreakdown, inputs: &CostInputs, project: &ProjectConfig) -> Table {
    let area = format_area(costs.allotted_area, &project.area_unit);
    Table {
        columns: vec![
            Column::left("Particulars", 0.45),
            Column::left("Rate", 0.25),
            Column::right("Amount (Rs.)", 0.30),
        ],
        rows: vec![
            vec![
                format!("Basic Sale Price ({area})"),
                format!("{} / {}", format_amount(inputs.basic_sale_price), project.area_unit),
                format_amount(costs.total_basic_price),
            ],
            vec![
                "EDC / IDC".into(),
                format!("{} / {}", format_amount(inputs.edc_idc_rate), project.area_unit),
                format_amount(costs.total_edc_idc),
            ],
            vec![
                "Preferential Location Charges".into(),
                format!("{}% of BSP", inputs.plc_percent),
                format_amount(costs.plc_amount),
            ],
        ],
        footer: Some(vec![
            "Total Cost".into(),
            String::new(),
            format_amount(costs.total_cost),
        ]),
    }
}

fn schedule_table(costs: &CostBreakdown, booking_amount: f64) -> Table {
    let mut rows: Vec<Vec<String>> = costs
        .schedule
        .iter()
        .map(|line| {
            vec![
                line.label.clone(),
                format!("{}%", line.percent),
                format_amount(line.amount),
            ]
        })
        .collect();
    rows.push(vec![
        "Booking amount payable now".into(),
        String::new(),
        format_rupees(booking_amount),
    ]);
    Table {
        columns: vec![
            Column::left("Instalment", 0.55),
            Column::right("Share", 0.15),
            Column::right("Amount (Rs.)", 0.30),
        ],
        rows,
        footer: Some(vec![
            "Total".into(),
            format!("{}%", costs.schedule_total_percent),
            format_amount(costs.schedule_total_amount),
        ]),
    }
}
