//! Agreement: booking summary, terms and declarations. Each section closes
//! with a signature block carrying the buyer's signature.

use chrono::NaiveDate;

use super::layout::{Block, Party, Section, Template};
use super::{format_area, format_date, letterhead};
use crate::config::ProjectConfig;
use crate::cost::format_rupees;
use crate::error::{AppError, Result};
use crate::ticket::{Applicant, Ticket};

pub const TITLE: &str = "Agreement";

const DEFAULT_TERMS: [&str; 12] = [
    "The allotment is provisional and subject to the allottee paying every instalment of the payment schedule on or before its due date.",
    "The total cost stated in this agreement covers the basic sale price, EDC/IDC and preferential location charges. Taxes, stamp duty and registration charges are payable by the allottee at actuals.",
    "Delay in payment of any instalment attracts interest at 18% per annum for the period of delay. The company may cancel the allotment if a payment remains outstanding for more than 90 days.",
    "On cancellation for default, the booking amount stands forfeited and the balance paid, if any, is refunded without interest within 90 days.",
    "The allottee may not transfer or assign the unit before execution of the conveyance deed without prior written consent of the company and payment of the applicable transfer charges.",
    "The area of the unit is tentative. Any variation on final demarcation is charged or refunded at the rate applicable at the time of booking.",
    "Possession will be offered on completion of development, subject to force majeure, and on receipt of all dues. Maintenance charges are payable from the date of offer of possession.",
    "The allottee shall abide by the rules of the maintenance agency and of any association of allottees formed for the project.",
    "The layout plan is subject to change as required by the competent authority. The allottee shall have no claim on account of any such change.",
    "All correspondence sent to the address recorded in the application is deemed received by the allottee.",
    "Any gift offered with the allotment is promotional, carries no cash value and is not adjustable against the cost of the unit.",
    "Disputes arising out of this agreement are subject to the exclusive jurisdiction of the courts where the project is located.",
];

const DEFAULT_DECLARATIONS: [&str; 6] = [
    "I/We have read and understood the terms and conditions of this agreement and accept them unconditionally.",
    "The particulars furnished in the application are true and correct, and nothing material has been concealed.",
    "I/We have inspected the project site, the layout plan and the approvals, and am/are satisfied with them.",
    "The funds used for this booking are from legitimate sources.",
    "I/We understand that the allotment may be cancelled if any declaration made herein is found to be false.",
    "I/We agree to execute such further documents as the company may reasonably require to complete the transaction.",
];

/// Builds the three-section agreement for a ticket with a finalized allotment.
pub fn agreement(ticket: &Ticket, project: &ProjectConfig, date: NaiveDate) -> Result<Template> {
    let (Some(allotment), Some(booking)) = (ticket.stage.allotment(), ticket.stage.booking()) else {
        return Err(AppError::validation(format!(
            "ticket {} has no finalized allotment ({})",
            ticket.id,
            ticket.stage.kind()
        )));
    };

    let terms = clauses(project.terms.as_deref(), &DEFAULT_TERMS);
    let declarations = clauses(project.declarations.as_deref(), &DEFAULT_DECLARATIONS);
    let parties = signing_parties(ticket, project);

    let mut summary_fields = vec![
        ("Agreement Date".to_string(), format_date(date)),
        ("Ticket No.".to_string(), ticket.id.to_string()),
        ("Applicant Type".to_string(), ticket.applicant.kind().to_string()),
        ("Allottee".to_string(), ticket.display_name().to_string()),
    ];
    if let Applicant::Company(company) = &ticket.applicant {
        let designation = company
            .signatory_designation
            .as_deref()
            .map_or_else(String::new, |d| format!(", {d}"));
        summary_fields.push((
            "Authorised Signatory".to_string(),
            format!("{}{}", company.signatory_name, designation),
        ));
    }
    summary_fields.extend([
        ("Address".to_string(), ticket.contact.address.clone()),
        ("Email".to_string(), ticket.contact.email.clone()),
        ("Phone".to_string(), ticket.contact.phone.clone()),
    ]);

    let project_name = if ticket.selection.project.trim().is_empty() {
        project.name.clone()
    } else {
        ticket.selection.project.clone()
    };
    let booking_fields = vec![
        ("Project".to_string(), format!("{}, {}", project_name, project.location)),
        ("Unit".to_string(), allotment.unit.clone()),
        ("Allotted Area".to_string(), format_area(booking.area, &project.area_unit)),
        ("Payment Plan".to_string(), ticket.selection.payment_plan.clone()),
        ("Payment Mode".to_string(), booking.mode.clone()),
        ("Total Cost".to_string(), format_rupees(booking.total_cost)),
        ("Booking Amount".to_string(), format_rupees(booking.booking_amount)),
        ("Gift".to_string(), allotment.gift.clone()),
    ];

    let summary = Section::new()
        .with(Block::Title("Agreement for Allotment".into()))
        .with(Block::Paragraph(format!(
            "This agreement is made on {} between {} (the company) and {} (the allottee) for the unit described below.",
            format_date(date),
            project.company.name,
            ticket.display_name()
        )))
        .with(Block::Heading("Allottee".into()))
        .with(Block::Fields(summary_fields))
        .with(Block::Heading("Booking".into()))
        .with(Block::Fields(booking_fields))
        .with(Block::Spacer(6.0))
        .with(Block::Signatures(parties.clone()));

    let terms_section = Section::new()
        .with(Block::Title("Terms and Conditions".into()))
        .with(Block::Numbered(terms))
        .with(Block::Spacer(6.0))
        .with(Block::Signatures(parties.clone()));

    let declarations_section = Section::new()
        .with(Block::Title("Declarations".into()))
        .with(Block::Paragraph("I/We, the allottee, hereby declare that:".into()))
        .with(Block::Numbered(declarations))
        .with(Block::Spacer(6.0))
        .with(Block::Signatures(parties));

    let mut template = letterhead(project, TITLE, format!("Agreement {}", ticket.id));
    template.sections = vec![summary, terms_section, declarations_section];
    Ok(template)
}

fn clauses(configured: Option<&[String]>, defaults: &[&str]) -> Vec<String> {
    match configured {
        Some(items) if !items.is_empty() => items.to_vec(),
        _ => defaults.iter().map(|s| s.to_string()).collect(),
    }
}

fn signing_parties(ticket: &Ticket, project: &ProjectConfig) -> Vec<Party> {
    vec![
        Party {
            caption: "Allottee".into(),
            name: ticket.applicant.signatory().to_string(),
            buyer_signature: true,
        },
        Party {
            caption: format!("For {}", project.company.name),
            name: project.company.signatory.clone(),
            buyer_signature: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{Allotment, Booking, Stage};
    use crate::render::layout::paginate;
    use crate::ticket::{CompanyApplicant, Contact, Person, Selection, TicketId};

    fn stage() -> Stage {
        Stage::Signed(
            Allotment {
                unit: "Plot-12".into(),
                gift: "Gold Coin".into(),
            },
            Booking {
                mode: "Online".into(),
                area: 200.0,
                total_cost: 500_000.0,
                booking_amount: 50_000.0,
            },
        )
    }

    fn ticket(applicant: Applicant) -> Ticket {
        Ticket {
            id: TicketId::new("T-42"),
            user_id: None,
            draw: None,
            applicant,
            contact: Contact::default(),
            selection: Selection::default(),
            stage: stage(),
        }
    }

    fn person() -> Applicant {
        Applicant::Individual(Person {
            name: "Amit Sharma".into(),
            pan: None,
            aadhaar: None,
        })
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()
    }

    #[test]
    fn test_three_pages_each_with_a_signature_slot() {
        let template = agreement(&ticket(person()), &ProjectConfig::default(), date()).expect("agreement");
        let pages = paginate(&template);
        assert_eq!(pages.len(), 3);
        for page in &pages {
            assert_eq!(page.signature_slots(), 1, "page {}", page.number);
        }
        let summary = pages[0].body_text().join(" ");
        assert!(summary.contains("Rs. 5,00,000.00"), "{summary}");
    }

    #[test]
    fn test_admin_figures_are_printed_verbatim() {
        let template = agreement(&ticket(person()), &ProjectConfig::default(), date()).expect("agreement");
        let text = paginate(&template)[0].body_text().join(" ");
        // The engine would give 4,60,000.00 for 200 sq. yd. at the default rates.
        assert!(!text.contains("4,60,000.00"));
        assert!(text.contains("Rs. 50,000.00"));
    }

    #[test]
    fn test_company_signatory_signs() {
        let company = Applicant::Company(CompanyApplicant {
            company_name: "Acme Infra LLP".into(),
            signatory_name: "Neha Gupta".into(),
            signatory_designation: Some("Partner".into()),
            pan: None,
        });
        let template = agreement(&ticket(company), &ProjectConfig::default(), date()).expect("agreement");
        let text = paginate(&template)[0].body_text().join(" ");
        assert!(text.contains("Neha Gupta, Partner"));
        assert!(text.contains("Acme Infra LLP"));
    }

    #[test]
    fn test_configured_terms_replace_defaults() {
        let project = ProjectConfig {
            terms: Some(vec!["Only clause".into()]),
            ..ProjectConfig::default()
        };
        let template = agreement(&ticket(person()), &project, date()).expect("agreement");
        let terms = paginate(&template)[1].body_text().join(" ");
        assert!(terms.contains("Only clause"));
        assert!(!terms.contains("provisional"));
    }

    #[test]
    fn test_unfinalized_ticket_is_refused() {
        let mut t = ticket(person());
        t.stage = Stage::Approved;
        assert!(matches!(
            agreement(&t, &ProjectConfig::default(), date()),
            Err(AppError::Validation(_))
        ));
    }
}
