//! Document renderer.
//!
//! Each document kind is a fixed template bound to ticket data. Rendering
//! lays the template out on A4 pages (see [`layout`]) and assembles the
//! pages into one PDF (see [`pdf`]).

pub mod agreement;
pub mod layout;
pub mod letter;
pub mod metrics;
pub mod pdf;
pub mod receipt;

use chrono::NaiveDate;
use tracing::debug;

pub use layout::{paginate, Page, Template};
pub use pdf::RenderedPdf;

use crate::config::ProjectConfig;
use crate::error::{AppError, Result};
use crate::signature::Signature;

/// Paginates and assembles a template.
///
/// Templates with a buyer signature slot refuse to render without one.
pub fn render(template: &Template, signature: Option<&Signature>) -> Result<RenderedPdf> {
    if template.wants_buyer_signature() && signature.is_none() {
        return Err(AppError::validation(format!(
            "{} needs the buyer's signature",
            template.title
        )));
    }

    let pages = paginate(template);
    debug!(
        title = %template.title,
        sections = template.sections.len(),
        pages = pages.len(),
        "Template paginated"
    );
    pdf::render_pdf(&template.title, &pages, signature)
}

/// Empty template carrying the project's letterhead.
fn letterhead(project: &ProjectConfig, title: &str, footer_note: String) -> Template {
    let company = &project.company;
    Template {
        title: title.to_string(),
        letterhead: company.name.clone(),
        letterhead_detail: format!(
            "{}  |  {}  |  {}",
            company.address, company.phone, company.email
        ),
        footer_note,
        sections: Vec::new(),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%-d %B %Y").to_string()
}

/// Area with the project's unit, trimmed of a needless fraction.
fn format_area(area: f64, unit: &str) -> String {
    if area.fract() == 0.0 {
        format!("{area:.0} {unit}")
    } else {
        format!("{area:.2} {unit}")
    }
}
