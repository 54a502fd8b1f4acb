//! Ticket data model.
//!
//! The backend stores every application as one flat draft record whose
//! applicant fields depend on `draft_type` and whose lifecycle is a bag of
//! independent flags. [`DraftRecord`] mirrors that wire shape; [`Ticket`] is
//! the checked domain view with a tagged [`Applicant`] and an explicit
//! [`Stage`].

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;
use crate::lifecycle::Stage;

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TicketId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Scalar::deserialize(deserializer).map(|s| Self(s.into_text()))
    }
}

/// Loosely typed scalar; the backend is not consistent about quoting.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    let value: Option<Scalar> = Option::deserialize(deserializer)?;
    Ok(match value {
        None => None,
        Some(Scalar::Bool(b)) => Some(b),
        Some(Scalar::Int(n)) => Some(n != 0),
        Some(Scalar::Float(n)) => Some(n != 0.0),
        Some(Scalar::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" => None,
            "true" | "1" | "yes" => Some(true),
            _ => Some(false),
        },
    })
}

fn de_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value: Option<Scalar> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(Scalar::Int(n)) => Ok(Some(n as f64)),
        Some(Scalar::Float(n)) => Ok(Some(n)),
        Some(Scalar::Bool(_)) => Err(serde::de::Error::custom("expected a number")),
        Some(Scalar::Text(s)) => {
            let cleaned: String = s.chars().filter(|c| *c != ',').collect();
            let trimmed = cleaned.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("invalid number '{s}'")))
        }
    }
}

fn de_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value: Option<Scalar> = Option::deserialize(deserializer)?;
    Ok(value.map(Scalar::into_text))
}

fn de_approval<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Approval, D::Error> {
    let value: Option<Scalar> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(Approval::Pending),
        Some(Scalar::Int(n)) => Approval::from_code(n).map_err(serde::de::Error::custom),
        Some(Scalar::Float(n)) if n.fract() == 0.0 => {
            Approval::from_code(n as i64).map_err(serde::de::Error::custom)
        }
        Some(Scalar::Float(n)) => Err(serde::de::Error::custom(format!(
            "invalid approval code {n}"
        ))),
        Some(Scalar::Bool(b)) => Ok(if b { Approval::Approved } else { Approval::Pending }),
        Some(Scalar::Text(s)) => s.parse().map_err(serde::de::Error::custom),
    }
}

// ============================================================================
// Review decision
// ============================================================================

/// Admin review outcome. Encoded on the wire as 0, 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Approval {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl Approval {
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Approved => 1,
            Self::Rejected => 2,
        }
    }

    fn from_code(code: i64) -> Result<Self, String> {
        match code {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Approved),
            2 => Ok(Self::Rejected),
            other => Err(format!("unknown approval code {other}")),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for Approval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "pending" => Ok(Self::Pending),
            "1" | "approved" => Ok(Self::Approved),
            "2" | "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown approval value '{other}'")),
        }
    }
}

impl Serialize for Approval {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Approval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de_approval(deserializer)
    }
}

// ============================================================================
// Draw
// ============================================================================

/// A lucky-draw event. Owned by the backend; tickets only reference it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draw {
    #[serde(default, deserialize_with = "de_text")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub opening_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de_flag")]
    pub active: Option<bool>,
}

/// Drafts carry either the draw's name or the embedded draw object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DrawRef {
    Name(String),
    Full(Draw),
}

impl DrawRef {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Full(draw) => &draw.name,
        }
    }
}

// ============================================================================
// Wire record
// ============================================================================

/// A draft exactly as `GET /draft` returns it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftRecord {
    pub ticket_id: TicketId,
    #[serde(deserialize_with = "de_text", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_type: Option<String>,

    // Individual / EOI applicant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(deserialize_with = "de_flag", skip_serializing_if = "Option::is_none")]
    pub eoi: Option<bool>,

    // Company applicant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signatory_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signatory_designation: Option<String>,

    // Contact and documents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(deserialize_with = "de_text", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan: Option<String>,
    #[serde(deserialize_with = "de_text", skip_serializing_if = "Option::is_none")]
    pub aadhaar: Option<String>,

    // Selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_plan: Option<String>,
    #[serde(deserialize_with = "de_text", skip_serializing_if = "Option::is_none")]
    pub plot_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draw: Option<DrawRef>,

    // Lifecycle flags
    pub approved: Approval,
    #[serde(deserialize_with = "de_flag", skip_serializing_if = "Option::is_none")]
    pub alloted: Option<bool>,
    #[serde(deserialize_with = "de_text", skip_serializing_if = "Option::is_none")]
    pub allot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gift: Option<String>,
    #[serde(deserialize_with = "de_flag", skip_serializing_if = "Option::is_none")]
    pub allotment_done: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(deserialize_with = "de_number", skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(deserialize_with = "de_number", skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(deserialize_with = "de_number", skip_serializing_if = "Option::is_none")]
    pub booking_amount: Option<f64>,
    #[serde(deserialize_with = "de_flag", skip_serializing_if = "Option::is_none")]
    pub signed: Option<bool>,
}

// ============================================================================
// Domain view
// ============================================================================

/// Opaque reference to an identity document held by the backend.
pub type DocumentRef = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    pub pan: Option<DocumentRef>,
    pub aadhaar: Option<DocumentRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyApplicant {
    pub company_name: String,
    pub signatory_name: String,
    pub signatory_designation: Option<String>,
    pub pan: Option<DocumentRef>,
}

/// One variant per `draft_type`, each with only its own fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applicant {
    Individual(Person),
    Company(CompanyApplicant),
    /// Expression of interest rather than a firm booking.
    Eoi(Person),
}

impl Applicant {
    /// Name printed as the buyer on documents.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Individual(person) | Self::Eoi(person) => &person.name,
            Self::Company(company) => &company.company_name,
        }
    }

    /// Person who signs on the applicant's behalf.
    #[must_use]
    pub fn signatory(&self) -> &str {
        match self {
            Self::Individual(person) | Self::Eoi(person) => &person.name,
            Self::Company(company) => &company.signatory_name,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Individual(_) => "Individual",
            Self::Company(_) => "Company",
            Self::Eoi(_) => "EOI",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contact {
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// What the applicant chose at submission. Immutable from the applicant side.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub project: String,
    pub payment_plan: String,
    pub plot_size: String,
    pub preference: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub id: TicketId,
    pub user_id: Option<String>,
    pub draw: Option<String>,
    pub applicant: Applicant,
    pub contact: Contact,
    pub selection: Selection,
    pub stage: Stage,
}

impl Ticket {
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.applicant.display_name()
    }
}

impl TryFrom<DraftRecord> for Ticket {
    type Error = AppError;

    fn try_from(record: DraftRecord) -> Result<Self, Self::Error> {
        let inconsistent = |reason: String| AppError::InconsistentTicket {
            ticket_id: record.ticket_id.to_string(),
            reason,
        };

        if record.ticket_id.as_str().is_empty() {
            return Err(inconsistent("missing ticket_id".to_string()));
        }

        let applicant = parse_applicant(&record).map_err(inconsistent)?;
        let stage = Stage::from_record(&record).map_err(inconsistent)?;

        Ok(Self {
            id: record.ticket_id.clone(),
            user_id: record.user_id.clone(),
            draw: record.draw.as_ref().map(|d| d.name().to_string()),
            applicant,
            contact: Contact {
                email: record.email.clone().unwrap_or_default(),
                phone: record.phone.clone().unwrap_or_default(),
                address: record.address.clone().unwrap_or_default(),
            },
            selection: Selection {
                project: record.project.clone().unwrap_or_default(),
                payment_plan: record.payment_plan.clone().unwrap_or_default(),
                plot_size: record.plot_size.clone().unwrap_or_default(),
                preference: record.preference.clone().unwrap_or_default(),
            },
            stage,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_applicant(record: &DraftRecord) -> Result<Applicant, String> {
    let draft_type = record
        .draft_type
        .as_deref()
        .map(|t| t.trim().to_ascii_lowercase())
        .unwrap_or_else(|| "individual".to_string());

    let person = || -> Result<Person, String> {
        Ok(Person {
            name: non_empty(&record.name).ok_or("applicant name is missing")?,
            pan: non_empty(&record.pan),
            aadhaar: non_empty(&record.aadhaar),
        })
    };

    match draft_type.as_str() {
        "individual" if record.eoi == Some(true) => Ok(Applicant::Eoi(person()?)),
        "individual" => Ok(Applicant::Individual(person()?)),
        "eoi" => Ok(Applicant::Eoi(person()?)),
        "company" => {
            let company_name = non_empty(&record.company_name).ok_or("company name is missing")?;
            let signatory_name = non_empty(&record.signatory_name)
                .or_else(|| non_empty(&record.name))
                .ok_or("authorised signatory is missing")?;
            Ok(Applicant::Company(CompanyApplicant {
                company_name,
                signatory_name,
                signatory_designation: non_empty(&record.signatory_designation),
                pan: non_empty(&record.pan),
            }))
        }
        other => Err(format!("unknown draft_type '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::StageKind;

    #[test]
    fn test_record_accepts_loose_scalars() {
        let json = r#"{
            "ticket_id": 1042,
            "draft_type": "Individual",
            "name": "Amit Sharma",
            "phone": 9876543210,
            "approved": "1",
            "alloted": 1,
            "allot": "Plot-12",
            "gift": "Gold Coin",
            "allotment_done": "true",
            "mode": "Online",
            "area": "200",
            "total_cost": "5,00,000",
            "booking_amount": 50000,
            "signed": 0
        }"#;
        let record: DraftRecord = serde_json::from_str(json).expect("record parses");
        assert_eq!(record.ticket_id.as_str(), "1042");
        assert_eq!(record.phone.as_deref(), Some("9876543210"));
        assert_eq!(record.approved, Approval::Approved);
        assert_eq!(record.total_cost, Some(500_000.0));
        assert_eq!(record.signed, Some(false));

        let ticket = Ticket::try_from(record).expect("consistent ticket");
        assert_eq!(ticket.stage.kind(), StageKind::AllotmentFinalized);
        assert_eq!(ticket.display_name(), "Amit Sharma");
    }

    #[test]
    fn test_company_variant_keeps_signatory() {
        let record = DraftRecord {
            ticket_id: TicketId::new("T-7"),
            draft_type: Some("Company".into()),
            company_name: Some("Acme Infra LLP".into()),
            signatory_name: Some("Neha Gupta".into()),
            ..Default::default()
        };
        let ticket = Ticket::try_from(record).expect("company ticket");
        match &ticket.applicant {
            Applicant::Company(company) => assert_eq!(company.signatory_name, "Neha Gupta"),
            other => panic!("expected company, got {other:?}"),
        }
        assert_eq!(ticket.display_name(), "Acme Infra LLP");
        assert_eq!(ticket.applicant.signatory(), "Neha Gupta");
        assert_eq!(ticket.stage.kind(), StageKind::Pending);
    }

    #[test]
    fn test_eoi_flag_on_individual_record() {
        let record = DraftRecord {
            ticket_id: TicketId::new("T-8"),
            draft_type: Some("individual".into()),
            name: Some("Ravi".into()),
            eoi: Some(true),
            ..Default::default()
        };
        let ticket = Ticket::try_from(record).expect("eoi ticket");
        assert_eq!(ticket.applicant.kind(), "EOI");
    }

    #[test]
    fn test_missing_company_name_is_inconsistent() {
        let record = DraftRecord {
            ticket_id: TicketId::new("T-9"),
            draft_type: Some("Company".into()),
            name: Some("Someone".into()),
            ..Default::default()
        };
        let err = Ticket::try_from(record).unwrap_err();
        assert!(matches!(err, AppError::InconsistentTicket { .. }));
        assert!(err.to_string().contains("company name"));
    }

    #[test]
    fn test_draw_reference_forms() {
        let by_name: DraftRecord =
            serde_json::from_str(r#"{"ticket_id": "A", "draw": "Diwali Draw"}"#).expect("parses");
        assert_eq!(by_name.draw.as_ref().map(DrawRef::name), Some("Diwali Draw"));

        let full: DraftRecord = serde_json::from_str(
            r#"{"ticket_id": "B", "draw": {"id": 3, "name": "Holi Draw", "opening_date": "2025-03-14", "active": 1}}"#,
        )
        .expect("parses");
        match full.draw {
            Some(DrawRef::Full(draw)) => {
                assert_eq!(draw.id.as_deref(), Some("3"));
                assert_eq!(draw.opening_date, NaiveDate::from_ymd_opt(2025, 3, 14));
                assert_eq!(draw.active, Some(true));
            }
            other => panic!("expected full draw, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_approval_code_is_rejected() {
        let result: Result<DraftRecord, _> =
            serde_json::from_str(r#"{"ticket_id": "C", "approved": 7}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_fractional_approval_code_is_rejected() {
        let result: Result<DraftRecord, _> =
            serde_json::from_str(r#"{"ticket_id": "C", "approved": 1.9}"#);
        assert!(result.is_err());

        let whole: DraftRecord =
            serde_json::from_str(r#"{"ticket_id": "C", "approved": 2.0}"#).expect("whole float");
        assert_eq!(whole.approved, Approval::Rejected);
    }
}
