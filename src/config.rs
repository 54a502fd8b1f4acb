//! Project parameters and backend settings.

use serde::{Deserialize, Serialize};

use crate::cost::{CostInputs, ScheduleRow};
use crate::error::{AppError, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankDetails {
    pub account_name: String,
    pub bank_name: String,
    pub account_number: String,
    pub ifsc: String,
    pub branch: String,
}

impl Default for BankDetails {
    fn default() -> Self {
        Self {
            account_name: "Sunrise Estates Collection Account".to_string(),
            bank_name: "State Bank of India".to_string(),
            account_number: "00000000000".to_string(),
            ifsc: "SBIN0000000".to_string(),
            branch: "Main Branch".to_string(),
        }
    }
}

/// Letterhead and contact block printed on every document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyDetails {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub signatory: String,
}

impl Default for CompanyDetails {
    fn default() -> Self {
        Self {
            name: "Sunrise Estates Pvt. Ltd.".to_string(),
            address: "Plot 1, Sector 1, Gurugram, Haryana".to_string(),
            phone: "+91 00000 00000".to_string(),
            email: "sales@example.com".to_string(),
            signatory: "Authorised Signatory".to_string(),
        }
    }
}

/// Per-project pricing inputs plus document boilerplate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    pub location: String,
    /// Basic sale price per unit area.
    pub basic_sale_price: f64,
    /// EDC/IDC per unit area.
    pub edc_idc_rate: f64,
    pub plc_percent: f64,
    pub area_unit: String,
    pub schedule: Vec<ScheduleRow>,
    pub bank: BankDetails,
    pub company: CompanyDetails,
    /// Replaces the built-in agreement terms when present.
    pub terms: Option<Vec<String>>,
    /// Replaces the built-in agreement declarations when present.
    pub declarations: Option<Vec<String>>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "Sunrise Greens".to_string(),
            location: "Sector 1, Gurugram".to_string(),
            basic_sale_price: 2_000.0,
            edc_idc_rate: 300.0,
            plc_percent: 0.0,
            area_unit: "sq. yd.".to_string(),
            schedule: vec![
                ScheduleRow::new("At the time of booking", 10.0),
                ScheduleRow::new("Within 45 days of allotment", 40.0),
                ScheduleRow::new("On offer of possession", 50.0),
            ],
            bank: BankDetails::default(),
            company: CompanyDetails::default(),
            terms: None,
            declarations: None,
        }
    }
}

impl ProjectConfig {
    #[must_use]
    pub fn cost_inputs(&self, allotted_area: f64) -> CostInputs {
        CostInputs {
            allotted_area,
            basic_sale_price: self.basic_sale_price,
            edc_idc_rate: self.edc_idc_rate,
            plc_percent: self.plc_percent,
            schedule: self.schedule.clone(),
        }
    }
}

/// Where the REST collaborator lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs,
        }
    }
}

/// Loads a project file, falling back to the built-in project when no path is given.
pub fn load_project(path: &Option<String>) -> Result<ProjectConfig> {
    match path {
        Some(p) => {
            let content = std::fs::read_to_string(p)
                .map_err(|e| AppError::Config(format!("{}: {}", p, e)))?;
            parse_project(&content).map_err(|e| AppError::Config(format!("{}: {}", p, e)))
        }
        None => Ok(ProjectConfig::default()),
    }
}

fn parse_project(content: &str) -> std::result::Result<ProjectConfig, String> {
    let project: ProjectConfig =
        serde_json::from_str(content).map_err(|e| format!("Invalid JSON: {}", e))?;
    project
        .cost_inputs(0.0)
        .validate()
        .map_err(|e| e.to_string())?;
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_project_file_keeps_defaults() {
        let project = parse_project(r#"{"name": "Palm Meadows", "plc_percent": 5}"#)
            .expect("valid project");
        assert_eq!(project.name, "Palm Meadows");
        assert_eq!(project.plc_percent, 5.0);
        assert_eq!(project.basic_sale_price, 2_000.0);
        assert_eq!(project.schedule.len(), 3);
        assert!(project.terms.is_none());
    }

    #[test]
    fn test_negative_rate_is_rejected() {
        let err = parse_project(r#"{"edc_idc_rate": -10}"#).unwrap_err();
        assert!(err.contains("EDC/IDC"), "{err}");
    }

    #[test]
    fn test_missing_project_file_is_config_error() {
        let err = load_project(&Some("does-not-exist.json".to_string())).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_backend_url_trailing_slash_is_trimmed() {
        let config = BackendConfig::new("https://api.example.com/v1/", 10);
        assert_eq!(config.base_url, "https://api.example.com/v1");
    }
}
