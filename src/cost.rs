//! Cost computation engine.
//!
//! Every monetary figure printed on a letter, receipt or agreement is derived
//! here from a handful of inputs. The functions are pure; all outputs are
//! rounded half-up to two decimals from the unrounded intermediate values, so
//! each figure carries at most one rounding step.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Share of the total cost collected as booking amount.
pub const BOOKING_RATE: f64 = 0.10;

/// One row of a project's payment schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub label: String,
    pub percent: f64,
}

impl ScheduleRow {
    pub fn new(label: impl Into<String>, percent: f64) -> Self {
        Self {
            label: label.into(),
            percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostInputs {
    pub allotted_area: f64,
    pub basic_sale_price: f64,
    pub edc_idc_rate: f64,
    pub plc_percent: f64,
    pub schedule: Vec<ScheduleRow>,
}

impl CostInputs {
    /// Rejects negative or non-finite inputs.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("allotted area", self.allotted_area),
            ("basic sale price", self.basic_sale_price),
            ("EDC/IDC rate", self.edc_idc_rate),
            ("PLC percentage", self.plc_percent),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::validation(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        for row in &self.schedule {
            if !row.percent.is_finite() || row.percent < 0.0 {
                return Err(AppError::validation(format!(
                    "schedule row '{}' has invalid percentage {}",
                    row.label, row.percent
                )));
            }
        }
        Ok(())
    }
}

/// Per-ticket rates entered by the admin. Unset rates fall back to the
/// project's.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateOverrides {
    pub basic_sale_price: Option<f64>,
    pub edc_idc_rate: Option<f64>,
    pub plc_percent: Option<f64>,
}

impl RateOverrides {
    #[must_use]
    pub fn apply(&self, inputs: CostInputs) -> CostInputs {
        CostInputs {
            basic_sale_price: self.basic_sale_price.unwrap_or(inputs.basic_sale_price),
            edc_idc_rate: self.edc_idc_rate.unwrap_or(inputs.edc_idc_rate),
            plc_percent: self.plc_percent.unwrap_or(inputs.plc_percent),
            ..inputs
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleLine {
    pub label: String,
    pub percent: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub allotted_area: f64,
    pub total_basic_price: f64,
    pub total_edc_idc: f64,
    pub plc_amount: f64,
    pub total_cost: f64,
    pub booking_amount: f64,
    pub schedule: Vec<ScheduleLine>,
    /// Sum of the row percentages. Not forced to 100.
    pub schedule_total_percent: f64,
    /// Sum of the rounded row amounts. Not forced to equal `total_cost`.
    pub schedule_total_amount: f64,
}

// ============================================================================
// Computation
// ============================================================================

#[must_use]
pub fn compute(inputs: &CostInputs) -> CostBreakdown {
    let basic = inputs.allotted_area * inputs.basic_sale_price;
    let edc_idc = inputs.allotted_area * inputs.edc_idc_rate;
    let plc = basic * (inputs.plc_percent / 100.0);
    let total = basic + edc_idc + plc;

    let schedule: Vec<ScheduleLine> = inputs
        .schedule
        .iter()
        .map(|row| ScheduleLine {
            label: row.label.clone(),
            percent: row.percent,
            amount: round_currency(total * (row.percent / 100.0)),
        })
        .collect();

    let schedule_total_percent = schedule.iter().map(|line| line.percent).sum();
    let schedule_total_amount = round_currency(schedule.iter().map(|line| line.amount).sum());

    CostBreakdown {
        allotted_area: inputs.allotted_area,
        total_basic_price: round_currency(basic),
        total_edc_idc: round_currency(edc_idc),
        plc_amount: round_currency(plc),
        total_cost: round_currency(total),
        booking_amount: round_currency(total * BOOKING_RATE),
        schedule,
        schedule_total_percent,
        schedule_total_amount,
    }
}

/// Round half-up to two decimals.
#[must_use]
pub fn round_currency(value: f64) -> f64 {
    let scaled = value * 100.0;
    // Absorb representation error such as 1.005 * 100 = 100.49999999999999.
    let nudged = scaled + scaled.signum() * 1e-7;
    nudged.round() / 100.0
}

// ============================================================================
// Display
// ============================================================================

/// Formats with Indian digit grouping and two decimals, e.g. `12,34,567.50`.
#[must_use]
pub fn format_amount(value: f64) -> String {
    let rounded = round_currency(value);
    let negative = rounded < 0.0;
    let fixed = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let grouped = group_indian(int_part);
    if negative {
        format!("-{grouped}.{frac_part}")
    } else {
        format!("{grouped}.{frac_part}")
    }
}

/// Currency string for documents. Built-in PDF fonts carry no rupee glyph.
#[must_use]
pub fn format_rupees(value: f64) -> String {
    format!("Rs. {}", format_amount(value))
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, last_three) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (left, right) = rest.split_at(rest.len() - 2);
        groups.push(right);
        rest = left;
    }
    if !rest.is_empty() {
        groups.push(rest);
    }
    groups.reverse();
    format!("{},{}", groups.join(","), last_three)
}

const ONES: [&str; 20] = [
    "", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten",
    "Eleven", "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen",
    "Eighteen", "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

/// Spells an amount using the Indian numbering system, e.g.
/// `Five Lakh Rupees Only`.
#[must_use]
pub fn amount_in_words(value: f64) -> String {
    let rounded = round_currency(value.abs());
    let total_paise = (rounded * 100.0).round() as u64;
    let rupees = total_paise / 100;
    let paise = total_paise % 100;

    let rupee_words = if rupees == 0 {
        "Zero".to_string()
    } else {
        indian_words(rupees)
    };

    if paise == 0 {
        format!("{rupee_words} Rupees Only")
    } else {
        format!("{rupee_words} Rupees and {} Paise Only", below_hundred(paise))
    }
}

fn indian_words(mut n: u64) -> String {
    let mut parts: Vec<String> = Vec::new();

    let crore = n / 10_000_000;
    n %= 10_000_000;
    if crore > 0 {
        parts.push(format!("{} Crore", indian_words(crore)));
    }

    let lakh = n / 100_000;
    n %= 100_000;
    if lakh > 0 {
        parts.push(format!("{} Lakh", below_hundred(lakh)));
    }

    let thousand = n / 1_000;
    n %= 1_000;
    if thousand > 0 {
        parts.push(format!("{} Thousand", below_hundred(thousand)));
    }

    let hundred = n / 100;
    n %= 100;
    if hundred > 0 {
        parts.push(format!("{} Hundred", ONES[hundred as usize]));
    }

    if n > 0 {
        parts.push(below_hundred(n));
    }

    parts.join(" ")
}

fn below_hundred(n: u64) -> String {
    let n = n as usize;
    if n < 20 {
        ONES[n].to_string()
    } else if n % 10 == 0 {
        TENS[n / 10].to_string()
    } else {
        format!("{} {}", TENS[n / 10], ONES[n % 10])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(area: f64, bsp: f64, edc: f64, plc: f64) -> CostInputs {
        CostInputs {
            allotted_area: area,
            basic_sale_price: bsp,
            edc_idc_rate: edc,
            plc_percent: plc,
            schedule: vec![
                ScheduleRow::new("On booking", 10.0),
                ScheduleRow::new("Within 30 days", 40.0),
                ScheduleRow::new("On possession", 50.0),
            ],
        }
    }

    #[test]
    fn test_rate_overrides_replace_only_what_is_set() {
        let overrides = RateOverrides {
            basic_sale_price: Some(2_200.0),
            ..RateOverrides::default()
        };
        let applied = overrides.apply(inputs(200.0, 2_000.0, 300.0, 5.0));
        assert_eq!(applied.basic_sale_price, 2_200.0);
        assert_eq!(applied.edc_idc_rate, 300.0);
        assert_eq!(applied.plc_percent, 5.0);
        assert_eq!(applied.schedule.len(), 3);

        let unchanged = RateOverrides::default().apply(inputs(200.0, 2_000.0, 300.0, 5.0));
        assert_eq!(unchanged, inputs(200.0, 2_000.0, 300.0, 5.0));
    }

    #[test]
    fn test_compute_matches_formula() {
        let breakdown = compute(&inputs(200.0, 2_000.0, 300.0, 5.0));
        assert_eq!(breakdown.total_basic_price, 400_000.0);
        assert_eq!(breakdown.total_edc_idc, 60_000.0);
        assert_eq!(breakdown.plc_amount, 20_000.0);
        assert_eq!(breakdown.total_cost, 480_000.0);
        assert_eq!(breakdown.booking_amount, 48_000.0);
        assert_eq!(breakdown.schedule[1].amount, 192_000.0);
        assert_eq!(breakdown.schedule_total_percent, 100.0);
        assert_eq!(breakdown.schedule_total_amount, 480_000.0);
    }

    #[test]
    fn test_total_cost_formula_holds_across_inputs() {
        let cases = [
            (150.0, 1_850.0, 275.5, 0.0),
            (333.33, 2_499.99, 410.0, 7.5),
            (1.0, 0.01, 0.0, 12.5),
            (999.5, 12_345.67, 890.12, 3.0),
        ];
        for (area, bsp, edc, plc) in cases {
            let breakdown = compute(&inputs(area, bsp, edc, plc));
            let expected = area * bsp + area * edc + area * bsp * (plc / 100.0);
            assert!(
                (breakdown.total_cost - expected).abs() <= 0.005 + 1e-9,
                "total {} vs {}",
                breakdown.total_cost,
                expected
            );
            assert_eq!(breakdown.booking_amount, round_currency(expected * 0.10));
        }
    }

    #[test]
    fn test_schedule_is_never_normalised() {
        let mut input = inputs(100.0, 1_000.0, 0.0, 0.0);
        input.schedule = vec![
            ScheduleRow::new("First", 30.0),
            ScheduleRow::new("Second", 30.0),
        ];
        let breakdown = compute(&input);
        assert_eq!(breakdown.schedule_total_percent, 60.0);
        assert_eq!(breakdown.schedule_total_amount, 60_000.0);
        assert_ne!(breakdown.schedule_total_amount, breakdown.total_cost);
        assert_eq!(breakdown.schedule[0].amount, 30_000.0);
    }

    #[test]
    fn test_round_currency_is_half_up() {
        assert_eq!(round_currency(1.005), 1.01);
        assert_eq!(round_currency(2.675), 2.68);
        assert_eq!(round_currency(10.004), 10.0);
        assert_eq!(round_currency(0.125), 0.13);
    }

    #[test]
    fn test_validate_rejects_negative_area() {
        let input = inputs(-1.0, 100.0, 0.0, 0.0);
        assert!(matches!(input.validate(), Err(AppError::Validation(_))));
        assert!(inputs(10.0, 100.0, 0.0, 0.0).validate().is_ok());
    }

    #[test]
    fn test_indian_grouping() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(999.5), "999.50");
        assert_eq!(format_amount(1_000.0), "1,000.00");
        assert_eq!(format_amount(500_000.0), "5,00,000.00");
        assert_eq!(format_amount(12_345_678.9), "1,23,45,678.90");
        assert_eq!(format_amount(-50_000.0), "-50,000.00");
        assert_eq!(format_rupees(48_000.0), "Rs. 48,000.00");
    }

    #[test]
    fn test_amount_in_words() {
        assert_eq!(amount_in_words(50_000.0), "Fifty Thousand Rupees Only");
        assert_eq!(amount_in_words(500_000.0), "Five Lakh Rupees Only");
        assert_eq!(
            amount_in_words(12_345_678.5),
            "One Crore Twenty Three Lakh Forty Five Thousand Six Hundred Seventy Eight Rupees and Fifty Paise Only"
        );
        assert_eq!(amount_in_words(0.0), "Zero Rupees Only");
    }
}
