//! Shared primitive types used across the warehouse core.

use serde::{Deserialize, Serialize};

/// The canonical pipeline run identifier.
pub type RunId = String;

/// A stable, unique identifier for any generated entity.
pub type EntityId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxType {
    #[serde(rename = "PAYE")]
    Paye,
    #[serde(rename = "VAT")]
    Vat,
}

impl TaxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paye => "PAYE",
            Self::Vat => "VAT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PAYE" => Some(Self::Paye),
            "VAT" => Some(Self::Vat),
            _ => None,
        }
    }

    /// Number of filing periods per year (PAYE monthly, VAT quarterly).
    pub fn periods_per_year(&self) -> u32 {
        match self {
            Self::Paye => 12,
            Self::Vat => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxpayerType {
    Individual,
    Corporate,
    Partnership,
    #[serde(rename = "NGO")]
    Ngo,
}

impl TaxpayerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "Individual",
            Self::Corporate => "Corporate",
            Self::Partnership => "Partnership",
            Self::Ngo => "NGO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Individual" => Some(Self::Individual),
            "Corporate" => Some(Self::Corporate),
            "Partnership" => Some(Self::Partnership),
            "NGO" => Some(Self::Ngo),
            _ => None,
        }
    }

    /// PAYE returns are filed by employers only.
    pub fn files_paye(&self) -> bool {
        matches!(self, Self::Corporate | Self::Partnership)
    }
}

/// Ordinal fraud-suspicion label carried on every taxpayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Low" => Some(Self::Low),
            "Medium" => Some(Self::Medium),
            "High" => Some(Self::High),
            _ => None,
        }
    }

    /// Categorize a raw additive risk score.
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            Self::High
        } else if score > 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Four-band bucketing of a model probability. Breakpoints 0.3 / 0.6 / 0.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskBand {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskBand {
    pub fn from_probability(p: f64) -> Self {
        if p <= 0.3 {
            Self::Low
        } else if p <= 0.6 {
            Self::Medium
        } else if p <= 0.8 {
            Self::High
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    /// Collapse to the three-valued taxpayer risk category for write-back.
    /// Critical maps to High so the taxpayer domain stays {Low, Medium, High}.
    pub fn to_risk_category(&self) -> RiskCategory {
        match self {
            Self::Low => RiskCategory::Low,
            Self::Medium => RiskCategory::Medium,
            Self::High | Self::Critical => RiskCategory::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnStatus {
    Filed,
    Overdue,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filed => "Filed",
            Self::Overdue => "Overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Filed" => Some(Self::Filed),
            "Overdue" => Some(Self::Overdue),
            _ => None,
        }
    }

    /// Filed iff a filing date exists and is on or before the due date.
    pub fn derive(
        filing_date: Option<chrono::NaiveDate>,
        due_date: chrono::NaiveDate,
    ) -> Self {
        match filing_date {
            Some(filed) if filed <= due_date => Self::Filed,
            _ => Self::Overdue,
        }
    }
}

/// Alert lifecycle. Transitions are one-directional:
/// Open -> Under Investigation -> Closed, never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertStatus {
    Open,
    #[serde(rename = "Under Investigation")]
    UnderInvestigation,
    Closed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::UnderInvestigation => "Under Investigation",
            Self::Closed => "Closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Open" => Some(Self::Open),
            "Under Investigation" => Some(Self::UnderInvestigation),
            "Closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: AlertStatus) -> bool {
        next > *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn return_status_derivation() {
        let due = NaiveDate::from_ymd_opt(2023, 4, 15).unwrap();
        assert_eq!(ReturnStatus::derive(Some(due), due), ReturnStatus::Filed);
        assert_eq!(
            ReturnStatus::derive(Some(due.pred_opt().unwrap()), due),
            ReturnStatus::Filed
        );
        assert_eq!(
            ReturnStatus::derive(Some(due.succ_opt().unwrap()), due),
            ReturnStatus::Overdue
        );
        assert_eq!(ReturnStatus::derive(None, due), ReturnStatus::Overdue);
    }

    #[test]
    fn risk_band_breakpoints() {
        assert_eq!(RiskBand::from_probability(0.1), RiskBand::Low);
        assert_eq!(RiskBand::from_probability(0.4), RiskBand::Medium);
        assert_eq!(RiskBand::from_probability(0.7), RiskBand::High);
        assert_eq!(RiskBand::from_probability(0.9), RiskBand::Critical);
    }

    #[test]
    fn alert_transitions_are_one_directional() {
        assert!(AlertStatus::Open.can_transition_to(AlertStatus::UnderInvestigation));
        assert!(AlertStatus::Open.can_transition_to(AlertStatus::Closed));
        assert!(AlertStatus::UnderInvestigation.can_transition_to(AlertStatus::Closed));
        assert!(!AlertStatus::Closed.can_transition_to(AlertStatus::Open));
        assert!(!AlertStatus::UnderInvestigation.can_transition_to(AlertStatus::Open));
    }
}
