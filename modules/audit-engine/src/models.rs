//! Core data model: company datasets, findings, adjusting journal entries,
//! and risk scores.
//!
//! Field names mirror the wire vocabulary exactly since these types are
//! serialized to subscribers and into the audit record verbatim.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Balances within this tolerance are considered equal.
pub const EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AccountingBasis {
    Cash,
    Accrual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountingStandard {
    Gaap,
    Ifrs,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    Debit,
    Credit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Weight used by the risk scorer.
    pub fn weight(self) -> f64 {
        match self {
            Severity::Critical => 10.0,
            Severity::High => 5.0,
            Severity::Medium => 2.0,
            Severity::Low => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FindingCategory {
    Structural,
    Balance,
    Classification,
    Timing,
    Documentation,
    Fraud,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyMetadata {
    pub id: String,
    pub name: String,
    pub industry: String,
    pub basis: AccountingBasis,
    pub reporting_period: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub normal_balance: NormalBalance,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChartOfAccounts {
    pub accounts: Vec<Account>,
}

impl ChartOfAccounts {
    pub fn find(&self, code: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.code == code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.find(code).is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub entry_id: String,
    pub date: NaiveDate,
    pub account_code: String,
    pub account_name: String,
    pub debit: f64,
    pub credit: f64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_or_customer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralLedger {
    pub company_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub entries: Vec<JournalEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrialBalanceRow {
    pub account_code: String,
    pub account_name: String,
    pub debit: f64,
    pub credit: f64,
    pub beginning_balance: f64,
    pub ending_balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrialBalance {
    pub period_end: NaiveDate,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debits: f64,
    pub total_credits: f64,
}

impl TrialBalance {
    pub fn is_balanced(&self) -> bool {
        (self.total_debits - self.total_credits).abs() < EPSILON
    }
}

/// Input bundle handed to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditDataset {
    pub metadata: CompanyMetadata,
    pub coa: ChartOfAccounts,
    pub gl: GeneralLedger,
    pub tb: TrialBalance,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub finding_id: String,
    pub category: FindingCategory,
    pub severity: Severity,
    pub issue: String,
    pub details: String,
    pub recommendation: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gaap_principle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ifrs_standard: Option<String>,
    pub detection_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_transactions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_explanation: Option<String>,
    pub accounting_standard_used: AccountingStandard,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AjeLine {
    pub account_code: String,
    pub debit: f64,
    pub credit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Aje {
    pub aje_id: String,
    pub date: NaiveDate,
    pub entries: Vec<AjeLine>,
    pub description: String,
    pub finding_reference: String,
    pub rationale: String,
    pub rule_applied: String,
    pub standard_reference: String,
    pub accounting_standard: AccountingStandard,
    pub is_balanced: bool,
}

impl Aje {
    pub fn total_debits(&self) -> f64 {
        self.entries.iter().map(|l| l.debit).sum()
    }

    pub fn total_credits(&self) -> f64 {
        self.entries.iter().map(|l| l.credit).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RiskScore {
    pub overall_score: f64,
    pub risk_level: RiskLevelWire,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub category_breakdown: std::collections::BTreeMap<String, f64>,
    pub requires_immediate_action: bool,
    pub interpretation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevelWire {
    #[default]
    Low,
    Medium,
    High,
    Critical,
    Unknown,
}

impl From<RiskLevel> for RiskLevelWire {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => RiskLevelWire::Low,
            RiskLevel::Medium => RiskLevelWire::Medium,
            RiskLevel::High => RiskLevelWire::High,
            RiskLevel::Critical => RiskLevelWire::Critical,
            RiskLevel::Unknown => RiskLevelWire::Unknown,
        }
    }
}

/// An immutable record of a single LLM call, folded into the audit record
/// and optionally streamed (truncated) to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeminiInteraction {
    pub timestamp: DateTime<Utc>,
    pub purpose: String,
    pub prompt_full: String,
    pub prompt_hash: String,
    pub response_full: String,
    pub response_hash: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The result of `run_full_audit`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditOutcome {
    pub findings: Vec<Finding>,
    pub ajes: Vec<Aje>,
    pub risk_score: RiskScore,
    pub accounting_standard: AccountingStandard,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trial_balance_balanced_within_epsilon() {
        let tb = TrialBalance {
            period_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            rows: vec![],
            total_debits: 100.005,
            total_credits: 100.0,
        };
        assert!(tb.is_balanced());
    }

    #[test]
    fn trial_balance_unbalanced_outside_epsilon() {
        let tb = TrialBalance {
            period_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            rows: vec![],
            total_debits: 6200.0,
            total_credits: 6000.0,
        };
        assert!(!tb.is_balanced());
    }

    #[test]
    fn severity_weights_match_scorer_table() {
        assert_eq!(Severity::Critical.weight(), 10.0);
        assert_eq!(Severity::High.weight(), 5.0);
        assert_eq!(Severity::Medium.weight(), 2.0);
        assert_eq!(Severity::Low.weight(), 1.0);
    }
}
