//! GAAP compliance rule set: approval controls, expense classification,
//! documentation, revenue recognition timing, matching principle, accrual
//! consistency, and cash-basis compliance.

use std::collections::{HashMap, HashSet};

use chrono::Datelike;

use super::{finding_id, Analyzer};
use crate::error::AnalyzerError;
use crate::models::{
    AccountingBasis, AccountingStandard, ChartOfAccounts, Finding, FindingCategory, GeneralLedger,
    JournalEntry, Severity, TrialBalance,
};

const APPROVAL_THRESHOLD: f64 = 5_000.0;
const CASH_BASIS_FORBIDDEN_ACCOUNTS: &[&str] = &["1100", "2000"];
const TRAVEL_KEYWORDS: &[&str] = &["flight", "hotel", "airline", "uber", "lyft", "rental car", "airbnb"];

pub struct GaapAnalyzer;

impl Analyzer for GaapAnalyzer {
    fn analyze(
        &self,
        gl: &GeneralLedger,
        tb: &TrialBalance,
        _coa: &ChartOfAccounts,
        basis: AccountingBasis,
    ) -> Result<Vec<Finding>, AnalyzerError> {
        // This runs inside a `spawn_blocking` offload already, so the
        // individual rule checks execute as plain function calls rather
        // than as separately-scheduled futures; the orchestrator's
        // `join_all` fan-out happens one level up, across this analyzer,
        // Anomaly, and Fraud.
        let mut findings = Vec::new();
        findings.extend(check_approval_controls(gl));
        findings.extend(check_expense_classification(gl));
        findings.extend(check_documentation(gl));

        match basis {
            AccountingBasis::Accrual => {
                findings.extend(check_revenue_recognition(gl));
                findings.extend(check_matching_principle(gl, tb));
                findings.extend(check_accruals(gl));
            }
            AccountingBasis::Cash => {
                findings.extend(check_cash_basis_compliance(gl));
            }
        }

        Ok(findings)
    }
}

fn transaction_details(entry: &JournalEntry) -> serde_json::Value {
    serde_json::json!({
        "entry_id": entry.entry_id,
        "date": entry.date,
        "account_code": entry.account_code,
        "account_name": entry.account_name,
        "description": entry.description,
        "debit": entry.debit,
        "credit": entry.credit,
        "vendor": entry.vendor_or_customer,
    })
}

fn check_approval_controls(gl: &GeneralLedger) -> Vec<Finding> {
    gl.entries
        .iter()
        .filter(|e| e.debit > APPROVAL_THRESHOLD)
        .map(|entry| Finding {
            finding_id: finding_id("APR"),
            category: FindingCategory::Documentation,
            severity: Severity::High,
            issue: "High-Value Transaction Requires Review".to_string(),
            details: format!(
                "Transaction of ${:.2} to {} exceeds review threshold",
                entry.debit,
                entry.vendor_or_customer.as_deref().unwrap_or("Unknown")
            ),
            recommendation: "Verify proper approval documentation exists".to_string(),
            confidence: 0.85,
            gaap_principle: Some("Internal Controls (COSO Framework)".to_string()),
            ifrs_standard: None,
            detection_method: "Rule-based validation: approval threshold check".to_string(),
            affected_transactions: Some(vec![entry.entry_id.clone()]),
            transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
            rule_code: Some(
                "RULE_001_APPROVAL_THRESHOLD: flag entry.debit > $5,000 (COSO Internal Control Framework)".to_string(),
            ),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Gaap,
        })
        .collect()
}

fn check_expense_classification(gl: &GeneralLedger) -> Vec<Finding> {
    gl.entries
        .iter()
        .filter(|e| {
            let desc = e.description.to_lowercase();
            TRAVEL_KEYWORDS.iter().any(|kw| desc.contains(kw)) && !e.account_code.starts_with("66")
        })
        .map(|entry| Finding {
            finding_id: finding_id("CLS"),
            category: FindingCategory::Classification,
            severity: Severity::Medium,
            issue: "Potential Expense Misclassification".to_string(),
            details: format!(
                "Transaction appears to be travel-related but coded to {}",
                entry.account_name
            ),
            recommendation: "Verify classification; may need to reclassify to Travel Expense".to_string(),
            confidence: 0.75,
            gaap_principle: Some("Proper Expense Classification".to_string()),
            ifrs_standard: None,
            detection_method: "Text analysis: travel keyword vs. account-code mismatch".to_string(),
            affected_transactions: Some(vec![entry.entry_id.clone()]),
            transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
            rule_code: Some(
                "RULE_002_EXPENSE_CLASSIFICATION: travel keyword present but account_code does not start with '66'"
                    .to_string(),
            ),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Gaap,
        })
        .collect()
}

/// Transactions that carry an IRS-relevant amount on a travel/meals
/// account with no meaningful description are documentation gaps — the
/// receipt itself is outside this system's data model, but a blank or
/// placeholder description is a concrete, checkable proxy.
fn check_documentation(gl: &GeneralLedger) -> Vec<Finding> {
    const RECEIPT_REQUIRED_THRESHOLD: f64 = 75.0;

    gl.entries
        .iter()
        .filter(|e| {
            e.debit > RECEIPT_REQUIRED_THRESHOLD
                && e.account_code.starts_with("66")
                && is_placeholder_description(&e.description)
        })
        .map(|entry| Finding {
            finding_id: finding_id("DOC"),
            category: FindingCategory::Documentation,
            severity: Severity::Low,
            issue: "Missing Transaction Description".to_string(),
            details: format!(
                "Travel/meals entry of ${:.2} has no meaningful description; IRS substantiation requires a receipt and business purpose for amounts over ${RECEIPT_REQUIRED_THRESHOLD:.0}",
                entry.debit
            ),
            recommendation: "Attach a receipt and document the business purpose".to_string(),
            confidence: 0.60,
            gaap_principle: Some("Documentation Standards".to_string()),
            ifrs_standard: None,
            detection_method: "Text analysis: blank or placeholder description on a travel/meals entry above the receipt threshold".to_string(),
            affected_transactions: Some(vec![entry.entry_id.clone()]),
            transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
            rule_code: Some("RULE_006_DOCUMENTATION: entry.debit > 75 on account_code.startswith('66') with empty description".to_string()),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Gaap,
        })
        .collect()
}

fn is_placeholder_description(description: &str) -> bool {
    let trimmed = description.trim().to_lowercase();
    trimmed.is_empty() || trimmed == "n/a" || trimmed == "misc" || trimmed == "expense"
}

fn check_revenue_recognition(gl: &GeneralLedger) -> Vec<Finding> {
    let period_end = gl.period_end;
    gl.entries
        .iter()
        .filter(|e| e.account_code.starts_with('4') && e.credit > 10_000.0 && e.date == period_end)
        .map(|entry| Finding {
            finding_id: finding_id("REV"),
            category: FindingCategory::Timing,
            severity: Severity::Medium,
            issue: "Large Period-End Revenue Entry".to_string(),
            details: format!(
                "Revenue of ${:.2} recorded on period end date. Verify timing is appropriate.",
                entry.credit
            ),
            recommendation: "Confirm delivery occurred and revenue recognition criteria are met per ASC 606".to_string(),
            confidence: 0.70,
            gaap_principle: Some("ASC 606 Revenue Recognition".to_string()),
            ifrs_standard: None,
            detection_method: "Rule-based validation: large revenue credit on the period-end date".to_string(),
            affected_transactions: Some(vec![entry.entry_id.clone()]),
            transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
            rule_code: Some("RULE_003_REVENUE_TIMING: account_code.startswith('4') and credit > 10000 and date == period_end".to_string()),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Gaap,
        })
        .collect()
}

fn check_matching_principle(gl: &GeneralLedger, tb: &TrialBalance) -> Vec<Finding> {
    tb.rows
        .iter()
        .filter(|row| row.account_name.to_lowercase().contains("prepaid") && row.ending_balance > 0.0)
        .filter(|row| {
            !gl.entries
                .iter()
                .any(|e| e.account_code == row.account_code && e.credit > 0.0)
        })
        .map(|row| Finding {
            finding_id: finding_id("MAT"),
            category: FindingCategory::Timing,
            severity: Severity::Medium,
            issue: "Prepaid Expense Not Amortized".to_string(),
            details: format!(
                "{} has a balance of ${:.2} with no amortization entries",
                row.account_name, row.ending_balance
            ),
            recommendation: "Record appropriate amortization to recognize expense in the proper period".to_string(),
            confidence: 0.80,
            gaap_principle: Some("Matching Principle".to_string()),
            ifrs_standard: None,
            detection_method: "Rule-based validation: prepaid account with a balance and zero credit entries".to_string(),
            affected_transactions: None,
            transaction_details: Some(serde_json::json!({
                "account_code": row.account_code,
                "account_name": row.account_name,
                "beginning_balance": row.beginning_balance,
                "ending_balance": row.ending_balance,
            })),
            rule_code: Some("RULE_004_PREPAID_AMORTIZATION: prepaid account ending_balance > 0 with no credit entries".to_string()),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Gaap,
        })
        .collect()
}

/// Flags expense accounts that post in most months of the period but have
/// no entry in the period-end month — a plausible sign of a missing
/// month-end accrual.
fn check_accruals(gl: &GeneralLedger) -> Vec<Finding> {
    let period_end_month = (gl.period_end.year(), gl.period_end.month());

    let mut months_by_account: HashMap<&str, HashSet<(i32, u32)>> = HashMap::new();
    for entry in &gl.entries {
        if entry.account_code.starts_with('6') && entry.debit > 0.0 {
            months_by_account
                .entry(entry.account_code.as_str())
                .or_default()
                .insert((entry.date.year(), entry.date.month()));
        }
    }

    months_by_account
        .into_iter()
        .filter(|(_, months)| months.len() >= 2 && !months.contains(&period_end_month))
        .map(|(account_code, months)| Finding {
            finding_id: finding_id("ACR"),
            category: FindingCategory::Timing,
            severity: Severity::Low,
            issue: "Possible Missing Month-End Accrual".to_string(),
            details: format!(
                "Account {account_code} posted expenses in {} other month(s) of the period but has no entry in the period-end month",
                months.len()
            ),
            recommendation: "Confirm whether a recurring expense accrual was omitted for the period-end month".to_string(),
            confidence: 0.50,
            gaap_principle: Some("Accrual Consistency".to_string()),
            ifrs_standard: None,
            detection_method: "Rule-based validation: recurring expense account missing an entry in the period-end month".to_string(),
            affected_transactions: None,
            transaction_details: None,
            rule_code: Some("RULE_007_ACCRUAL_CONSISTENCY: expense account active in >=2 months but absent in the period-end month".to_string()),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Gaap,
        })
        .collect()
}

fn check_cash_basis_compliance(gl: &GeneralLedger) -> Vec<Finding> {
    gl.entries
        .iter()
        .filter(|e| CASH_BASIS_FORBIDDEN_ACCOUNTS.contains(&e.account_code.as_str()))
        .map(|entry| Finding {
            finding_id: finding_id("CSH"),
            category: FindingCategory::Structural,
            severity: Severity::High,
            issue: "Accrual Entry Under Cash Basis".to_string(),
            details: format!("Entry to {} recorded under cash basis accounting", entry.account_name),
            recommendation: "Remove accrual entries or switch to accrual basis".to_string(),
            confidence: 0.90,
            gaap_principle: Some("Cash Basis Accounting".to_string()),
            ifrs_standard: None,
            detection_method: "Rule-based validation: AR/AP posting under cash basis".to_string(),
            affected_transactions: Some(vec![entry.entry_id.clone()]),
            transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
            rule_code: Some("RULE_005_CASH_BASIS_COMPLIANCE: account_code in {1100, 2000} while basis == cash".to_string()),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Gaap,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(id: &str, date: NaiveDate, account: &str, debit: f64, credit: f64, desc: &str) -> JournalEntry {
        JournalEntry {
            entry_id: id.into(),
            date,
            account_code: account.into(),
            account_name: "Acct".into(),
            debit,
            credit,
            description: desc.into(),
            vendor_or_customer: None,
        }
    }

    #[test]
    fn approval_threshold_flags_over_5000() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 1, 31),
            entries: vec![entry("E1", date(2024, 1, 5), "6000", 5_500.0, 0.0, "consulting fee")],
        };
        let findings = check_approval_controls(&gl);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn cash_basis_flags_ar_ap_accounts() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 1, 31),
            entries: vec![
                entry("E1", date(2024, 1, 5), "1100", 100.0, 0.0, "AR"),
                entry("E2", date(2024, 1, 6), "6000", 100.0, 0.0, "expense"),
            ],
        };
        let findings = check_cash_basis_compliance(&gl);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].issue, "Accrual Entry Under Cash Basis");
    }

    #[test]
    fn expense_classification_flags_travel_keyword_outside_travel_account() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 1, 31),
            entries: vec![entry("E1", date(2024, 1, 5), "6000", 300.0, 0.0, "Uber ride to airport")],
        };
        assert_eq!(check_expense_classification(&gl).len(), 1);
    }
}
