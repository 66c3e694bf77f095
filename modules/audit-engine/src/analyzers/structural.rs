//! Phase 1 structural validation: the only sequential analyzer. Runs
//! before anything else because later phases assume a structurally sound
//! dataset.

use std::collections::{HashMap, HashSet};

use super::{finding_id, Analyzer};
use crate::error::AnalyzerError;
use crate::models::{
    AccountingBasis, AccountingStandard, ChartOfAccounts, Finding, FindingCategory, GeneralLedger,
    Severity, TrialBalance, EPSILON,
};

const CASH_ACCOUNT_CODE: &str = "1000";

pub struct StructuralAnalyzer;

impl Analyzer for StructuralAnalyzer {
    fn analyze(
        &self,
        gl: &GeneralLedger,
        tb: &TrialBalance,
        coa: &ChartOfAccounts,
        _basis: AccountingBasis,
    ) -> Result<Vec<Finding>, AnalyzerError> {
        let mut findings = Vec::new();

        if !tb.is_balanced() {
            tracing::warn!(
                debits = tb.total_debits,
                credits = tb.total_credits,
                "trial balance out of balance"
            );
            findings.push(balance_finding(
                "Trial Balance Out of Balance",
                format!(
                    "Trial Balance debits ({:.2}) do not equal credits ({:.2})",
                    tb.total_debits, tb.total_credits
                ),
            ));
        }

        for row in &tb.rows {
            if row.account_code == CASH_ACCOUNT_CODE && row.ending_balance < 0.0 {
                tracing::warn!(balance = row.ending_balance, "negative cash balance");
                findings.push(balance_finding(
                    "Negative Cash Balance",
                    format!(
                        "Cash account shows negative balance of ${:.2}",
                        row.ending_balance.abs()
                    ),
                ));
            }
        }

        findings.extend(validate_double_entry(gl)?);
        findings.extend(validate_account_codes(gl, coa));

        Ok(findings)
    }
}

fn balance_finding(issue: &str, details: String) -> Finding {
    Finding {
        finding_id: finding_id("STR"),
        category: FindingCategory::Balance,
        severity: Severity::Critical,
        issue: issue.to_string(),
        details,
        recommendation: "Investigate and correct the imbalance before proceeding".to_string(),
        confidence: 1.0,
        gaap_principle: Some("Double-Entry Accounting".to_string()),
        ifrs_standard: None,
        detection_method: "Rule-based validation: double-entry accounting balance check".to_string(),
        affected_transactions: None,
        transaction_details: None,
        rule_code: None,
        ai_explanation: None,
        accounting_standard_used: AccountingStandard::Gaap,
    }
}

/// Each `entry_id` group's debits and credits must balance within
/// `EPSILON`, and no row may carry both a debit and a credit.
fn validate_double_entry(gl: &GeneralLedger) -> Result<Vec<Finding>, AnalyzerError> {
    let mut totals: HashMap<&str, (f64, f64)> = HashMap::new();
    for entry in &gl.entries {
        let slot = totals.entry(entry.entry_id.as_str()).or_insert((0.0, 0.0));
        slot.0 += entry.debit;
        slot.1 += entry.credit;
    }

    let mut findings = Vec::new();
    for (entry_id, (debit, credit)) in totals {
        if (debit - credit).abs() > EPSILON {
            findings.push(Finding {
                finding_id: finding_id("STR"),
                category: FindingCategory::Structural,
                severity: Severity::Critical,
                issue: "Unbalanced Journal Entry Group".to_string(),
                details: format!(
                    "Entry group '{entry_id}' has debits ({debit:.2}) that do not equal credits ({credit:.2})"
                ),
                recommendation: "Correct the journal entry so debits equal credits".to_string(),
                confidence: 1.0,
                gaap_principle: Some("Double-Entry Accounting".to_string()),
                ifrs_standard: None,
                detection_method: "Rule-based validation: per-entry double-entry balance check".to_string(),
                affected_transactions: Some(vec![entry_id.to_string()]),
                transaction_details: None,
                rule_code: None,
                ai_explanation: None,
                accounting_standard_used: AccountingStandard::Gaap,
            });
        }
    }
    Ok(findings)
}

fn validate_account_codes(gl: &GeneralLedger, coa: &ChartOfAccounts) -> Vec<Finding> {
    let mut seen = HashSet::new();
    let mut findings = Vec::new();
    for entry in &gl.entries {
        if !coa.contains(&entry.account_code) && seen.insert(entry.account_code.clone()) {
            findings.push(Finding {
                finding_id: finding_id("STR"),
                category: FindingCategory::Structural,
                severity: Severity::Critical,
                issue: "Unknown Account Code".to_string(),
                details: format!(
                    "Account code '{}' referenced in the general ledger is not present in the chart of accounts",
                    entry.account_code
                ),
                recommendation: "Add the account to the chart of accounts or correct the posting".to_string(),
                confidence: 1.0,
                gaap_principle: Some("Chart of Accounts Integrity".to_string()),
                ifrs_standard: None,
                detection_method: "Rule-based validation: account code existence check".to_string(),
                affected_transactions: Some(vec![entry.entry_id.clone()]),
                transaction_details: None,
                rule_code: None,
                ai_explanation: None,
                accounting_standard_used: AccountingStandard::Gaap,
            });
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::models::{Account, AccountType, NormalBalance, TrialBalanceRow};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_coa() -> ChartOfAccounts {
        ChartOfAccounts {
            accounts: vec![
                Account {
                    code: "1000".into(),
                    name: "Cash".into(),
                    account_type: AccountType::Asset,
                    subtype: None,
                    normal_balance: NormalBalance::Debit,
                },
                Account {
                    code: "4000".into(),
                    name: "Revenue".into(),
                    account_type: AccountType::Revenue,
                    subtype: None,
                    normal_balance: NormalBalance::Credit,
                },
            ],
        }
    }

    #[test]
    fn balanced_trial_balance_emits_no_finding() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 1, 31),
            entries: vec![],
        };
        let tb = TrialBalance {
            period_end: date(2024, 1, 31),
            rows: vec![TrialBalanceRow {
                account_code: "1000".into(),
                account_name: "Cash".into(),
                debit: 100.0,
                credit: 0.0,
                beginning_balance: 0.0,
                ending_balance: 100.0,
            }],
            total_debits: 100.0,
            total_credits: 100.0,
        };
        let findings = StructuralAnalyzer
            .analyze(&gl, &tb, &sample_coa(), AccountingBasis::Accrual)
            .unwrap();
        assert!(findings.iter().all(|f| f.issue != "Trial Balance Out of Balance"));
    }

    #[test]
    fn unbalanced_trial_balance_emits_critical_finding() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 1, 31),
            entries: vec![],
        };
        let tb = TrialBalance {
            period_end: date(2024, 1, 31),
            rows: vec![],
            total_debits: 6200.0,
            total_credits: 6000.0,
        };
        let findings = StructuralAnalyzer
            .analyze(&gl, &tb, &sample_coa(), AccountingBasis::Accrual)
            .unwrap();
        let f = findings
            .iter()
            .find(|f| f.issue == "Trial Balance Out of Balance")
            .expect("expected a balance finding");
        assert_eq!(f.severity, Severity::Critical);
        assert_eq!(f.category, FindingCategory::Balance);
    }

    #[test]
    fn unknown_account_code_flagged() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 1, 31),
            entries: vec![crate::models::JournalEntry {
                entry_id: "E1".into(),
                date: date(2024, 1, 5),
                account_code: "9999".into(),
                account_name: "Unknown".into(),
                debit: 50.0,
                credit: 0.0,
                description: "test".into(),
                vendor_or_customer: None,
            }],
        };
        let tb = TrialBalance {
            period_end: date(2024, 1, 31),
            rows: vec![],
            total_debits: 50.0,
            total_credits: 50.0,
        };
        let findings = StructuralAnalyzer
            .analyze(&gl, &tb, &sample_coa(), AccountingBasis::Accrual)
            .unwrap();
        assert!(findings.iter().any(|f| f.issue == "Unknown Account Code"));
    }
}
