//! Phase 6: adjusting journal entry generation. Each correctable finding is
//! handed to the LLM for a tailored entry; if the AI path produces nothing
//! usable across the whole finding set, a deterministic rule table takes
//! over so every correctable finding still gets an AJE.

use chrono::NaiveDate;
use regex::Regex;
use tracing::{info, warn};

use crate::audit_record::AuditRecord;
use crate::error::AnalyzerError;
use crate::llm::LlmClient;
use crate::models::{AccountingStandard, Aje, AjeLine, Finding, FindingCategory};

/// Findings in these categories are ones a correcting entry can plausibly
/// fix; structural imbalances, fraud flags, misclassifications, and timing
/// issues all have a natural debit/credit correction. Balance-check and
/// documentation findings don't.
fn is_correctable(category: FindingCategory) -> bool {
    matches!(
        category,
        FindingCategory::Classification | FindingCategory::Timing | FindingCategory::Structural | FindingCategory::Fraud
    )
}

/// Generates AJEs for every correctable finding, streaming each one to
/// `on_aje` as soon as it's produced. Tries the LLM first; if that path
/// yields zero AJEs across the entire correctable set, falls back to the
/// deterministic rule table for all of them.
pub async fn generate_ajes(
    findings: &[Finding],
    accounting_standard: AccountingStandard,
    period_end: NaiveDate,
    llm: &dyn LlmClient,
    record: &mut AuditRecord,
    mut on_aje: impl FnMut(&Aje),
) -> Result<Vec<Aje>, AnalyzerError> {
    let correctable: Vec<&Finding> = findings.iter().filter(|f| is_correctable(f.category)).collect();
    if correctable.is_empty() {
        return Ok(Vec::new());
    }

    let mut ajes = Vec::new();
    let mut quota_exceeded = false;

    for finding in &correctable {
        if quota_exceeded {
            record.add_reasoning_step("Skipping remaining AJE generation - LLM quota exceeded");
            break;
        }

        match generate_aje_via_llm(finding, accounting_standard, period_end, llm, record).await {
            Ok(Some(aje)) => {
                on_aje(&aje);
                ajes.push(aje);
            }
            Ok(None) => {}
            Err(QuotaExceeded) => {
                quota_exceeded = true;
                record.add_reasoning_step("Skipping remaining AJE generation - LLM quota exceeded");
            }
        }
    }

    if ajes.is_empty() {
        record.add_reasoning_step(format!("Using deterministic {accounting_standard:?} AJE rules (AI unavailable)"));
        for finding in &correctable {
            if let Some(aje) = apply_deterministic_rule(finding, accounting_standard, period_end) {
                on_aje(&aje);
                ajes.push(aje);
            }
        }
    }

    Ok(ajes)
}

struct QuotaExceeded;

async fn generate_aje_via_llm(
    finding: &Finding,
    accounting_standard: AccountingStandard,
    period_end: NaiveDate,
    llm: &dyn LlmClient,
    record: &mut AuditRecord,
) -> Result<Option<Aje>, QuotaExceeded> {
    let prompt = format!(
        "You are an accounting assistant. Given this audit finding, propose a single adjusting \
         journal entry that corrects it under {accounting_standard:?}.\n\n\
         Issue: {}\nDetails: {}\nCategory: {:?}\nSeverity: {:?}\n\n\
         Respond with JSON: {{\"account_code_debit\": str, \"account_code_credit\": str, \
         \"amount\": number, \"description\": str, \"rationale\": str, \"standard_reference\": str}}",
        finding.issue, finding.details, finding.category, finding.severity
    );

    let (value, interaction) = match llm.generate_json(&prompt, "aje_generation").await {
        Ok(result) => result,
        Err(err) => {
            if err.is_retryable() {
                warn!(finding = %finding.finding_id, error = %err, "LLM unavailable for AJE generation");
                return Err(QuotaExceeded);
            }
            warn!(finding = %finding.finding_id, error = %err, "LLM call failed for AJE generation");
            return Ok(None);
        }
    };

    record.add_gemini_interaction(interaction);

    let debit_code = value.get("account_code_debit").and_then(|v| v.as_str());
    let credit_code = value.get("account_code_credit").and_then(|v| v.as_str());
    let amount = value.get("amount").and_then(|v| v.as_f64());

    let (debit_code, credit_code, amount) = match (debit_code, credit_code, amount) {
        (Some(d), Some(c), Some(a)) => (d, c, a),
        _ => return Ok(None),
    };

    let description = value
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("Adjusting journal entry")
        .to_string();
    let rationale = value
        .get("rationale")
        .and_then(|v| v.as_str())
        .unwrap_or("Generated by AI review")
        .to_string();
    let standard_reference = value
        .get("standard_reference")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let entries = vec![
        AjeLine { account_code: debit_code.to_string(), debit: amount, credit: 0.0 },
        AjeLine { account_code: credit_code.to_string(), debit: 0.0, credit: amount },
    ];
    let is_balanced = (entries[0].debit - entries[1].credit).abs() < crate::models::EPSILON;
    if !is_balanced {
        return Ok(None);
    }

    info!(finding = %finding.finding_id, "generated AI-assisted AJE");

    Ok(Some(Aje {
        aje_id: crate::analyzers::finding_id("AJE"),
        date: period_end,
        entries,
        description,
        finding_reference: finding.finding_id.clone(),
        rationale,
        rule_applied: format!("AI_GENERATED_{accounting_standard:?}"),
        standard_reference,
        accounting_standard,
        is_balanced,
    }))
}

/// Extracts a dollar amount from free text, defaulting to $1,000 when none
/// is present — matching the fallback table's tolerance for loosely
/// worded finding details.
fn extract_amount(details: &str) -> f64 {
    let re = Regex::new(r"\$?([\d,]+(?:\.\d{2})?)").expect("valid regex");
    re.captures(details)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .unwrap_or(1_000.00)
}

struct RuleOutcome {
    debit_code: &'static str,
    debit_name: &'static str,
    credit_code: &'static str,
    credit_name: &'static str,
    rule_name: &'static str,
    gaap_standard: &'static str,
    ifrs_standard: &'static str,
}

impl RuleOutcome {
    fn standard_reference(&self, accounting_standard: AccountingStandard) -> &'static str {
        match accounting_standard {
            AccountingStandard::Gaap => self.gaap_standard,
            AccountingStandard::Ifrs => self.ifrs_standard,
        }
    }
}

/// The deterministic fallback table: issue/category keyword matching to a
/// fixed debit/credit account pair, tried in order until one matches.
fn apply_deterministic_rule(
    finding: &Finding,
    accounting_standard: AccountingStandard,
    period_end: NaiveDate,
) -> Option<Aje> {
    let issue = finding.issue.to_lowercase();
    let category = format!("{:?}", finding.category).to_lowercase();

    let outcome = if issue.contains("misclass") || category.contains("classification") {
        Some(RuleOutcome {
            debit_code: "6200",
            debit_name: "Marketing Expense",
            credit_code: "6900",
            credit_name: "Miscellaneous Expense",
            rule_name: "RULE_EXPENSE_RECLASSIFICATION",
            gaap_standard: "ASC 220 - Income Statement",
            ifrs_standard: "IAS 1 - Presentation of Financial Statements",
        })
    } else if issue.contains("revenue") && (issue.contains("timing") || issue.contains("recognition")) {
        Some(RuleOutcome {
            debit_code: "4000",
            debit_name: "Service Revenue",
            credit_code: "2200",
            credit_name: "Deferred Revenue",
            rule_name: "RULE_REVENUE_DEFERRAL",
            gaap_standard: "ASC 606 - Revenue Recognition",
            ifrs_standard: "IFRS 15 - Revenue from Contracts with Customers",
        })
    } else if issue.contains("accrual") || issue.contains("accrue") {
        Some(RuleOutcome {
            debit_code: "6000",
            debit_name: "Operating Expense",
            credit_code: "2100",
            credit_name: "Accrued Expenses",
            rule_name: "RULE_EXPENSE_ACCRUAL",
            gaap_standard: "ASC 450 - Contingencies",
            ifrs_standard: "IAS 1.27-28 - Accrual Basis",
        })
    } else if issue.contains("prepaid") || issue.contains("amortiz") {
        Some(RuleOutcome {
            debit_code: "6000",
            debit_name: "Operating Expense",
            credit_code: "1200",
            credit_name: "Prepaid Expenses",
            rule_name: "RULE_PREPAID_AMORTIZATION",
            gaap_standard: "ASC 340 - Other Assets and Deferred Costs",
            ifrs_standard: "IAS 1 - Presentation of Financial Statements",
        })
    } else if issue.contains("deprec") {
        Some(RuleOutcome {
            debit_code: "6700",
            debit_name: "Depreciation Expense",
            credit_code: "1600",
            credit_name: "Accumulated Depreciation",
            rule_name: "RULE_DEPRECIATION",
            gaap_standard: "ASC 360 - Property, Plant, and Equipment",
            ifrs_standard: "IAS 16 - Property, Plant and Equipment",
        })
    } else if issue.contains("lease") {
        Some(RuleOutcome {
            debit_code: "1700",
            debit_name: "Right-of-Use Asset",
            credit_code: "2300",
            credit_name: "Lease Liability",
            rule_name: "RULE_LEASE_RECOGNITION",
            gaap_standard: "ASC 842 - Leases",
            ifrs_standard: "IFRS 16 - Leases",
        })
    } else if issue.contains("impair") {
        Some(RuleOutcome {
            debit_code: "6800",
            debit_name: "Impairment Loss",
            credit_code: "1600",
            credit_name: "Accumulated Impairment",
            rule_name: "RULE_IMPAIRMENT",
            gaap_standard: "ASC 360-10 - Impairment",
            ifrs_standard: "IAS 36 - Impairment of Assets",
        })
    } else if category == "fraud" && (issue.contains("duplicate") || issue.contains("structuring") || issue.contains("suspicious")) {
        Some(RuleOutcome {
            debit_code: "6850",
            debit_name: "Fraud Loss Expense",
            credit_code: "2150",
            credit_name: "Provision for Fraud Losses",
            rule_name: "RULE_FRAUD_PROVISION",
            gaap_standard: "ASC 450 - Contingencies",
            ifrs_standard: "IAS 37 - Provisions, Contingent Liabilities",
        })
    } else if category == "fraud" && (issue.contains("round-trip") || issue.contains("vendor") || issue.contains("round number")) {
        Some(RuleOutcome {
            debit_code: "4000",
            debit_name: "Revenue",
            credit_code: "2200",
            credit_name: "Deferred Revenue / Suspense",
            rule_name: "RULE_FRAUD_REVENUE_RECLASSIFICATION",
            gaap_standard: "ASC 606 - Revenue Recognition",
            ifrs_standard: "IFRS 15 - Revenue from Contracts with Customers",
        })
    } else if category == "fraud" {
        Some(RuleOutcome {
            debit_code: "1950",
            debit_name: "Suspense - Under Investigation",
            credit_code: "6900",
            credit_name: "Miscellaneous Expense",
            rule_name: "RULE_FRAUD_SUSPENSE",
            gaap_standard: "AU-C 240 - Consideration of Fraud",
            ifrs_standard: "ISA 240 - Auditor's Responsibilities Relating to Fraud",
        })
    } else if matches!(category.as_str(), "classification" | "structural" | "timing") {
        Some(RuleOutcome {
            debit_code: "6000",
            debit_name: "Operating Expense",
            credit_code: "6900",
            credit_name: "Miscellaneous Expense",
            rule_name: "RULE_GENERIC_CORRECTION",
            gaap_standard: "ASC 250 - Accounting Changes and Error Corrections",
            ifrs_standard: "IAS 8 - Accounting Policies, Changes in Accounting Estimates and Errors",
        })
    } else {
        None
    };

    let outcome = outcome?;
    let amount = extract_amount(&finding.details);
    let standard_reference = outcome.standard_reference(accounting_standard).to_string();

    Some(Aje {
        aje_id: crate::analyzers::finding_id("AJE"),
        date: period_end,
        entries: vec![
            AjeLine { account_code: outcome.debit_code.to_string(), debit: amount, credit: 0.0 },
            AjeLine { account_code: outcome.credit_code.to_string(), debit: 0.0, credit: amount },
        ],
        description: format!("Correcting entry: {} -> {}", outcome.debit_name, outcome.credit_name),
        finding_reference: finding.finding_id.clone(),
        rationale: format!("Deterministic rule matched on finding issue/category: {}", finding.issue),
        rule_applied: format!("{}_{:?}", outcome.rule_name, accounting_standard),
        standard_reference,
        accounting_standard,
        is_balanced: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn finding(issue: &str, category: FindingCategory, details: &str) -> Finding {
        Finding {
            finding_id: "F1".into(),
            category,
            severity: Severity::Medium,
            issue: issue.into(),
            details: details.into(),
            recommendation: "x".into(),
            confidence: 0.5,
            gaap_principle: None,
            ifrs_standard: None,
            detection_method: "x".into(),
            affected_transactions: None,
            transaction_details: None,
            rule_code: None,
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Gaap,
        }
    }

    #[test]
    fn extracts_dollar_amount_from_details() {
        assert_eq!(extract_amount("Transaction of $5,500.00 to vendor"), 5500.0);
    }

    #[test]
    fn defaults_to_1000_when_no_amount_present() {
        assert_eq!(extract_amount("no amount mentioned here"), 1000.0);
    }

    #[test]
    fn misclassification_maps_to_expense_reclassification_rule() {
        let f = finding("Potential Expense Misclassification", FindingCategory::Classification, "$300.00");
        let aje = apply_deterministic_rule(&f, AccountingStandard::Gaap, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()).unwrap();
        assert!(aje.rule_applied.starts_with("RULE_EXPENSE_RECLASSIFICATION"));
        assert_eq!(aje.entries[0].account_code, "6200");
        assert_eq!(aje.entries[1].account_code, "6900");
        assert!(aje.is_balanced);
    }

    #[test]
    fn fraud_suspense_is_the_generic_fraud_catchall() {
        let f = finding("Unusual activity detected", FindingCategory::Fraud, "$2,000.00");
        let aje = apply_deterministic_rule(&f, AccountingStandard::Gaap, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()).unwrap();
        assert!(aje.rule_applied.starts_with("RULE_FRAUD_SUSPENSE"));
    }

    #[test]
    fn lease_recognition_maps_to_rou_asset() {
        let f = finding("Lease liability not recognized", FindingCategory::Classification, "$8,000.00");
        let aje = apply_deterministic_rule(&f, AccountingStandard::Ifrs, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()).unwrap();
        assert_eq!(aje.entries[0].account_code, "1700");
        assert_eq!(aje.entries[1].account_code, "2300");
    }

    #[test]
    fn non_correctable_category_is_excluded_upstream() {
        assert!(!is_correctable(FindingCategory::Balance));
        assert!(!is_correctable(FindingCategory::Documentation));
    }
}
