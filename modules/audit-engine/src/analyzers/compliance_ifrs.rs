//! IFRS compliance rule set. Covers the IFRS/GAAP divergence points (LIFO
//! prohibition, PPE revaluation, impairment reversal, development cost
//! capitalization) plus the broader standards IFRS imposes that GAAP
//! doesn't call out explicitly (provisions, leases, deferred tax, related
//! parties, foreign currency, subsequent events, policy changes, revenue
//! recognition, and accrual-basis presentation), and the controls/expense/
//! cash-basis checks shared with the GAAP rule set.

use super::{finding_id, Analyzer};
use crate::error::AnalyzerError;
use crate::models::{
    AccountingBasis, AccountingStandard, ChartOfAccounts, Finding, FindingCategory, GeneralLedger,
    JournalEntry, Severity, TrialBalance,
};

const APPROVAL_THRESHOLD: f64 = 5_000.0;
const CASH_BASIS_FORBIDDEN_ACCOUNTS: &[&str] = &["1100", "2000"];
const TRAVEL_KEYWORDS: &[&str] = &["flight", "hotel", "airline", "uber", "lyft", "rental car", "airbnb"];
const LIFO_KEYWORDS: &[&str] = &["lifo", "last-in", "last in first out"];
const WRITEDOWN_KEYWORDS: &[&str] = &["write-down", "writedown", "nrv", "impairment", "obsolete"];
const REVERSAL_KEYWORDS: &[&str] = &["reversal", "write-up", "recovery"];
const REVALUATION_KEYWORDS: &[&str] = &["revaluation", "revalue", "fair value adjustment", "appraisal"];
const IMPAIRMENT_KEYWORDS: &[&str] = &["impairment", "impaired", "write-down", "recoverable amount"];
const IMPAIRMENT_REVERSAL_KEYWORDS: &[&str] = &["reversal", "recovery", "write-up", "restore"];
const GOODWILL_KEYWORDS: &[&str] = &["goodwill", "acquisition", "business combination"];
const RESEARCH_KEYWORDS: &[&str] = &["research", "r&d", "basic research", "exploratory"];
const DEVELOPMENT_KEYWORDS: &[&str] = &["development", "capitalize", "intangible", "software development"];
const PROVISION_KEYWORDS: &[&str] = &["provision", "contingent", "warranty", "legal", "restructuring", "onerous"];
const LEASE_KEYWORDS: &[&str] = &["lease", "rent", "rental", "operating lease", "right-of-use", "rou"];
const RELATED_PARTY_KEYWORDS: &[&str] = &[
    "related party", "affiliate", "subsidiary", "parent company", "director", "officer", "shareholder",
    "key management",
];
const FX_KEYWORDS: &[&str] = &[
    "fx", "foreign exchange", "currency", "translation", "forex", "eur", "gbp", "jpy", "cad", "aud", "unrealized",
];
const SUBSEQUENT_KEYWORDS: &[&str] = &["subsequent", "post-period", "post-closing", "adjustment", "after year-end"];
const POLICY_KEYWORDS: &[&str] = &["policy change", "restatement", "prior period", "correction", "retrospective", "error", "reclassification"];
const ACCRUAL_PRESENTATION_KEYWORDS: &[&str] = &["accrued", "prepaid", "receivable", "payable"];

pub struct IfrsAnalyzer;

impl Analyzer for IfrsAnalyzer {
    fn analyze(
        &self,
        gl: &GeneralLedger,
        tb: &TrialBalance,
        _coa: &ChartOfAccounts,
        basis: AccountingBasis,
    ) -> Result<Vec<Finding>, AnalyzerError> {
        // Sequential, like the GAAP analyzer: no rule here performs I/O,
        // so the real concurrency happens at the orchestrator's fan-out
        // across Compliance/Anomaly/Fraud, not within a single standard.
        let mut findings = Vec::new();
        findings.extend(check_lifo_prohibition(gl));
        findings.extend(check_inventory_nrv(gl));
        findings.extend(check_ppe_revaluation(gl));
        findings.extend(check_impairment_reversal(gl));
        findings.extend(check_development_capitalization(gl));
        findings.extend(check_provisions(gl));
        findings.extend(check_related_party(gl));
        findings.extend(check_lease_recognition(gl));
        findings.extend(check_deferred_tax(tb));
        findings.extend(check_foreign_currency(gl));
        findings.extend(check_subsequent_events(gl));
        findings.extend(check_policy_changes(gl));
        findings.extend(check_approval_controls(gl));
        findings.extend(check_expense_classification(gl));

        match basis {
            AccountingBasis::Accrual => {
                findings.extend(check_revenue_recognition_ifrs15(gl));
                findings.extend(check_accrual_basis_presentation(tb));
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

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| haystack.contains(kw))
}

/// IAS 2: LIFO is prohibited outright under IFRS.
fn check_lifo_prohibition(gl: &GeneralLedger) -> Vec<Finding> {
    gl.entries
        .iter()
        .filter(|e| {
            (e.account_code.starts_with("12") || e.account_code.starts_with("50"))
                && contains_any(&e.description.to_lowercase(), LIFO_KEYWORDS)
        })
        .map(|entry| Finding {
            finding_id: finding_id("INV"),
            category: FindingCategory::Structural,
            severity: Severity::Critical,
            issue: "LIFO Method Detected - Prohibited Under IFRS".to_string(),
            details: format!(
                "Transaction description suggests LIFO inventory costing: '{}'. LIFO is explicitly prohibited under IAS 2.",
                entry.description
            ),
            recommendation: "Switch to FIFO or weighted average cost method as required by IAS 2".to_string(),
            confidence: 0.95,
            gaap_principle: None,
            ifrs_standard: Some("IAS 2 Inventories".to_string()),
            detection_method: "Text analysis: LIFO keyword on an inventory/COGS account".to_string(),
            affected_transactions: Some(vec![entry.entry_id.clone()]),
            transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
            rule_code: Some(
                "IFRS_002_LIFO_PROHIBITION: account_code startswith ('12','50') and LIFO keyword present".to_string(),
            ),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Ifrs,
        })
        .collect()
}

/// IAS 2: inventory must sit at the lower of cost and net realizable
/// value; unlike GAAP, a write-down reversal is permitted when conditions
/// improve.
fn check_inventory_nrv(gl: &GeneralLedger) -> Vec<Finding> {
    let mut findings = Vec::new();
    for entry in gl.entries.iter().filter(|e| e.account_code.starts_with("12")) {
        let desc = entry.description.to_lowercase();
        if contains_any(&desc, WRITEDOWN_KEYWORDS) {
            findings.push(Finding {
                finding_id: finding_id("NRV"),
                category: FindingCategory::Balance,
                severity: Severity::Medium,
                issue: "Inventory NRV Adjustment Detected".to_string(),
                details: format!(
                    "Inventory write-down of ${:.2} detected. Verify NRV calculation per IAS 2.",
                    entry.credit
                ),
                recommendation: "Verify NRV = Estimated selling price - Costs to complete - Costs to sell".to_string(),
                confidence: 0.80,
                gaap_principle: None,
                ifrs_standard: Some("IAS 2 Inventories".to_string()),
                detection_method: "Text analysis: write-down/NRV keyword on an inventory account".to_string(),
                affected_transactions: Some(vec![entry.entry_id.clone()]),
                transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
                rule_code: Some("IFRS_002_INVENTORY_NRV: account_code startswith '12' and write-down keyword present".to_string()),
                ai_explanation: None,
                accounting_standard_used: AccountingStandard::Ifrs,
            });
        }
        if contains_any(&desc, REVERSAL_KEYWORDS) && entry.debit > 0.0 {
            findings.push(Finding {
                finding_id: finding_id("NRVR"),
                category: FindingCategory::Balance,
                severity: Severity::Low,
                issue: "Inventory Write-Down Reversal (Permitted Under IFRS)".to_string(),
                details: format!(
                    "Inventory write-down reversal of ${:.2}. This is ALLOWED under IAS 2 but verify conditions.",
                    entry.debit
                ),
                recommendation: "Verify reversal is due to increased NRV and does not exceed the original write-down".to_string(),
                confidence: 0.85,
                gaap_principle: None,
                ifrs_standard: Some("IAS 2 Inventories".to_string()),
                detection_method: "Text analysis: reversal keyword with a debit on an inventory account".to_string(),
                affected_transactions: Some(vec![entry.entry_id.clone()]),
                transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
                rule_code: Some("IFRS_002_NRV_REVERSAL: reversal keyword present and debit > 0 on an inventory account".to_string()),
                ai_explanation: None,
                accounting_standard_used: AccountingStandard::Ifrs,
            });
        }
    }
    findings
}

/// IAS 16: the revaluation model is allowed under IFRS (prohibited under
/// GAAP), so a detected revaluation is reported for review rather than
/// flagged as noncompliant.
fn check_ppe_revaluation(gl: &GeneralLedger) -> Vec<Finding> {
    gl.entries
        .iter()
        .filter(|e| {
            let desc = e.description.to_lowercase();
            (e.account_code.starts_with("15") || e.account_code.starts_with("16") || e.account_code.starts_with("17") || desc.contains("revaluation"))
                && contains_any(&desc, REVALUATION_KEYWORDS)
        })
        .map(|entry| {
            let (direction, amount) = if entry.debit > 0.0 {
                ("upward", entry.debit)
            } else {
                ("downward", entry.credit)
            };
            Finding {
                finding_id: finding_id("REV"),
                category: FindingCategory::Balance,
                severity: Severity::Medium,
                issue: format!("PPE Revaluation Detected ({direction})"),
                details: format!(
                    "Property, Plant & Equipment {direction} revaluation of ${amount:.2}. Verify per IAS 16 revaluation model requirements."
                ),
                recommendation: "Verify: 1) Revaluation applied to entire asset class, 2) Surplus credited to OCI, 3) Depreciation recalculated on revalued amount".to_string(),
                confidence: 0.85,
                gaap_principle: None,
                ifrs_standard: Some("IAS 16 Property, Plant and Equipment".to_string()),
                detection_method: "Text analysis: revaluation keyword on a PPE account".to_string(),
                affected_transactions: Some(vec![entry.entry_id.clone()]),
                transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
                rule_code: Some("IFRS_003_PPE_REVALUATION: PPE account (15/16/17) or 'revaluation' in description, with a revaluation keyword".to_string()),
                ai_explanation: None,
                accounting_standard_used: AccountingStandard::Ifrs,
            }
        })
        .collect()
}

/// IAS 36: impairment reversal is allowed under IFRS except for goodwill,
/// where it's prohibited exactly as under GAAP.
fn check_impairment_reversal(gl: &GeneralLedger) -> Vec<Finding> {
    let mut findings = Vec::new();
    for entry in &gl.entries {
        let desc = entry.description.to_lowercase();
        if !contains_any(&desc, IMPAIRMENT_KEYWORDS) || !contains_any(&desc, IMPAIRMENT_REVERSAL_KEYWORDS) {
            continue;
        }
        let is_goodwill = contains_any(&desc, GOODWILL_KEYWORDS) || entry.account_code.starts_with("18");
        if is_goodwill {
            findings.push(Finding {
                finding_id: finding_id("IMP"),
                category: FindingCategory::Structural,
                severity: Severity::Critical,
                issue: "Goodwill Impairment Reversal - PROHIBITED".to_string(),
                details: "Goodwill impairment reversal detected. This is PROHIBITED under IAS 36 Paragraph 124.".to_string(),
                recommendation: "Reverse this entry. Goodwill impairment cannot be reversed under IFRS.".to_string(),
                confidence: 0.95,
                gaap_principle: None,
                ifrs_standard: Some("IAS 36 Impairment of Assets".to_string()),
                detection_method: "Text analysis: impairment + reversal keywords on a goodwill-coded account".to_string(),
                affected_transactions: Some(vec![entry.entry_id.clone()]),
                transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
                rule_code: Some("IFRS_004_GOODWILL_IMPAIRMENT_REVERSAL: goodwill keyword or account_code startswith '18', with impairment+reversal keywords".to_string()),
                ai_explanation: None,
                accounting_standard_used: AccountingStandard::Ifrs,
            });
        } else {
            findings.push(Finding {
                finding_id: finding_id("IMPR"),
                category: FindingCategory::Balance,
                severity: Severity::Low,
                issue: "Impairment Reversal Detected (Permitted Under IFRS)".to_string(),
                details: format!(
                    "Asset impairment reversal of ${:.2}. This is ALLOWED under IAS 36 for non-goodwill assets.",
                    entry.debit
                ),
                recommendation: "Verify: 1) Indicators of reversal exist, 2) Recoverable amount recalculated, 3) Reversal limited to original impairment".to_string(),
                confidence: 0.80,
                gaap_principle: None,
                ifrs_standard: Some("IAS 36 Impairment of Assets".to_string()),
                detection_method: "Text analysis: impairment + reversal keywords on a non-goodwill account".to_string(),
                affected_transactions: Some(vec![entry.entry_id.clone()]),
                transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
                rule_code: Some("IFRS_004_IMPAIRMENT_REVERSAL: impairment+reversal keywords, account not goodwill-coded".to_string()),
                ai_explanation: None,
                accounting_standard_used: AccountingStandard::Ifrs,
            });
        }
    }
    findings
}

/// IAS 38: development costs may be capitalized (all six criteria must be
/// verified); research costs must always be expensed.
fn check_development_capitalization(gl: &GeneralLedger) -> Vec<Finding> {
    let mut findings = Vec::new();
    for entry in gl.entries.iter().filter(|e| e.account_code.starts_with("18") && e.debit > 0.0) {
        let desc = entry.description.to_lowercase();
        if contains_any(&desc, DEVELOPMENT_KEYWORDS) {
            findings.push(Finding {
                finding_id: finding_id("DEV"),
                category: FindingCategory::Classification,
                severity: Severity::Medium,
                issue: "Development Cost Capitalization Detected".to_string(),
                details: format!(
                    "Development costs of ${:.2} capitalized. Verify all 6 IAS 38 criteria are met.",
                    entry.debit
                ),
                recommendation: "Verify 6 criteria: 1) Technical feasibility, 2) Intention to complete, 3) Ability to use/sell, 4) Future economic benefits, 5) Adequate resources, 6) Reliable measurement".to_string(),
                confidence: 0.85,
                gaap_principle: None,
                ifrs_standard: Some("IAS 38 Intangible Assets".to_string()),
                detection_method: "Text analysis: development keyword on a capitalized intangible account".to_string(),
                affected_transactions: Some(vec![entry.entry_id.clone()]),
                transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
                rule_code: Some("IFRS_006_DEVELOPMENT_CAPITALIZATION: account_code startswith '18', debit > 0, development keyword".to_string()),
                ai_explanation: None,
                accounting_standard_used: AccountingStandard::Ifrs,
            });
        }
        if contains_any(&desc, RESEARCH_KEYWORDS) && !desc.contains("development") {
            findings.push(Finding {
                finding_id: finding_id("RES"),
                category: FindingCategory::Classification,
                severity: Severity::High,
                issue: "Research Costs Incorrectly Capitalized".to_string(),
                details: format!(
                    "Research costs of ${:.2} appear to be capitalized. Research costs must be EXPENSED under IAS 38.",
                    entry.debit
                ),
                recommendation: "Reclassify to R&D expense. Research costs cannot be capitalized under IAS 38.".to_string(),
                confidence: 0.90,
                gaap_principle: None,
                ifrs_standard: Some("IAS 38 Intangible Assets".to_string()),
                detection_method: "Text analysis: research keyword, without 'development', on a capitalized intangible account".to_string(),
                affected_transactions: Some(vec![entry.entry_id.clone()]),
                transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
                rule_code: Some("IFRS_006_RESEARCH_EXPENSE: research keyword and account_code startswith '18', no 'development' in description".to_string()),
                ai_explanation: None,
                accounting_standard_used: AccountingStandard::Ifrs,
            });
        }
    }
    findings
}

/// IAS 37: recognizing a provision requires a present obligation, a
/// probable outflow, and a reliable estimate — significant provisions are
/// surfaced for that verification.
fn check_provisions(gl: &GeneralLedger) -> Vec<Finding> {
    gl.entries
        .iter()
        .filter(|e| {
            (e.account_code.starts_with("24") || contains_any(&e.description.to_lowercase(), PROVISION_KEYWORDS))
                && e.credit > 10_000.0
        })
        .map(|entry| Finding {
            finding_id: finding_id("PRV"),
            category: FindingCategory::Balance,
            severity: Severity::Medium,
            issue: "Provision Recorded - Verify IAS 37 Criteria".to_string(),
            details: format!(
                "Provision of ${:.2} recorded for '{}'. Verify all 3 IAS 37 recognition criteria.",
                entry.credit, entry.description
            ),
            recommendation: "Verify: 1) Present obligation from past event, 2) Probable outflow (>50%), 3) Reliable estimate possible".to_string(),
            confidence: 0.75,
            gaap_principle: None,
            ifrs_standard: Some("IAS 37 Provisions, Contingent Liabilities and Contingent Assets".to_string()),
            detection_method: "Rule-based validation: significant provision account or keyword".to_string(),
            affected_transactions: Some(vec![entry.entry_id.clone()]),
            transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
            rule_code: Some("IFRS_005_PROVISIONS: account_code startswith '24' or provision keyword, credit > 10000".to_string()),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Ifrs,
        })
        .collect()
}

/// IAS 24: related-party transactions require disclosure regardless of
/// whether pricing looks reasonable.
fn check_related_party(gl: &GeneralLedger) -> Vec<Finding> {
    gl.entries
        .iter()
        .filter(|e| {
            let desc = e.description.to_lowercase();
            let vendor = e.vendor_or_customer.as_deref().unwrap_or("").to_lowercase();
            (contains_any(&desc, RELATED_PARTY_KEYWORDS) || contains_any(&vendor, RELATED_PARTY_KEYWORDS))
                && e.debit.max(e.credit) > 1_000.0
        })
        .map(|entry| {
            let amount = entry.debit.max(entry.credit);
            Finding {
                finding_id: finding_id("RPT"),
                category: FindingCategory::Fraud,
                severity: Severity::High,
                issue: "Related Party Transaction Detected".to_string(),
                details: format!(
                    "Potential related party transaction of ${amount:.2} with {}. Requires disclosure per IAS 24.",
                    entry.vendor_or_customer.as_deref().unwrap_or("Unknown")
                ),
                recommendation: "Verify: 1) Arm's length pricing, 2) Proper disclosure in notes, 3) Board approval if required".to_string(),
                confidence: 0.85,
                gaap_principle: None,
                ifrs_standard: Some("IAS 24 Related Party Disclosures".to_string()),
                detection_method: "Text analysis: related-party keyword in description or counterparty".to_string(),
                affected_transactions: Some(vec![entry.entry_id.clone()]),
                transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
                rule_code: Some("IFRS_010_RELATED_PARTY: related-party keyword present, amount > 1000".to_string()),
                ai_explanation: None,
                accounting_standard_used: AccountingStandard::Ifrs,
            }
        })
        .collect()
}

/// IFRS 16: nearly all leases must sit on the balance sheet as a
/// right-of-use asset plus lease liability; a sizeable rent expense is a
/// sign of an off-balance-sheet lease that was never capitalized.
fn check_lease_recognition(gl: &GeneralLedger) -> Vec<Finding> {
    gl.entries
        .iter()
        .filter(|e| {
            contains_any(&e.description.to_lowercase(), LEASE_KEYWORDS)
                && e.account_code.starts_with("65")
                && e.debit > 5_000.0
        })
        .map(|entry| Finding {
            finding_id: finding_id("LSE"),
            category: FindingCategory::Classification,
            severity: Severity::High,
            issue: "Potential Off-Balance-Sheet Lease".to_string(),
            details: format!(
                "Rent/lease expense of ${:.2} recorded. Under IFRS 16, most leases must be on balance sheet with ROU asset and lease liability.",
                entry.debit
            ),
            recommendation: "Verify if lease qualifies for short-term (<12 months) or low-value exemption. Otherwise, recognize ROU asset and lease liability.".to_string(),
            confidence: 0.80,
            gaap_principle: None,
            ifrs_standard: Some("IFRS 16 Leases".to_string()),
            detection_method: "Text analysis: lease keyword on a significant rent-expense entry".to_string(),
            affected_transactions: Some(vec![entry.entry_id.clone()]),
            transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
            rule_code: Some("IFRS_007_LEASE_RECOGNITION: lease keyword, account_code startswith '65', debit > 5000".to_string()),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Ifrs,
        })
        .collect()
}

/// IAS 12: a significant deferred tax balance warrants review of the
/// underlying temporary differences and recoverability.
fn check_deferred_tax(tb: &TrialBalance) -> Vec<Finding> {
    tb.rows
        .iter()
        .filter(|row| row.account_name.to_lowercase().contains("deferred tax") && row.ending_balance > 50_000.0)
        .map(|row| Finding {
            finding_id: finding_id("TAX"),
            category: FindingCategory::Balance,
            severity: Severity::Medium,
            issue: "Significant Deferred Tax Balance".to_string(),
            details: format!(
                "Deferred tax balance of ${:.2} in {}. Review temporary differences and recoverability.",
                row.ending_balance, row.account_name
            ),
            recommendation: "Verify: 1) All temporary differences identified, 2) DTA recoverability assessed, 3) Correct tax rates used".to_string(),
            confidence: 0.75,
            gaap_principle: None,
            ifrs_standard: Some("IAS 12 Income Taxes".to_string()),
            detection_method: "Rule-based validation: deferred tax account balance above threshold".to_string(),
            affected_transactions: None,
            transaction_details: Some(serde_json::json!({
                "account_code": row.account_code,
                "account_name": row.account_name,
                "beginning_balance": row.beginning_balance,
                "ending_balance": row.ending_balance,
            })),
            rule_code: Some("IFRS_008_DEFERRED_TAX: account_name contains 'deferred tax', ending_balance > 50000".to_string()),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Ifrs,
        })
        .collect()
}

/// IAS 21: foreign-currency transactions need rate and translation review.
fn check_foreign_currency(gl: &GeneralLedger) -> Vec<Finding> {
    gl.entries
        .iter()
        .filter(|e| contains_any(&e.description.to_lowercase(), FX_KEYWORDS) && e.debit.max(e.credit) > 1_000.0)
        .map(|entry| {
            let amount = entry.debit.max(entry.credit);
            Finding {
                finding_id: finding_id("FX"),
                category: FindingCategory::Balance,
                severity: Severity::Low,
                issue: "Foreign Currency Transaction".to_string(),
                details: format!(
                    "Foreign currency transaction of ${amount:.2}. Verify exchange rate and translation per IAS 21."
                ),
                recommendation: "Verify: 1) Correct exchange rate used, 2) Monetary items at closing rate, 3) FX gains/losses in P&L".to_string(),
                confidence: 0.70,
                gaap_principle: None,
                ifrs_standard: Some("IAS 21 The Effects of Changes in Foreign Exchange Rates".to_string()),
                detection_method: "Text analysis: foreign-currency keyword on a significant entry".to_string(),
                affected_transactions: Some(vec![entry.entry_id.clone()]),
                transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
                rule_code: Some("IFRS_012_FOREIGN_CURRENCY: FX keyword present, amount > 1000".to_string()),
                ai_explanation: None,
                accounting_standard_used: AccountingStandard::Ifrs,
            }
        })
        .collect()
}

/// IAS 10: entries referencing post-period events need classification as
/// adjusting or non-adjusting.
fn check_subsequent_events(gl: &GeneralLedger) -> Vec<Finding> {
    gl.entries
        .iter()
        .filter(|e| contains_any(&e.description.to_lowercase(), SUBSEQUENT_KEYWORDS))
        .map(|entry| {
            let amount = entry.debit.max(entry.credit);
            Finding {
                finding_id: finding_id("SUB"),
                category: FindingCategory::Timing,
                severity: Severity::Medium,
                issue: "Potential Subsequent Event Adjustment".to_string(),
                details: format!(
                    "Entry of ${amount:.2} references post-period events. Classify as adjusting or non-adjusting per IAS 10."
                ),
                recommendation: "Determine if adjusting (conditions existed at period end) or non-adjusting (conditions arose after - disclose only)".to_string(),
                confidence: 0.75,
                gaap_principle: None,
                ifrs_standard: Some("IAS 10 Events After the Reporting Period".to_string()),
                detection_method: "Text analysis: subsequent-event keyword".to_string(),
                affected_transactions: Some(vec![entry.entry_id.clone()]),
                transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
                rule_code: Some("IFRS_013_SUBSEQUENT_EVENTS: subsequent-event keyword present".to_string()),
                ai_explanation: None,
                accounting_standard_used: AccountingStandard::Ifrs,
            }
        })
        .collect()
}

/// IAS 8: policy changes and error corrections must be applied
/// retrospectively, unlike prospective changes in estimate.
fn check_policy_changes(gl: &GeneralLedger) -> Vec<Finding> {
    gl.entries
        .iter()
        .filter(|e| contains_any(&e.description.to_lowercase(), POLICY_KEYWORDS))
        .map(|entry| {
            let amount = entry.debit.max(entry.credit);
            Finding {
                finding_id: finding_id("POL"),
                category: FindingCategory::Structural,
                severity: Severity::High,
                issue: "Accounting Policy Change or Error Correction".to_string(),
                details: format!(
                    "Entry of ${amount:.2} suggests policy change or error correction. Apply retrospectively per IAS 8."
                ),
                recommendation: "Verify: 1) Retrospective application, 2) Comparative periods restated, 3) Required disclosures made".to_string(),
                confidence: 0.80,
                gaap_principle: None,
                ifrs_standard: Some("IAS 8 Accounting Policies, Changes in Accounting Estimates and Errors".to_string()),
                detection_method: "Text analysis: policy-change/error-correction keyword".to_string(),
                affected_transactions: Some(vec![entry.entry_id.clone()]),
                transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
                rule_code: Some("IFRS_014_POLICY_CHANGES: policy-change keyword present".to_string()),
                ai_explanation: None,
                accounting_standard_used: AccountingStandard::Ifrs,
            }
        })
        .collect()
}

/// IFRS 15: large period-end revenue warrants confirming the performance
/// obligation was actually satisfied under the five-step model.
fn check_revenue_recognition_ifrs15(gl: &GeneralLedger) -> Vec<Finding> {
    let period_end = gl.period_end;
    gl.entries
        .iter()
        .filter(|e| e.account_code.starts_with('4') && e.credit > 10_000.0 && e.date == period_end)
        .map(|entry| Finding {
            finding_id: finding_id("REV"),
            category: FindingCategory::Timing,
            severity: Severity::Medium,
            issue: "Large Period-End Revenue - IFRS 15 Review".to_string(),
            details: format!(
                "Revenue of ${:.2} recorded on period end. Verify performance obligation satisfied per IFRS 15.",
                entry.credit
            ),
            recommendation: "Apply IFRS 15 5-step model: 1) Identify contract, 2) Identify obligations, 3) Determine price, 4) Allocate price, 5) Recognize when satisfied".to_string(),
            confidence: 0.75,
            gaap_principle: None,
            ifrs_standard: Some("IFRS 15 Revenue from Contracts with Customers".to_string()),
            detection_method: "Rule-based validation: large revenue credit on the period-end date".to_string(),
            affected_transactions: Some(vec![entry.entry_id.clone()]),
            transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
            rule_code: Some("IFRS_001_REVENUE_RECOGNITION: account_code startswith '4', credit > 10000, date == period_end".to_string()),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Ifrs,
        })
        .collect()
}

/// IAS 1: IFRS mandates accrual-basis presentation; a trial balance with
/// no accrual-type accounts at all is a sign cash-basis bookkeeping leaked
/// in.
fn check_accrual_basis_presentation(tb: &TrialBalance) -> Vec<Finding> {
    let has_accrual_accounts = tb
        .rows
        .iter()
        .any(|row| contains_any(&row.account_name.to_lowercase(), ACCRUAL_PRESENTATION_KEYWORDS));

    if has_accrual_accounts {
        return Vec::new();
    }

    vec![Finding {
        finding_id: finding_id("IAS1"),
        category: FindingCategory::Structural,
        severity: Severity::Medium,
        issue: "Limited Accrual Accounts Detected".to_string(),
        details: "Few or no accrual-type accounts found. Verify accrual basis is properly applied per IAS 1.".to_string(),
        recommendation: "Ensure accrued expenses, prepaid assets, and receivables/payables are properly recorded".to_string(),
        confidence: 0.65,
        gaap_principle: None,
        ifrs_standard: Some("IAS 1 Presentation of Financial Statements".to_string()),
        detection_method: "Rule-based validation: no accrual-type account names present in the trial balance".to_string(),
        affected_transactions: None,
        transaction_details: None,
        rule_code: Some("IFRS_011_ACCRUAL_BASIS: no trial balance row name contains accrued/prepaid/receivable/payable".to_string()),
        ai_explanation: None,
        accounting_standard_used: AccountingStandard::Ifrs,
    }]
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
            gaap_principle: None,
            ifrs_standard: Some("Internal Controls (ISA 315)".to_string()),
            detection_method: "Rule-based validation: approval threshold check".to_string(),
            affected_transactions: Some(vec![entry.entry_id.clone()]),
            transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
            rule_code: Some("IFRS_COMMON_APPROVAL_THRESHOLD: entry.debit > $5,000".to_string()),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Ifrs,
        })
        .collect()
}

fn check_expense_classification(gl: &GeneralLedger) -> Vec<Finding> {
    gl.entries
        .iter()
        .filter(|e| {
            let desc = e.description.to_lowercase();
            contains_any(&desc, TRAVEL_KEYWORDS) && !e.account_code.starts_with("66")
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
            gaap_principle: None,
            ifrs_standard: Some("IAS 1 Presentation (Expense Classification)".to_string()),
            detection_method: "Text analysis: travel keyword vs. account-code mismatch".to_string(),
            affected_transactions: Some(vec![entry.entry_id.clone()]),
            transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
            rule_code: Some("IFRS_COMMON_EXPENSE_CLASSIFICATION: travel keyword present but account_code does not start with '66'".to_string()),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Ifrs,
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
            details: format!(
                "Entry to {} recorded under cash basis. Note: IFRS requires accrual basis per IAS 1.",
                entry.account_name
            ),
            recommendation: "IFRS requires accrual basis accounting per IAS 1. Consider transitioning to accrual basis.".to_string(),
            confidence: 0.90,
            gaap_principle: None,
            ifrs_standard: Some("IAS 1 Presentation of Financial Statements".to_string()),
            detection_method: "Rule-based validation: AR/AP posting under cash basis".to_string(),
            affected_transactions: Some(vec![entry.entry_id.clone()]),
            transaction_details: Some(serde_json::Value::Array(vec![transaction_details(entry)])),
            rule_code: Some("IFRS_COMMON_CASH_BASIS: account_code in {1100, 2000} while basis == cash".to_string()),
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Ifrs,
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
    fn lifo_flagged_on_inventory_account() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 1, 31),
            entries: vec![entry("E1", date(2024, 1, 5), "1250", 0.0, 2_000.0, "LIFO inventory adjustment")],
        };
        let findings = check_lifo_prohibition(&gl);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].ifrs_standard.as_deref(), Some("IAS 2 Inventories"));
    }

    #[test]
    fn ppe_revaluation_detected_as_medium_not_prohibited() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 1, 31),
            entries: vec![entry("E1", date(2024, 1, 10), "1550", 20_000.0, 0.0, "Revaluation of building")],
        };
        let findings = check_ppe_revaluation(&gl);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert!(findings[0].issue.contains("upward"));
    }

    #[test]
    fn goodwill_impairment_reversal_is_critical_non_goodwill_is_low() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 1, 31),
            entries: vec![
                entry("E1", date(2024, 1, 10), "1810", 10_000.0, 0.0, "Goodwill impairment reversal"),
                entry("E2", date(2024, 1, 11), "1700", 5_000.0, 0.0, "Equipment impairment reversal"),
            ],
        };
        let findings = check_impairment_reversal(&gl);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().any(|f| f.severity == Severity::Critical && f.issue.contains("Goodwill")));
        assert!(findings.iter().any(|f| f.severity == Severity::Low));
    }

    #[test]
    fn research_costs_capitalized_flagged_high() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 1, 31),
            entries: vec![entry("E1", date(2024, 1, 10), "1810", 8_000.0, 0.0, "Basic research costs")],
        };
        let findings = check_development_capitalization(&gl);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].issue, "Research Costs Incorrectly Capitalized");
    }
}
