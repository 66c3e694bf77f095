//! Heuristic fraud-pattern detection: duplicate payments, structuring,
//! round numbers, generic vendor names, round-tripping, weekend/holiday
//! activity, and dual-role/similar-name entity clusters.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate};

use super::{finding_id, Analyzer};
use crate::error::AnalyzerError;
use crate::models::{
    AccountingBasis, AccountingStandard, ChartOfAccounts, Finding, FindingCategory, GeneralLedger,
    JournalEntry, Severity, TrialBalance,
};

/// (month, day) pairs; several are fixed approximations of floating
/// holidays, matching the table the detection was grounded on.
const US_HOLIDAYS: &[(u32, u32)] = &[
    (1, 1),
    (7, 4),
    (12, 25),
    (12, 24),
    (11, 11),
    (1, 15),
    (2, 15),
    (5, 25),
    (9, 1),
    (10, 10),
    (11, 25),
];

const ROUND_AMOUNTS: &[u64] = &[1_000, 2_000, 2_500, 5_000, 10_000, 25_000, 50_000];
const GENERIC_VENDOR_TOKENS: &[&str] = &[
    "consulting",
    "services",
    "solutions",
    "management",
    "enterprises",
    "holdings",
    "global",
    "international",
];
const GENERIC_NAME_STOPWORDS: &[&str] = &["the", "and", "of", "inc", "llc", "corp", "ltd", "co"];

pub struct FraudAnalyzer;

impl Analyzer for FraudAnalyzer {
    fn analyze(
        &self,
        gl: &GeneralLedger,
        _tb: &TrialBalance,
        _coa: &ChartOfAccounts,
        _basis: AccountingBasis,
    ) -> Result<Vec<Finding>, AnalyzerError> {
        let mut findings = Vec::new();
        findings.extend(detect_duplicate_payments(gl));
        findings.extend(detect_structuring(gl));
        findings.extend(detect_round_numbers(gl));
        findings.extend(detect_vendor_anomalies(gl));
        findings.extend(detect_round_tripping(gl));
        findings.extend(detect_weekend_holiday(gl));
        findings.extend(detect_shared_entities(gl));
        Ok(findings)
    }
}

fn base_finding(
    prefix: &str,
    issue: &str,
    details: String,
    recommendation: &str,
    severity: Severity,
    confidence: f64,
    gaap_principle: &str,
    detection_method: &str,
    affected_transactions: Vec<String>,
) -> Finding {
    Finding {
        finding_id: finding_id(prefix),
        category: FindingCategory::Fraud,
        severity,
        issue: issue.to_string(),
        details,
        recommendation: recommendation.to_string(),
        confidence,
        gaap_principle: Some(gaap_principle.to_string()),
        ifrs_standard: None,
        detection_method: detection_method.to_string(),
        affected_transactions: if affected_transactions.is_empty() {
            None
        } else {
            Some(affected_transactions)
        },
        transaction_details: None,
        rule_code: None,
        ai_explanation: None,
        accounting_standard_used: AccountingStandard::Gaap,
    }
}

fn detect_duplicate_payments(gl: &GeneralLedger) -> Vec<Finding> {
    let mut groups: HashMap<(String, u64), Vec<&JournalEntry>> = HashMap::new();
    for entry in &gl.entries {
        if entry.debit > 0.0 {
            if let Some(vendor) = &entry.vendor_or_customer {
                let key = (vendor.to_lowercase(), cents(entry.debit));
                groups.entry(key).or_default().push(entry);
            }
        }
    }

    let mut findings = Vec::new();
    for ((vendor, _), mut entries) in groups {
        if entries.len() < 2 {
            continue;
        }
        entries.sort_by_key(|e| e.date);
        let within_window = entries.windows(2).any(|pair| (pair[1].date - pair[0].date).num_days() <= 7);
        if within_window {
            let amount = entries[0].debit;
            findings.push(base_finding(
                "DUP",
                "Potential Duplicate Payment",
                format!("Multiple payments of ${amount:.2} to {vendor} within 7 days"),
                "Verify these are not duplicate payments for the same invoice",
                Severity::High,
                0.80,
                "Payment Controls",
                "Rule-based pattern matching: same vendor + same amount + date proximity analysis",
                entries.iter().map(|e| e.entry_id.clone()).collect(),
            ));
        }
    }
    findings
}

fn detect_structuring(gl: &GeneralLedger) -> Vec<Finding> {
    const THRESHOLD: f64 = 10_000.0;
    let lower = THRESHOLD * 0.8;

    let mut groups: HashMap<String, Vec<&JournalEntry>> = HashMap::new();
    for entry in &gl.entries {
        if entry.debit > 0.0 && entry.debit >= lower && entry.debit < THRESHOLD {
            let vendor = entry.vendor_or_customer.clone().unwrap_or_else(|| "Unknown".to_string());
            groups.entry(vendor).or_default().push(entry);
        }
    }

    groups
        .into_iter()
        .filter(|(_, entries)| entries.len() >= 3)
        .map(|(vendor, entries)| {
            let total: f64 = entries.iter().map(|e| e.debit).sum();
            base_finding(
                "STR",
                "Potential Structuring/Smurfing",
                format!(
                    "{} transactions between ${:.0}-${:.0} to {vendor}, totaling ${:.2}. This pattern may indicate structuring to avoid reporting thresholds.",
                    entries.len(),
                    lower,
                    THRESHOLD,
                    total
                ),
                "Investigate for potential Bank Secrecy Act violations. Consider filing a SAR if warranted.",
                Severity::Critical,
                0.75,
                "Bank Secrecy Act Compliance",
                "Rule-based threshold analysis: transactions clustered just below the $10,000 reporting threshold",
                entries.iter().map(|e| e.entry_id.clone()).collect(),
            )
        })
        .collect()
}

fn detect_round_numbers(gl: &GeneralLedger) -> Vec<Finding> {
    let round_entries: Vec<&JournalEntry> = gl
        .entries
        .iter()
        .filter(|e| e.debit >= 1_000.0 && ROUND_AMOUNTS.contains(&cents_to_dollars(e.debit)))
        .collect();

    if round_entries.len() < 3 {
        return Vec::new();
    }

    let total: f64 = round_entries.iter().map(|e| e.debit).sum();
    vec![base_finding(
        "RND",
        "Multiple Round-Number Transactions",
        format!(
            "{} transactions with suspiciously round amounts totaling ${total:.2}. Natural transactions rarely result in perfectly round numbers.",
            round_entries.len()
        ),
        "Review supporting documentation for these transactions",
        Severity::Medium,
        0.60,
        "Fraud Detection - Red Flags",
        "Statistical analysis: round number frequency detection ($1,000, $2,500, $5,000, etc.)",
        round_entries.iter().map(|e| e.entry_id.clone()).collect(),
    )]
}

fn cents_to_dollars(amount: f64) -> u64 {
    amount.round() as u64
}

fn cents(amount: f64) -> u64 {
    (amount * 100.0).round() as u64
}

fn detect_vendor_anomalies(gl: &GeneralLedger) -> Vec<Finding> {
    let mut totals: HashMap<String, f64> = HashMap::new();
    let mut entries_by_vendor: HashMap<String, Vec<&JournalEntry>> = HashMap::new();
    for entry in &gl.entries {
        if entry.debit > 0.0 {
            if let Some(vendor) = &entry.vendor_or_customer {
                *totals.entry(vendor.clone()).or_insert(0.0) += entry.debit;
                entries_by_vendor.entry(vendor.clone()).or_default().push(entry);
            }
        }
    }

    totals
        .into_iter()
        .filter_map(|(vendor, total)| {
            let vendor_lower = vendor.to_lowercase();
            let generic_count = GENERIC_VENDOR_TOKENS.iter().filter(|t| vendor_lower.contains(*t)).count();
            if generic_count >= 2 && total > 10_000.0 {
                let entries = entries_by_vendor.get(&vendor).cloned().unwrap_or_default();
                Some(base_finding(
                    "VND",
                    "Generic Vendor Name Pattern",
                    format!(
                        "Vendor '{vendor}' has generic naming patterns common to shell companies. Total payments: ${total:.2}"
                    ),
                    "Verify vendor legitimacy: physical address, tax ID, business registration",
                    Severity::Medium,
                    0.55,
                    "Vendor Due Diligence",
                    "Text analysis: detecting generic naming patterns (consulting, services, holdings, etc.)",
                    entries.iter().take(20).map(|e| e.entry_id.clone()).collect(),
                ))
            } else {
                None
            }
        })
        .collect()
}

fn detect_round_tripping(gl: &GeneralLedger) -> Vec<Finding> {
    const TOLERANCE: f64 = 0.05;
    const WINDOW_DAYS: i64 = 30;
    const MIN_AMOUNT: f64 = 5_000.0;

    let payments: Vec<&JournalEntry> = gl
        .entries
        .iter()
        .filter(|e| e.debit >= MIN_AMOUNT && e.vendor_or_customer.is_some())
        .collect();
    let receipts: Vec<&JournalEntry> = gl
        .entries
        .iter()
        .filter(|e| e.credit >= MIN_AMOUNT && e.vendor_or_customer.is_some())
        .collect();

    let mut matched_txns = Vec::new();
    let mut total_amount = 0.0;
    let mut pattern_count = 0;

    for pay in &payments {
        let pay_vendor = pay.vendor_or_customer.as_ref().unwrap();
        for rec in &receipts {
            let rec_customer = rec.vendor_or_customer.as_ref().unwrap();
            if rec.date < pay.date || (rec.date - pay.date).num_days() > WINDOW_DAYS {
                continue;
            }
            let amount_diff = (pay.debit - rec.credit).abs() / pay.debit;
            if amount_diff <= TOLERANCE && pay_vendor.to_lowercase() != rec_customer.to_lowercase() {
                pattern_count += 1;
                total_amount += pay.debit;
                matched_txns.push(pay.entry_id.clone());
                matched_txns.push(rec.entry_id.clone());
            }
        }
    }

    if pattern_count >= 2 {
        vec![base_finding(
            "RTR",
            "Potential Round-Tripping Pattern",
            format!(
                "Found {pattern_count} instances where payments to vendors were matched by similar receipts from customers within 30 days. Total amount: ${total_amount:.2}. This pattern may indicate circular money flows."
            ),
            "Investigate business purpose of these transactions. Verify vendor/customer relationships and common ownership.",
            Severity::Critical,
            0.70,
            "Anti-Money Laundering / Fraud Detection",
            "Pattern analysis: detecting circular money flows (payment then matched receipt within 30 days)",
            matched_txns,
        )]
    } else {
        Vec::new()
    }
}

fn detect_weekend_holiday(gl: &GeneralLedger) -> Vec<Finding> {
    let mut findings = Vec::new();

    let weekend_entries: Vec<&JournalEntry> =
        gl.entries.iter().filter(|e| is_weekend(e.date)).collect();
    if weekend_entries.len() >= 3 {
        let total: f64 = weekend_entries.iter().map(|e| signed_amount(e)).sum();
        findings.push(base_finding(
            "WKD",
            "Weekend Transaction Activity",
            format!(
                "{} transactions posted on weekends totaling ${total:.2}. Weekend entries may indicate backdating or system access outside normal business hours.",
                weekend_entries.len()
            ),
            "Verify these entries were legitimately posted and properly authorized. Check system access logs.",
            Severity::Low,
            0.50,
            "Internal Controls - Access Management",
            "Temporal analysis: detecting transactions posted on Saturday/Sunday",
            weekend_entries.iter().take(20).map(|e| e.entry_id.clone()).collect(),
        ));
    }

    let holiday_entries: Vec<&JournalEntry> = gl
        .entries
        .iter()
        .filter(|e| US_HOLIDAYS.contains(&(e.date.month(), e.date.day())))
        .collect();
    if holiday_entries.len() >= 2 {
        let total: f64 = holiday_entries.iter().map(|e| signed_amount(e)).sum();
        findings.push(base_finding(
            "HOL",
            "Holiday Transaction Activity",
            format!(
                "{} transactions posted on US holidays totaling ${total:.2}. Holiday entries are unusual and may indicate backdating.",
                holiday_entries.len()
            ),
            "Verify authorization and business purpose for transactions posted on holidays.",
            Severity::Low,
            0.45,
            "Internal Controls - Temporal Validation",
            "Temporal analysis: detecting transactions posted on US federal holidays",
            holiday_entries.iter().take(20).map(|e| e.entry_id.clone()).collect(),
        ));
    }

    findings
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

fn signed_amount(entry: &JournalEntry) -> f64 {
    if entry.debit > 0.0 {
        entry.debit
    } else {
        entry.credit
    }
}

fn detect_shared_entities(gl: &GeneralLedger) -> Vec<Finding> {
    let mut vendors: HashSet<String> = HashSet::new();
    let mut customers: HashSet<String> = HashSet::new();
    let mut entries_by_entity: HashMap<String, Vec<&JournalEntry>> = HashMap::new();

    for entry in &gl.entries {
        if let Some(entity) = entry.vendor_or_customer.as_ref().map(|s| s.trim().to_string()) {
            entries_by_entity.entry(entity.clone()).or_default().push(entry);
            if entry.debit > 0.0 {
                vendors.insert(entity.clone());
            } else if entry.credit > 0.0 {
                customers.insert(entity);
            }
        }
    }

    let mut findings = Vec::new();

    let both_roles: Vec<String> = vendors.intersection(&customers).cloned().collect();
    if !both_roles.is_empty() {
        let mut affected = Vec::new();
        for entity in &both_roles {
            if let Some(entries) = entries_by_entity.get(entity) {
                affected.extend(entries.iter().map(|e| e.entry_id.clone()));
            }
        }
        let shown: Vec<&str> = both_roles.iter().take(5).map(|s| s.as_str()).collect();
        findings.push(base_finding(
            "SLF",
            "Entity as Both Vendor and Customer",
            format!(
                "{} entities appear as both vendor and customer: {}{}. This pattern may indicate related party transactions or self-dealing.",
                both_roles.len(),
                shown.join(", "),
                if both_roles.len() > 5 { "..." } else { "" }
            ),
            "Verify business purpose for each transaction. Document any related party relationships.",
            Severity::High,
            0.75,
            "Related Party Disclosure (ASC 850)",
            "Entity analysis: detecting entities in dual vendor/customer roles",
            affected.into_iter().take(30).collect(),
        ));
    }

    let all_entities: Vec<String> = vendors.union(&customers).cloned().collect();
    for group in find_similar_entity_names(&all_entities) {
        let mut group_entries = Vec::new();
        for entity in &group {
            if let Some(entries) = entries_by_entity.get(entity) {
                group_entries.extend(entries.iter().map(|e| e.entry_id.clone()));
            }
        }
        findings.push(base_finding(
            "SIM",
            "Potentially Related Entities (Similar Names)",
            format!(
                "Found {} entities with similar names: {}. This may indicate related parties or a shell company network.",
                group.len(),
                group.join(", ")
            ),
            "Verify if these entities share ownership, addresses, or management.",
            Severity::Medium,
            0.60,
            "Related Party Disclosure (ASC 850)",
            "Text analysis: detecting similar entity names that may indicate related parties",
            group_entries.into_iter().take(20).collect(),
        ));
    }

    findings
}

fn find_similar_entity_names(entities: &[String]) -> Vec<Vec<String>> {
    if entities.len() < 2 {
        return Vec::new();
    }

    let mut groups = Vec::new();
    let mut processed: HashSet<String> = HashSet::new();

    for (i, entity1) in entities.iter().enumerate() {
        if processed.contains(entity1) {
            continue;
        }
        let words1: HashSet<String> = entity1.to_lowercase().split_whitespace().map(String::from).collect();
        let mut group = vec![entity1.clone()];

        for (j, entity2) in entities.iter().enumerate() {
            if i == j || processed.contains(entity2) {
                continue;
            }
            let words2: HashSet<String> = entity2.to_lowercase().split_whitespace().map(String::from).collect();
            let common: HashSet<&String> = words1
                .intersection(&words2)
                .filter(|w| !GENERIC_NAME_STOPWORDS.contains(&w.as_str()))
                .collect();
            if common.len() >= 2 {
                group.push(entity2.clone());
                processed.insert(entity2.clone());
            }
        }

        if group.len() >= 2 {
            processed.insert(entity1.clone());
            groups.push(group);
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(id: &str, date: NaiveDate, debit: f64, credit: f64, vendor: Option<&str>) -> JournalEntry {
        JournalEntry {
            entry_id: id.into(),
            date,
            account_code: "6000".into(),
            account_name: "Expense".into(),
            debit,
            credit,
            description: "test".into(),
            vendor_or_customer: vendor.map(String::from),
        }
    }

    #[test]
    fn duplicate_payment_within_window_flagged() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: date(2024, 4, 1),
            period_end: date(2024, 4, 30),
            entries: vec![
                entry("E1", date(2024, 4, 15), 5_000.0, 0.0, Some("Vendor A")),
                entry("E2", date(2024, 4, 18), 5_000.0, 0.0, Some("Vendor A")),
            ],
        };
        let findings = detect_duplicate_payments(&gl);
        assert!(findings.iter().any(|f| f.issue.contains("Duplicate")));
    }

    #[test]
    fn structuring_requires_three_same_vendor_entries() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 1, 31),
            entries: vec![
                entry("E1", date(2024, 1, 2), 9_500.0, 0.0, Some("CashCo")),
                entry("E2", date(2024, 1, 3), 9_600.0, 0.0, Some("CashCo")),
                entry("E3", date(2024, 1, 4), 9_700.0, 0.0, Some("CashCo")),
                entry("E4", date(2024, 1, 5), 9_800.0, 0.0, Some("CashCo")),
            ],
        };
        let findings = detect_structuring(&gl);
        let f = findings.iter().find(|f| f.issue.contains("Structuring")).expect("expected structuring finding");
        assert_eq!(f.severity, Severity::Critical);
        assert!(f.confidence >= 0.70);
    }

    #[test]
    fn structuring_below_three_is_not_flagged() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 1, 31),
            entries: vec![
                entry("E1", date(2024, 1, 2), 9_500.0, 0.0, Some("CashCo")),
                entry("E2", date(2024, 1, 3), 9_600.0, 0.0, Some("CashCo")),
            ],
        };
        assert!(detect_structuring(&gl).is_empty());
    }
}
