//! Statistical anomaly detection: Benford's Law, Z-score outliers, and
//! daily-volume spikes.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::{finding_id, Analyzer};
use crate::error::AnalyzerError;
use crate::models::{
    AccountingBasis, AccountingStandard, ChartOfAccounts, Finding, FindingCategory, GeneralLedger,
    Severity, TrialBalance,
};

const BENFORD_EXPECTED: [f64; 9] = [
    0.301, 0.176, 0.125, 0.097, 0.079, 0.067, 0.058, 0.051, 0.046,
];
const BENFORD_CRITICAL_VALUE: f64 = 15.507;
const BENFORD_MIN_SAMPLES: usize = 50;
const ZSCORE_THRESHOLD: f64 = 3.0;
const ZSCORE_MIN_SAMPLES: usize = 10;
const DAILY_VOLUME_ZSCORE_THRESHOLD: f64 = 2.5;

pub struct AnomalyAnalyzer;

impl Analyzer for AnomalyAnalyzer {
    fn analyze(
        &self,
        gl: &GeneralLedger,
        _tb: &TrialBalance,
        _coa: &ChartOfAccounts,
        _basis: AccountingBasis,
    ) -> Result<Vec<Finding>, AnalyzerError> {
        let mut findings = benfords_law_analysis(gl);
        findings.extend(statistical_outliers(gl));
        findings.extend(timing_anomalies(gl));
        Ok(findings)
    }
}

fn first_digit(amount: f64) -> Option<u32> {
    let cents = (amount.abs() * 100.0).round() as i64;
    let digits: String = cents.to_string().chars().filter(|c| c.is_ascii_digit()).collect();
    let trimmed = digits.trim_start_matches('0');
    trimmed.chars().next().and_then(|c| c.to_digit(10)).filter(|d| (1..=9).contains(d))
}

fn benfords_law_analysis(gl: &GeneralLedger) -> Vec<Finding> {
    let first_digits: Vec<u32> = gl
        .entries
        .iter()
        .filter_map(|e| {
            let amount = if e.debit > 0.0 { e.debit } else { e.credit };
            if amount > 0.0 {
                first_digit(amount)
            } else {
                None
            }
        })
        .collect();

    if first_digits.len() < BENFORD_MIN_SAMPLES {
        return Vec::new();
    }

    let total = first_digits.len() as f64;
    let mut counts = [0u32; 9];
    for d in &first_digits {
        counts[(*d - 1) as usize] += 1;
    }

    let chi_square: f64 = (0..9)
        .map(|i| {
            let actual = counts[i] as f64 / total;
            let expected = BENFORD_EXPECTED[i];
            (actual - expected).powi(2) / expected
        })
        .sum();

    if chi_square > BENFORD_CRITICAL_VALUE {
        vec![Finding {
            finding_id: finding_id("BEN"),
            category: FindingCategory::Fraud,
            severity: Severity::Medium,
            issue: "Benford's Law Deviation".to_string(),
            details: format!(
                "Transaction amounts deviate from expected first-digit distribution (chi-square: {chi_square:.2}). This may indicate fabricated or manipulated numbers."
            ),
            recommendation: "Review transactions for potential data manipulation or fraud".to_string(),
            confidence: (chi_square / 30.0).min(0.95),
            gaap_principle: Some("Data Integrity".to_string()),
            ifrs_standard: None,
            detection_method: format!(
                "Statistical analysis: Benford's Law chi-square test (value: {chi_square:.2}, critical: {BENFORD_CRITICAL_VALUE})"
            ),
            affected_transactions: None,
            transaction_details: None,
            rule_code: None,
            ai_explanation: None,
            accounting_standard_used: AccountingStandard::Gaap,
        }]
    } else {
        Vec::new()
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn stdev(values: &[f64], mean_value: f64) -> f64 {
    let n = values.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean_value).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

fn statistical_outliers(gl: &GeneralLedger) -> Vec<Finding> {
    let amounts: Vec<f64> = gl.entries.iter().filter(|e| e.debit > 0.0).map(|e| e.debit).collect();

    if amounts.len() < ZSCORE_MIN_SAMPLES {
        return Vec::new();
    }

    let mean_value = mean(&amounts);
    let stdev_value = stdev(&amounts, mean_value);
    if stdev_value == 0.0 {
        return Vec::new();
    }

    gl.entries
        .iter()
        .filter(|e| e.debit > 0.0)
        .filter_map(|entry| {
            let z_score = (entry.debit - mean_value) / stdev_value;
            if z_score.abs() > ZSCORE_THRESHOLD {
                Some(Finding {
                    finding_id: finding_id("OUT"),
                    category: FindingCategory::Fraud,
                    severity: Severity::Medium,
                    issue: "Statistical Outlier".to_string(),
                    details: format!(
                        "Transaction of ${:.2} is {:.1} standard deviations from mean (${:.2})",
                        entry.debit,
                        z_score.abs(),
                        mean_value
                    ),
                    recommendation: "Verify this unusual transaction amount".to_string(),
                    confidence: (z_score.abs() / 5.0).min(0.90),
                    gaap_principle: Some("Transaction Validity".to_string()),
                    ifrs_standard: None,
                    detection_method: format!(
                        "Statistical analysis: Z-score outlier detection (z={z_score:.2}, threshold={ZSCORE_THRESHOLD})"
                    ),
                    affected_transactions: Some(vec![entry.entry_id.clone()]),
                    transaction_details: None,
                    rule_code: None,
                    ai_explanation: None,
                    accounting_standard_used: AccountingStandard::Gaap,
                })
            } else {
                None
            }
        })
        .collect()
}

fn timing_anomalies(gl: &GeneralLedger) -> Vec<Finding> {
    let mut by_date: HashMap<NaiveDate, usize> = HashMap::new();
    for entry in &gl.entries {
        *by_date.entry(entry.date).or_insert(0) += 1;
    }

    let counts: Vec<f64> = by_date.values().map(|c| *c as f64).collect();
    if counts.len() <= 5 {
        return Vec::new();
    }

    let mean_count = mean(&counts);
    let stdev_count = stdev(&counts, mean_count);
    if stdev_count <= 0.0 {
        return Vec::new();
    }

    let mut dates: Vec<_> = by_date.into_iter().collect();
    dates.sort_by_key(|(d, _)| *d);

    dates
        .into_iter()
        .filter_map(|(date, count)| {
            let z_score = (count as f64 - mean_count) / stdev_count;
            if z_score > DAILY_VOLUME_ZSCORE_THRESHOLD {
                Some(Finding {
                    finding_id: finding_id("TME"),
                    category: FindingCategory::Timing,
                    severity: Severity::Low,
                    issue: "Unusual Activity Spike".to_string(),
                    details: format!(
                        "Date {date} has {count} entries, significantly higher than average ({mean_count:.1})"
                    ),
                    recommendation: "Review transactions on this date for unusual patterns".to_string(),
                    confidence: 0.65,
                    gaap_principle: Some("Transaction Timing".to_string()),
                    ifrs_standard: None,
                    detection_method: format!(
                        "Statistical analysis: daily volume Z-score (z={z_score:.2}, threshold={DAILY_VOLUME_ZSCORE_THRESHOLD})"
                    ),
                    affected_transactions: None,
                    transaction_details: None,
                    rule_code: None,
                    ai_explanation: None,
                    accounting_standard_used: AccountingStandard::Gaap,
                })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JournalEntry;

    fn entry(id: &str, date: NaiveDate, debit: f64) -> JournalEntry {
        JournalEntry {
            entry_id: id.into(),
            date,
            account_code: "6000".into(),
            account_name: "Expense".into(),
            debit,
            credit: 0.0,
            description: "x".into(),
            vendor_or_customer: None,
        }
    }

    #[test]
    fn benford_requires_at_least_50_samples() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            entries: (0..10)
                .map(|i| entry(&format!("E{i}"), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 100.0 + i as f64))
                .collect(),
        };
        assert!(benfords_law_analysis(&gl).is_empty());
    }

    #[test]
    fn zscore_requires_nonzero_stdev_and_min_samples() {
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            entries: (0..20)
                .map(|i| entry(&format!("E{i}"), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 500.0))
                .collect(),
        };
        assert!(statistical_outliers(&gl).is_empty());
    }

    #[test]
    fn zscore_flags_clear_outlier() {
        let base_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut entries: Vec<JournalEntry> = (0..20)
            .map(|i| entry(&format!("E{i}"), base_date, 500.0))
            .collect();
        entries.push(entry("E-outlier", base_date, 50_000.0));
        let gl = GeneralLedger {
            company_id: "C1".into(),
            period_start: base_date,
            period_end: base_date,
            entries,
        };
        let findings = statistical_outliers(&gl);
        assert!(findings.iter().any(|f| {
            f.affected_transactions
                .as_ref()
                .is_some_and(|txns| txns.iter().any(|t| t == "E-outlier"))
        }));
    }
}
