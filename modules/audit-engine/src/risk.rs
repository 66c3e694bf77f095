//! Phase 7: composite risk scoring from the accumulated findings.

use std::collections::BTreeMap;

use crate::models::{Finding, RiskLevel, RiskScore, Severity};

/// Raw severity weight, matching `Severity::weight` exactly; kept local so
/// the scoring formula reads the way the source does.
fn weight(severity: Severity) -> f64 {
    severity.weight()
}

/// Calculates the composite risk score for a finished audit. An empty
/// finding set is the only input that short-circuits to a canned "clean"
/// result rather than running the formula.
pub fn calculate(findings: &[Finding]) -> RiskScore {
    if findings.is_empty() {
        return RiskScore {
            overall_score: 0.0,
            risk_level: RiskLevel::Low.into(),
            critical_count: 0,
            high_count: 0,
            medium_count: 0,
            low_count: 0,
            category_breakdown: BTreeMap::new(),
            requires_immediate_action: false,
            interpretation: "No findings identified. Financial statements appear materially correct.".to_string(),
        };
    }

    let critical_count = findings.iter().filter(|f| f.severity == Severity::Critical).count();
    let high_count = findings.iter().filter(|f| f.severity == Severity::High).count();
    let medium_count = findings.iter().filter(|f| f.severity == Severity::Medium).count();
    let low_count = findings.iter().filter(|f| f.severity == Severity::Low).count();

    let raw_score = critical_count as f64 * weight(Severity::Critical)
        + high_count as f64 * weight(Severity::High)
        + medium_count as f64 * weight(Severity::Medium)
        + low_count as f64 * weight(Severity::Low);

    let max_possible = (findings.len() as f64) * weight(Severity::Critical);
    let normalized_score = (raw_score / max_possible.max(1.0) * 100.0).min(100.0);

    let risk_level = if normalized_score >= 75.0 || critical_count >= 2 {
        RiskLevel::Critical
    } else if normalized_score >= 50.0 || critical_count >= 1 {
        RiskLevel::High
    } else if normalized_score >= 25.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let mut category_breakdown: BTreeMap<String, f64> = BTreeMap::new();
    for finding in findings {
        let key = format!("{:?}", finding.category).to_lowercase();
        *category_breakdown.entry(key).or_insert(0.0) += weight(finding.severity);
    }

    let interpretation = interpretation(risk_level, critical_count, high_count, findings.len());
    let requires_immediate_action = matches!(risk_level, RiskLevel::Critical | RiskLevel::High);

    RiskScore {
        overall_score: (normalized_score * 10.0).round() / 10.0,
        risk_level: risk_level.into(),
        critical_count,
        high_count,
        medium_count,
        low_count,
        category_breakdown,
        requires_immediate_action,
        interpretation,
    }
}

fn interpretation(risk_level: RiskLevel, critical_count: usize, high_count: usize, total: usize) -> String {
    match risk_level {
        RiskLevel::Critical => format!(
            "CRITICAL RISK: {critical_count} critical findings require immediate attention. \
             Material misstatement or fraud indicators present. \
             Do not rely on these financial statements without remediation."
        ),
        RiskLevel::High => format!(
            "HIGH RISK: {} significant findings identified. \
             Material misstatement possible. \
             Recommend immediate review and corrective action before relying on statements.",
            critical_count + high_count
        ),
        RiskLevel::Medium => format!(
            "MEDIUM RISK: {total} findings identified, mostly non-critical. \
             Some control weaknesses present. \
             Recommend addressing findings to strengthen internal controls."
        ),
        RiskLevel::Low | RiskLevel::Unknown => format!(
            "LOW RISK: {total} minor findings identified. \
             No material issues detected. \
             Financial statements appear reliable with minor improvements recommended."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountingStandard, FindingCategory};

    fn finding(severity: Severity, category: FindingCategory) -> Finding {
        Finding {
            finding_id: "F1".into(),
            category,
            severity,
            issue: "x".into(),
            details: "x".into(),
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
    fn empty_findings_is_low_risk_clean() {
        let score = calculate(&[]);
        assert_eq!(score.overall_score, 0.0);
        assert!(!score.requires_immediate_action);
    }

    #[test]
    fn two_criticals_force_critical_risk_level() {
        let findings = vec![
            finding(Severity::Critical, FindingCategory::Fraud),
            finding(Severity::Critical, FindingCategory::Balance),
        ];
        let score = calculate(&findings);
        assert_eq!(score.critical_count, 2);
        assert!(score.requires_immediate_action);
    }

    #[test]
    fn single_critical_is_at_least_high_risk() {
        let findings = vec![finding(Severity::Critical, FindingCategory::Fraud)];
        let score = calculate(&findings);
        assert!(score.requires_immediate_action);
    }

    #[test]
    fn all_low_severity_is_low_risk() {
        let findings: Vec<Finding> = (0..5).map(|_| finding(Severity::Low, FindingCategory::Timing)).collect();
        let score = calculate(&findings);
        assert!(!score.requires_immediate_action);
    }
}
