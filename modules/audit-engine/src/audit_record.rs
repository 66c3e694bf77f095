//! Audit Record / Audit Trail (C5): an append-only, tamper-evident log of
//! everything that happened during one audit run — every reasoning step,
//! every LLM call, every finding and AJE — closed out with a deterministic
//! SHA-256 integrity hash over its canonical JSON form.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::AuditRecordError;
use crate::models::{Aje, Finding, GeminiInteraction};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub step: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub step: String,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

/// One audit run's complete, append-only trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: String,
    pub company_id: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub input_type: String,
    pub reasoning_chain: Vec<ReasoningStep>,
    pub gemini_interactions: Vec<GeminiInteraction>,
    pub findings: Vec<Finding>,
    pub ajes: Vec<Aje>,
    pub execution_steps: Vec<ExecutionStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_integrity_hash: Option<String>,
}

impl AuditRecord {
    /// Matches the source's defaults: `created_by` is `"system"` and
    /// `input_type` is `"synthetic"` unless overridden.
    pub fn new(audit_id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            audit_id: audit_id.into(),
            company_id: company_id.into(),
            created_at: Utc::now(),
            created_by: "system".to_string(),
            input_type: "synthetic".to_string(),
            reasoning_chain: Vec::new(),
            gemini_interactions: Vec::new(),
            findings: Vec::new(),
            ajes: Vec::new(),
            execution_steps: Vec::new(),
            record_integrity_hash: None,
        }
    }

    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    pub fn add_reasoning_step(&mut self, step: impl Into<String>) {
        self.reasoning_chain.push(ReasoningStep {
            step: step.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn add_gemini_interaction(&mut self, interaction: GeminiInteraction) {
        self.gemini_interactions.push(interaction);
    }

    pub fn add_finding(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn add_aje(&mut self, aje: Aje) {
        self.ajes.push(aje);
    }

    pub fn add_execution_step(&mut self, step: impl Into<String>, details: Value) {
        self.execution_steps.push(ExecutionStep {
            step: step.into(),
            details,
            timestamp: Utc::now(),
        });
    }

    /// Hashes the record's canonical JSON form (sorted keys, via
    /// `serde_json`'s map ordering plus an explicit key sort), always
    /// excluding its own previous hash, so repeat calls on unchanged
    /// content are reproducible rather than hashing-the-last-hash.
    pub fn compute_integrity_hash(&mut self) -> Result<String, AuditRecordError> {
        let canonical = self.canonical_json()?;
        let hash = format!("{:x}", Sha256::digest(canonical.as_bytes()));
        self.record_integrity_hash = Some(hash.clone());
        Ok(hash)
    }

    fn canonical_json(&self) -> Result<String, AuditRecordError> {
        let mut unhashed = self.clone();
        unhashed.record_integrity_hash = None;
        let value = serde_json::to_value(&unhashed).map_err(|e| AuditRecordError::Canonicalization(e.to_string()))?;
        Ok(canonicalize(&value))
    }

    pub fn to_dict(&self) -> Value {
        serde_json::to_value(self).expect("AuditRecord always serializes")
    }

    /// Renders a plain-text report suitable for regulatory review: the
    /// header, every reasoning step, every finding, and a closing
    /// disclaimer.
    pub fn to_regulatory_report(&self) -> String {
        let mut report = String::new();
        report.push_str("=== AUDIT TRAIL REPORT ===\n");
        report.push_str(&format!("Audit ID: {}\n", self.audit_id));
        report.push_str(&format!("Company ID: {}\n", self.company_id));
        report.push_str(&format!("Created: {} by {}\n", self.created_at.to_rfc3339(), self.created_by));
        if let Some(hash) = &self.record_integrity_hash {
            report.push_str(&format!("Integrity Hash: {hash}\n"));
        }

        report.push_str("\n--- REASONING CHAIN ---\n");
        for (i, step) in self.reasoning_chain.iter().enumerate() {
            report.push_str(&format!("{}. [{}] {}\n", i + 1, step.timestamp.to_rfc3339(), step.step));
        }

        report.push_str("\n--- FINDINGS ---\n");
        for finding in &self.findings {
            report.push_str(&format!(
                "[{:?}] {} - {}\n",
                finding.severity, finding.issue, finding.details
            ));
        }

        report.push_str("\n--- ADJUSTING JOURNAL ENTRIES ---\n");
        for aje in &self.ajes {
            report.push_str(&format!("{}: {}\n", aje.aje_id, aje.description));
        }

        report.push_str("\n--- DISCLAIMER ---\n");
        report.push_str(
            "This report was generated by an automated audit system and is intended to support, \
             not replace, professional audit judgment. Findings should be independently verified \
             before being relied upon for regulatory or financial reporting purposes.\n",
        );

        report
    }
}

/// Recursively sorts object keys so the hash is stable regardless of
/// struct field order or HashMap iteration order.
fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let entries: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{:?}:{}", k, canonicalize(&map[k])))
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        Value::Array(items) => {
            let entries: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", entries.join(","))
        }
        other => other.to_string(),
    }
}

/// Manages the lifecycle of `AuditRecord`s across multiple concurrent
/// audits, keyed by audit id.
#[derive(Debug, Default)]
pub struct AuditTrail {
    records: HashMap<String, AuditRecord>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_record(&mut self, audit_id: impl Into<String>, company_id: impl Into<String>, created_by: Option<String>) -> &mut AuditRecord {
        let audit_id = audit_id.into();
        let mut record = AuditRecord::new(audit_id.clone(), company_id);
        if let Some(created_by) = created_by {
            record = record.with_created_by(created_by);
        }
        self.records.insert(audit_id.clone(), record);
        self.records.get_mut(&audit_id).expect("just inserted")
    }

    pub fn get_record(&self, audit_id: &str) -> Option<&AuditRecord> {
        self.records.get(audit_id)
    }

    pub fn get_record_mut(&mut self, audit_id: &str) -> Option<&mut AuditRecord> {
        self.records.get_mut(audit_id)
    }

    pub fn finalize_record(&mut self, audit_id: &str) -> Option<String> {
        self.records.get_mut(audit_id).and_then(|r| r.compute_integrity_hash().ok())
    }

    pub fn export_record(&self, audit_id: &str) -> Option<Value> {
        self.records.get(audit_id).map(|r| r.to_dict())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_has_python_defaults() {
        let record = AuditRecord::new("AUD-001", "COMP-001");
        assert_eq!(record.created_by, "system");
        assert_eq!(record.input_type, "synthetic");
        assert!(record.reasoning_chain.is_empty());
    }

    #[test]
    fn integrity_hash_is_64_char_hex_and_cached() {
        let mut record = AuditRecord::new("AUD-001", "COMP-001");
        record.add_reasoning_step("Test step");
        let hash = record.compute_integrity_hash().unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(record.record_integrity_hash, Some(hash));
    }

    #[test]
    fn hash_changes_with_content() {
        let mut r1 = AuditRecord::new("AUD-001", "COMP-001");
        r1.add_reasoning_step("Step A");
        let hash1 = r1.compute_integrity_hash().unwrap();

        let mut r2 = AuditRecord::new("AUD-001", "COMP-001");
        r2.add_reasoning_step("Step B");
        let hash2 = r2.compute_integrity_hash().unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn hash_is_reproducible_for_same_content() {
        let mut record = AuditRecord::new("AUD-001", "COMP-001");
        record.add_reasoning_step("Test step");
        let hash1 = record.compute_integrity_hash().unwrap();
        let hash2 = record.compute_integrity_hash().unwrap();
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn regulatory_report_contains_required_sections() {
        let mut record = AuditRecord::new("AUD-001", "COMP-001");
        record.add_reasoning_step("Started audit");
        let report = record.to_regulatory_report();
        assert!(report.contains("AUDIT TRAIL REPORT"));
        assert!(report.contains("AUD-001"));
        assert!(report.contains("COMP-001"));
        assert!(report.contains("REASONING CHAIN"));
        assert!(report.contains("FINDINGS"));
        assert!(report.contains("DISCLAIMER"));
    }

    #[test]
    fn trail_manager_lifecycle() {
        let mut trail = AuditTrail::new();
        trail.create_record("AUD-001", "COMP-001", None);
        assert!(trail.get_record("AUD-001").is_some());
        assert!(trail.get_record("NONEXISTENT").is_none());

        let hash = trail.finalize_record("AUD-001");
        assert!(hash.is_some());
        assert_eq!(hash.unwrap().len(), 64);

        assert!(trail.export_record("AUD-001").is_some());
        assert!(trail.export_record("NONEXISTENT").is_none());
    }

    #[test]
    fn multiple_records_are_independently_tracked() {
        let mut trail = AuditTrail::new();
        trail.create_record("AUD-001", "COMP-001", None);
        trail.create_record("AUD-002", "COMP-002", None);
        trail.create_record("AUD-003", "COMP-001", None);
        assert!(trail.get_record("AUD-001").is_some());
        assert!(trail.get_record("AUD-002").is_some());
        assert!(trail.get_record("AUD-003").is_some());
    }
}
