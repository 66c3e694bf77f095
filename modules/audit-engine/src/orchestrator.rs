//! Phase scheduler (C7): drives the fixed 7-phase audit pipeline, wires the
//! host's callbacks, and enforces cooperative cancellation and resume.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::aje;
use crate::analyzers::{self, compliance_analyzer, Analyzer};
use crate::audit_record::AuditRecord;
use crate::error::OrchestratorError;
use crate::llm::LlmClient;
use crate::models::{AccountingStandard, Aje, AuditDataset, AuditOutcome, Finding, RiskLevelWire, RiskScore};
use crate::risk;

/// Checkpoint phase vocabulary, also used to resolve `resume_from`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Structural,
    Gaap,
    Anomaly,
    Fraud,
    AnalysisComplete,
    AiEnhance,
    Aje,
    QuotaExceeded,
}

impl Phase {
    /// The pipeline step (1-7) to resume at when a checkpoint records this
    /// phase as its last completed step.
    fn resume_step(self) -> u8 {
        match self {
            Phase::Structural => 2,
            Phase::Gaap | Phase::Anomaly | Phase::Fraud | Phase::AnalysisComplete => 5,
            Phase::AiEnhance => 6,
            Phase::Aje | Phase::QuotaExceeded => 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub findings: Option<Vec<Finding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ajes: Option<Vec<Aje>>,
}

pub struct ResumeFrom {
    pub phase: Phase,
    pub data: CheckpointData,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Finding,
    FindingEnhanced,
    Aje,
    RiskScore,
    ReasoningStep,
    GeminiInteraction,
}

/// The host-supplied hooks the orchestrator drives the pipeline through.
/// Kept as a trait (rather than bare closures) so tests can supply a mock
/// that records calls without standing up a real progress tracker.
#[async_trait]
pub trait Callbacks: Send + Sync {
    async fn progress(&self, message: &str, percent: f64, current_step: Option<u32>, total_steps: Option<u32>, step_name: Option<&str>);
    async fn data(&self, data_type: DataType, payload: serde_json::Value);
    async fn is_cancelled(&self) -> bool;
    async fn save_checkpoint(&self, phase: Phase, data: CheckpointData);
    async fn on_quota_exceeded(&self);
    async fn gemini_call(&self, purpose: &str, prompt: &str, response: &str, error: Option<&str>);
}

const TOTAL_STEPS: u32 = 7;
const MAX_ENRICHMENT_CONCURRENCY: usize = 5;

/// Runs the full 7-phase audit pipeline against `dataset`, recording every
/// reasoning step and LLM call into `record` and reporting through
/// `callbacks`. Returns a partial result with `cancelled=true` if
/// cancellation is observed at a phase boundary.
pub async fn run_full_audit(
    dataset: &AuditDataset,
    record: &mut AuditRecord,
    standard: AccountingStandard,
    llm: &dyn LlmClient,
    callbacks: &dyn Callbacks,
    resume_from: Option<ResumeFrom>,
) -> Result<AuditOutcome, OrchestratorError> {
    let (start_step, mut findings, mut ajes) = match resume_from {
        Some(resume) => {
            record.add_reasoning_step(format!("Resuming audit from phase {:?}", resume.phase));
            (resume.phase.resume_step(), resume.data.findings.unwrap_or_default(), resume.data.ajes.unwrap_or_default())
        }
        None => (1, Vec::new(), Vec::new()),
    };

    if start_step <= 1 {
        record.add_reasoning_step("Starting structural validation");
        let gl = dataset.gl.clone();
        let tb = dataset.tb.clone();
        let coa = dataset.coa.clone();
        let basis = dataset.metadata.basis;
        let structural_findings = tokio::task::spawn_blocking(move || {
            analyzers::structural::StructuralAnalyzer.analyze(&gl, &tb, &coa, basis)
        })
        .await
        .map_err(|e| crate::error::AnalyzerError::WorkerOffload(e.to_string()))??;

        for finding in &structural_findings {
            callbacks.data(DataType::Finding, serde_json::to_value(finding).expect("Finding serializes")).await;
            record.add_finding(finding.clone());
        }
        findings.extend(structural_findings);

        callbacks
            .progress("Structural validation complete", 10.0, Some(1), Some(TOTAL_STEPS), Some("Structural validation"))
            .await;

        if callbacks.is_cancelled().await {
            return Ok(cancel(record, callbacks, Phase::Structural, findings, ajes, standard).await);
        }
    }

    if start_step <= 4 {
        record.add_reasoning_step("Running compliance, anomaly, and fraud analyzers");
        let gl = dataset.gl.clone();
        let tb = dataset.tb.clone();
        let coa = dataset.coa.clone();
        let basis = dataset.metadata.basis;

        let compliance = {
            let (gl, tb, coa) = (gl.clone(), tb.clone(), coa.clone());
            tokio::task::spawn_blocking(move || compliance_analyzer(standard).analyze(&gl, &tb, &coa, basis))
        };
        let anomaly = {
            let (gl, tb, coa) = (gl.clone(), tb.clone(), coa.clone());
            tokio::task::spawn_blocking(move || analyzers::anomaly::AnomalyAnalyzer.analyze(&gl, &tb, &coa, basis))
        };
        let fraud = {
            let (gl, tb, coa) = (gl.clone(), tb.clone(), coa.clone());
            tokio::task::spawn_blocking(move || analyzers::fraud::FraudAnalyzer.analyze(&gl, &tb, &coa, basis))
        };

        let (compliance, anomaly, fraud) = tokio::join!(compliance, anomaly, fraud);
        let compliance = compliance.map_err(|e| crate::error::AnalyzerError::WorkerOffload(e.to_string()))??;
        let anomaly = anomaly.map_err(|e| crate::error::AnalyzerError::WorkerOffload(e.to_string()))??;
        let fraud = fraud.map_err(|e| crate::error::AnalyzerError::WorkerOffload(e.to_string()))??;

        for batch in [&compliance, &anomaly, &fraud] {
            for finding in batch {
                callbacks.data(DataType::Finding, serde_json::to_value(finding).expect("Finding serializes")).await;
                record.add_finding(finding.clone());
            }
        }
        findings.extend(compliance);
        findings.extend(anomaly);
        findings.extend(fraud);

        callbacks
            .progress("Compliance, anomaly, and fraud analysis complete", 50.0, Some(4), Some(TOTAL_STEPS), Some("Analysis complete"))
            .await;

        if callbacks.is_cancelled().await {
            return Ok(cancel(record, callbacks, Phase::AnalysisComplete, findings, ajes, standard).await);
        }
    }

    if start_step <= 5 {
        record.add_reasoning_step("Enriching findings with AI explanations");
        enrich_findings(&mut findings, llm, callbacks, record).await;

        callbacks
            .progress("AI enrichment complete", 75.0, Some(5), Some(TOTAL_STEPS), Some("AI enrichment"))
            .await;

        if callbacks.is_cancelled().await {
            return Ok(cancel(record, callbacks, Phase::AiEnhance, findings, ajes, standard).await);
        }
    }

    if start_step <= 6 {
        record.add_reasoning_step("Generating adjusting journal entries");
        let new_ajes = aje::generate_ajes(&findings, standard, dataset.gl.period_end, llm, record, |generated| {
            // `on_aje` fires synchronously; the async data callback is
            // invoked from the caller loop below instead so we can `await`.
            let _ = generated;
        })
        .await
        .map_err(OrchestratorError::Analyzer)?;

        for generated in &new_ajes {
            callbacks.data(DataType::Aje, serde_json::to_value(generated).expect("Aje serializes")).await;
            record.add_aje(generated.clone());
        }
        ajes.extend(new_ajes);

        callbacks
            .progress("AJE generation complete", 85.0, Some(6), Some(TOTAL_STEPS), Some("AJE generation"))
            .await;

        if callbacks.is_cancelled().await {
            return Ok(cancel(record, callbacks, Phase::Aje, findings, ajes, standard).await);
        }
    }

    record.add_reasoning_step("Calculating risk score");
    let risk_score = risk::calculate(&findings);
    callbacks.data(DataType::RiskScore, serde_json::to_value(&risk_score).expect("RiskScore serializes")).await;

    callbacks
        .progress("Audit complete", 100.0, Some(7), Some(TOTAL_STEPS), Some("Complete"))
        .await;

    info!(findings = findings.len(), ajes = ajes.len(), "audit complete");

    Ok(AuditOutcome { findings, ajes, risk_score, accounting_standard: standard, cancelled: false })
}

async fn cancel(
    record: &mut AuditRecord,
    callbacks: &dyn Callbacks,
    phase: Phase,
    findings: Vec<Finding>,
    ajes: Vec<Aje>,
    standard: AccountingStandard,
) -> AuditOutcome {
    warn!(?phase, "cancellation observed at phase boundary");
    record.add_reasoning_step(format!("Audit cancelled at phase {phase:?}"));
    callbacks
        .save_checkpoint(
            phase,
            CheckpointData { findings: Some(findings.clone()), ajes: Some(ajes.clone()) },
        )
        .await;

    AuditOutcome {
        findings,
        ajes,
        risk_score: RiskScore {
            overall_score: 0.0,
            risk_level: RiskLevelWire::Unknown,
            critical_count: 0,
            high_count: 0,
            medium_count: 0,
            low_count: 0,
            category_breakdown: Default::default(),
            requires_immediate_action: false,
            interpretation: "Audit cancelled before risk scoring completed".to_string(),
        },
        accounting_standard: standard,
        cancelled: true,
    }
}

/// Enriches every finding lacking an `ai_explanation` via the LLM, bounded
/// to `MAX_ENRICHMENT_CONCURRENCY` in-flight calls. Once a quota-exceeded
/// error is observed, remaining findings are marked skipped without
/// issuing further calls, and `on_quota_exceeded` fires exactly once.
async fn enrich_findings(findings: &mut [Finding], llm: &dyn LlmClient, callbacks: &dyn Callbacks, record: &mut AuditRecord) {
    let pending: Vec<usize> = findings.iter().enumerate().filter(|(_, f)| f.ai_explanation.is_none()).map(|(i, _)| i).collect();
    let total = pending.len();
    if total == 0 {
        return;
    }

    let semaphore = Arc::new(Semaphore::new(MAX_ENRICHMENT_CONCURRENCY));
    let quota_exceeded = Arc::new(AtomicBool::new(false));
    let quota_exceeded_notified = Arc::new(AtomicBool::new(false));
    let processed = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = pending
        .iter()
        .map(|&idx| {
            let finding = findings[idx].clone();
            let semaphore = semaphore.clone();
            let quota_exceeded = quota_exceeded.clone();
            let processed = processed.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                if quota_exceeded.load(Ordering::SeqCst) {
                    return (idx, EnrichmentOutcome::Skipped);
                }

                let prompt = format!(
                    "Explain this audit finding in one or two plain-language sentences for a non-accountant: \
                     {} — {}",
                    finding.issue, finding.details
                );
                let outcome = match llm
                    .generate(&prompt, "finding_explanation", crate::llm::DEFAULT_TEMPERATURE, crate::llm::DEFAULT_MAX_TOKENS)
                    .await
                {
                    Ok(response) => EnrichmentOutcome::Explained { text: response.text, interaction: response.interaction },
                    Err(err) if err.is_retryable() => {
                        quota_exceeded.store(true, Ordering::SeqCst);
                        EnrichmentOutcome::QuotaExceeded
                    }
                    Err(err) => EnrichmentOutcome::Failed { message: err.to_string() },
                };

                let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                let percent = 55.0 + 20.0 * (done as f64 / total.max(1) as f64);
                callbacks
                    .progress(
                        &format!("Enriched {done}/{total} findings"),
                        percent,
                        Some(5),
                        Some(TOTAL_STEPS),
                        Some("AI enrichment"),
                    )
                    .await;

                (idx, outcome)
            }
        })
        .collect();

    let results = futures::future::join_all(tasks).await;

    for (idx, outcome) in results {
        match outcome {
            EnrichmentOutcome::Explained { text, interaction } => {
                findings[idx].ai_explanation = Some(text.clone());
                callbacks
                    .gemini_call("finding_explanation", &truncate(&interaction.prompt_full, 500), &truncate(&interaction.response_full, 800), None)
                    .await;
                record.add_gemini_interaction(interaction);
                callbacks
                    .data(DataType::FindingEnhanced, serde_json::to_value(&findings[idx]).expect("Finding serializes"))
                    .await;
            }
            EnrichmentOutcome::QuotaExceeded => {
                findings[idx].ai_explanation = Some("AI explanation skipped — quota exceeded".to_string());
                if !quota_exceeded_notified.swap(true, Ordering::SeqCst) {
                    callbacks.on_quota_exceeded().await;
                }
            }
            EnrichmentOutcome::Skipped => {
                findings[idx].ai_explanation = Some("AI explanation skipped — quota exceeded".to_string());
            }
            EnrichmentOutcome::Failed { message } => {
                findings[idx].ai_explanation = Some(format!("AI unavailable: {message}"));
            }
        }
    }
}

enum EnrichmentOutcome {
    Explained { text: String, interaction: crate::models::GeminiInteraction },
    QuotaExceeded,
    Skipped,
    Failed { message: String },
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::LlmResponse;
    use crate::models::{Account, AccountType, ChartOfAccounts, CompanyMetadata, GeneralLedger, JournalEntry, NormalBalance, TrialBalance, TrialBalanceRow};
    use chrono::{NaiveDate, Utc};
    use std::sync::Mutex as StdMutex;

    struct MockLlm;

    #[async_trait]
    impl LlmClient for MockLlm {
        async fn generate(&self, _prompt: &str, purpose: &str, _temperature: f64, _max_tokens: u32) -> Result<LlmResponse, LlmError> {
            Ok(LlmResponse {
                text: "This finding means the books need review.".to_string(),
                interaction: crate::models::GeminiInteraction {
                    timestamp: Utc::now(),
                    purpose: purpose.to_string(),
                    prompt_full: "prompt".to_string(),
                    prompt_hash: "hash".to_string(),
                    response_full: "response".to_string(),
                    response_hash: "hash".to_string(),
                    model: "mock".to_string(),
                    error: None,
                },
            })
        }
    }

    struct NoopCallbacks {
        cancelled: StdMutex<bool>,
    }

    #[async_trait]
    impl Callbacks for NoopCallbacks {
        async fn progress(&self, _message: &str, _percent: f64, _current_step: Option<u32>, _total_steps: Option<u32>, _step_name: Option<&str>) {}
        async fn data(&self, _data_type: DataType, _payload: serde_json::Value) {}
        async fn is_cancelled(&self) -> bool {
            *self.cancelled.lock().unwrap()
        }
        async fn save_checkpoint(&self, _phase: Phase, _data: CheckpointData) {}
        async fn on_quota_exceeded(&self) {}
        async fn gemini_call(&self, _purpose: &str, _prompt: &str, _response: &str, _error: Option<&str>) {}
    }

    fn clean_dataset() -> AuditDataset {
        let period_end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        AuditDataset {
            metadata: CompanyMetadata {
                id: "C1".into(),
                name: "Acme".into(),
                industry: "tech".into(),
                basis: crate::models::AccountingBasis::Accrual,
                reporting_period: "2024-01".into(),
            },
            coa: ChartOfAccounts {
                accounts: vec![
                    Account { code: "1000".into(), name: "Cash".into(), account_type: AccountType::Asset, subtype: None, normal_balance: NormalBalance::Debit },
                    Account { code: "4000".into(), name: "Revenue".into(), account_type: AccountType::Revenue, subtype: None, normal_balance: NormalBalance::Credit },
                    Account { code: "6000".into(), name: "Expense".into(), account_type: AccountType::Expense, subtype: None, normal_balance: NormalBalance::Debit },
                ],
            },
            gl: GeneralLedger {
                company_id: "C1".into(),
                period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                period_end,
                entries: vec![
                    JournalEntry { entry_id: "E1".into(), date: period_end, account_code: "1000".into(), account_name: "Cash".into(), debit: 5_000.0, credit: 0.0, description: "sale".into(), vendor_or_customer: None },
                    JournalEntry { entry_id: "E1".into(), date: period_end, account_code: "4000".into(), account_name: "Revenue".into(), debit: 0.0, credit: 5_000.0, description: "sale".into(), vendor_or_customer: None },
                ],
            },
            tb: TrialBalance {
                period_end,
                rows: vec![
                    TrialBalanceRow { account_code: "1000".into(), account_name: "Cash".into(), debit: 5_000.0, credit: 0.0, beginning_balance: 0.0, ending_balance: 5_000.0 },
                    TrialBalanceRow { account_code: "4000".into(), account_name: "Revenue".into(), debit: 0.0, credit: 5_000.0, beginning_balance: 0.0, ending_balance: 5_000.0 },
                ],
                total_debits: 5_000.0,
                total_credits: 5_000.0,
            },
        }
    }

    #[tokio::test]
    async fn clean_dataset_produces_low_risk_outcome() {
        let dataset = clean_dataset();
        let mut record = AuditRecord::new("AUD-1", "C1");
        let llm = MockLlm;
        let callbacks = NoopCallbacks { cancelled: StdMutex::new(false) };

        let outcome = run_full_audit(&dataset, &mut record, AccountingStandard::Gaap, &llm, &callbacks, None)
            .await
            .unwrap();

        assert!(!outcome.cancelled);
        assert_eq!(outcome.risk_score.risk_level, RiskLevelWire::Low);
    }

    #[tokio::test]
    async fn cancellation_at_first_boundary_returns_partial_unknown_result() {
        let dataset = clean_dataset();
        let mut record = AuditRecord::new("AUD-1", "C1");
        let llm = MockLlm;
        let callbacks = NoopCallbacks { cancelled: StdMutex::new(true) };

        let outcome = run_full_audit(&dataset, &mut record, AccountingStandard::Gaap, &llm, &callbacks, None)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.risk_score.risk_level, RiskLevelWire::Unknown);
    }

    #[test]
    fn phase_resume_step_mapping_matches_checkpoint_vocabulary() {
        assert_eq!(Phase::Structural.resume_step(), 2);
        assert_eq!(Phase::Gaap.resume_step(), 5);
        assert_eq!(Phase::AnalysisComplete.resume_step(), 5);
        assert_eq!(Phase::AiEnhance.resume_step(), 6);
        assert_eq!(Phase::Aje.resume_step(), 7);
    }
}
