//! Demo entry point: runs a full audit against a small built-in dataset and
//! prints the resulting findings, AJEs, and risk score.

use std::sync::Arc;

use async_trait::async_trait;
use audit_engine::audit_record::AuditRecord;
use audit_engine::config::Config;
use audit_engine::llm::GeminiClient;
use audit_engine::models::{
    Account, AccountType, AccountingBasis, AccountingStandard, AuditDataset, ChartOfAccounts,
    CompanyMetadata, GeneralLedger, JournalEntry, NormalBalance, TrialBalance, TrialBalanceRow,
};
use audit_engine::orchestrator::{self, CheckpointData, DataType, Phase};
use audit_engine::progress::ProgressTracker;
use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;

struct ProgressCallbacks {
    tracker: Arc<ProgressTracker>,
    operation_id: String,
}

#[async_trait]
impl orchestrator::Callbacks for ProgressCallbacks {
    async fn progress(&self, message: &str, percent: f64, current_step: Option<u32>, total_steps: Option<u32>, step_name: Option<&str>) {
        self.tracker
            .add_step(
                &self.operation_id,
                "info",
                message,
                serde_json::Value::Null,
                audit_engine::progress::StepUpdate {
                    progress_percent: Some(percent),
                    current_step,
                    total_steps,
                    step_name: step_name.map(|s| s.to_string()),
                },
            )
            .await;
    }

    async fn data(&self, data_type: DataType, payload: serde_json::Value) {
        self.tracker
            .add_step(
                &self.operation_id,
                "data",
                "data",
                serde_json::json!({ "data_type": data_type, "payload": payload }),
                Default::default(),
            )
            .await;
    }

    async fn is_cancelled(&self) -> bool {
        self.tracker.is_cancelled(&self.operation_id).await
    }

    async fn save_checkpoint(&self, phase: Phase, data: CheckpointData) {
        self.tracker
            .save_checkpoint(&self.operation_id, serde_json::json!({ "phase": phase, "data": data }))
            .await;
    }

    async fn on_quota_exceeded(&self) {
        self.tracker.set_quota_exceeded(&self.operation_id).await;
    }

    async fn gemini_call(&self, purpose: &str, prompt: &str, response: &str, error: Option<&str>) {
        self.tracker
            .add_step(
                &self.operation_id,
                "gemini_call",
                purpose,
                serde_json::json!({ "prompt": prompt, "response": response, "error": error }),
                Default::default(),
            )
            .await;
    }
}

fn sample_dataset() -> AuditDataset {
    let period_start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let period_end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

    AuditDataset {
        metadata: CompanyMetadata {
            id: "DEMO-1".to_string(),
            name: "Demo Retail Co".to_string(),
            industry: "retail".to_string(),
            basis: AccountingBasis::Accrual,
            reporting_period: "2024-01".to_string(),
        },
        coa: ChartOfAccounts {
            accounts: vec![
                Account { code: "1000".into(), name: "Cash".into(), account_type: AccountType::Asset, subtype: None, normal_balance: NormalBalance::Debit },
                Account { code: "4000".into(), name: "Sales Revenue".into(), account_type: AccountType::Revenue, subtype: None, normal_balance: NormalBalance::Credit },
                Account { code: "6000".into(), name: "Operating Expense".into(), account_type: AccountType::Expense, subtype: None, normal_balance: NormalBalance::Debit },
            ],
        },
        gl: GeneralLedger {
            company_id: "DEMO-1".to_string(),
            period_start,
            period_end,
            entries: vec![
                JournalEntry {
                    entry_id: "JE-1".into(),
                    date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                    account_code: "1000".into(),
                    account_name: "Cash".into(),
                    debit: 12_000.0,
                    credit: 0.0,
                    description: "Cash sale".into(),
                    vendor_or_customer: Some("Walk-in customer".into()),
                },
                JournalEntry {
                    entry_id: "JE-1".into(),
                    date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                    account_code: "4000".into(),
                    account_name: "Sales Revenue".into(),
                    debit: 0.0,
                    credit: 12_000.0,
                    description: "Cash sale".into(),
                    vendor_or_customer: Some("Walk-in customer".into()),
                },
                JournalEntry {
                    entry_id: "JE-2".into(),
                    date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                    account_code: "6000".into(),
                    account_name: "Operating Expense".into(),
                    debit: 6_500.0,
                    credit: 0.0,
                    description: "Uber rides to client site".into(),
                    vendor_or_customer: Some("Uber".into()),
                },
                JournalEntry {
                    entry_id: "JE-2".into(),
                    date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                    account_code: "1000".into(),
                    account_name: "Cash".into(),
                    debit: 0.0,
                    credit: 6_500.0,
                    description: "Uber rides to client site".into(),
                    vendor_or_customer: Some("Uber".into()),
                },
            ],
        },
        tb: TrialBalance {
            period_end,
            rows: vec![
                TrialBalanceRow { account_code: "1000".into(), account_name: "Cash".into(), debit: 12_000.0, credit: 6_500.0, beginning_balance: 0.0, ending_balance: 5_500.0 },
                TrialBalanceRow { account_code: "4000".into(), account_name: "Sales Revenue".into(), debit: 0.0, credit: 12_000.0, beginning_balance: 0.0, ending_balance: 12_000.0 },
                TrialBalanceRow { account_code: "6000".into(), account_name: "Operating Expense".into(), debit: 6_500.0, credit: 0.0, beginning_balance: 0.0, ending_balance: 6_500.0 },
            ],
            total_debits: 18_500.0,
            total_credits: 18_500.0,
        },
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("Starting audit engine demo run...");

    let config = Config::from_env().expect("failed to load configuration from environment");
    let llm = GeminiClient::new(
        config.llm_api_key.clone(),
        config.llm_model.clone(),
        config.llm_rate_limit_per_minute,
        config.llm_timeout_secs,
        config.llm_max_retries,
    );

    let dataset = sample_dataset();
    let mut record = AuditRecord::new("AUD-DEMO-1", &dataset.metadata.id);

    let tracker = Arc::new(ProgressTracker::new());
    let operation_id = "demo-audit".to_string();
    tracker.start_operation(&operation_id, "audit", 7).await;
    let callbacks = ProgressCallbacks { tracker: tracker.clone(), operation_id: operation_id.clone() };

    let outcome = orchestrator::run_full_audit(&dataset, &mut record, AccountingStandard::Gaap, &llm, &callbacks, None)
        .await
        .expect("audit pipeline failed");

    tracker.complete_operation(&operation_id, None).await;
    record.compute_integrity_hash().expect("record always serializes");

    tracing::info!(
        findings = outcome.findings.len(),
        ajes = outcome.ajes.len(),
        risk_level = ?outcome.risk_score.risk_level,
        "audit finished"
    );

    println!("{}", record.to_regulatory_report());
}
