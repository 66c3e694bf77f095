//! Rule analyzers (C1): pure, deterministic functions over a dataset that
//! emit findings. No analyzer performs I/O, reads the clock, or uses
//! randomness — every input they need is passed in explicitly.

pub mod anomaly;
pub mod compliance_gaap;
pub mod compliance_ifrs;
pub mod fraud;
pub mod structural;

use crate::error::AnalyzerError;
use crate::models::{AccountingBasis, AccountingStandard, ChartOfAccounts, Finding, GeneralLedger, TrialBalance};

/// Shared contract for the four analyzers.
pub trait Analyzer {
    fn analyze(
        &self,
        gl: &GeneralLedger,
        tb: &TrialBalance,
        coa: &ChartOfAccounts,
        basis: AccountingBasis,
    ) -> Result<Vec<Finding>, AnalyzerError>;
}

/// Dispatches to the GAAP or IFRS rule set based on the selected standard.
pub fn compliance_analyzer(standard: AccountingStandard) -> Box<dyn Analyzer + Send + Sync> {
    match standard {
        AccountingStandard::Gaap => Box::new(compliance_gaap::GaapAnalyzer),
        AccountingStandard::Ifrs => Box::new(compliance_ifrs::IfrsAnalyzer),
    }
}

/// Generates a short random-looking but deterministic-enough id for a
/// finding, matching the `PREFIX-xxxxxxxx` shape used throughout the
/// analyzers (`uuid::Uuid::new_v4()` truncated to its first 8 hex chars).
pub fn finding_id(prefix: &str) -> String {
    format!("{prefix}-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
}
