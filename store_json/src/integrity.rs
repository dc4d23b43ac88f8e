//! Startup integrity check.

/// Summary of the consistency check run when a store is opened.
#[derive(Clone, Debug, Default)]
pub struct IntegrityReport {
    pub members: u64,
    pub transactions: u64,
    /// Disagreements found and repaired (balances re-derived from the log,
    /// torn log tail dropped).
    pub findings: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if nothing had to be repaired.
    pub fn is_healthy(&self) -> bool {
        self.findings.is_empty()
    }
}
