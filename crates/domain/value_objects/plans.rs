use serde::{Deserialize, Serialize};

/// Marketing bullet points shown on the pricing page. Stored as JSONB in the database.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct PlanFeatures(pub Vec<String>);

/// Hardware allotted to a server provisioned for a plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Percent of one core; 100 = one full core.
    pub cpu: i32,
    /// Memory in MiB.
    pub ram: i32,
    /// Disk in MiB.
    pub disk: i32,
    pub databases: i32,
    pub backups: i32,
}
