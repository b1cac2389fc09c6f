/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of an associate record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociateStatus {
    Active,
    Inactive,
}

impl AssociateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociateStatus::Active => "active",
            AssociateStatus::Inactive => "inactive",
        }
    }

    /// Accepts the stored spelling plus the Portuguese words admins type in searches.
    pub fn from_loose(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "active" | "ativo" | "ativa" | "ativos" | "ativas" => Some(AssociateStatus::Active),
            "inactive" | "inativo" | "inativa" | "inativos" | "inativas" => Some(AssociateStatus::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for AssociateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssociateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_loose(s).ok_or_else(|| format!("unknown associate status: {}", s))
    }
}
