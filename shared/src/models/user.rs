//! User, role and capability models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A back-office user attached to a home branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: UserRole,
    pub branch_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fixed dealership roles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Owner,
    PdiManager,
    Mechanic,
    BranchStaff,
}

/// Operations a role may perform, checked at every core operation boundary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewStock,
    ReceiveInward,
    ManageTransfers,
    RecordSales,
    AssignPdi,
    CompletePdi,
    ConfirmDelivery,
    ViewReports,
    ManageBranches,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Owner => "owner",
            UserRole::PdiManager => "pdi_manager",
            UserRole::Mechanic => "mechanic",
            UserRole::BranchStaff => "branch_staff",
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            UserRole::Owner => &[
                ViewStock,
                ReceiveInward,
                ManageTransfers,
                RecordSales,
                AssignPdi,
                ConfirmDelivery,
                ViewReports,
                ManageBranches,
            ],
            UserRole::PdiManager => &[
                ViewStock,
                ReceiveInward,
                ManageTransfers,
                AssignPdi,
                ConfirmDelivery,
                ViewReports,
            ],
            // Mechanics only see their own queue and the stock needed to pick a chassis
            UserRole::Mechanic => &[ViewStock, CompletePdi],
            UserRole::BranchStaff => &[
                ViewStock,
                ReceiveInward,
                ManageTransfers,
                RecordSales,
                ConfirmDelivery,
            ],
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = crate::error::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(UserRole::Owner),
            "pdi_manager" => Ok(UserRole::PdiManager),
            "mechanic" => Ok(UserRole::Mechanic),
            "branch_staff" => Ok(UserRole::BranchStaff),
            other => Err(crate::error::DomainError::validation(
                "role",
                format!("unknown role '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Capability::ViewStock => "view_stock",
            Capability::ReceiveInward => "receive_inward",
            Capability::ManageTransfers => "manage_transfers",
            Capability::RecordSales => "record_sales",
            Capability::AssignPdi => "assign_pdi",
            Capability::CompletePdi => "complete_pdi",
            Capability::ConfirmDelivery => "confirm_delivery",
            Capability::ViewReports => "view_reports",
            Capability::ManageBranches => "manage_branches",
        };
        f.write_str(name)
    }
}
