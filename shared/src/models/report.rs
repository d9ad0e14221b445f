//! Report derivations
//!
//! Reports are computed from the movement ledger and the current vehicle and sales state.
//! Every function takes its inputs by shared reference and never mutates them.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BranchScope, InventoryMovement, MovementKind, SalesRecord, Vehicle, VehicleStatus};
use crate::error::DomainError;
use crate::types::{BusinessClock, DateRange};

/// Column label for per-group totals in pivoted sections
pub const TOTAL_LABEL: &str = "TOTAL";

/// Inward and outward counts for one branch over the range
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovementSummaryRow {
    pub branch_id: Uuid,
    pub inward_oem: u64,
    pub inward_transfer: u64,
    /// Outward transfers net of cancelled loads
    pub outward_transfer: u64,
    pub sales: u64,
    pub deliveries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnaroundRow {
    /// `None` on the all-branches row
    pub branch_id: Option<Uuid>,
    pub completed: u64,
    pub average_hours: Option<Decimal>,
    pub min_hours: Option<Decimal>,
    pub max_hours: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotRow {
    pub branch_id: Uuid,
    pub in_stock: u64,
    pub in_transit: u64,
    pub awaiting_pdi: u64,
    pub pdi_in_progress: u64,
    pub pdi_complete: u64,
}

/// One cell of a pivot: a model-variant (or `TOTAL`) quantity for a branch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SalesByModelRow {
    pub branch_id: Uuid,
    pub model_variant: String,
    pub quantity: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferSummaryRow {
    pub source_branch_id: Uuid,
    pub destination_branch_id: Uuid,
    pub model_variant: String,
    pub quantity: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InwardTrendRow {
    pub date: NaiveDate,
    pub loads: u64,
    pub vehicles: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgingBucket {
    #[serde(rename = "0-30")]
    UpTo30,
    #[serde(rename = "31-60")]
    UpTo60,
    #[serde(rename = "61-90")]
    UpTo90,
    #[serde(rename = "90+")]
    Over90,
}

impl AgingBucket {
    pub const ALL: [AgingBucket; 4] = [
        AgingBucket::UpTo30,
        AgingBucket::UpTo60,
        AgingBucket::UpTo90,
        AgingBucket::Over90,
    ];

    /// Buckets are closed on the left: day 30 is already "31-60".
    /// Negative ages (received after `as_of`) fall in no bucket.
    pub fn for_age(days: i64) -> Option<Self> {
        match days {
            d if d < 0 => None,
            d if d < 30 => Some(AgingBucket::UpTo30),
            d if d < 60 => Some(AgingBucket::UpTo60),
            d if d < 90 => Some(AgingBucket::UpTo90),
            _ => Some(AgingBucket::Over90),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgingBucket::UpTo30 => "0-30",
            AgingBucket::UpTo60 => "31-60",
            AgingBucket::UpTo90 => "61-90",
            AgingBucket::Over90 => "90+",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgingRow {
    pub branch_id: Uuid,
    pub bucket: AgingBucket,
    pub vehicles: u64,
}

/// Complete report over a date range and branch scope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    pub range: DateRange,
    pub as_of: NaiveDate,
    pub movement_summary: Vec<MovementSummaryRow>,
    pub turnaround: Vec<TurnaroundRow>,
    pub snapshot: Vec<SnapshotRow>,
    pub sales_by_model: Vec<SalesByModelRow>,
    pub transfer_summary: Vec<TransferSummaryRow>,
    pub inward_trend: Vec<InwardTrendRow>,
    pub aging: Vec<AgingRow>,
}

/// Tabular report sections, addressable for CSV export
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReportSection {
    MovementSummary,
    Turnaround,
    Snapshot,
    SalesByModel,
    TransferSummary,
    InwardTrend,
    Aging,
}

impl ReportSection {
    pub const ALL: [ReportSection; 7] = [
        ReportSection::MovementSummary,
        ReportSection::Turnaround,
        ReportSection::Snapshot,
        ReportSection::SalesByModel,
        ReportSection::TransferSummary,
        ReportSection::InwardTrend,
        ReportSection::Aging,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportSection::MovementSummary => "movement-summary",
            ReportSection::Turnaround => "turnaround",
            ReportSection::Snapshot => "snapshot",
            ReportSection::SalesByModel => "sales-by-model",
            ReportSection::TransferSummary => "transfer-summary",
            ReportSection::InwardTrend => "inward-trend",
            ReportSection::Aging => "aging",
        }
    }
}

impl std::fmt::Display for ReportSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportSection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportSection::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| DomainError::validation("section", format!("unknown report section '{}'", s)))
    }
}

/// Inputs a report is derived from
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub movements: &'a [InventoryMovement],
    pub vehicles: &'a [Vehicle],
    pub sales: &'a [SalesRecord],
}

pub fn generate_report(
    range: DateRange,
    scope: &BranchScope,
    input: ReportInput<'_>,
    as_of: NaiveDate,
    clock: BusinessClock,
) -> Report {
    let movements: Vec<&InventoryMovement> = input
        .movements
        .iter()
        .filter(|m| scope.contains(m.branch_id) && range.contains(m.business_date))
        .collect();

    Report {
        range,
        as_of,
        movement_summary: movement_summary(scope, &movements),
        turnaround: turnaround(range, scope, input.sales, clock),
        snapshot: snapshot(scope, input.vehicles),
        sales_by_model: sales_by_model(&movements),
        transfer_summary: transfer_summary(&movements),
        inward_trend: inward_trend(&movements),
        aging: aging(scope, input.vehicles, as_of),
    }
}

/// Load reference and vehicle of an outward dispatch or its reversal
fn dispatch_key(m: &InventoryMovement) -> (Option<&str>, Uuid) {
    (m.reference.as_deref(), m.vehicle_id)
}

/// Dispatches inside the window that a reversal inside the same window cancels.
///
/// A reversal whose dispatch falls outside the window nets nothing, so a load cancelled
/// the day after it left still counts as outward on the day it left.
fn reversed_dispatches<'a>(movements: &[&'a InventoryMovement]) -> HashSet<(Option<&'a str>, Uuid)> {
    let dispatched: HashSet<_> = movements
        .iter()
        .copied()
        .filter(|m| m.kind == MovementKind::OutwardTransfer)
        .map(dispatch_key)
        .collect();
    movements
        .iter()
        .copied()
        .filter(|m| m.kind == MovementKind::TransferReversal)
        .map(dispatch_key)
        .filter(|key| dispatched.contains(key))
        .collect()
}

fn movement_summary(scope: &BranchScope, movements: &[&InventoryMovement]) -> Vec<MovementSummaryRow> {
    let mut rows: BTreeMap<Uuid, MovementSummaryRow> = scope
        .iter()
        .map(|&id| {
            (
                id,
                MovementSummaryRow {
                    branch_id: id,
                    ..Default::default()
                },
            )
        })
        .collect();
    let reversed = reversed_dispatches(movements);

    for m in movements {
        let Some(row) = rows.get_mut(&m.branch_id) else {
            continue;
        };
        match m.kind {
            MovementKind::InwardOem => row.inward_oem += 1,
            MovementKind::InwardTransfer => row.inward_transfer += 1,
            MovementKind::OutwardTransfer if !reversed.contains(&dispatch_key(m)) => {
                row.outward_transfer += 1
            }
            MovementKind::OutwardTransfer | MovementKind::TransferReversal => {}
            MovementKind::Sale => row.sales += 1,
            MovementKind::Delivery => row.deliveries += 1,
        }
    }
    rows.into_values().collect()
}

fn hours(minutes: i64) -> Decimal {
    (Decimal::from(minutes) / Decimal::from(60)).round_dp(2)
}

fn turnaround_row(branch_id: Option<Uuid>, minutes: &[i64]) -> TurnaroundRow {
    let completed = minutes.len() as u64;
    let average_hours = if minutes.is_empty() {
        None
    } else {
        let total: i64 = minutes.iter().sum();
        Some((Decimal::from(total) / Decimal::from(minutes.len() as i64) / Decimal::from(60)).round_dp(2))
    };
    TurnaroundRow {
        branch_id,
        completed,
        average_hours,
        min_hours: minutes.iter().min().map(|&m| hours(m)),
        max_hours: minutes.iter().max().map(|&m| hours(m)),
    }
}

/// Assignment-to-completion time for PDIs completed inside the range
fn turnaround(
    range: DateRange,
    scope: &BranchScope,
    sales: &[SalesRecord],
    clock: BusinessClock,
) -> Vec<TurnaroundRow> {
    let mut by_branch: BTreeMap<Uuid, Vec<i64>> = BTreeMap::new();
    for record in sales.iter().filter(|s| scope.contains(s.branch_id)) {
        let (Some(completed_at), Some(elapsed)) = (record.completed_at, record.turnaround()) else {
            continue;
        };
        if range.contains(clock.business_date(completed_at)) {
            by_branch
                .entry(record.branch_id)
                .or_default()
                .push(elapsed.num_minutes());
        }
    }

    let all: Vec<i64> = by_branch.values().flatten().copied().collect();
    let mut rows: Vec<TurnaroundRow> = by_branch
        .iter()
        .map(|(&branch_id, minutes)| turnaround_row(Some(branch_id), minutes))
        .collect();
    rows.push(turnaround_row(None, &all));
    rows
}

/// Current stock position per branch in scope
fn snapshot(scope: &BranchScope, vehicles: &[Vehicle]) -> Vec<SnapshotRow> {
    let mut rows: BTreeMap<Uuid, SnapshotRow> = scope
        .iter()
        .map(|&id| {
            (
                id,
                SnapshotRow {
                    branch_id: id,
                    ..Default::default()
                },
            )
        })
        .collect();
    for v in vehicles {
        let Some(row) = rows.get_mut(&v.branch_id) else {
            continue;
        };
        match v.status {
            VehicleStatus::InStock => row.in_stock += 1,
            VehicleStatus::InTransit => row.in_transit += 1,
            VehicleStatus::Sold => row.awaiting_pdi += 1,
            VehicleStatus::PdiAssigned => row.pdi_in_progress += 1,
            VehicleStatus::PdiComplete => row.pdi_complete += 1,
            VehicleStatus::Delivered => {}
        }
    }
    rows.into_values().collect()
}

fn sales_by_model(movements: &[&InventoryMovement]) -> Vec<SalesByModelRow> {
    let mut pivot: BTreeMap<Uuid, BTreeMap<String, u64>> = BTreeMap::new();
    for m in movements.iter().filter(|m| m.kind == MovementKind::Sale) {
        *pivot
            .entry(m.branch_id)
            .or_default()
            .entry(m.model_variant())
            .or_insert(0) += 1;
    }

    let mut rows = Vec::new();
    for (branch_id, cells) in pivot {
        let total = cells.values().sum();
        rows.extend(cells.into_iter().map(|(model_variant, quantity)| SalesByModelRow {
            branch_id,
            model_variant,
            quantity,
        }));
        rows.push(SalesByModelRow {
            branch_id,
            model_variant: TOTAL_LABEL.to_string(),
            quantity: total,
        });
    }
    rows
}

/// Outward loads by destination and model-variant, net of cancellations
fn transfer_summary(movements: &[&InventoryMovement]) -> Vec<TransferSummaryRow> {
    let reversed = reversed_dispatches(movements);
    let mut pivot: BTreeMap<(Uuid, Uuid), BTreeMap<String, u64>> = BTreeMap::new();
    for m in movements
        .iter()
        .filter(|m| m.kind == MovementKind::OutwardTransfer && !reversed.contains(&dispatch_key(m)))
    {
        let Some(destination) = m.counterpart_branch_id else {
            continue;
        };
        *pivot
            .entry((m.branch_id, destination))
            .or_default()
            .entry(m.model_variant())
            .or_insert(0) += 1;
    }

    let mut rows = Vec::new();
    for ((source, destination), cells) in pivot {
        let total = cells.values().sum();
        rows.extend(cells.into_iter().map(|(model_variant, quantity)| TransferSummaryRow {
            source_branch_id: source,
            destination_branch_id: destination,
            model_variant,
            quantity,
        }));
        rows.push(TransferSummaryRow {
            source_branch_id: source,
            destination_branch_id: destination,
            model_variant: TOTAL_LABEL.to_string(),
            quantity: total,
        });
    }
    rows
}

/// Distinct OEM loads and vehicles received per business day
fn inward_trend(movements: &[&InventoryMovement]) -> Vec<InwardTrendRow> {
    let mut days: BTreeMap<NaiveDate, (BTreeSet<&str>, u64)> = BTreeMap::new();
    for m in movements.iter().filter(|m| m.kind == MovementKind::InwardOem) {
        let (loads, vehicles) = days.entry(m.business_date).or_default();
        if let Some(reference) = m.reference.as_deref() {
            loads.insert(reference);
        }
        *vehicles += 1;
    }
    days.into_iter()
        .map(|(date, (loads, vehicles))| InwardTrendRow {
            date,
            loads: loads.len() as u64,
            vehicles,
        })
        .collect()
}

/// Age of in-stock vehicles as of `as_of`
fn aging(scope: &BranchScope, vehicles: &[Vehicle], as_of: NaiveDate) -> Vec<AgingRow> {
    let mut counts: BTreeMap<(Uuid, AgingBucket), u64> = BTreeMap::new();
    for v in vehicles
        .iter()
        .filter(|v| v.status == VehicleStatus::InStock && scope.contains(v.branch_id))
    {
        let Some(bucket) = AgingBucket::for_age((as_of - v.date_received).num_days()) else {
            continue;
        };
        *counts.entry((v.branch_id, bucket)).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|((branch_id, bucket), vehicles)| AgingRow {
            branch_id,
            bucket,
            vehicles,
        })
        .collect()
}
