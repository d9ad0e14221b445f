//! Stock aggregation, search and lookup over a branch scope
//!
//! Everything here is a read-only derivation over vehicles (and their sales records) that the
//! caller already loaded for the scope. Rows outside the scope are ignored even if passed in.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BranchScope, PdiStatus, SalesRecord, Vehicle, VehicleStatus};
use crate::error::{DomainError, DomainResult};
use crate::validation::normalize_search_query;

/// Optional stock filters.
///
/// Model, variant and color are case-insensitive equality. Chassis, DC number and customer
/// name are case-insensitive substring matches; customer name is looked up through the
/// vehicle's sales record, so it never matches unsold stock.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockFilter {
    pub model: Option<String>,
    pub variant: Option<String>,
    pub color: Option<String>,
    pub chassis: Option<String>,
    pub customer_name: Option<String>,
    pub dc_number: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn eq_ci(value: &str, wanted: Option<&str>) -> bool {
    wanted.map_or(true, |w| value.eq_ignore_ascii_case(w))
}

fn contains_ci(value: Option<&str>, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(n) => value.map_or(false, |v| v.to_lowercase().contains(&n.to_lowercase())),
    }
}

impl StockFilter {
    pub fn is_empty(&self) -> bool {
        [
            &self.model,
            &self.variant,
            &self.color,
            &self.chassis,
            &self.customer_name,
            &self.dc_number,
        ]
        .into_iter()
        .all(|f| non_blank(f).is_none())
    }

    pub fn matches(&self, vehicle: &Vehicle, sale: Option<&SalesRecord>) -> bool {
        eq_ci(&vehicle.model, non_blank(&self.model))
            && eq_ci(&vehicle.variant, non_blank(&self.variant))
            && eq_ci(&vehicle.color, non_blank(&self.color))
            && contains_ci(Some(&vehicle.chassis_no), non_blank(&self.chassis))
            && contains_ci(vehicle.dc_number.as_deref(), non_blank(&self.dc_number))
            && contains_ci(
                sale.map(|s| s.customer_name.as_str()),
                non_blank(&self.customer_name),
            )
    }
}

/// Per-vehicle detail row behind a stock count
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockVehicle {
    pub vehicle_id: Uuid,
    pub chassis_no: String,
    pub engine_no: Option<String>,
    pub branch_id: Uuid,
    pub dc_number: Option<String>,
    pub load_reference: Option<String>,
    pub date_received: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColorStock {
    pub color: String,
    pub total: usize,
    pub by_branch: BTreeMap<Uuid, usize>,
    pub vehicles: Vec<StockVehicle>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantStock {
    pub variant: String,
    pub total: usize,
    pub colors: Vec<ColorStock>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelStock {
    pub model: String,
    pub total: usize,
    pub variants: Vec<VariantStock>,
}

/// In-stock counts grouped model -> variant -> color
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockView {
    pub total: usize,
    pub by_branch: BTreeMap<Uuid, usize>,
    pub models: Vec<ModelStock>,
}

fn sales_by_id(sales: &[SalesRecord]) -> HashMap<Uuid, &SalesRecord> {
    sales.iter().map(|s| (s.id, s)).collect()
}

/// Aggregate in-stock vehicles within `scope`
pub fn aggregate_stock(
    scope: &BranchScope,
    filter: &StockFilter,
    vehicles: &[Vehicle],
    sales: &[SalesRecord],
) -> StockView {
    let sales = sales_by_id(sales);
    let mut grouped: BTreeMap<&str, BTreeMap<&str, BTreeMap<&str, Vec<&Vehicle>>>> = BTreeMap::new();

    for vehicle in vehicles {
        if vehicle.status != VehicleStatus::InStock || !scope.contains(vehicle.branch_id) {
            continue;
        }
        let sale = vehicle.sale_id.and_then(|id| sales.get(&id).copied());
        if !filter.matches(vehicle, sale) {
            continue;
        }
        grouped
            .entry(&vehicle.model)
            .or_default()
            .entry(&vehicle.variant)
            .or_default()
            .entry(&vehicle.color)
            .or_default()
            .push(vehicle);
    }

    let mut view = StockView::default();
    for (model, variants) in grouped {
        let mut model_stock = ModelStock {
            model: model.to_string(),
            total: 0,
            variants: Vec::new(),
        };
        for (variant, colors) in variants {
            let mut variant_stock = VariantStock {
                variant: variant.to_string(),
                total: 0,
                colors: Vec::new(),
            };
            for (color, mut items) in colors {
                items.sort_by(|a, b| a.chassis_no.cmp(&b.chassis_no));
                let mut by_branch = BTreeMap::new();
                for v in &items {
                    *by_branch.entry(v.branch_id).or_insert(0) += 1;
                    *view.by_branch.entry(v.branch_id).or_insert(0) += 1;
                }
                variant_stock.total += items.len();
                variant_stock.colors.push(ColorStock {
                    color: color.to_string(),
                    total: items.len(),
                    by_branch,
                    vehicles: items
                        .into_iter()
                        .map(|v| StockVehicle {
                            vehicle_id: v.id,
                            chassis_no: v.chassis_no.clone(),
                            engine_no: v.engine_no.clone(),
                            branch_id: v.branch_id,
                            dc_number: v.dc_number.clone(),
                            load_reference: v.load_reference.clone(),
                            date_received: v.date_received,
                        })
                        .collect(),
                });
            }
            model_stock.total += variant_stock.total;
            model_stock.variants.push(variant_stock);
        }
        view.total += model_stock.total;
        view.models.push(model_stock);
    }
    view
}

// ============================================================================
// Search and Lookup
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VehicleHit {
    pub vehicle_id: Uuid,
    pub chassis_no: String,
    pub model: String,
    pub variant: String,
    pub color: String,
    pub branch_id: Uuid,
    pub status: VehicleStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaleHit {
    pub sale_id: Uuid,
    pub customer_name: String,
    pub chassis_no: String,
    pub dc_number: Option<String>,
    pub branch_id: Uuid,
    pub pdi_status: PdiStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResults {
    pub vehicles: Vec<VehicleHit>,
    pub sales: Vec<SaleHit>,
}

/// One free-text query across chassis, DC number and customer name, any status.
/// Each hit list is capped at `limit`.
pub fn universal_search(
    scope: &BranchScope,
    query: &str,
    vehicles: &[Vehicle],
    sales: &[SalesRecord],
    limit: usize,
) -> DomainResult<SearchResults> {
    let needle = normalize_search_query(query)?.to_lowercase();
    let hit = |value: Option<&str>| value.map_or(false, |v| v.to_lowercase().contains(&needle));

    let vehicle_hits = vehicles
        .iter()
        .filter(|v| scope.contains(v.branch_id))
        .filter(|v| hit(Some(&v.chassis_no)) || hit(v.dc_number.as_deref()))
        .take(limit)
        .map(|v| VehicleHit {
            vehicle_id: v.id,
            chassis_no: v.chassis_no.clone(),
            model: v.model.clone(),
            variant: v.variant.clone(),
            color: v.color.clone(),
            branch_id: v.branch_id,
            status: v.status,
        })
        .collect();

    let sale_hits = sales
        .iter()
        .filter(|s| scope.contains(s.branch_id))
        .filter(|s| {
            hit(Some(&s.customer_name)) || hit(Some(&s.chassis_no)) || hit(s.dc_number.as_deref())
        })
        .take(limit)
        .map(|s| SaleHit {
            sale_id: s.id,
            customer_name: s.customer_name.clone(),
            chassis_no: s.chassis_no.clone(),
            dc_number: s.dc_number.clone(),
            branch_id: s.branch_id,
            pdi_status: s.pdi_status,
        })
        .collect();

    Ok(SearchResults {
        vehicles: vehicle_hits,
        sales: sale_hits,
    })
}

/// Find vehicles in scope by chassis or attributes, whatever their status
pub fn locate_vehicles(
    scope: &BranchScope,
    filter: &StockFilter,
    vehicles: &[Vehicle],
    sales: &[SalesRecord],
) -> DomainResult<Vec<Vehicle>> {
    if filter.is_empty() {
        return Err(DomainError::validation(
            "filter",
            "give a chassis number or at least one attribute",
        ));
    }
    let sales = sales_by_id(sales);
    let mut found: Vec<Vehicle> = vehicles
        .iter()
        .filter(|v| scope.contains(v.branch_id))
        .filter(|v| filter.matches(v, v.sale_id.and_then(|id| sales.get(&id).copied())))
        .cloned()
        .collect();
    found.sort_by(|a, b| a.chassis_no.cmp(&b.chassis_no));
    Ok(found)
}

/// Distinct model -> variant -> colors catalogue, for dropdowns
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MasterData {
    pub models: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

pub fn master_data(scope: &BranchScope, vehicles: &[Vehicle]) -> MasterData {
    let mut data = MasterData::default();
    for v in vehicles.iter().filter(|v| scope.contains(v.branch_id)) {
        data.models
            .entry(v.model.clone())
            .or_default()
            .entry(v.variant.clone())
            .or_default()
            .insert(v.color.clone());
    }
    data
}

/// Dashboard counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockOverview {
    pub pdi_pending: usize,
    pub pdi_in_progress: usize,
    pub in_transit: usize,
    pub stock_on_hand: usize,
}

pub fn stock_overview(scope: &BranchScope, vehicles: &[Vehicle], sales: &[SalesRecord]) -> StockOverview {
    let mut overview = StockOverview::default();
    for v in vehicles.iter().filter(|v| scope.contains(v.branch_id)) {
        match v.status {
            VehicleStatus::InStock => overview.stock_on_hand += 1,
            VehicleStatus::InTransit => overview.in_transit += 1,
            _ => {}
        }
    }
    for s in sales.iter().filter(|s| scope.contains(s.branch_id)) {
        match s.pdi_status {
            PdiStatus::Pending => overview.pdi_pending += 1,
            PdiStatus::InProgress => overview.pdi_in_progress += 1,
            _ => {}
        }
    }
    overview
}
