//! Reporting service for dealership analytics and data export
//! Provides movement summaries, PDI turnaround, stock snapshots and aging

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::DateRange;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::BusinessConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    collect_domain, generate_report, Capability, MovementRow, Report, ReportInput, ReportSection,
    RequestContext,
};
use crate::services::store;

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
    business: BusinessConfig,
}

/// Report filter parameters
#[derive(Debug, Deserialize)]
pub struct ReportFilter {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Narrow the caller's scope to one branch
    pub branch_id: Option<Uuid>,
}

const MOVEMENT_COLUMNS: &str = "id, kind, branch_id, counterpart_branch_id, vehicle_id, chassis_no, \
     model, variant, color, reference, business_date, recorded_at";

impl ReportingService {
    pub fn new(db: PgPool, business: BusinessConfig) -> Self {
        Self { db, business }
    }

    /// Build every report section over the range. Read-only: runs on a plain connection
    /// and never writes.
    pub async fn generate(&self, ctx: &RequestContext, filter: &ReportFilter) -> AppResult<Report> {
        ctx.require(Capability::ViewReports)?;
        let range = DateRange::new(filter.start_date, filter.end_date)?;
        let scope = ctx.narrowed_to(filter.branch_id)?;
        let clock = self.business.clock()?;

        let mut conn = self.db.acquire().await?;
        let sql = format!(
            r#"
            SELECT {} FROM inventory_movements
            WHERE branch_id = ANY($1) AND business_date BETWEEN $2 AND $3
            ORDER BY recorded_at
            "#,
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(scope.ids())
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&mut *conn)
            .await?;
        let movements = collect_domain(rows, MovementRow::into_domain)?;
        let vehicles = store::vehicles_in_scope(&mut conn, &scope).await?;
        let sales = store::sales_in_scope(&mut conn, &scope).await?;

        let input = ReportInput {
            movements: &movements,
            vehicles: &vehicles,
            sales: &sales,
        };
        let as_of = clock.business_date(Utc::now());
        let report = generate_report(range, &scope, input, as_of, clock);

        tracing::debug!(
            start = %range.start,
            end = %range.end,
            branches = scope.len(),
            movements = movements.len(),
            "Report generated"
        );
        Ok(report)
    }

    /// One section of a report as CSV
    pub fn section_csv(report: &Report, section: ReportSection) -> AppResult<String> {
        match section {
            ReportSection::MovementSummary => Self::export_to_csv(&report.movement_summary),
            ReportSection::Turnaround => Self::export_to_csv(&report.turnaround),
            ReportSection::Snapshot => Self::export_to_csv(&report.snapshot),
            ReportSection::SalesByModel => Self::export_to_csv(&report.sales_by_model),
            ReportSection::TransferSummary => Self::export_to_csv(&report.transfer_summary),
            ReportSection::InwardTrend => Self::export_to_csv(&report.inward_trend),
            ReportSection::Aging => Self::export_to_csv(&report.aging),
        }
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgingBucket, AgingRow, MovementSummaryRow};

    #[test]
    fn test_export_to_csv_writes_header_and_rows() {
        let branch_id = Uuid::nil();
        let rows = vec![MovementSummaryRow {
            branch_id,
            inward_oem: 3,
            inward_transfer: 1,
            outward_transfer: 2,
            sales: 1,
            deliveries: 0,
        }];

        let csv = ReportingService::export_to_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("branch_id,inward_oem,inward_transfer,outward_transfer,sales,deliveries")
        );
        assert_eq!(lines.next(), Some(format!("{},3,1,2,1,0", branch_id).as_str()));
    }

    #[test]
    fn test_aging_bucket_renders_label_in_csv() {
        let rows = vec![AgingRow {
            branch_id: Uuid::nil(),
            bucket: AgingBucket::Over90,
            vehicles: 4,
        }];

        let csv = ReportingService::export_to_csv(&rows).unwrap();
        assert!(csv.contains(",90+,4"));
    }

    #[test]
    fn test_export_empty_section() {
        let rows: Vec<MovementSummaryRow> = Vec::new();
        assert_eq!(ReportingService::export_to_csv(&rows).unwrap(), "");
    }
}
