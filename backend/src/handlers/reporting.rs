//! Reporting handlers for analytics and data export

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};

use crate::error::AppResult;
use crate::middleware::Ctx;
use crate::models::{Report, ReportSection};
use crate::services::reporting::{ReportFilter, ReportingService};
use crate::AppState;

/// Full report over a date range
pub async fn get_report(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(filter): Query<ReportFilter>,
) -> AppResult<Json<Report>> {
    let service = ReportingService::new(state.db.clone(), state.config.business.clone());
    Ok(Json(service.generate(&ctx, &filter).await?))
}

/// One report section as a CSV download
pub async fn get_section_csv(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(section): Path<String>,
    Query(filter): Query<ReportFilter>,
) -> AppResult<impl IntoResponse> {
    let section: ReportSection = section.parse()?;
    let service = ReportingService::new(state.db.clone(), state.config.business.clone());
    let report = service.generate(&ctx, &filter).await?;
    let csv = ReportingService::section_csv(&report, section)?;

    let disposition = format!(
        "attachment; filename=\"{}_{}_{}.csv\"",
        section.as_str(),
        report.range.start.format("%Y%m%d"),
        report.range.end.format("%Y%m%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
