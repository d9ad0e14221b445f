//! Row loading and persistence shared by the services
//!
//! Every function takes a `PgConnection` so callers can run them inside their own
//! transaction. Locking reads order rows by id so concurrent operations acquire row locks in
//! the same order.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    collect_domain, BranchRow, BranchScope, BranchTree, InventoryMovement, SalesRecord, SalesRow,
    User, UserRow, Vehicle, VehicleRow,
};

pub const VEHICLE_COLUMNS: &str = "id, chassis_no, engine_no, model, variant, color, branch_id, \
     status, dc_number, load_reference, sale_id, date_received, updated_at";

pub const SALES_COLUMNS: &str = "id, vehicle_id, chassis_no, engine_no, customer_name, \
     customer_phone, dc_number, branch_id, model, variant, color, pdi_status, \
     assigned_mechanic_id, sold_at, assigned_at, completed_at, delivered_at, updated_at";

pub const USER_COLUMNS: &str = "id, username, display_name, role, branch_id, is_active, created_at";

/// Load the whole branch hierarchy
pub async fn load_tree(conn: &mut PgConnection) -> AppResult<BranchTree> {
    let rows = sqlx::query_as::<_, BranchRow>(
        "SELECT id, code, name, parent_id, created_at FROM branches ORDER BY code",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(BranchTree::build(rows.into_iter().map(Into::into).collect())?)
}

pub async fn load_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<User> {
    let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
    sqlx::query_as::<_, UserRow>(&sql)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::Domain(shared::DomainError::UserNotFound(user_id.to_string())))?
        .into_domain()
}

pub async fn vehicles_in_scope(conn: &mut PgConnection, scope: &BranchScope) -> AppResult<Vec<Vehicle>> {
    let sql = format!(
        "SELECT {} FROM vehicles WHERE branch_id = ANY($1) ORDER BY chassis_no",
        VEHICLE_COLUMNS
    );
    let rows = sqlx::query_as::<_, VehicleRow>(&sql)
        .bind(scope.ids())
        .fetch_all(&mut *conn)
        .await?;
    collect_domain(rows, VehicleRow::into_domain)
}

pub async fn sales_in_scope(conn: &mut PgConnection, scope: &BranchScope) -> AppResult<Vec<SalesRecord>> {
    let sql = format!(
        "SELECT {} FROM sales_records WHERE branch_id = ANY($1) ORDER BY sold_at DESC",
        SALES_COLUMNS
    );
    let rows = sqlx::query_as::<_, SalesRow>(&sql)
        .bind(scope.ids())
        .fetch_all(&mut *conn)
        .await?;
    collect_domain(rows, SalesRow::into_domain)
}

/// Lock vehicles by id for the rest of the transaction
pub async fn lock_vehicles(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<Vec<Vehicle>> {
    let sql = format!(
        "SELECT {} FROM vehicles WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        VEHICLE_COLUMNS
    );
    let rows = sqlx::query_as::<_, VehicleRow>(&sql)
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
    collect_domain(rows, VehicleRow::into_domain)
}

/// Lock vehicles by normalized chassis number for the rest of the transaction
pub async fn lock_vehicles_by_chassis(
    conn: &mut PgConnection,
    chassis_numbers: &[String],
) -> AppResult<Vec<Vehicle>> {
    let sql = format!(
        "SELECT {} FROM vehicles WHERE chassis_no = ANY($1) ORDER BY id FOR UPDATE",
        VEHICLE_COLUMNS
    );
    let rows = sqlx::query_as::<_, VehicleRow>(&sql)
        .bind(chassis_numbers)
        .fetch_all(&mut *conn)
        .await?;
    collect_domain(rows, VehicleRow::into_domain)
}

pub async fn lock_sale(conn: &mut PgConnection, sale_id: Uuid) -> AppResult<SalesRecord> {
    let sql = format!("SELECT {} FROM sales_records WHERE id = $1 FOR UPDATE", SALES_COLUMNS);
    sqlx::query_as::<_, SalesRow>(&sql)
        .bind(sale_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::Domain(shared::DomainError::SaleNotFound(sale_id.to_string())))?
        .into_domain()
}

pub async fn insert_vehicle(conn: &mut PgConnection, v: &Vehicle) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO vehicles (id, chassis_no, engine_no, model, variant, color, branch_id,
                              status, dc_number, load_reference, sale_id, date_received, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(v.id)
    .bind(&v.chassis_no)
    .bind(&v.engine_no)
    .bind(&v.model)
    .bind(&v.variant)
    .bind(&v.color)
    .bind(v.branch_id)
    .bind(v.status.as_str())
    .bind(&v.dc_number)
    .bind(&v.load_reference)
    .bind(v.sale_id)
    .bind(v.date_received)
    .bind(v.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Write back the mutable vehicle fields
pub async fn update_vehicle(conn: &mut PgConnection, v: &Vehicle) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE vehicles
        SET branch_id = $2, status = $3, engine_no = $4, dc_number = $5, sale_id = $6,
            updated_at = $7
        WHERE id = $1
        "#,
    )
    .bind(v.id)
    .bind(v.branch_id)
    .bind(v.status.as_str())
    .bind(&v.engine_no)
    .bind(&v.dc_number)
    .bind(v.sale_id)
    .bind(v.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_sale(conn: &mut PgConnection, s: &SalesRecord) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales_records (id, vehicle_id, chassis_no, engine_no, customer_name,
                                   customer_phone, dc_number, branch_id, model, variant, color,
                                   pdi_status, sold_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(s.id)
    .bind(s.vehicle_id)
    .bind(&s.chassis_no)
    .bind(&s.engine_no)
    .bind(&s.customer_name)
    .bind(&s.customer_phone)
    .bind(&s.dc_number)
    .bind(s.branch_id)
    .bind(&s.model)
    .bind(&s.variant)
    .bind(&s.color)
    .bind(s.pdi_status.as_str())
    .bind(s.sold_at)
    .bind(s.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Write back the PDI workflow fields
pub async fn update_sale(conn: &mut PgConnection, s: &SalesRecord) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE sales_records
        SET pdi_status = $2, assigned_mechanic_id = $3, engine_no = $4, dc_number = $5,
            assigned_at = $6, completed_at = $7, delivered_at = $8, updated_at = $9
        WHERE id = $1
        "#,
    )
    .bind(s.id)
    .bind(s.pdi_status.as_str())
    .bind(s.assigned_mechanic_id)
    .bind(&s.engine_no)
    .bind(&s.dc_number)
    .bind(s.assigned_at)
    .bind(s.completed_at)
    .bind(s.delivered_at)
    .bind(s.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Append ledger entries
pub async fn insert_movements(conn: &mut PgConnection, movements: &[InventoryMovement]) -> AppResult<()> {
    for m in movements {
        sqlx::query(
            r#"
            INSERT INTO inventory_movements (id, kind, branch_id, counterpart_branch_id, vehicle_id,
                                             chassis_no, model, variant, color, reference,
                                             business_date, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(m.id)
        .bind(m.kind.as_str())
        .bind(m.branch_id)
        .bind(m.counterpart_branch_id)
        .bind(m.vehicle_id)
        .bind(&m.chassis_no)
        .bind(&m.model)
        .bind(&m.variant)
        .bind(&m.color)
        .bind(&m.reference)
        .bind(m.business_date)
        .bind(m.recorded_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
