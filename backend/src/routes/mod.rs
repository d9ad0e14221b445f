//! Route definitions for the PDI Control Center

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/me", get(handlers::me))
        // Protected routes - branch hierarchy
        .nest("/branches", branch_routes())
        // Protected routes - stock, search and OEM inward
        .nest("/stock", stock_routes())
        // Protected routes - transfers between branches
        .nest("/transfers", transfer_routes())
        // Protected routes - sales and PDI workflow
        .nest("/sales", sales_routes())
        .nest("/pdi", pdi_routes())
        // Protected routes - reports
        .nest("/reports", report_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .nest("/auth", auth_routes())
        .merge(protected)
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
}

fn branch_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_branches).post(handlers::create_branch))
        .route("/scope", get(handlers::get_scope))
        .route("/:id/parent", put(handlers::move_branch))
}

fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_stock))
        .route("/search", get(handlers::search))
        .route("/locator", get(handlers::locate))
        .route("/master-data", get(handlers::get_master_data))
        .route("/overview", get(handlers::get_overview))
        .route("/inward", post(handlers::receive_inward))
}

fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_transfers).post(handlers::create_transfer))
        .route("/:id", get(handlers::get_transfer))
        .route("/:id/receive", post(handlers::receive_transfer))
        .route("/:id/receive-partial", post(handlers::receive_partial))
        .route("/:id/cancel", post(handlers::cancel_transfer))
}

fn sales_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::record_sale))
        .route("/:id", get(handlers::get_sale))
}

fn pdi_routes() -> Router<AppState> {
    Router::new()
        .route("/board", get(handlers::get_board))
        .route("/my-tasks", get(handlers::my_tasks))
        .route("/mechanics", get(handlers::list_mechanics))
        .route("/:vehicle_id/assign", post(handlers::assign))
        .route("/:vehicle_id/reassign", post(handlers::reassign))
        .route("/:vehicle_id/complete", post(handlers::complete))
        .route("/:vehicle_id/deliver", post(handlers::deliver))
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_report))
        .route("/:section/csv", get(handlers::get_section_csv))
}
