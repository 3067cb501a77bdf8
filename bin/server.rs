// Personal Ledger - Web Server
// JSON read models and the narrow write surface over one shared ledger

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use personal_ledger::{
    calendar, Account, Budget, Category, Ledger, LedgerConfig, LedgerError, Rule, SimpleEntry,
    Transaction, TransactionFilter,
};

const ENV_SERVER_ADDR: &str = "LEDGER_SERVER_ADDR";

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Ledger>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Ledger failure mapped onto an HTTP status
struct ApiError(StatusCode, String);

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let status = match &e {
            LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
            LedgerError::InUse { .. } => StatusCode::CONFLICT,
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %e, "ledger request failed");
        }
        ApiError(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ApiResponse::<()>::err(self.1))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Run `work` with exclusive access to the ledger
fn with_ledger<T, F>(state: &AppState, work: F) -> ApiResult<T>
where
    F: FnOnce(&mut Ledger) -> personal_ledger::Result<T>,
{
    let mut ledger = state.db.lock().map_err(|_| {
        ApiError(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ledger lock poisoned".to_string(),
        )
    })?;
    let data = work(&mut ledger)?;
    Ok(Json(ApiResponse::ok(data)))
}

// ============================================================================
// Query parameters
// ============================================================================

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct MonthsQuery {
    months: Option<u32>,
}

#[derive(Deserialize)]
struct PeriodQuery {
    month: Option<u32>,
    year: Option<i32>,
}

#[derive(Deserialize)]
struct RangeQuery {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/dashboard
async fn get_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    with_ledger(&state, |ledger| ledger.dashboard_stats())
}

/// GET /api/accounts - Accounts with derived balances
async fn get_accounts(State(state): State<AppState>) -> impl IntoResponse {
    with_ledger(&state, |ledger| ledger.account_summaries())
}

/// POST /api/accounts
async fn create_account(
    State(state): State<AppState>,
    Json(mut account): Json<Account>,
) -> impl IntoResponse {
    with_ledger(&state, |ledger| {
        ledger.create_account(&mut account)?;
        Ok(account)
    })
}

/// DELETE /api/accounts/:id
async fn delete_account(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    with_ledger(&state, |ledger| ledger.delete_account(id))
}

/// GET /api/categories
async fn get_categories(State(state): State<AppState>) -> impl IntoResponse {
    with_ledger(&state, |ledger| ledger.list_categories())
}

/// POST /api/categories
async fn create_category(
    State(state): State<AppState>,
    Json(mut category): Json<Category>,
) -> impl IntoResponse {
    with_ledger(&state, |ledger| {
        ledger.create_category(&mut category)?;
        Ok(category)
    })
}

/// DELETE /api/categories/:id
async fn delete_category(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    with_ledger(&state, |ledger| ledger.delete_category(id))
}

/// GET /api/budgets?month=&year= - Progress for a month (default: current)
async fn get_budget_progress(
    State(state): State<AppState>,
    Query(period): Query<PeriodQuery>,
) -> impl IntoResponse {
    let current = calendar::CalendarMonth::containing(calendar::today());
    let month = period.month.unwrap_or(current.month);
    let year = period.year.unwrap_or(current.year);
    with_ledger(&state, |ledger| ledger.budget_progress(month, year))
}

/// POST /api/budgets
async fn create_budget(
    State(state): State<AppState>,
    Json(mut budget): Json<Budget>,
) -> impl IntoResponse {
    with_ledger(&state, |ledger| {
        ledger.create_budget(&mut budget)?;
        Ok(budget)
    })
}

/// GET /api/rules
async fn get_rules(State(state): State<AppState>) -> impl IntoResponse {
    with_ledger(&state, |ledger| ledger.list_rules())
}

/// POST /api/rules
async fn create_rule(
    State(state): State<AppState>,
    Json(mut rule): Json<Rule>,
) -> impl IntoResponse {
    with_ledger(&state, |ledger| {
        ledger.create_rule(&mut rule)?;
        Ok(rule)
    })
}

/// GET /api/transactions?limit= - Most recent first
async fn get_transactions(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50);
    with_ledger(&state, |ledger| ledger.get_recent_transactions(limit))
}

/// GET /api/transactions/search?text=&start=&end=&min_amount=&max_amount=&limit=
async fn search_transactions(
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
) -> impl IntoResponse {
    with_ledger(&state, |ledger| ledger.search_transactions(&filter))
}

/// GET /api/transactions/:id
async fn get_transaction(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    with_ledger(&state, |ledger| {
        ledger
            .get_transaction(id)?
            .ok_or_else(|| LedgerError::not_found("transaction", id))
    })
}

/// POST /api/transactions - Post a balanced transaction
async fn post_transaction(
    State(state): State<AppState>,
    Json(mut tx): Json<Transaction>,
) -> impl IntoResponse {
    with_ledger(&state, |ledger| {
        ledger.post_transaction(&mut tx)?;
        Ok(tx)
    })
}

/// PUT /api/transactions/:id
async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut tx): Json<Transaction>,
) -> impl IntoResponse {
    tx.id = Some(id);
    with_ledger(&state, |ledger| {
        ledger.update_transaction(&mut tx)?;
        Ok(tx)
    })
}

/// DELETE /api/transactions/:id
async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    with_ledger(&state, |ledger| ledger.delete_transaction(id))
}

/// POST /api/entries - Simple income/expense entry
async fn record_entry(
    State(state): State<AppState>,
    Json(entry): Json<SimpleEntry>,
) -> impl IntoResponse {
    with_ledger(&state, |ledger| ledger.record_simple_entry(&entry))
}

/// GET /api/breakdown?start=&end= - Spending by category (default: last 30 days)
async fn get_breakdown(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> impl IntoResponse {
    let end = range.end.unwrap_or_else(calendar::today);
    let start = range
        .start
        .unwrap_or_else(|| end - chrono::Duration::days(30));
    with_ledger(&state, |ledger| ledger.category_breakdown(start, end))
}

/// GET /api/monthly?months=
async fn get_monthly_stats(
    State(state): State<AppState>,
    Query(query): Query<MonthsQuery>,
) -> impl IntoResponse {
    let months = query.months.unwrap_or(6);
    with_ledger(&state, |ledger| ledger.monthly_stats(months))
}

/// GET /api/net-worth?months=
async fn get_net_worth_history(
    State(state): State<AppState>,
    Query(query): Query<MonthsQuery>,
) -> impl IntoResponse {
    let months = query.months.unwrap_or(12);
    with_ledger(&state, |ledger| ledger.net_worth_history(months))
}

/// GET /api/forecast?months=
async fn get_forecast(
    State(state): State<AppState>,
    Query(query): Query<MonthsQuery>,
) -> impl IntoResponse {
    let months = query.months.unwrap_or(6);
    with_ledger(&state, |ledger| ledger.project_net_worth(months))
}

/// GET /api/recurring
async fn get_recurring(State(state): State<AppState>) -> impl IntoResponse {
    with_ledger(&state, |ledger| ledger.detect_recurring_patterns())
}

/// GET /api/anomalies
async fn get_anomalies(State(state): State<AppState>) -> impl IntoResponse {
    with_ledger(&state, |ledger| ledger.detect_anomalies())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = LedgerConfig::from_env()?;
    let ledger = Ledger::open(&config)?;
    info!(path = %config.db_path.display(), "ledger opened");

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(ledger)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/dashboard", get(get_dashboard))
        .route("/accounts", get(get_accounts).post(create_account))
        .route("/accounts/:id", axum::routing::delete(delete_account))
        .route("/categories", get(get_categories).post(create_category))
        .route("/categories/:id", axum::routing::delete(delete_category))
        .route("/budgets", get(get_budget_progress).post(create_budget))
        .route("/rules", get(get_rules).post(create_rule))
        .route("/transactions", get(get_transactions).post(post_transaction))
        .route("/transactions/search", get(search_transactions))
        .route(
            "/transactions/:id",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
        .route("/entries", axum::routing::post(record_entry))
        .route("/breakdown", get(get_breakdown))
        .route("/monthly", get(get_monthly_stats))
        .route("/net-worth", get(get_net_worth_history))
        .route("/forecast", get(get_forecast))
        .route("/recurring", get(get_recurring))
        .route("/anomalies", get(get_anomalies))
        .with_state(state);

    // Build main router
    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let addr = env::var(ENV_SERVER_ADDR).unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
