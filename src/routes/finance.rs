use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use chrono::{NaiveDate, Utc, Weekday};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::AppState;
use crate::{revenue_report, RangeSelection, RevenueType, Sale};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/finance/revenue", post(handler))
}

fn default_week_start() -> Weekday {
    Weekday::Sun
}

/// Body of `POST /finance/revenue`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevenueRequest {
    sales: Vec<Sale>,
    revenue_types: Vec<RevenueType>,
    range: RangeSelection,
    /// Reference day for preset ranges; defaults to today (UTC).
    today: Option<NaiveDate>,
    #[serde(default = "default_week_start")]
    week_start: Weekday,
}

async fn handler(Json(req): Json<RevenueRequest>) -> impl IntoResponse {
    // ---
    info!(
        "POST /finance/revenue - {} sales, range {:?}",
        req.sales.len(),
        req.range.option
    );

    let today = req.today.unwrap_or_else(|| Utc::now().date_naive());
    let range = match req.range.resolve(today, req.week_start) {
        Ok(range) => range,
        Err(e) => {
            warn!("Rejected revenue range: {}", e);
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
                .into_response();
        }
    };

    let report = revenue_report(&req.sales, &range, &req.revenue_types);
    info!(
        "Revenue {} over {} sales between {} and {}",
        report.total,
        report.sales.len(),
        range.from,
        range.to
    );
    (StatusCode::OK, Json(report)).into_response()
}
