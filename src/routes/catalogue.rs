use axum::{routing::post, Json, Router};
use serde::Deserialize;
use tracing::info;

use super::AppState;
use crate::{build_catalogue, Catalogue, CatalogueEntry, CatalogueFilter, CropWithoutPlan};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/crop/catalogue", post(handler))
}

/// Body of `POST /crop/catalogue`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogueRequest {
    entries: Vec<CatalogueEntry>,
    #[serde(default)]
    without_plan: Vec<CropWithoutPlan>,
    #[serde(default)]
    filter: CatalogueFilter,
}

async fn handler(Json(req): Json<CatalogueRequest>) -> Json<Catalogue> {
    // ---
    info!(
        "POST /crop/catalogue - {} entries, {} without plan",
        req.entries.len(),
        req.without_plan.len()
    );

    let catalogue = build_catalogue(req.entries, req.without_plan, &req.filter);
    info!("Returning {} catalogue entries", catalogue.crop_catalogue.len());
    Json(catalogue)
}
