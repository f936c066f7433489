//! Crop catalogue shaping: filters, status summary and ordering.
//!
//! Entries are crop varieties with counts of their management plans by
//! status. Display names arrive already translated.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Plan statuses a catalogue can be filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Active,
    Planned,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueEntry {
    pub crop_id: String,
    pub crop_variety_id: String,
    pub crop_name: String,
    #[serde(default)]
    pub variety_name: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub active: u32,
    #[serde(default)]
    pub planned: u32,
    /// Completed or abandoned plans.
    #[serde(default)]
    pub past: u32,
    /// Whether the crop also has varieties without any plan.
    #[serde(default)]
    pub needs_plan: bool,
}

/// A crop variety without any management plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropWithoutPlan {
    pub crop_id: String,
    pub crop_variety_id: String,
    pub crop_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogueFilter {
    /// Case-insensitive substring of the crop or variety name.
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub locations: HashSet<String>,
    #[serde(default)]
    pub suppliers: HashSet<String>,
    #[serde(default)]
    pub statuses: HashSet<PlanStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub sum: u32,
    pub active: u32,
    pub planned: u32,
    pub past: u32,
    pub needs_plan: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalogue {
    pub crop_catalogue: Vec<CatalogueEntry>,
    pub filtered_crops_without_management_plan: Vec<CropWithoutPlan>,
    #[serde(flatten)]
    pub summary: StatusSummary,
}

/// Plan counts over the unfiltered catalogue.
pub fn status_summary(entries: &[CatalogueEntry], without_plan: &[CropWithoutPlan]) -> StatusSummary {
    // ---
    // Counts come from the request; saturate rather than overflow
    let mut summary = entries.iter().fold(StatusSummary::default(), |mut acc, e| {
        acc.active = acc.active.saturating_add(e.active);
        acc.planned = acc.planned.saturating_add(e.planned);
        acc.past = acc.past.saturating_add(e.past);
        acc
    });
    summary.needs_plan = u32::try_from(without_plan.len()).unwrap_or(u32::MAX);
    summary.sum = summary
        .active
        .saturating_add(summary.planned)
        .saturating_add(summary.past)
        .saturating_add(summary.needs_plan);
    summary
}

fn matches_search(search: &str, names: &[Option<&str>]) -> bool {
    // ---
    if search.is_empty() {
        return true;
    }
    let needle = search.to_lowercase();
    names
        .iter()
        .flatten()
        .any(|name| name.to_lowercase().contains(&needle))
}

/// Apply search, location and supplier filters. Empty selections keep everything.
pub fn filter_entries(entries: Vec<CatalogueEntry>, filter: &CatalogueFilter) -> Vec<CatalogueEntry> {
    // ---
    entries
        .into_iter()
        .filter(|e| matches_search(&filter.search, &[Some(e.crop_name.as_str()), e.variety_name.as_deref()]))
        .filter(|e| {
            filter.locations.is_empty()
                || e.location_id
                    .as_ref()
                    .is_some_and(|l| filter.locations.contains(l))
        })
        .filter(|e| {
            filter.suppliers.is_empty()
                || e.supplier
                    .as_ref()
                    .is_some_and(|s| filter.suppliers.contains(s))
        })
        .collect()
}

/// Keep only the selected statuses' counts, dropping entries left with none.
pub fn filter_by_status(entries: Vec<CatalogueEntry>, statuses: &HashSet<PlanStatus>) -> Vec<CatalogueEntry> {
    // ---
    if statuses.is_empty() {
        return entries;
    }
    entries
        .into_iter()
        .map(|mut e| {
            if !statuses.contains(&PlanStatus::Active) {
                e.active = 0;
            }
            if !statuses.contains(&PlanStatus::Planned) {
                e.planned = 0;
            }
            if !statuses.contains(&PlanStatus::Complete) {
                e.past = 0;
            }
            e
        })
        .filter(|e| e.active > 0 || e.planned > 0 || e.past > 0)
        .collect()
}

fn exactly_one_zero(a: u32, b: u32) -> bool {
    (a == 0) != (b == 0)
}

/// Entries with active plans first, then entries with planned ones, then by name.
pub fn compare_entries(a: &CatalogueEntry, b: &CatalogueEntry) -> Ordering {
    // ---
    if exactly_one_zero(a.active, b.active) {
        b.active.cmp(&a.active)
    } else if a.active == 0 && b.active == 0 && exactly_one_zero(a.planned, b.planned) {
        b.planned.cmp(&a.planned)
    } else {
        a.crop_name.cmp(&b.crop_name)
    }
}

/// Filter, sort and annotate a catalogue.
pub fn build_catalogue(
    entries: Vec<CatalogueEntry>,
    without_plan: Vec<CropWithoutPlan>,
    filter: &CatalogueFilter,
) -> Catalogue {
    // ---
    let summary = status_summary(&entries, &without_plan);

    let mut shaped = filter_by_status(filter_entries(entries, filter), &filter.statuses);
    shaped.sort_by(compare_entries);

    let mut without_plan: Vec<CropWithoutPlan> = without_plan
        .into_iter()
        .filter(|c| matches_search(&filter.search, &[Some(c.crop_name.as_str())]))
        .collect();
    without_plan.sort_by(|a, b| a.crop_name.cmp(&b.crop_name));

    let crops_needing_plan: HashSet<&str> = without_plan.iter().map(|c| c.crop_id.as_str()).collect();
    for entry in &mut shaped {
        entry.needs_plan = crops_needing_plan.contains(entry.crop_id.as_str());
    }

    let crops_with_plan: HashSet<&str> = shaped.iter().map(|e| e.crop_id.as_str()).collect();
    let filtered_crops_without_management_plan = without_plan
        .iter()
        .filter(|c| !crops_with_plan.contains(c.crop_id.as_str()))
        .cloned()
        .collect();

    Catalogue {
        crop_catalogue: shaped,
        filtered_crops_without_management_plan,
        summary,
    }
}
