use crate::metrics::{CardinalityReport, MetricStore};
use axum::{Json, extract::Extension};
use std::sync::Arc;

/// Series counts per family, for operators watching cardinality limits.
pub async fn cardinality(
    Extension(store): Extension<Arc<MetricStore>>,
) -> Json<CardinalityReport> {
    Json(store.cardinality())
}
