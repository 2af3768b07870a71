//! Storage notification endpoint.
//!
//! The status code is the only thing the delivery system sees: 204 acks the
//! delivery, 500 asks for redelivery. Error text stays in the logs.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use finpipe_core::{RunContext, ToolRunner};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::metrics::{EVENTS_TOTAL, INFRA_ERROR};
use crate::state::AppState;

/// CloudEvents binary-mode type header.
pub const CE_TYPE_HEADER: &str = "ce-type";

pub async fn receive_event<R: ToolRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let delivery_id = Uuid::new_v4();
    let ce_type = headers
        .get(CE_TYPE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .trim()
        .to_string();

    let span = info_span!("delivery", %delivery_id, ce_type = %ce_type);
    async move {
        // Cancelled when the handler future is dropped, e.g. on disconnect.
        let ctx = RunContext::background().with_timeout(state.config().pipeline.run_timeout());
        let _cancel_on_drop = ctx.cancellation_token().clone().drop_guard();

        match state
            .orchestrator()
            .handle_event(&ctx, &ce_type, &body)
            .await
        {
            Ok(outcome) => {
                EVENTS_TOTAL.with_label_values(&[outcome.label()]).inc();
                info!(outcome = outcome.label(), run_id = ?outcome.run_id(), "Delivery acknowledged");
                StatusCode::NO_CONTENT
            }
            Err(e) => {
                EVENTS_TOTAL.with_label_values(&[INFRA_ERROR]).inc();
                if e.is_cancellation() {
                    warn!(error = %e, "Delivery interrupted");
                } else {
                    error!(error = %e, "Delivery failed");
                }
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
    .instrument(span)
    .await
}
