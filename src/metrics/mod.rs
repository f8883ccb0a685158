//! Prometheus counters for allocation engine outcomes.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

use crate::errors::ServiceError;
use crate::models::ItemKind;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    static ref CONSUMPTIONS: IntCounter = IntCounter::new(
        "rollstock_consumptions_total",
        "Total number of consumption events registered"
    )
    .expect("metric can be created");
    static ref ITEMS_CREATED: IntCounterVec = IntCounterVec::new(
        Opts::new("rollstock_items_created_total", "Total number of items created"),
        &["kind"]
    )
    .expect("metric can be created");
    static ref OPERATION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "rollstock_operation_failures_total",
            "Total number of rejected or failed engine operations"
        ),
        &["operation", "kind"]
    )
    .expect("metric can be created");
    static ref REGISTERED: bool = register_all();
}

fn register_all() -> bool {
    let collectors: [Box<dyn prometheus::core::Collector>; 3] = [
        Box::new(CONSUMPTIONS.clone()),
        Box::new(ITEMS_CREATED.clone()),
        Box::new(OPERATION_FAILURES.clone()),
    ];
    collectors.into_iter().all(|collector| match REGISTRY.register(collector) {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Failed to register metric");
            false
        }
    })
}

fn ensure_registered() {
    lazy_static::initialize(&REGISTERED);
}

pub fn record_consumption() {
    ensure_registered();
    CONSUMPTIONS.inc();
}

pub fn record_item_created(kind: ItemKind) {
    ensure_registered();
    ITEMS_CREATED.with_label_values(&[kind.as_ref()]).inc();
}

pub fn record_failure(operation: &str, err: &ServiceError) {
    ensure_registered();
    OPERATION_FAILURES
        .with_label_values(&[operation, err.kind()])
        .inc();
}

pub fn consumption_count() -> u64 {
    CONSUMPTIONS.get()
}

pub fn failure_count(operation: &str, kind: &str) -> u64 {
    OPERATION_FAILURES.with_label_values(&[operation, kind]).get()
}

/// Renders every registered metric in the Prometheus text exposition format.
pub fn gather_text() -> String {
    ensure_registered();
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
