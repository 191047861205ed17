//! Prometheus metrics integration

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{
    opts, register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

use crate::models::Direction;

static HUBS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!("translator_hubs_created_total", "Total number of hubs opened"))
        .expect("Failed to create hubs created counter")
});

static HUBS_REUSED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "translator_hubs_reused_total",
        "Total number of requests answered with an existing hub"
    ))
    .expect("Failed to create hubs reused counter")
});

static HUBS_CLOSED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!("translator_hubs_closed_total", "Total number of hubs closed"))
        .expect("Failed to create hubs closed counter")
});

static HUBS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(opts!("translator_hubs_active", "Hubs currently tracked by the registry"))
        .expect("Failed to create active hubs gauge")
});

static MESSAGES_FORWARDED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "translator_messages_forwarded_total",
            "Messages forwarded between spokes"
        ),
        &["direction"]
    )
    .expect("Failed to create forwarded messages counter")
});

static REGISTRATION_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "translator_registration_failures_total",
        "Service registry requests that failed"
    ))
    .expect("Failed to create registration failures counter")
});

/// Initialize all metrics
pub fn init_metrics() {
    Lazy::force(&HUBS_CREATED_TOTAL);
    Lazy::force(&HUBS_REUSED_TOTAL);
    Lazy::force(&HUBS_CLOSED_TOTAL);
    Lazy::force(&HUBS_ACTIVE);
    Lazy::force(&MESSAGES_FORWARDED_TOTAL);
    Lazy::force(&REGISTRATION_FAILURES_TOTAL);
}

pub fn record_hub_opened() {
    HUBS_CREATED_TOTAL.inc();
}

pub fn record_hub_reused() {
    HUBS_REUSED_TOTAL.inc();
}

pub fn record_hub_closed() {
    HUBS_CLOSED_TOTAL.inc();
}

/// Set the number of hubs held by the registry
pub fn set_hubs_active(count: i64) {
    HUBS_ACTIVE.set(count);
}

pub fn record_message_forwarded(direction: Direction) {
    let label = match direction {
        Direction::ConsumerToProducer => "consumer_to_producer",
        Direction::ProducerToConsumer => "producer_to_consumer",
    };
    MESSAGES_FORWARDED_TOTAL.with_label_values(&[label]).inc();
}

pub fn record_registration_failure() {
    REGISTRATION_FAILURES_TOTAL.inc();
}

/// Prometheus metrics endpoint, mounted at the configured metrics path
pub async fn metrics_endpoint() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(format!("Failed to encode metrics: {}", e));
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(buffer)
}
