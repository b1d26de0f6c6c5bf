use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use plant_diagnosis::Outcome;
use prometheus::Registry;

const DURATION_BOUNDARIES_MS: [f64; 12] = [
    10.0, 25.0, 50.0, 75.0, 100.0, 150.0, 250.0, 400.0, 600.0, 1000.0, 2000.0, 5000.0,
];

pub struct Metrics {
    request_counter: Counter<u64>,
    outcome_counter: Counter<u64>,
    prediction_duration: Histogram<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("diagnosis_server");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        let outcome_counter = meter
            .u64_counter("diagnosis_outcomes_total")
            .with_description("Pipeline results by outcome")
            .build();

        let prediction_duration = meter
            .u64_histogram("diagnosis_duration_ms")
            .with_boundaries(DURATION_BOUNDARIES_MS.to_vec())
            .with_description("Duration of validation and inference in milliseconds")
            .build();

        Ok(Metrics {
            request_counter,
            outcome_counter,
            prediction_duration,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = [KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_outcome(&self, outcome: Outcome, route: &str) {
        let attributes = [
            KeyValue::new("route", route.to_string()),
            KeyValue::new("outcome", outcome_label(outcome)),
        ];
        self.outcome_counter.add(1, &attributes);
    }

    pub fn record_prediction_duration(&self, duration_ms: u64, route: &str) {
        let attributes = [KeyValue::new("route", route.to_string())];
        self.prediction_duration.record(duration_ms, &attributes);
    }
}

fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Confident => "confident",
        Outcome::LowConfidence => "low_confidence",
        Outcome::Rejected => "rejected",
        Outcome::ServerError => "server_error",
    }
}
