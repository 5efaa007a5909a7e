use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_NOT_FOUND: &str = "not_found";
pub const OUTCOME_ERROR: &str = "error";

static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Process-wide metrics registry, initialized on first use.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Token metrics
    pub token_exchanges: IntCounterVec,
    pub token_expiry_unix: IntGauge,

    // Bank call metrics
    pub bank_requests: IntCounterVec,
    pub bank_request_duration: HistogramVec,

    // Config/runtime
    pub config_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let metrics = Arc::new(Self {
            token_exchanges: IntCounterVec::new(
                Opts::new("token_exchanges_total", "Bearer assertion exchanges by outcome"),
                &["outcome"],
            )
            .expect("valid metric"),
            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Cached access token expiry timestamp")
                .expect("valid metric"),

            bank_requests: IntCounterVec::new(
                Opts::new("bank_requests_total", "Signed bank calls by operation and outcome"),
                &["operation", "outcome"],
            )
            .expect("valid metric"),
            bank_request_duration: HistogramVec::new(
                HistogramOpts::new("bank_request_duration_seconds", "Signed bank call duration seconds")
                    .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
                &["operation"],
            )
            .expect("valid metric"),

            config_errors: IntCounter::new("config_errors_total", "Settings parse errors").expect("valid metric"),
            up: IntGauge::new("up", "1 if service is healthy").expect("valid metric"),

            registry: Registry::new_custom(Some("billetgateway".into()), None).expect("valid registry"),
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(metrics.token_exchanges.clone()),
            Box::new(metrics.token_expiry_unix.clone()),
            Box::new(metrics.bank_requests.clone()),
            Box::new(metrics.bank_request_duration.clone()),
            Box::new(metrics.config_errors.clone()),
            Box::new(metrics.up.clone()),
        ];
        for collector in collectors {
            if let Err(e) = reg.register(collector) {
                tracing::error!("metric registration failed: {}", e);
            }
        }

        metrics
    }
}
