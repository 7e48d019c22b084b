use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "kumoscan_views_incremented_total",
            Unit::Count,
            "Title and chapter views counted, labelled by entity."
        );
        describe_counter!(
            "kumoscan_counter_increment_failed_total",
            Unit::Count,
            "View counter increments that failed and were dropped, labelled by entity."
        );
        describe_counter!(
            "kumoscan_images_hosted_total",
            Unit::Count,
            "Images accepted by the external image host."
        );
        describe_counter!(
            "kumoscan_upload_compensations_total",
            Unit::Count,
            "Hosted images deleted again because their write was abandoned."
        );
        describe_counter!(
            "kumoscan_identity_rejections_total",
            Unit::Count,
            "Bearer tokens rejected by the identity provider."
        );
        describe_counter!(
            "kumoscan_rate_limited_total",
            Unit::Count,
            "Requests refused by the per-client rate limiter."
        );
    });
}
