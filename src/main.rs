//! Service daemon: resolve once, print the situation report, then keep the
//! background refresh timer running until ctrl-c.

use std::sync::Arc;

use aqmon_service::cache::FileStore;
use aqmon_service::config::ServiceConfig;
use aqmon_service::forecast::{ForecastService, LinearProjector};
use aqmon_service::ingest::waqi::WaqiClient;
use aqmon_service::logging::{self, DataSource, LogLevel};
use aqmon_service::pipeline::AqiPipeline;
use aqmon_service::wards;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    logging::init_logger(LogLevel::Info, Some("aqmon.log"));

    let config = ServiceConfig::load("aqmon.toml");
    let forecast_ttl = config.forecast_ttl_minutes;

    let client = match WaqiClient::new(ServiceConfig::api_token(), config.request_timeout_secs) {
        Ok(client) => client,
        Err(e) => {
            logging::error(DataSource::System, None, &format!("failed to build HTTP client: {}", e));
            std::process::exit(1);
        }
    };

    let pipeline = Arc::new(AqiPipeline::new(client, FileStore::new("./data"), config));
    let forecasts = ForecastService::new(LinearProjector, forecast_ttl);

    // Initial aggregation, then the one-shot forecast advisory seeded from
    // the resolved index.
    let live = pipeline.fetch_city_aqi().await;
    let history: Vec<f64> = pipeline
        .historical_context(live.aqi)
        .iter()
        .map(|p| p.aqi as f64)
        .collect();
    let slope = pipeline.calculate_trend_slope(&history);
    let predictions = forecasts.predict(live.aqi, slope).await;

    println!("─────────────────────────────────────────────");
    println!("{}: AQI {} ({})", live.city_name, live.aqi, live.status);
    println!("Dominant pollutant: {}", live.dominant_pollutant);
    println!("Trend: {:?}  Prediction: {:?}", live.intelligence.trend, live.intelligence.prediction);
    println!("Exposure limit: {}", live.intelligence.exposure);
    println!("{}", live.intelligence.grap.label);
    println!("─────────────────────────────────────────────");
    for prediction in &predictions {
        println!(
            "  +{:>2}h  AQI {:>3}  {}  (confidence {:.0}%)",
            prediction.horizon_hours,
            prediction.aqi,
            prediction.risk,
            prediction.confidence * 100.0
        );
    }
    println!("─────────────────────────────────────────────");
    for ward in wards::refresh_wards(&pipeline.station_snapshot().await) {
        println!("  {:<16} {:<12} AQI {:>3}  {}", ward.name, ward.region, ward.aqi, ward.status);
    }
    println!("─────────────────────────────────────────────");

    pipeline.start();
    logging::info(
        DataSource::System,
        None,
        &format!("refresh timer running every {} s, ctrl-c to stop", pipeline.config().refresh_interval_secs),
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        logging::error(DataSource::System, None, &format!("signal listener failed: {}", e));
    }
    pipeline.stop();
    logging::info(DataSource::System, None, "refresh timer cancelled, shutting down");
}
