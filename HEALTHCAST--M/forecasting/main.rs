use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use shared_event_bus::FileEventPublisher;
use shared_logging::LogLevel;

use crate::{
    config::{CapacityTable, HealthCastConfig},
    forecaster::{ForecastSequence, RecursiveForecaster},
    helper::{self, ForecastTelemetry},
    predictor::{LinearPredictor, Predictor},
    ranking::{RiskRanker, RiskRanking},
    series::{CsvSeriesSource, SeriesSource},
    stress::{self, StressAssessment},
    trend::Trend,
};

/// Everything the presentation layer shows for one region.
#[derive(Debug, Clone, Serialize)]
pub struct RegionOutlook {
    /// Region identifier.
    pub region: String,
    /// Seven-day forecast.
    pub forecast: ForecastSequence,
    /// Stress on the final forecast day.
    pub assessment: StressAssessment,
    /// Direction of the last three forecast days.
    pub trend: Trend,
}

/// Facade wiring series source, predictor, and capacities together.
pub struct HealthCastEngine {
    telemetry: Option<ForecastTelemetry>,
    predictor: Arc<dyn Predictor>,
    source: Arc<dyn SeriesSource>,
    capacities: CapacityTable,
    forecaster: RecursiveForecaster,
    ranker: RiskRanker,
}

impl HealthCastEngine {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> HealthCastEngineBuilder {
        HealthCastEngineBuilder::default()
    }

    /// Builds an engine from a loaded configuration document.
    pub fn from_config(config: &HealthCastConfig) -> Result<Self> {
        let source = CsvSeriesSource::load(&config.data.series_csv, &config.data.date_column)
            .with_context(|| format!("loading series {}", config.data.series_csv.display()))?;
        let predictor = LinearPredictor::from_weights_file(&config.model.weights)?;
        let mut builder = Self::builder()
            .source(Arc::new(source))
            .predictor(Arc::new(predictor))
            .capacities(config.capacities.clone());
        let sinks = &config.telemetry;
        if sinks.log_path.is_some() || sinks.event_log.is_some() {
            let mut telemetry = ForecastTelemetry::builder("healthcast").min_level(sinks.min_level);
            if let Some(path) = &sinks.log_path {
                telemetry = telemetry.log_path(path);
            }
            if let Some(path) = &sinks.event_log {
                telemetry = telemetry.event_publisher(Arc::new(FileEventPublisher::new(path)?));
            }
            builder = builder.telemetry(telemetry.build()?);
        }
        builder.build()
    }

    /// Active regions in capacity-table order.
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.capacities.regions()
    }

    /// Configured capacities.
    #[must_use]
    pub const fn capacities(&self) -> &CapacityTable {
        &self.capacities
    }

    /// Forecast, day-7 stress, and trend for one region.
    pub fn outlook(&self, region: &str) -> Result<RegionOutlook> {
        let capacity = self.capacities.capacity(region)?;
        let telemetry = self.telemetry.as_ref();
        let series = self.source.series(region)?;
        let forecast = match self.forecaster.forecast(&series, self.predictor.as_ref()) {
            Ok(forecast) => forecast,
            Err(err) => {
                helper::event(
                    telemetry,
                    "forecast.failed",
                    json!({ "region": region, "error": err.to_string() }),
                );
                return Err(err).with_context(|| format!("forecasting region {region}"));
            }
        };
        let assessment = stress::evaluate(forecast.final_value(), capacity);
        let trend = Trend::of_forecast(&forecast);
        helper::log(
            telemetry,
            LogLevel::Info,
            "forecast.completed",
            json!({
                "region": region,
                "final_cases": assessment.case_count,
                "stress_ratio": assessment.stress_ratio,
                "risk_level": assessment.risk_level.label(),
                "trend": trend.label(),
            }),
        );
        helper::forecast_completed(telemetry, region, &forecast);
        Ok(RegionOutlook {
            region: region.to_string(),
            forecast,
            assessment,
            trend,
        })
    }

    /// Ranks all regions by day-7 stress.
    #[must_use]
    pub fn rank(&self) -> RiskRanking {
        let ranking = self
            .ranker
            .rank(self.source.as_ref(), self.predictor.as_ref(), &self.capacities);
        helper::log(
            self.telemetry.as_ref(),
            LogLevel::Info,
            "ranking.completed",
            json!({
                "run_id": ranking.run_id,
                "ranked": ranking.entries.len(),
                "failed": ranking.failures.len(),
            }),
        );
        ranking
    }

    /// Returns telemetry handle.
    #[must_use]
    pub const fn telemetry(&self) -> Option<&ForecastTelemetry> {
        self.telemetry.as_ref()
    }
}

/// Builder for `HealthCastEngine`.
#[derive(Default)]
pub struct HealthCastEngineBuilder {
    telemetry: Option<ForecastTelemetry>,
    predictor: Option<Arc<dyn Predictor>>,
    source: Option<Arc<dyn SeriesSource>>,
    capacities: Option<CapacityTable>,
}

impl HealthCastEngineBuilder {
    /// Sets telemetry.
    #[must_use]
    pub fn telemetry(mut self, telemetry: ForecastTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Sets the trained predictor.
    #[must_use]
    pub fn predictor(mut self, predictor: Arc<dyn Predictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    /// Sets the historical series source.
    #[must_use]
    pub fn source(mut self, source: Arc<dyn SeriesSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Overrides the default five-region capacity table.
    #[must_use]
    pub fn capacities(mut self, capacities: CapacityTable) -> Self {
        self.capacities = Some(capacities);
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Result<HealthCastEngine> {
        let predictor = self.predictor.context("engine requires a predictor")?;
        let source = self.source.context("engine requires a series source")?;
        let telemetry = self.telemetry;
        let forecaster = RecursiveForecaster::new(telemetry.clone());
        let ranker = RiskRanker::new(forecaster.clone(), telemetry.clone());
        Ok(HealthCastEngine {
            telemetry,
            predictor,
            source,
            capacities: self.capacities.unwrap_or_default(),
            forecaster,
            ranker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{ConfigurationError, ForecastError},
        forecaster::HORIZON,
        predictor::ConstantPredictor,
        series::InMemorySeriesSource,
        stress::RiskLevel,
    };
    use shared_event_bus::MemoryEventBus;
    use std::fs;
    use tempfile::tempdir;

    fn compounding(len: usize) -> Vec<f64> {
        let mut value = 100.0;
        (0..len)
            .map(|_| {
                let current = value;
                value = (value * 1.1_f64).round();
                current
            })
            .collect()
    }

    #[test]
    fn constant_model_end_to_end() {
        let source = InMemorySeriesSource::new().with_series("KL", compounding(16));
        let bus = Arc::new(MemoryEventBus::new(8));
        let telemetry = ForecastTelemetry::builder("engine")
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        let engine = HealthCastEngine::builder()
            .source(Arc::new(source))
            .predictor(Arc::new(ConstantPredictor(150.0)))
            .capacities(CapacityTable::from_entries([("KL", 90_000)]).unwrap())
            .telemetry(telemetry)
            .build()
            .unwrap();
        let outlook = engine.outlook("KL").unwrap();
        assert_eq!(outlook.forecast.values(), &[150.0; HORIZON]);
        assert!((outlook.assessment.stress_ratio - 150.0 * 0.05 / 90_000.0).abs() < 1e-15);
        assert_eq!(outlook.assessment.risk_level, RiskLevel::VeryLow);
        assert_eq!(outlook.trend, Trend::Stable);
        let completed = bus.of_type("forecast.completed");
        assert_eq!(completed.len(), 1);
        assert_eq!(
            completed[0].payload,
            json!({ "region": "KL", "horizon": HORIZON, "final_value": 150.0 })
        );
    }

    #[tokio::test]
    async fn ranking_inside_a_runtime_writes_events() {
        let dir = tempdir().unwrap();
        let events_path = dir.path().join("events.jsonl");
        let telemetry = ForecastTelemetry::builder("engine")
            .event_publisher(Arc::new(FileEventPublisher::new(&events_path).unwrap()))
            .build()
            .unwrap();
        let engine = HealthCastEngine::builder()
            .source(Arc::new(
                InMemorySeriesSource::new()
                    .with_series("TN", compounding(20))
                    .with_series("DL", compounding(20)),
            ))
            .predictor(Arc::new(ConstantPredictor(150.0)))
            .capacities(CapacityTable::from_entries([("TN", 120_000), ("DL", 75_000)]).unwrap())
            .telemetry(telemetry)
            .build()
            .unwrap();
        let ranking = engine.rank();
        assert_eq!(ranking.entries.len(), 2);
        let content = fs::read_to_string(&events_path).unwrap();
        assert_eq!(content.matches("forecast.completed").count(), 2);
        assert!(content.contains("ranking.completed"));
    }

    #[test]
    fn unknown_region_is_a_configuration_error() {
        let engine = HealthCastEngine::builder()
            .source(Arc::new(InMemorySeriesSource::new()))
            .predictor(Arc::new(ConstantPredictor(1.0)))
            .build()
            .unwrap();
        assert_eq!(engine.regions().count(), 5);
        let err = engine.outlook("ZZ").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigurationError>(),
            Some(ConfigurationError::MissingCapacity { .. })
        ));
    }

    #[test]
    fn forecast_failure_is_reported() {
        let engine = HealthCastEngine::builder()
            .source(Arc::new(
                InMemorySeriesSource::new().with_series("TN", compounding(20)),
            ))
            .predictor(Arc::new(ConstantPredictor(f64::INFINITY)))
            .build()
            .unwrap();
        let err = engine.outlook("TN").unwrap_err();
        assert!(err.downcast_ref::<ForecastError>().is_some());
        assert!(engine.rank().entries.is_empty());
    }

    #[test]
    fn builder_requires_predictor_and_source() {
        assert!(HealthCastEngine::builder().build().is_err());
        assert!(HealthCastEngine::builder()
            .predictor(Arc::new(ConstantPredictor(1.0)))
            .build()
            .is_err());
    }

    #[test]
    fn runs_from_configuration_files() {
        let dir = tempdir().unwrap();
        let mut csv = String::from("Date,TN,DL\n");
        for day in 1..=20 {
            csv.push_str(&format!(
                "2021-04-{day:02},{},{}\n",
                1_000 + day * 10,
                30_000 - day * 100
            ));
        }
        fs::write(dir.path().join("state_data.csv"), csv).unwrap();
        fs::write(
            dir.path().join("weights.json"),
            r#"{"weights": [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], "bias": 0.0}"#,
        )
        .unwrap();
        let config_path = dir.path().join("healthcast.toml");
        fs::write(
            &config_path,
            r#"
[data]
series_csv = "state_data.csv"

[model]
weights = "weights.json"

[telemetry]
log_path = "logs/healthcast.log.jsonl"
event_log = "logs/events.jsonl"

[[regions]]
name = "TN"
capacity = 120000

[[regions]]
name = "DL"
capacity = 75000
"#,
        )
        .unwrap();
        let config = HealthCastConfig::load(&config_path).unwrap();
        let engine = HealthCastEngine::from_config(&config).unwrap();
        let ranking = engine.rank();
        let order: Vec<_> = ranking.entries.iter().map(|e| e.region.as_str()).collect();
        assert_eq!(order, vec!["DL", "TN"]);
        // lag_1 of the last row is the second-to-last observation: 30000 - 19 * 100
        assert_eq!(ranking.entries[0].final_cases, 28_100.0);
        let log = fs::read_to_string(dir.path().join("logs/healthcast.log.jsonl")).unwrap();
        assert!(log.contains("ranking.completed"));
        let events = fs::read_to_string(dir.path().join("logs/events.jsonl")).unwrap();
        assert!(events.contains("ranking.completed"));
    }
}
