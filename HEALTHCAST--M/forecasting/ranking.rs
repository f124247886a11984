use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use shared_logging::LogLevel;
use uuid::Uuid;

use crate::{
    config::CapacityTable,
    forecaster::RecursiveForecaster,
    helper::{self, ForecastTelemetry},
    predictor::Predictor,
    series::SeriesSource,
    stress::{self, RiskLevel},
};

/// One region's position in the ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRegion {
    /// Region identifier.
    pub region: String,
    /// Forecast case count on the final horizon day.
    pub final_cases: f64,
    /// Stress ratio for `final_cases`.
    pub stress_ratio: f64,
    /// Risk category for `stress_ratio`.
    pub risk_level: RiskLevel,
}

/// Region skipped because its series or forecast failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionFailure {
    /// Region identifier.
    pub region: String,
    /// Error description.
    pub reason: String,
}

/// Regions ordered by descending stress.
#[derive(Debug, Clone, Serialize)]
pub struct RiskRanking {
    /// Identifier for this ranking run.
    pub run_id: Uuid,
    /// Creation time.
    pub generated_at: DateTime<Utc>,
    /// Ranked regions, highest stress first.
    pub entries: Vec<RankedRegion>,
    /// Regions that could not be ranked, in table order.
    pub failures: Vec<RegionFailure>,
}

impl RiskRanking {
    /// `(rank, entry)` pairs with ranks starting at 1.
    pub fn positions(&self) -> impl Iterator<Item = (usize, &RankedRegion)> {
        self.entries.iter().enumerate().map(|(idx, entry)| (idx + 1, entry))
    }

    /// Highest-stress region, if any was ranked.
    #[must_use]
    pub fn top(&self) -> Option<&RankedRegion> {
        self.entries.first()
    }
}

/// Ranks every region of a capacity table by forecast stress.
#[derive(Debug, Clone, Default)]
pub struct RiskRanker {
    forecaster: RecursiveForecaster,
    telemetry: Option<ForecastTelemetry>,
}

impl RiskRanker {
    /// Creates a ranker; the forecaster carries its own telemetry.
    #[must_use]
    pub const fn new(
        forecaster: RecursiveForecaster,
        telemetry: Option<ForecastTelemetry>,
    ) -> Self {
        Self {
            forecaster,
            telemetry,
        }
    }

    /// Forecasts and scores each region, then sorts by descending stress.
    ///
    /// Ties keep table order. A failing region is reported in
    /// [`RiskRanking::failures`] without affecting the others.
    pub fn rank(
        &self,
        source: &dyn SeriesSource,
        predictor: &dyn Predictor,
        capacities: &CapacityTable,
    ) -> RiskRanking {
        let telemetry = self.telemetry.as_ref();
        let run_id = Uuid::new_v4();
        let mut entries = Vec::with_capacity(capacities.len());
        let mut failures = Vec::new();
        for (region, capacity) in capacities.iter() {
            let outcome = source
                .series(region)
                .map_err(|err| err.to_string())
                .and_then(|series| {
                    self.forecaster
                        .forecast(&series, predictor)
                        .map_err(|err| err.to_string())
                });
            match outcome {
                Ok(forecast) => {
                    let assessment = stress::evaluate(forecast.final_value(), capacity);
                    helper::forecast_completed(telemetry, region, &forecast);
                    entries.push(RankedRegion {
                        region: region.to_string(),
                        final_cases: assessment.case_count,
                        stress_ratio: assessment.stress_ratio,
                        risk_level: assessment.risk_level,
                    });
                }
                Err(reason) => {
                    tracing::warn!(region, %reason, "region excluded from ranking");
                    helper::log(
                        telemetry,
                        LogLevel::Warn,
                        "ranking.region_failed",
                        json!({ "run_id": run_id, "region": region, "error": reason }),
                    );
                    helper::event(
                        telemetry,
                        "forecast.failed",
                        json!({ "run_id": run_id, "region": region, "error": reason }),
                    );
                    failures.push(RegionFailure {
                        region: region.to_string(),
                        reason,
                    });
                }
            }
        }
        sort_by_stress(&mut entries);
        helper::event(
            telemetry,
            "ranking.completed",
            json!({
                "run_id": run_id,
                "ranked": entries.len(),
                "failed": failures.len(),
                "top": entries.first().map(|entry| entry.region.clone()),
            }),
        );
        RiskRanking {
            run_id,
            generated_at: Utc::now(),
            entries,
            failures,
        }
    }
}

/// Stable descending sort; equal ratios keep their input order.
fn sort_by_stress(entries: &mut [RankedRegion]) {
    entries.sort_by(|a, b| {
        b.stress_ratio
            .partial_cmp(&a.stress_ratio)
            .unwrap_or(Ordering::Equal)
    });
}
