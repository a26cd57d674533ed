// 📈 Aggregation Layer - per-region time series and cross-region summaries
// Every year/region is resolved independently through the orchestrator.

use crate::error::{StatsError, StatsResult};
use crate::orchestrator::{FallbackOrchestrator, Origin, Resolution};
use crate::records::{
    Dataset, RegionRecord, Scope, SummaryStatistic, TimeSeries, TimeSeriesPoint, TransactionRecord,
};
use crate::sources::FetchRequest;

// ============================================================================
// PURE AGGREGATES
// ============================================================================

/// count/avg/min/max over positive unit prices; None when nothing is priced
pub fn summarize_transactions(
    code: &str,
    year: i32,
    transactions: &[TransactionRecord],
) -> Option<SummaryStatistic> {
    let unit_prices: Vec<i64> = transactions
        .iter()
        .filter_map(|t| t.unit_price)
        .filter(|p| *p > 0)
        .collect();

    let first = transactions.first()?;
    let min = *unit_prices.iter().min()?;
    let max = *unit_prices.iter().max()?;
    let avg = unit_prices.iter().sum::<i64>() / unit_prices.len() as i64;

    let trade_prices: Vec<i64> = transactions
        .iter()
        .filter_map(|t| t.trade_price)
        .filter(|p| *p > 0)
        .collect();
    let avg_trade_price = if trade_prices.is_empty() {
        None
    } else {
        Some(trade_prices.iter().sum::<i64>() / trade_prices.len() as i64)
    };

    Some(SummaryStatistic {
        code: code.to_string(),
        prefecture: first.prefecture.clone(),
        municipality: first.municipality.clone(),
        year,
        count: unit_prices.len(),
        avg,
        min,
        max,
        transaction_count: transactions.len(),
        avg_trade_price,
    })
}

/// A population record viewed as a one-sample summary
pub fn summarize_region(record: &RegionRecord) -> SummaryStatistic {
    SummaryStatistic {
        code: record.code.clone(),
        prefecture: record.prefecture.clone(),
        municipality: record.municipality.clone(),
        year: record.year,
        count: 1,
        avg: record.value,
        min: record.value,
        max: record.value,
        transaction_count: 1,
        avg_trade_price: None,
    }
}

fn request_for(dataset: Dataset, year: i32, code: &str) -> FetchRequest {
    FetchRequest::new(dataset, year, Scope::for_region_code(code))
}

/// Resolve, logging and swallowing failures so the caller can skip the year/region
async fn try_resolve(orchestrator: &FallbackOrchestrator, request: &FetchRequest) -> Option<Resolution> {
    match orchestrator.resolve(request).await {
        Ok(resolution) => Some(resolution),
        Err(e) => {
            tracing::debug!(dataset = %request.dataset, year = request.year, error = %e, "Skipping unresolvable batch");
            None
        }
    }
}

// ============================================================================
// TIME SERIES
// ============================================================================

/// Per-year values for one code, ascending by year
///
/// Population points carry the record value; real-estate points carry the
/// average unit price. Years without a match are skipped.
pub async fn time_series(
    orchestrator: &FallbackOrchestrator,
    dataset: Dataset,
    code: &str,
    years: &[i32],
) -> StatsResult<TimeSeries> {
    let mut years = years.to_vec();
    years.sort_unstable();
    years.dedup();

    let mut series = TimeSeries {
        code: code.to_string(),
        prefecture: String::new(),
        municipality: String::new(),
        points: Vec::new(),
        contains_synthetic: false,
    };

    for &year in &years {
        let Some(resolution) = try_resolve(orchestrator, &request_for(dataset, year, code)).await else {
            continue;
        };

        let point = match dataset {
            Dataset::Population => resolution
                .snapshot
                .regions()
                .and_then(|records| records.iter().find(|r| r.code == code))
                .map(summarize_region),
            Dataset::RealEstate => resolution
                .snapshot
                .transactions()
                .and_then(|txs| summarize_transactions(code, year, txs)),
        };

        if let Some(stat) = point {
            series.prefecture = stat.prefecture;
            series.municipality = stat.municipality;
            series.points.push(TimeSeriesPoint {
                year,
                value: stat.avg,
            });
            series.contains_synthetic |= resolution.origin == Origin::Synthetic;
        }
    }

    if series.points.is_empty() {
        return Err(StatsError::RegionNotFound {
            code: code.to_string(),
            searched_years: years,
        });
    }
    Ok(series)
}

// ============================================================================
// SUMMARIES
// ============================================================================

/// One statistic per code with qualifying data; regions without any are omitted
pub async fn summary<S: AsRef<str>>(
    orchestrator: &FallbackOrchestrator,
    dataset: Dataset,
    year: i32,
    codes: &[S],
) -> Vec<SummaryStatistic> {
    match dataset {
        Dataset::Population => {
            let Some(resolution) = try_resolve(orchestrator, &FetchRequest::population(year)).await else {
                return Vec::new();
            };
            let records = resolution.snapshot.into_regions();
            codes
                .iter()
                .filter_map(|code| records.iter().find(|r| r.code == code.as_ref()))
                .map(summarize_region)
                .collect()
        }
        Dataset::RealEstate => {
            let mut stats = Vec::new();
            for code in codes {
                let code = code.as_ref();
                let Some(resolution) = try_resolve(orchestrator, &request_for(dataset, year, code)).await else {
                    continue;
                };
                if let Some(stat) = resolution
                    .snapshot
                    .transactions()
                    .and_then(|txs| summarize_transactions(code, year, txs))
                {
                    stats.push(stat);
                }
            }
            stats
        }
    }
}

/// Real-estate summary for one code in every year of the range that has priced data
pub async fn transaction_series(
    orchestrator: &FallbackOrchestrator,
    code: &str,
    start: i32,
    end: i32,
) -> StatsResult<Vec<SummaryStatistic>> {
    let mut stats = Vec::new();
    for year in start..=end {
        let codes = [code];
        stats.extend(summary(orchestrator, Dataset::RealEstate, year, &codes).await);
    }

    if stats.is_empty() {
        return Err(StatsError::RegionNotFound {
            code: code.to_string(),
            searched_years: (start..=end).collect(),
        });
    }
    Ok(stats)
}

// ============================================================================
// TESTS
// ============================================================================
