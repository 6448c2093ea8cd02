//! Statement caching using Moka.
//!
//! A completed run never changes, so statements are keyed by run and kind.
//! Entries are dropped when a run is deleted.

use consolida_shared::types::ConsolidationRunId;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

use super::error::ReportError;
use super::types::{ConsolidatedStatement, StatementKind};

/// Default cache capacity (number of entries).
const DEFAULT_CACHE_CAPACITY: u64 = 256;

/// Default time-to-live for cache entries (10 minutes).
const DEFAULT_TTL_SECS: u64 = 600;

const ALL_KINDS: [StatementKind; 4] = [
    StatementKind::BalanceSheet,
    StatementKind::IncomeStatement,
    StatementKind::CashFlow,
    StatementKind::Equity,
];

/// Cache for generated statements.
#[derive(Clone)]
pub struct StatementCache {
    cache: Cache<(ConsolidationRunId, StatementKind), Arc<ConsolidatedStatement>>,
}

impl StatementCache {
    /// Creates a cache with default settings.
    ///
    /// Default: 256 entries max, 10 minute TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_CACHE_CAPACITY, DEFAULT_TTL_SECS)
    }

    /// Creates a cache with custom configuration.
    ///
    /// # Arguments
    ///
    /// * `max_capacity` - Maximum number of entries to cache
    /// * `ttl_secs` - Time-to-live in seconds for each entry
    #[must_use]
    pub fn with_config(max_capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { cache }
    }

    /// Returns a cached statement.
    #[must_use]
    pub fn get(
        &self,
        run_id: ConsolidationRunId,
        kind: StatementKind,
    ) -> Option<Arc<ConsolidatedStatement>> {
        self.cache.get(&(run_id, kind))
    }

    /// Returns the cached statement or generates and caches it.
    ///
    /// Failed generations are not cached.
    pub fn get_or_generate<F>(
        &self,
        run_id: ConsolidationRunId,
        kind: StatementKind,
        generate: F,
    ) -> Result<Arc<ConsolidatedStatement>, ReportError>
    where
        F: FnOnce() -> Result<ConsolidatedStatement, ReportError>,
    {
        if let Some(cached) = self.get(run_id, kind) {
            return Ok(cached);
        }

        let statement = Arc::new(generate()?);
        self.cache.insert((run_id, kind), Arc::clone(&statement));
        Ok(statement)
    }

    /// Drops every statement of a run.
    pub fn invalidate_run(&self, run_id: ConsolidationRunId) {
        for kind in ALL_KINDS {
            self.cache.invalidate(&(run_id, kind));
        }
    }

    /// Invalidates all cached entries.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Returns the number of entries currently in the cache.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs cache maintenance tasks.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

impl Default for StatementCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::run::FiscalPeriodRef;
    use crate::reports::types::{ConsolidatedIncomeStatement, StatementHeader, StatementSection};
    use chrono::NaiveDate;
    use consolida_shared::types::{ConsolidationGroupId, Currency};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::cell::Cell;

    fn statement(run_id: ConsolidationRunId, net_income: Decimal) -> ConsolidatedStatement {
        ConsolidatedStatement::IncomeStatement(ConsolidatedIncomeStatement {
            header: StatementHeader {
                run_id,
                group_id: ConsolidationGroupId::new(),
                group_name: "Group".into(),
                period: FiscalPeriodRef { year: 2025, period: 1 },
                as_of: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
                currency: Currency::Usd,
            },
            revenue: StatementSection::default(),
            cost_of_goods_sold: StatementSection::default(),
            gross_profit: Decimal::ZERO,
            operating_expenses: StatementSection::default(),
            operating_income: Decimal::ZERO,
            other_expenses: StatementSection::default(),
            net_income,
            attributable_to_parent: net_income,
            attributable_to_nci: Decimal::ZERO,
        })
    }

    #[test]
    fn test_cache_miss_then_hit() {
        let cache = StatementCache::new();
        let run_id = ConsolidationRunId::new();
        let calls = Cell::new(0);

        let generate = || {
            calls.set(calls.get() + 1);
            Ok(statement(run_id, dec!(100)))
        };
        let first = cache
            .get_or_generate(run_id, StatementKind::IncomeStatement, generate)
            .unwrap();
        let second = cache
            .get_or_generate(run_id, StatementKind::IncomeStatement, || {
                calls.set(calls.get() + 1);
                Ok(statement(run_id, dec!(999)))
            })
            .unwrap();

        assert_eq!(calls.get(), 1, "Second call should be served from cache");
        assert_eq!(first, second);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = StatementCache::new();
        let run_id = ConsolidationRunId::new();

        let result = cache.get_or_generate(run_id, StatementKind::BalanceSheet, || {
            Err(ReportError::NoTrialBalance(run_id))
        });
        assert!(result.is_err());
        assert!(cache.get(run_id, StatementKind::BalanceSheet).is_none());
    }

    #[test]
    fn test_kinds_cached_separately() {
        let cache = StatementCache::new();
        let run_id = ConsolidationRunId::new();

        cache
            .get_or_generate(run_id, StatementKind::IncomeStatement, || {
                Ok(statement(run_id, dec!(1)))
            })
            .unwrap();
        assert!(cache.get(run_id, StatementKind::IncomeStatement).is_some());
        assert!(cache.get(run_id, StatementKind::CashFlow).is_none());
    }

    #[test]
    fn test_invalidate_run() {
        let cache = StatementCache::with_config(10, 60);
        let kept = ConsolidationRunId::new();
        let dropped = ConsolidationRunId::new();

        for run_id in [kept, dropped] {
            cache
                .get_or_generate(run_id, StatementKind::IncomeStatement, || {
                    Ok(statement(run_id, dec!(1)))
                })
                .unwrap();
        }

        cache.invalidate_run(dropped);
        cache.run_pending_tasks();

        assert!(cache.get(dropped, StatementKind::IncomeStatement).is_none());
        assert!(cache.get(kept, StatementKind::IncomeStatement).is_some());
    }

    #[test]
    fn test_invalidate_all() {
        let cache = StatementCache::default();
        let run_id = ConsolidationRunId::new();
        cache
            .get_or_generate(run_id, StatementKind::IncomeStatement, || {
                Ok(statement(run_id, dec!(1)))
            })
            .unwrap();

        cache.invalidate_all();
        cache.run_pending_tasks();

        assert!(cache.get(run_id, StatementKind::IncomeStatement).is_none());
        assert_eq!(cache.entry_count(), 0);
    }
}
