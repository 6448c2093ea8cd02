//! Exchange rate lookups for currency translation.
//!
//! Rates are loaded for both quote directions of a pair and resolved by
//! [`RateTable`], so an inverse quote is used when no direct one exists.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tracing::debug;
use uuid::Uuid;

use consolida_core::consolidation::{ExchangeRateRepository, RepositoryError};
use consolida_core::currency::{ExchangeRate, RateTable};
use consolida_shared::types::{Currency, OrganizationId};

use super::{db_err, parse_column};
use crate::entities::exchange_rates;

/// Exchange rate repository backed by the `exchange_rates` table.
#[derive(Debug, Clone)]
pub struct SqlExchangeRateRepository {
    db: DatabaseConnection,
}

impl SqlExchangeRateRepository {
    /// Creates a new exchange rate repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Stores a rate, replacing any rate of the same pair and date.
    ///
    /// # Errors
    ///
    /// Returns an error if the rate is not positive or the write fails.
    pub async fn upsert_rate(
        &self,
        organization_id: OrganizationId,
        rate: &ExchangeRate,
    ) -> Result<(), RepositoryError> {
        if rate.rate <= Decimal::ZERO || rate.from_currency == rate.to_currency {
            return Err(RepositoryError::Conflict(format!(
                "invalid rate {} {}/{}",
                rate.rate, rate.from_currency, rate.to_currency
            )));
        }

        let existing = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(exchange_rates::Column::FromCurrency.eq(rate.from_currency.code()))
            .filter(exchange_rates::Column::ToCurrency.eq(rate.to_currency.code()))
            .filter(exchange_rates::Column::EffectiveDate.eq(rate.effective_date))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        if let Some(existing) = existing {
            let mut active: exchange_rates::ActiveModel = existing.into();
            active.rate = Set(rate.rate);
            active.update(&self.db).await.map_err(db_err)?;
        } else {
            exchange_rates::ActiveModel {
                id: Set(Uuid::now_v7()),
                organization_id: Set(organization_id.into_inner()),
                from_currency: Set(rate.from_currency.code().to_string()),
                to_currency: Set(rate.to_currency.code().to_string()),
                rate: Set(rate.rate),
                effective_date: Set(rate.effective_date),
                created_at: Set(Utc::now().into()),
            }
            .insert(&self.db)
            .await
            .map_err(db_err)?;
        }
        Ok(())
    }

    /// Loads the rates of a pair, in either direction, effective within the range.
    async fn load_table(
        &self,
        organization_id: OrganizationId,
        from: Currency,
        to: Currency,
        start: Option<NaiveDate>,
        end: NaiveDate,
    ) -> Result<RateTable, RepositoryError> {
        let pair = Condition::any()
            .add(
                Condition::all()
                    .add(exchange_rates::Column::FromCurrency.eq(from.code()))
                    .add(exchange_rates::Column::ToCurrency.eq(to.code())),
            )
            .add(
                Condition::all()
                    .add(exchange_rates::Column::FromCurrency.eq(to.code()))
                    .add(exchange_rates::Column::ToCurrency.eq(from.code())),
            );

        let mut query = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(pair)
            .filter(exchange_rates::Column::EffectiveDate.lte(end));
        if let Some(start) = start {
            query = query.filter(exchange_rates::Column::EffectiveDate.gte(start));
        }

        let models = query.all(&self.db).await.map_err(db_err)?;
        let mut table = RateTable::default();
        for model in models {
            table.push(ExchangeRate::new(
                parse_column("from_currency", &model.from_currency)?,
                parse_column("to_currency", &model.to_currency)?,
                model.rate,
                model.effective_date,
            ));
        }
        Ok(table)
    }
}

#[async_trait]
impl ExchangeRateRepository for SqlExchangeRateRepository {
    async fn closing_rate(
        &self,
        organization_id: OrganizationId,
        from: Currency,
        to: Currency,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, RepositoryError> {
        let table = self.load_table(organization_id, from, to, None, date).await?;
        let rate = table.closing(from, to, date);
        debug!(from = %from, to = %to, date = %date, rate = ?rate, "Closing rate lookup");
        Ok(rate)
    }

    async fn average_rate(
        &self,
        organization_id: OrganizationId,
        from: Currency,
        to: Currency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Decimal>, RepositoryError> {
        let table = self
            .load_table(organization_id, from, to, Some(start), end)
            .await?;
        Ok(table.average(from, to, start, end))
    }
}
