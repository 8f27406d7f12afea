use chrono::{DateTime, Utc};

use crate::{
    PeriodRange, ResultEngine, SummaryPeriod, TransactionSummary,
    summary::aggregate,
};

use super::Engine;

impl Engine {
    /// Summarizes income and expense over `period`, ending today.
    pub async fn summary(&self, period: SummaryPeriod) -> ResultEngine<TransactionSummary> {
        self.summary_at(period, Utc::now()).await
    }

    /// Like [`Engine::summary`], with "today" taken from `now`.
    pub async fn summary_at(
        &self,
        period: SummaryPeriod,
        now: DateTime<Utc>,
    ) -> ResultEngine<TransactionSummary> {
        let range = PeriodRange::resolve(period, now, self.timezone)?;
        let transactions = self.storage.reader().find_by_period(&range).await?;
        tracing::debug!(
            "summarizing {} transactions for {period} ({} .. {})",
            transactions.len(),
            range.start,
            range.end
        );
        aggregate(&range, &transactions)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::Tz;

    use crate::{
        Amount, CategoryType, CreateCategoryCmd, CreateTransactionCmd, TransactionType,
        memory::MemoryStorage,
    };

    use super::*;

    #[tokio::test]
    async fn empty_store_yields_zero_series() {
        let engine = Engine::builder()
            .storage(MemoryStorage::new())
            .build()
            .await
            .unwrap();
        let summary = engine.summary(SummaryPeriod::Last30Days).await.unwrap();
        assert_eq!(summary.breakdown.len(), 31);
        assert!(summary.net_total.is_zero());
    }

    #[tokio::test]
    async fn folds_stored_transactions_in_engine_timezone() {
        let tz: Tz = "America/Sao_Paulo".parse().unwrap();
        let engine = Engine::builder()
            .storage(MemoryStorage::new())
            .timezone(tz)
            .build()
            .await
            .unwrap();
        let category = engine
            .create_category(CreateCategoryCmd::new("Bilheteria", vec![CategoryType::Common]))
            .await
            .unwrap();

        for (kind, amount, at) in [
            (TransactionType::Income, 100.0, Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0)),
            (TransactionType::Expense, -40.0, Utc.with_ymd_and_hms(2025, 3, 10, 18, 0, 0)),
            // 01:00 UTC on the 11th is still the 10th in São Paulo.
            (TransactionType::Income, 5.0, Utc.with_ymd_and_hms(2025, 3, 11, 1, 0, 0)),
            (TransactionType::Income, 70.0, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0)),
        ] {
            engine
                .create_transaction(
                    CreateTransactionCmd::new(category.id(), "Movimento", kind)
                        .amount(amount)
                        .created_at(at.unwrap()),
                )
                .await
                .unwrap();
        }

        let summary = engine
            .summary_at(
                SummaryPeriod::Last30Days,
                Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(summary.total_income, Amount::from_minor_units(10_500));
        assert_eq!(summary.total_expense, Amount::from_minor_units(4_000));
        assert_eq!(summary.net_total, Amount::from_minor_units(6_500));
        let entries = summary.breakdown.entries();
        let day = entries.iter().find(|(k, _, _)| *k == "2025-03-10").unwrap();
        assert_eq!(day.1, Amount::from_minor_units(10_500));
        assert_eq!(day.2, Amount::from_minor_units(4_000));
        assert_eq!(entries.len(), 31);
    }
}
