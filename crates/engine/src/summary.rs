//! Period summaries.
//!
//! A [`PeriodRange`] turns a [`SummaryPeriod`] into concrete calendar
//! boundaries in a given time zone. [`aggregate`] folds a set of transactions
//! into income/expense totals and a gap-free, ordered series of daily or
//! monthly buckets covering the whole range.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{
    DateTime, Datelike, Days, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta,
    TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{Amount, EngineError, ResultEngine, Transaction, TransactionType};

/// Days before today included in [`SummaryPeriod::Last30Days`].
const DAYS_BACK: u64 = 30;
/// Months before the current one included in [`SummaryPeriod::TwelveMonths`].
const MONTHS_BACK: u32 = 12;
/// How far to search for a valid local time when a boundary sits in a DST gap.
const GAP_SEARCH_MINUTES: i64 = 180;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SummaryPeriod {
    #[serde(rename = "LAST_30_DAYS")]
    Last30Days,
    #[serde(rename = "TWELVE_MONTHS")]
    TwelveMonths,
}

impl SummaryPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Last30Days => "LAST_30_DAYS",
            Self::TwelveMonths => "TWELVE_MONTHS",
        }
    }

    pub fn granularity(self) -> Granularity {
        match self {
            Self::Last30Days => Granularity::Day,
            Self::TwelveMonths => Granularity::Month,
        }
    }
}

impl fmt::Display for SummaryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryPeriod {
    type Err = EngineError;

    /// Accepts `LAST_30_DAYS` / `TWELVE_MONTHS` in any case, with `-` or `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "LAST_30_DAYS" => Ok(Self::Last30Days),
            "TWELVE_MONTHS" => Ok(Self::TwelveMonths),
            other => Err(EngineError::Validation(format!("invalid period: {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Month,
}

#[derive(Clone, Copy)]
enum Edge {
    Start,
    End,
}

/// Resolved boundaries of a summary period.
///
/// `start` and `end` are inclusive instants; `first_day` and `last_day` are the
/// local calendar dates they fall on in `timezone`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeriodRange {
    pub period: SummaryPeriod,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub timezone: Tz,
}

impl PeriodRange {
    /// Resolves `period` relative to `now` as seen in `timezone`.
    ///
    /// - `Last30Days`: today minus 30 days at 00:00:00.000 through today at
    ///   23:59:59.999.
    /// - `TwelveMonths`: the first day of the month twelve months back through
    ///   the last day of the current month at 23:59:59.999.
    pub fn resolve(period: SummaryPeriod, now: DateTime<Utc>, timezone: Tz) -> ResultEngine<Self> {
        let out_of_range = || EngineError::Validation(format!("{period} is out of range"));
        let today = now.with_timezone(&timezone).date_naive();

        let (first_day, last_day) = match period {
            SummaryPeriod::Last30Days => (
                today
                    .checked_sub_days(Days::new(DAYS_BACK))
                    .ok_or_else(out_of_range)?,
                today,
            ),
            SummaryPeriod::TwelveMonths => {
                let month_start = today.with_day(1).ok_or_else(out_of_range)?;
                let first = month_start
                    .checked_sub_months(Months::new(MONTHS_BACK))
                    .ok_or_else(out_of_range)?;
                let last = month_start
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .ok_or_else(out_of_range)?;
                (first, last)
            }
        };

        let midnight = NaiveTime::from_hms_opt(0, 0, 0).ok_or_else(out_of_range)?;
        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).ok_or_else(out_of_range)?;
        let start = local_instant(&timezone, first_day.and_time(midnight), Edge::Start)?;
        let end = local_instant(&timezone, last_day.and_time(end_of_day), Edge::End)?;

        Ok(Self {
            period,
            start,
            end,
            first_day,
            last_day,
            timezone,
        })
    }

    pub fn granularity(&self) -> Granularity {
        self.period.granularity()
    }

    /// Inclusive on both ends.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    /// `YYYY-MM-DD` or `YYYY-MM` of `at` in the range's time zone.
    pub fn bucket_key(&self, at: DateTime<Utc>) -> String {
        let local = at.with_timezone(&self.timezone).date_naive();
        self.key_for(local)
    }

    fn key_for(&self, date: NaiveDate) -> String {
        match self.granularity() {
            Granularity::Day => date.format("%Y-%m-%d").to_string(),
            Granularity::Month => date.format("%Y-%m").to_string(),
        }
    }

    /// Every bucket key from `first_day` to `last_day`, in order.
    pub fn keys(&self) -> Vec<String> {
        match self.granularity() {
            Granularity::Day => self
                .first_day
                .iter_days()
                .take_while(|day| *day <= self.last_day)
                .map(|day| self.key_for(day))
                .collect(),
            Granularity::Month => {
                let mut keys = Vec::new();
                let mut cursor = self.first_day.with_day(1);
                while let Some(month) = cursor.filter(|month| *month <= self.last_day) {
                    keys.push(self.key_for(month));
                    cursor = month.checked_add_months(Months::new(1));
                }
                keys
            }
        }
    }
}

/// Maps a local wall-clock time to an instant.
///
/// Ambiguous times (DST fold) take the earliest instant for a start and the
/// latest for an end. Times inside a DST gap move forward (start) or backward
/// (end) to the nearest valid minute.
fn local_instant(tz: &Tz, naive: NaiveDateTime, edge: Edge) -> ResultEngine<DateTime<Utc>> {
    let pick = |result: LocalResult<DateTime<Tz>>| match edge {
        Edge::Start => result.earliest(),
        Edge::End => result.latest(),
    };
    let step = match edge {
        Edge::Start => 1,
        Edge::End => -1,
    };

    pick(tz.from_local_datetime(&naive))
        .or_else(|| {
            (1..=GAP_SEARCH_MINUTES).find_map(|minutes| {
                let candidate = naive.checked_add_signed(TimeDelta::minutes(minutes * step))?;
                pick(tz.from_local_datetime(&candidate))
            })
        })
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| {
            EngineError::Validation(format!("local time {naive} does not exist in {tz}"))
        })
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct BucketTotals {
    income: Amount,
    expense: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub day: String,
    pub income: Amount,
    pub expense: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    pub month: String,
    pub income: Amount,
    pub expense: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Breakdown {
    Daily(Vec<DailySummary>),
    Monthly(Vec<MonthlySummary>),
}

impl Breakdown {
    pub fn len(&self) -> usize {
        match self {
            Self::Daily(days) => days.len(),
            Self::Monthly(months) => months.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(key, income, expense)` for each bucket, in order.
    pub fn entries(&self) -> Vec<(&str, Amount, Amount)> {
        match self {
            Self::Daily(days) => days
                .iter()
                .map(|d| (d.day.as_str(), d.income, d.expense))
                .collect(),
            Self::Monthly(months) => months
                .iter()
                .map(|m| (m.month.as_str(), m.income, m.expense))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionSummary {
    pub total_income: Amount,
    pub total_expense: Amount,
    pub net_total: Amount,
    pub period: SummaryPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub breakdown: Breakdown,
}

/// Folds `transactions` into a summary over `range`.
///
/// Income and expense accumulate the magnitude of each amount, so an expense
/// stored as `-40.00` counts as `40.00` of expense. Transactions outside the
/// range are skipped. The input order does not matter.
pub fn aggregate(range: &PeriodRange, transactions: &[Transaction]) -> ResultEngine<TransactionSummary> {
    let mut total_income = Amount::ZERO;
    let mut total_expense = Amount::ZERO;
    let mut buckets: BTreeMap<String, BucketTotals> = BTreeMap::new();

    for tx in transactions {
        if !range.contains(tx.created_at()) {
            tracing::debug!(
                "skipping transaction {} outside {} window",
                tx.id(),
                range.period
            );
            continue;
        }
        let amount = tx.amount().abs()?;
        let bucket = buckets.entry(range.bucket_key(tx.created_at())).or_default();
        match tx.kind() {
            TransactionType::Income => {
                total_income = total_income.try_add(amount)?;
                bucket.income = bucket.income.try_add(amount)?;
            }
            TransactionType::Expense => {
                total_expense = total_expense.try_add(amount)?;
                bucket.expense = bucket.expense.try_add(amount)?;
            }
        }
    }

    for key in range.keys() {
        buckets.entry(key).or_default();
    }

    let breakdown = match range.granularity() {
        Granularity::Day => Breakdown::Daily(
            buckets
                .into_iter()
                .map(|(day, totals)| DailySummary {
                    day,
                    income: totals.income,
                    expense: totals.expense,
                })
                .collect(),
        ),
        Granularity::Month => Breakdown::Monthly(
            buckets
                .into_iter()
                .map(|(month, totals)| MonthlySummary {
                    month,
                    income: totals.income,
                    expense: totals.expense,
                })
                .collect(),
        ),
    };

    Ok(TransactionSummary {
        total_income,
        total_expense,
        net_total: total_income.try_sub(total_expense)?,
        period: range.period,
        start_date: range.start,
        end_date: range.end,
        breakdown,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use uuid::Uuid;

    use super::*;
    use crate::{NewTransaction, TransactionType};

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn tx(kind: TransactionType, cents: i64, created_at: DateTime<Utc>) -> Transaction {
        Transaction::new(NewTransaction {
            id: None,
            user_id: None,
            category_id: Uuid::new_v4(),
            description: "Trip to depot".to_string(),
            amount: Amount::from_minor_units(cents),
            kind,
            line_details_id: None,
            created_at: Some(created_at),
        })
        .unwrap()
    }

    #[test]
    fn last_30_days_boundaries() {
        let range =
            PeriodRange::resolve(SummaryPeriod::Last30Days, at("2025-06-15T10:20:00Z"), Tz::UTC)
                .unwrap();
        assert_eq!(range.start, at("2025-05-16T00:00:00Z"));
        assert_eq!(range.end, at("2025-06-15T23:59:59.999Z"));
    }

    #[test]
    fn twelve_months_boundaries() {
        let range =
            PeriodRange::resolve(SummaryPeriod::TwelveMonths, at("2025-06-15T10:20:00Z"), Tz::UTC)
                .unwrap();
        assert_eq!(range.start, at("2024-06-01T00:00:00Z"));
        assert_eq!(range.end, at("2025-06-30T23:59:59.999Z"));
    }

    #[test]
    fn empty_window_is_fully_zero_filled() {
        let now = at("2025-06-15T10:20:00Z");
        for (period, expected) in [(SummaryPeriod::Last30Days, 31), (SummaryPeriod::TwelveMonths, 13)] {
            let range = PeriodRange::resolve(period, now, Tz::UTC).unwrap();
            let summary = aggregate(&range, &[]).unwrap();
            assert_eq!(summary.breakdown.len(), expected);
            assert!(summary
                .breakdown
                .entries()
                .iter()
                .all(|(_, income, expense)| income.is_zero() && expense.is_zero()));
            assert!(summary.total_income.is_zero());
            assert!(summary.total_expense.is_zero());
            assert!(summary.net_total.is_zero());
        }
    }

    #[test]
    fn income_and_expense_on_same_day() {
        let range =
            PeriodRange::resolve(SummaryPeriod::Last30Days, at("2025-06-15T10:20:00Z"), Tz::UTC)
                .unwrap();
        let day = at("2025-06-10T09:00:00Z");
        let summary = aggregate(
            &range,
            &[
                tx(TransactionType::Income, 10_000, day),
                tx(TransactionType::Expense, -4_000, day),
            ],
        )
        .unwrap();

        assert_eq!(summary.total_income, Amount::from_minor_units(10_000));
        assert_eq!(summary.total_expense, Amount::from_minor_units(4_000));
        assert_eq!(summary.net_total, Amount::from_minor_units(6_000));
        let entries = summary.breakdown.entries();
        let (_, income, expense) = entries
            .iter()
            .find(|(key, _, _)| *key == "2025-06-10")
            .copied()
            .unwrap();
        assert_eq!(income, Amount::from_minor_units(10_000));
        assert_eq!(expense, Amount::from_minor_units(4_000));
    }

    #[test]
    fn boundaries_are_inclusive() {
        let range =
            PeriodRange::resolve(SummaryPeriod::Last30Days, at("2025-06-15T10:20:00Z"), Tz::UTC)
                .unwrap();
        let summary = aggregate(
            &range,
            &[
                tx(TransactionType::Income, 100, range.start),
                tx(TransactionType::Income, 200, range.end),
                tx(TransactionType::Income, 400, range.end + TimeDelta::milliseconds(1)),
            ],
        )
        .unwrap();
        assert_eq!(summary.total_income, Amount::from_minor_units(300));
        let entries = summary.breakdown.entries();
        assert_eq!(entries.first().unwrap().0, "2025-05-16");
        assert_eq!(entries.first().unwrap().1, Amount::from_minor_units(100));
        assert_eq!(entries.last().unwrap().0, "2025-06-15");
        assert_eq!(entries.last().unwrap().1, Amount::from_minor_units(200));
        assert_eq!(entries.len(), 31);
    }

    #[test]
    fn order_of_input_does_not_matter() {
        let range =
            PeriodRange::resolve(SummaryPeriod::TwelveMonths, at("2025-06-15T10:20:00Z"), Tz::UTC)
                .unwrap();
        let mut txs = vec![
            tx(TransactionType::Income, 1_000, at("2025-01-03T00:00:00Z")),
            tx(TransactionType::Expense, 250, at("2024-07-20T00:00:00Z")),
            tx(TransactionType::Income, 500, at("2025-01-28T00:00:00Z")),
        ];
        let forward = aggregate(&range, &txs).unwrap();
        txs.reverse();
        let backward = aggregate(&range, &txs).unwrap();
        assert_eq!(forward, backward);

        let entries = forward.breakdown.entries();
        assert_eq!(entries.len(), 13);
        let january = entries.iter().find(|(k, _, _)| *k == "2025-01").unwrap();
        assert_eq!(january.1, Amount::from_minor_units(1_500));
        assert_eq!(forward.net_total, Amount::from_minor_units(1_250));
    }

    #[test]
    fn leap_day_enumerated_once() {
        let range =
            PeriodRange::resolve(SummaryPeriod::Last30Days, at("2024-03-15T12:00:00Z"), Tz::UTC)
                .unwrap();
        let keys = range.keys();
        assert_eq!(keys.len(), 31);
        assert_eq!(keys.first().unwrap(), "2024-02-14");
        assert_eq!(keys.last().unwrap(), "2024-03-15");
        assert_eq!(keys.iter().filter(|k| *k == "2024-02-29").count(), 1);
        assert_eq!(keys.iter().collect::<HashSet<_>>().len(), 31);
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(sorted, keys);
    }

    #[test]
    fn twelve_months_from_leap_day() {
        let range =
            PeriodRange::resolve(SummaryPeriod::TwelveMonths, at("2024-02-29T12:00:00Z"), Tz::UTC)
                .unwrap();
        assert_eq!(range.first_day, NaiveDate::from_ymd_opt(2023, 2, 1).unwrap());
        assert_eq!(range.last_day, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let keys = range.keys();
        assert_eq!(keys.len(), 13);
        assert_eq!(keys.first().unwrap(), "2023-02");
        assert_eq!(keys.last().unwrap(), "2024-02");
    }

    #[test]
    fn buckets_follow_configured_timezone() {
        let tz: Tz = "America/Sao_Paulo".parse().unwrap();
        let range =
            PeriodRange::resolve(SummaryPeriod::Last30Days, at("2025-01-10T12:00:00Z"), tz).unwrap();
        // 02:00 UTC on Jan 1st is still Dec 31st in São Paulo (UTC-3).
        assert_eq!(range.bucket_key(at("2025-01-01T02:00:00Z")), "2024-12-31");
        assert_eq!(range.end, at("2025-01-11T02:59:59.999Z"));
    }

    #[test]
    fn start_in_dst_gap_moves_forward() {
        // Havana springs forward at local midnight.
        let tz: Tz = "America/Havana".parse().unwrap();
        let range =
            PeriodRange::resolve(SummaryPeriod::Last30Days, at("2024-04-09T16:00:00Z"), tz).unwrap();
        assert_eq!(range.first_day, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(range.start, at("2024-03-10T05:00:00Z"));
        assert_eq!(range.keys().len(), 31);
    }

    #[test]
    fn parses_period_names() {
        assert_eq!("LAST_30_DAYS".parse::<SummaryPeriod>().unwrap(), SummaryPeriod::Last30Days);
        assert_eq!("twelve-months".parse::<SummaryPeriod>().unwrap(), SummaryPeriod::TwelveMonths);
        assert!("LAST_7_DAYS".parse::<SummaryPeriod>().is_err());
    }
}
