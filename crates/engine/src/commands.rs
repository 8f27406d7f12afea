//! Command structs for engine operations.
//!
//! These types group parameters for write operations and listings, keeping
//! call sites readable and avoiding long argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{CategoryType, TransactionType};

/// Trip legs in major units; all three must be non-negative.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineDetailsInput {
    pub amount_go: f64,
    pub amount_return: f64,
    pub drive_change: f64,
}

impl LineDetailsInput {
    #[must_use]
    pub fn new(amount_go: f64, amount_return: f64, drive_change: f64) -> Self {
        Self {
            amount_go,
            amount_return,
            drive_change,
        }
    }
}

/// Create a transaction.
///
/// When `line_details` is present the settled amount is the sum of its legs
/// and `amount` is ignored; otherwise `amount` (major units) is used, or zero.
#[derive(Clone, Debug)]
pub struct CreateTransactionCmd {
    pub user_id: Option<i64>,
    pub category_id: Uuid,
    pub description: String,
    pub kind: TransactionType,
    pub amount: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub line_details: Option<LineDetailsInput>,
}

impl CreateTransactionCmd {
    #[must_use]
    pub fn new(category_id: Uuid, description: impl Into<String>, kind: TransactionType) -> Self {
        Self {
            user_id: None,
            category_id,
            description: description.into(),
            kind,
            amount: None,
            created_at: None,
            line_details: None,
        }
    }

    #[must_use]
    pub fn user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    #[must_use]
    pub fn line_details(mut self, line_details: LineDetailsInput) -> Self {
        self.line_details = Some(line_details);
        self
    }
}

/// Create a category.
#[derive(Clone, Debug)]
pub struct CreateCategoryCmd {
    pub user_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub types: Vec<CategoryType>,
}

impl CreateCategoryCmd {
    #[must_use]
    pub fn new(name: impl Into<String>, types: Vec<CategoryType>) -> Self {
        Self {
            user_id: None,
            name: name.into(),
            description: None,
            types,
        }
    }

    #[must_use]
    pub fn user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Filters for listing transactions.
///
/// `from` and `to` are both inclusive, in UTC.
#[derive(Clone, Debug, Default)]
pub struct TransactionListFilter {
    pub user_id: Option<i64>,
    pub kind: Option<TransactionType>,
    pub category_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Filters for listing categories.
#[derive(Clone, Debug, Default)]
pub struct CategoryListFilter {
    /// Case-insensitive substring of the category name.
    pub name: Option<String>,
    /// Only categories carrying this tag.
    pub kind: Option<CategoryType>,
}
