//! Transaction primitives.
//!
//! A `Transaction` records one income or expense against a category. It may
//! reference a [`LineDetails`](crate::LineDetails) breakdown, in which case
//! its amount is the breakdown total. Transactions are immutable once built.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, EngineError, ResultEngine, util::normalize_required_text};

const MIN_DESCRIPTION_CHARS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
        }
    }
}

impl TryFrom<&str> for TransactionType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INCOME" => Ok(Self::Income),
            "EXPENSE" => Ok(Self::Expense),
            other => Err(EngineError::Validation(format!(
                "invalid transaction type: {other}"
            ))),
        }
    }
}

/// Input for [`Transaction::new`].
#[derive(Clone, Debug)]
pub struct NewTransaction {
    pub id: Option<Uuid>,
    pub user_id: Option<i64>,
    pub category_id: Uuid,
    pub description: String,
    pub amount: Amount,
    pub kind: TransactionType,
    pub line_details_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Transaction {
    id: Uuid,
    user_id: Option<i64>,
    category_id: Uuid,
    description: String,
    amount: Amount,
    #[serde(rename = "type")]
    kind: TransactionType,
    line_details_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Validates `props` and builds the transaction.
    ///
    /// `user_id = None` is a shared ("house") transaction. A missing id is
    /// generated and a missing `created_at` defaults to now.
    pub fn new(props: NewTransaction) -> ResultEngine<Self> {
        if props.category_id.is_nil() {
            return Err(EngineError::Validation(
                "Category ID is required".to_string(),
            ));
        }
        let description =
            normalize_required_text(&props.description, "Description", MIN_DESCRIPTION_CHARS)?;
        let now = Utc::now();

        Ok(Self {
            id: props.id.unwrap_or_else(Uuid::new_v4),
            user_id: props.user_id,
            category_id: props.category_id,
            description,
            amount: props.amount,
            kind: props.kind,
            line_details_id: props.line_details_id,
            created_at: props.created_at.unwrap_or(now),
            updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn category_id(&self) -> Uuid {
        self.category_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn kind(&self) -> TransactionType {
        self.kind
    }

    pub fn line_details_id(&self) -> Option<Uuid> {
        self.line_details_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Option<i64>,
    pub category_id: Uuid,
    pub description: String,
    pub amount_minor: i64,
    pub kind: String,
    pub line_details_id: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::line_details::Entity",
        from = "Column::LineDetailsId",
        to = "super::line_details::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    LineDetails,
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::line_details::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LineDetails.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id),
            user_id: ActiveValue::Set(tx.user_id),
            category_id: ActiveValue::Set(tx.category_id),
            description: ActiveValue::Set(tx.description.clone()),
            amount_minor: ActiveValue::Set(tx.amount.minor_units()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            line_details_id: ActiveValue::Set(tx.line_details_id),
            created_at: ActiveValue::Set(tx.created_at),
            updated_at: ActiveValue::Set(tx.updated_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let kind = TransactionType::try_from(model.kind.as_str()).map_err(|_| {
            EngineError::Unexpected(format!(
                "transaction {} has invalid type: {}",
                model.id, model.kind
            ))
        })?;
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            category_id: model.category_id,
            description: model.description,
            amount: Amount::from_minor_units(model.amount_minor),
            kind,
            line_details_id: model.line_details_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn props() -> NewTransaction {
        NewTransaction {
            id: None,
            user_id: Some(7),
            category_id: Uuid::new_v4(),
            description: "Diesel".to_string(),
            amount: Amount::from_minor_units(4_000),
            kind: TransactionType::Expense,
            line_details_id: None,
            created_at: None,
        }
    }

    #[test]
    fn builds_with_generated_id_and_timestamps() {
        let tx = Transaction::new(props()).unwrap();
        assert!(!tx.id().is_nil());
        assert_eq!(tx.amount().minor_units(), 4_000);
        assert_eq!(tx.kind(), TransactionType::Expense);
        assert!(tx.created_at() <= tx.updated_at());
    }

    #[test]
    fn keeps_explicit_id_and_creation_time() {
        let id = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap();
        let tx = Transaction::new(NewTransaction {
            id: Some(id),
            created_at: Some(at),
            user_id: None,
            ..props()
        })
        .unwrap();
        assert_eq!(tx.id(), id);
        assert_eq!(tx.created_at(), at);
        assert_eq!(tx.user_id(), None);
    }

    #[test]
    fn description_needs_three_non_blank_chars() {
        let err = Transaction::new(NewTransaction {
            description: "  ab   ".to_string(),
            ..props()
        })
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation("Description must be at least 3 characters long".to_string())
        );
    }

    #[test]
    fn category_is_required() {
        let err = Transaction::new(NewTransaction {
            category_id: Uuid::nil(),
            ..props()
        })
        .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[test]
    fn parses_type_tags() {
        assert_eq!(TransactionType::try_from("INCOME").unwrap(), TransactionType::Income);
        assert_eq!(TransactionType::try_from("expense").unwrap(), TransactionType::Expense);
        assert!(TransactionType::try_from("TRANSFER").is_err());
    }

    #[test]
    fn stored_row_with_unknown_type_is_unexpected() {
        let tx = Transaction::new(props()).unwrap();
        let mut model = Model {
            id: tx.id(),
            user_id: tx.user_id(),
            category_id: tx.category_id(),
            description: tx.description().to_string(),
            amount_minor: 4_000,
            kind: "INCOME".to_string(),
            line_details_id: None,
            created_at: tx.created_at(),
            updated_at: tx.updated_at(),
        };
        assert!(Transaction::try_from(model.clone()).is_ok());
        model.kind = "REFUND".to_string();
        assert_eq!(
            Transaction::try_from(model).unwrap_err().kind(),
            crate::ErrorKind::Unexpected
        );
    }
}
