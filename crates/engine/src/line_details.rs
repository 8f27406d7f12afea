//! Trip-expense line details.
//!
//! A transaction may be composed of three legs: the outbound trip (`go`), the
//! return trip and the drive change. The legs are never negative and the
//! owning transaction's amount is their sum.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{Amount, EngineError, ResultEngine};

/// Input for [`LineDetails::new`].
#[derive(Clone, Debug)]
pub struct NewLineDetails {
    pub id: Option<Uuid>,
    pub transaction_id: Uuid,
    pub amount_go: Amount,
    pub amount_return: Amount,
    pub drive_change: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LineDetails {
    id: Uuid,
    transaction_id: Uuid,
    amount_go: Amount,
    amount_return: Amount,
    drive_change: Amount,
    total: Amount,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LineDetails {
    pub fn new(props: NewLineDetails) -> ResultEngine<Self> {
        let legs = [props.amount_go, props.amount_return, props.drive_change];
        if legs.iter().any(|leg| leg.is_negative()) {
            return Err(EngineError::Validation(
                "line details amounts cannot be negative".to_string(),
            ));
        }
        let total = legs
            .iter()
            .try_fold(Amount::ZERO, |acc, leg| acc.try_add(*leg))?;
        let now = Utc::now();

        Ok(Self {
            id: props.id.unwrap_or_else(Uuid::new_v4),
            transaction_id: props.transaction_id,
            amount_go: props.amount_go,
            amount_return: props.amount_return,
            drive_change: props.drive_change,
            total,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transaction_id(&self) -> Uuid {
        self.transaction_id
    }

    pub fn amount_go(&self) -> Amount {
        self.amount_go
    }

    pub fn amount_return(&self) -> Amount {
        self.amount_return
    }

    pub fn drive_change(&self) -> Amount {
        self.drive_change
    }

    /// Sum of the three legs.
    pub fn total(&self) -> Amount {
        self.total
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transaction_line_details")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub transaction_id: Uuid,
    pub amount_go_minor: i64,
    pub amount_return_minor: i64,
    pub drive_change_minor: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::transactions::Entity")]
    Transaction,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&LineDetails> for ActiveModel {
    fn from(details: &LineDetails) -> Self {
        Self {
            id: ActiveValue::Set(details.id),
            transaction_id: ActiveValue::Set(details.transaction_id),
            amount_go_minor: ActiveValue::Set(details.amount_go.minor_units()),
            amount_return_minor: ActiveValue::Set(details.amount_return.minor_units()),
            drive_change_minor: ActiveValue::Set(details.drive_change.minor_units()),
            created_at: ActiveValue::Set(details.created_at),
            updated_at: ActiveValue::Set(details.updated_at),
        }
    }
}

impl TryFrom<Model> for LineDetails {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let amount_go = Amount::from_minor_units(model.amount_go_minor);
        let amount_return = Amount::from_minor_units(model.amount_return_minor);
        let drive_change = Amount::from_minor_units(model.drive_change_minor);
        let total = amount_go
            .try_add(amount_return)
            .and_then(|sum| sum.try_add(drive_change))
            .map_err(|_| {
                EngineError::Unexpected(format!("line details {} overflow", model.id))
            })?;

        Ok(Self {
            id: model.id,
            transaction_id: model.transaction_id,
            amount_go,
            amount_return,
            drive_change,
            total,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
