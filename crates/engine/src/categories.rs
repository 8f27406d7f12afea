//! Transaction categories.
//!
//! A category either belongs to a user or is shared (`user_id = None`). Its
//! type tags say where it applies; `COMMON` is exclusive and cannot be
//! combined with any other tag.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    util::{normalize_name_key, normalize_optional_text, normalize_required_text},
};

const MIN_NAME_CHARS: usize = 3;
const MIN_DESCRIPTION_CHARS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryType {
    Common,
    Agency,
    Line,
}

impl CategoryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Common => "COMMON",
            Self::Agency => "AGENCY",
            Self::Line => "LINE",
        }
    }
}

impl TryFrom<&str> for CategoryType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "COMMON" => Ok(Self::Common),
            "AGENCY" => Ok(Self::Agency),
            "LINE" => Ok(Self::Line),
            other => Err(EngineError::Validation(format!(
                "invalid category type: {other}"
            ))),
        }
    }
}

/// Input for [`Category::new`].
#[derive(Clone, Debug, Default)]
pub struct NewCategory {
    pub id: Option<Uuid>,
    pub user_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub types: Vec<CategoryType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
    id: Uuid,
    user_id: Option<i64>,
    name: String,
    description: Option<String>,
    types: Vec<CategoryType>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Category {
    /// Validates `props` and builds a new category stamped with the current
    /// time. A missing id is generated.
    pub fn new(props: NewCategory) -> ResultEngine<Self> {
        let name = normalize_required_text(&props.name, "Name", MIN_NAME_CHARS)?;
        let description = normalize_optional_text(
            props.description.as_deref(),
            "Description",
            MIN_DESCRIPTION_CHARS,
        )?;
        let types = validate_types(props.types)?;
        let now = Utc::now();

        Ok(Self {
            id: props.id.unwrap_or_else(Uuid::new_v4),
            user_id: props.user_id,
            name,
            description,
            types,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn types(&self) -> &[CategoryType] {
        &self.types
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Key used to detect duplicate names.
    pub fn name_key(&self) -> String {
        normalize_name_key(&self.name)
    }

    pub fn has_type(&self, kind: CategoryType) -> bool {
        self.types.contains(&kind)
    }
}

/// Deduplicates `types` (keeping first-seen order) and enforces the tag rules.
fn validate_types(types: Vec<CategoryType>) -> ResultEngine<Vec<CategoryType>> {
    let mut unique: Vec<CategoryType> = Vec::with_capacity(types.len());
    for kind in types {
        if !unique.contains(&kind) {
            unique.push(kind);
        }
    }
    if unique.is_empty() {
        return Err(EngineError::Validation(
            "At least one category type must be specified".to_string(),
        ));
    }
    if unique.len() > 1 && unique.contains(&CategoryType::Common) {
        return Err(EngineError::Validation(
            "the type COMMON cannot be combined with other types".to_string(),
        ));
    }
    Ok(unique)
}

fn join_types(types: &[CategoryType]) -> String {
    types
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn split_types(raw: &str) -> ResultEngine<Vec<CategoryType>> {
    raw.split(',')
        .filter(|tag| !tag.trim().is_empty())
        .map(CategoryType::try_from)
        .collect()
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transaction_categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Option<i64>,
    pub name: String,
    pub name_norm: String,
    pub description: Option<String>,
    pub types: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Category> for ActiveModel {
    fn from(category: &Category) -> Self {
        Self {
            id: ActiveValue::Set(category.id),
            user_id: ActiveValue::Set(category.user_id),
            name: ActiveValue::Set(category.name.clone()),
            name_norm: ActiveValue::Set(category.name_key()),
            description: ActiveValue::Set(category.description.clone()),
            types: ActiveValue::Set(join_types(&category.types)),
            created_at: ActiveValue::Set(category.created_at),
            updated_at: ActiveValue::Set(category.updated_at),
        }
    }
}

impl TryFrom<Model> for Category {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let types = split_types(&model.types).map_err(|_| {
            EngineError::Unexpected(format!(
                "category {} has invalid types: {}",
                model.id, model.types
            ))
        })?;
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            description: model.description,
            types,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
