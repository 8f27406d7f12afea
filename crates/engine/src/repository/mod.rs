//! Repository seams.
//!
//! The engine only talks to storage through these traits. Repositories with
//! `save` are only handed out by a [`UnitOfWork`](crate::UnitOfWork) and share
//! its session; [`Storage`](crate::Storage) hands out read-only views.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    Category, CategoryListFilter, LineDetails, Page, PageRequest, PeriodRange, ResultEngine,
    Transaction, TransactionListFilter,
};

mod sea;

pub use sea::{
    SeaCategoryRepository, SeaLineDetailsRepository, SeaTransactionReader,
    SeaTransactionRepository,
};

#[async_trait]
pub trait CategoryReader: Send + Sync {
    /// Fails with [`EngineError::KeyNotFound`](crate::EngineError::KeyNotFound)
    /// when no category has this id.
    async fn find_one_by_id(&self, id: Uuid) -> ResultEngine<Category>;

    /// Looks a category up by its normalized name key.
    async fn find_by_name_key(&self, name_key: &str) -> ResultEngine<Option<Category>>;

    /// Categories ordered by name.
    async fn list(
        &self,
        filter: &CategoryListFilter,
        page: PageRequest,
    ) -> ResultEngine<Page<Category>>;
}

#[async_trait]
pub trait CategoryRepository: CategoryReader {
    async fn save(&self, category: &Category) -> ResultEngine<()>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn save(&self, transaction: &Transaction) -> ResultEngine<()>;

    async fn find_one_by_id(&self, id: Uuid) -> ResultEngine<Option<Transaction>>;
}

#[async_trait]
pub trait LineDetailsRepository: Send + Sync {
    async fn save(&self, details: &LineDetails) -> ResultEngine<()>;

    async fn find_by_transaction_id(
        &self,
        transaction_id: Uuid,
    ) -> ResultEngine<Option<LineDetails>>;
}

/// Read-only access for summaries and listings.
#[async_trait]
pub trait TransactionReader: Send + Sync {
    /// All transactions whose `created_at` falls inside `range`, both ends
    /// inclusive. Stored rows with an unrecognized type are skipped.
    async fn find_by_period(&self, range: &PeriodRange) -> ResultEngine<Vec<Transaction>>;

    async fn find_transaction(&self, id: Uuid) -> ResultEngine<Option<Transaction>>;

    async fn find_line_details(&self, transaction_id: Uuid) -> ResultEngine<Option<LineDetails>>;

    /// Transactions newest first, joined with their category.
    async fn list(
        &self,
        filter: &TransactionListFilter,
        page: PageRequest,
    ) -> ResultEngine<Page<TransactionView>>;
}

/// A transaction together with its category's name and description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub category_name: Option<String>,
    pub category_description: Option<String>,
}
