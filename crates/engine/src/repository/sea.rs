use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::{
    Category, CategoryListFilter, EngineError, LineDetails, Page, PageRequest, PeriodRange,
    ResultEngine, Transaction, TransactionListFilter, categories, line_details, transactions,
    util::normalize_name_key,
};

use super::{
    CategoryReader, CategoryRepository, LineDetailsRepository, TransactionReader,
    TransactionRepository, TransactionView,
};

/// Category repository bound to a connection or an open database transaction.
pub struct SeaCategoryRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> SeaCategoryRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<C> CategoryReader for SeaCategoryRepository<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn find_one_by_id(&self, id: Uuid) -> ResultEngine<Category> {
        let model = categories::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("category {id}")))?;
        Category::try_from(model)
    }

    async fn find_by_name_key(&self, name_key: &str) -> ResultEngine<Option<Category>> {
        categories::Entity::find()
            .filter(categories::Column::NameNorm.eq(name_key))
            .one(self.conn)
            .await?
            .map(Category::try_from)
            .transpose()
    }

    async fn list(
        &self,
        filter: &CategoryListFilter,
        page: PageRequest,
    ) -> ResultEngine<Page<Category>> {
        page.validate()?;
        let mut query = categories::Entity::find();
        if let Some(name) = filter.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            query = query.filter(categories::Column::NameNorm.contains(normalize_name_key(name)));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(categories::Column::Types.contains(kind.as_str()));
        }

        let item_count = query.clone().count(self.conn).await?;
        let items = query
            .order_by_asc(categories::Column::Name)
            .order_by_asc(categories::Column::Id)
            .offset(page.offset())
            .limit(page.take)
            .all(self.conn)
            .await?
            .into_iter()
            .map(Category::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(Page::new(items, page, item_count))
    }
}

#[async_trait]
impl<C> CategoryRepository for SeaCategoryRepository<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn save(&self, category: &Category) -> ResultEngine<()> {
        categories::ActiveModel::from(category)
            .insert(self.conn)
            .await?;
        Ok(())
    }
}

pub struct SeaTransactionRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> SeaTransactionRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<C> TransactionRepository for SeaTransactionRepository<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn save(&self, transaction: &Transaction) -> ResultEngine<()> {
        transactions::ActiveModel::from(transaction)
            .insert(self.conn)
            .await?;
        Ok(())
    }

    async fn find_one_by_id(&self, id: Uuid) -> ResultEngine<Option<Transaction>> {
        transactions::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .map(Transaction::try_from)
            .transpose()
    }
}

pub struct SeaLineDetailsRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> SeaLineDetailsRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<C> LineDetailsRepository for SeaLineDetailsRepository<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn save(&self, details: &LineDetails) -> ResultEngine<()> {
        line_details::ActiveModel::from(details)
            .insert(self.conn)
            .await?;
        Ok(())
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: Uuid,
    ) -> ResultEngine<Option<LineDetails>> {
        line_details::Entity::find()
            .filter(line_details::Column::TransactionId.eq(transaction_id))
            .one(self.conn)
            .await?
            .map(LineDetails::try_from)
            .transpose()
    }
}

pub struct SeaTransactionReader<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> SeaTransactionReader<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

trait ApplyListFilters: QueryFilter + Sized {
    fn apply_list_filters(self, filter: &TransactionListFilter) -> Self;
}

impl<T> ApplyListFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_list_filters(mut self, filter: &TransactionListFilter) -> Self {
        if let Some(user_id) = filter.user_id {
            self = self.filter(transactions::Column::UserId.eq(user_id));
        }
        if let Some(kind) = filter.kind {
            self = self.filter(transactions::Column::Kind.eq(kind.as_str()));
        }
        if let Some(category_id) = filter.category_id {
            self = self.filter(transactions::Column::CategoryId.eq(category_id));
        }
        if let Some(from) = filter.from {
            self = self.filter(transactions::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            self = self.filter(transactions::Column::CreatedAt.lte(to));
        }
        self
    }
}

#[async_trait]
impl<C> TransactionReader for SeaTransactionReader<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn find_by_period(&self, range: &PeriodRange) -> ResultEngine<Vec<Transaction>> {
        let models = transactions::Entity::find()
            .filter(transactions::Column::CreatedAt.between(range.start, range.end))
            .order_by_asc(transactions::Column::CreatedAt)
            .all(self.conn)
            .await?;

        let mut out = Vec::with_capacity(models.len());
        for model in models {
            match Transaction::try_from(model) {
                Ok(tx) => out.push(tx),
                Err(err) => tracing::warn!("skipping stored transaction: {err}"),
            }
        }
        Ok(out)
    }

    async fn find_transaction(&self, id: Uuid) -> ResultEngine<Option<Transaction>> {
        SeaTransactionRepository::new(self.conn)
            .find_one_by_id(id)
            .await
    }

    async fn find_line_details(&self, transaction_id: Uuid) -> ResultEngine<Option<LineDetails>> {
        SeaLineDetailsRepository::new(self.conn)
            .find_by_transaction_id(transaction_id)
            .await
    }

    async fn list(
        &self,
        filter: &TransactionListFilter,
        page: PageRequest,
    ) -> ResultEngine<Page<TransactionView>> {
        page.validate()?;
        if let (Some(from), Some(to)) = (filter.from, filter.to)
            && from > to
        {
            return Err(EngineError::Validation(
                "invalid range: from must be <= to".to_string(),
            ));
        }

        let item_count = transactions::Entity::find()
            .apply_list_filters(filter)
            .count(self.conn)
            .await?;
        let rows = transactions::Entity::find()
            .apply_list_filters(filter)
            .find_also_related(categories::Entity)
            .order_by_desc(transactions::Column::CreatedAt)
            .order_by_desc(transactions::Column::Id)
            .offset(page.offset())
            .limit(page.take)
            .all(self.conn)
            .await?;

        let items = rows
            .into_iter()
            .map(|(model, category)| {
                let transaction = Transaction::try_from(model)?;
                Ok(TransactionView {
                    transaction,
                    category_name: category.as_ref().map(|c| c.name.clone()),
                    category_description: category.and_then(|c| c.description),
                })
            })
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(Page::new(items, page, item_count))
    }
}
