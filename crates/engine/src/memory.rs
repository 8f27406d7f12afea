//! In-memory storage.
//!
//! Useful for tests and dry runs. Writes made through a unit of work are
//! staged and only become visible to other readers on commit. Failures can be
//! injected per operation, and save calls are counted.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use sea_orm::DbErr;
use uuid::Uuid;

use crate::{
    Category, CategoryListFilter, EngineError, LineDetails, Page, PageRequest, PeriodRange,
    ResultEngine, Transaction, TransactionListFilter,
    repository::{
        CategoryReader, CategoryRepository, LineDetailsRepository, TransactionReader,
        TransactionRepository, TransactionView,
    },
    unit_of_work::{Phase, Storage, UnitOfWork, UnitOfWorkStatus},
    util::normalize_name_key,
};

#[derive(Clone, Debug, Default)]
struct Tables {
    categories: BTreeMap<Uuid, Category>,
    transactions: BTreeMap<Uuid, Transaction>,
    line_details: BTreeMap<Uuid, LineDetails>,
}

impl Tables {
    fn merge(&mut self, staged: Tables) {
        self.categories.extend(staged.categories);
        self.transactions.extend(staged.transactions);
        self.line_details.extend(staged.line_details);
    }
}

#[derive(Debug, Default)]
struct Inner {
    committed: Mutex<Tables>,
    fail_transaction_saves: AtomicBool,
    fail_line_details_saves: AtomicBool,
    fail_commits: AtomicBool,
    transaction_saves: AtomicUsize,
    line_details_saves: AtomicUsize,
}

fn lock(tables: &Mutex<Tables>) -> MutexGuard<'_, Tables> {
    tables.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected(what: &str) -> EngineError {
    EngineError::Database(DbErr::Custom(format!("injected {what} failure")))
}

/// Shared in-memory tables. Clones share the same data.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    inner: Arc<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every transaction save fail with a persistence error.
    pub fn fail_transaction_saves(&self, fail: bool) {
        self.inner.fail_transaction_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every line details save fail with a persistence error.
    pub fn fail_line_details_saves(&self, fail: bool) {
        self.inner.fail_line_details_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every commit fail with a persistence error.
    pub fn fail_commits(&self, fail: bool) {
        self.inner.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Number of transaction saves attempted, including failed ones.
    pub fn transaction_save_calls(&self) -> usize {
        self.inner.transaction_saves.load(Ordering::SeqCst)
    }

    /// Number of line details saves attempted, including failed ones.
    pub fn line_details_save_calls(&self) -> usize {
        self.inner.line_details_saves.load(Ordering::SeqCst)
    }

    pub fn category_count(&self) -> usize {
        lock(&self.inner.committed).categories.len()
    }

    pub fn transaction_count(&self) -> usize {
        lock(&self.inner.committed).transactions.len()
    }

    pub fn line_details_count(&self) -> usize {
        lock(&self.inner.committed).line_details.len()
    }

    fn repo(&self) -> MemoryRepository<'_> {
        MemoryRepository {
            inner: &self.inner,
            staged: None,
        }
    }
}

impl Storage for MemoryStorage {
    fn unit_of_work(&self) -> Box<dyn UnitOfWork> {
        Box::new(MemoryUnitOfWork {
            inner: Arc::clone(&self.inner),
            phase: Phase::Idle,
        })
    }

    fn categories(&self) -> Box<dyn CategoryReader + '_> {
        Box::new(self.repo())
    }

    fn reader(&self) -> Box<dyn TransactionReader + '_> {
        Box::new(self.repo())
    }
}

pub struct MemoryUnitOfWork {
    inner: Arc<Inner>,
    phase: Phase<Mutex<Tables>>,
}

impl MemoryUnitOfWork {
    fn repo(&self) -> ResultEngine<MemoryRepository<'_>> {
        let staged = self.phase.session()?;
        Ok(MemoryRepository {
            inner: &self.inner,
            staged: Some(staged),
        })
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn start(&mut self) -> ResultEngine<()> {
        self.phase.ensure_idle()?;
        self.phase = Phase::Active(Mutex::new(Tables::default()));
        tracing::debug!("memory unit of work started");
        Ok(())
    }

    fn categories(&self) -> ResultEngine<Box<dyn CategoryRepository + '_>> {
        Ok(Box::new(self.repo()?))
    }

    fn transactions(&self) -> ResultEngine<Box<dyn TransactionRepository + '_>> {
        Ok(Box::new(self.repo()?))
    }

    fn line_details(&self) -> ResultEngine<Box<dyn LineDetailsRepository + '_>> {
        Ok(Box::new(self.repo()?))
    }

    async fn commit(&mut self) -> ResultEngine<()> {
        let staged = self.phase.take_for_commit()?;
        if self.inner.fail_commits.load(Ordering::SeqCst) {
            return Err(injected("commit"));
        }
        let staged = staged.into_inner().unwrap_or_else(PoisonError::into_inner);
        lock(&self.inner.committed).merge(staged);
        self.phase = Phase::Committed;
        tracing::debug!("memory unit of work committed");
        Ok(())
    }

    async fn rollback(&mut self) -> ResultEngine<()> {
        if self.phase.take_for_rollback().is_some() {
            tracing::debug!("memory unit of work rolled back");
        }
        Ok(())
    }

    fn status(&self) -> UnitOfWorkStatus {
        self.phase.status()
    }
}

/// Reads see staged rows first, then committed ones. Writes go to the staged
/// tables; only a unit of work hands out a repository that can write.
struct MemoryRepository<'a> {
    inner: &'a Inner,
    staged: Option<&'a Mutex<Tables>>,
}

impl MemoryRepository<'_> {
    fn read<T>(&self, f: impl Fn(&Tables) -> Option<T>) -> Option<T> {
        if let Some(staged) = self.staged
            && let Some(found) = f(&*lock(staged))
        {
            return Some(found);
        }
        f(&*lock(&self.inner.committed))
    }

    fn write(&self, f: impl FnOnce(&mut Tables, &Tables) -> ResultEngine<()>) -> ResultEngine<()> {
        let Some(staged) = self.staged else {
            return Err(EngineError::UnitOfWorkNotStarted(
                "writes need a started unit of work".to_string(),
            ));
        };
        let committed = lock(&self.inner.committed);
        f(&mut *lock(staged), &*committed)
    }

    fn snapshot(&self) -> Tables {
        let mut tables = lock(&self.inner.committed).clone();
        if let Some(staged) = self.staged {
            tables.merge(lock(staged).clone());
        }
        tables
    }
}

fn duplicate(table: &str, id: Uuid) -> EngineError {
    EngineError::Database(DbErr::Custom(format!(
        "UNIQUE constraint failed: {table} {id}"
    )))
}

#[async_trait]
impl CategoryReader for MemoryRepository<'_> {
    async fn find_one_by_id(&self, id: Uuid) -> ResultEngine<Category> {
        self.read(|t| t.categories.get(&id).cloned())
            .ok_or_else(|| EngineError::KeyNotFound(format!("category {id}")))
    }

    async fn find_by_name_key(&self, name_key: &str) -> ResultEngine<Option<Category>> {
        Ok(self.read(|t| {
            t.categories
                .values()
                .find(|c| c.name_key() == name_key)
                .cloned()
        }))
    }

    async fn list(
        &self,
        filter: &CategoryListFilter,
        page: PageRequest,
    ) -> ResultEngine<Page<Category>> {
        page.validate()?;
        let needle = filter
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(normalize_name_key);

        let mut matching: Vec<Category> = self
            .snapshot()
            .categories
            .into_values()
            .filter(|c| needle.as_deref().is_none_or(|n| c.name_key().contains(n)))
            .filter(|c| filter.kind.is_none_or(|kind| c.has_type(kind)))
            .collect();
        matching.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));

        Ok(paginate(matching, page))
    }
}

#[async_trait]
impl CategoryRepository for MemoryRepository<'_> {
    async fn save(&self, category: &Category) -> ResultEngine<()> {
        self.write(|target, committed| {
            let key = category.name_key();
            let clash = |t: &Tables| {
                t.categories.contains_key(&category.id())
                    || t.categories.values().any(|c| c.name_key() == key)
            };
            if clash(target) || clash(committed) {
                return Err(duplicate("transaction_categories", category.id()));
            }
            target.categories.insert(category.id(), category.clone());
            Ok(())
        })
    }
}

#[async_trait]
impl TransactionRepository for MemoryRepository<'_> {
    async fn save(&self, transaction: &Transaction) -> ResultEngine<()> {
        self.inner.transaction_saves.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_transaction_saves.load(Ordering::SeqCst) {
            return Err(injected("transaction save"));
        }
        self.write(|target, committed| {
            let id = transaction.id();
            if target.transactions.contains_key(&id) || committed.transactions.contains_key(&id) {
                return Err(duplicate("transactions", id));
            }
            target.transactions.insert(id, transaction.clone());
            Ok(())
        })
    }

    async fn find_one_by_id(&self, id: Uuid) -> ResultEngine<Option<Transaction>> {
        Ok(self.read(|t| t.transactions.get(&id).cloned()))
    }
}

#[async_trait]
impl LineDetailsRepository for MemoryRepository<'_> {
    async fn save(&self, details: &LineDetails) -> ResultEngine<()> {
        self.inner.line_details_saves.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_line_details_saves.load(Ordering::SeqCst) {
            return Err(injected("line details save"));
        }
        self.write(|target, committed| {
            let clash = |t: &Tables| {
                t.line_details.contains_key(&details.id())
                    || t.line_details
                        .values()
                        .any(|d| d.transaction_id() == details.transaction_id())
            };
            if clash(target) || clash(committed) {
                return Err(duplicate("transaction_line_details", details.id()));
            }
            target.line_details.insert(details.id(), details.clone());
            Ok(())
        })
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: Uuid,
    ) -> ResultEngine<Option<LineDetails>> {
        Ok(self.read(|t| {
            t.line_details
                .values()
                .find(|d| d.transaction_id() == transaction_id)
                .cloned()
        }))
    }
}

#[async_trait]
impl TransactionReader for MemoryRepository<'_> {
    async fn find_by_period(&self, range: &PeriodRange) -> ResultEngine<Vec<Transaction>> {
        let mut found: Vec<Transaction> = self
            .snapshot()
            .transactions
            .into_values()
            .filter(|tx| range.contains(tx.created_at()))
            .collect();
        found.sort_by_key(Transaction::created_at);
        Ok(found)
    }

    async fn find_transaction(&self, id: Uuid) -> ResultEngine<Option<Transaction>> {
        TransactionRepository::find_one_by_id(self, id).await
    }

    async fn find_line_details(&self, transaction_id: Uuid) -> ResultEngine<Option<LineDetails>> {
        self.find_by_transaction_id(transaction_id).await
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

        let tables = self.snapshot();
        let mut matching: Vec<&Transaction> = tables
            .transactions
            .values()
            .filter(|tx| filter.user_id.is_none_or(|u| tx.user_id() == Some(u)))
            .filter(|tx| filter.kind.is_none_or(|k| tx.kind() == k))
            .filter(|tx| filter.category_id.is_none_or(|c| tx.category_id() == c))
            .filter(|tx| filter.from.is_none_or(|from| tx.created_at() >= from))
            .filter(|tx| filter.to.is_none_or(|to| tx.created_at() <= to))
            .collect();
        matching.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then(b.id().cmp(&a.id()))
        });

        let views = matching
            .into_iter()
            .map(|tx| {
                let category = tables.categories.get(&tx.category_id());
                TransactionView {
                    transaction: tx.clone(),
                    category_name: category.map(|c| c.name().to_string()),
                    category_description: category
                        .and_then(|c| c.description())
                        .map(ToString::to_string),
                }
            })
            .collect();

        Ok(paginate(views, page))
    }
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Page<T> {
    let item_count = items.len() as u64;
    let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let take = usize::try_from(page.take).unwrap_or(usize::MAX);
    let items = items.into_iter().skip(skip).take(take).collect();
    Page::new(items, page, item_count)
}
