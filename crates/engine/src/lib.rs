//! Ledger engine.
//!
//! Records income and expense transactions against categories, optionally
//! broken down into trip line details, and summarizes them over rolling
//! periods. All writes go through a [`UnitOfWork`] so a transaction and its
//! line details are committed together or not at all.

pub use categories::{Category, CategoryType, NewCategory};
pub use commands::{
    CategoryListFilter, CreateCategoryCmd, CreateTransactionCmd, LineDetailsInput,
    TransactionListFilter,
};
pub use error::{EngineError, ErrorKind};
pub use line_details::{LineDetails, NewLineDetails};
pub use money::Amount;
pub use ops::{Engine, EngineBuilder};
pub use page::{DEFAULT_TAKE, MAX_TAKE, Page, PageRequest};
pub use repository::{
    CategoryReader, CategoryRepository, LineDetailsRepository, TransactionReader,
    TransactionRepository, TransactionView,
};
pub use summary::{
    Breakdown, DailySummary, Granularity, MonthlySummary, PeriodRange, SummaryPeriod,
    TransactionSummary, aggregate,
};
pub use transactions::{NewTransaction, Transaction, TransactionType};
pub use unit_of_work::{SeaStorage, SeaUnitOfWork, Storage, UnitOfWork, UnitOfWorkStatus};

pub mod memory;

mod categories;
mod commands;
mod error;
mod line_details;
mod money;
mod ops;
mod page;
mod repository;
mod summary;
mod transactions;
mod unit_of_work;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
