use std::sync::Arc;

use chrono_tz::Tz;
use sea_orm::DatabaseConnection;

use crate::{
    EngineError, ResultEngine,
    unit_of_work::{SeaStorage, Storage, UnitOfWork},
};

mod categories;
mod summary;
mod transactions;

/// Run a block inside a unit of work, committing on success and rolling back
/// on any error, including a failed commit.
macro_rules! with_uow {
    ($self:expr, |$uow:ident| $body:expr) => {{
        let mut $uow = $self.storage.unit_of_work();
        $uow.start().await?;
        let result = $body;
        match result {
            Ok(value) => match $uow.commit().await {
                Ok(()) => Ok(value),
                Err(err) => {
                    tracing::warn!("commit failed: {err}");
                    super::release(&mut $uow).await;
                    Err(err)
                }
            },
            Err(err) => {
                tracing::warn!("rolling back: {err}");
                super::release(&mut $uow).await;
                Err(err)
            }
        }
    }};
}

pub(crate) use with_uow;

/// Rolls back, logging instead of surfacing a failure so the original error
/// reaches the caller.
async fn release(uow: &mut Box<dyn UnitOfWork>) {
    if let Err(err) = uow.rollback().await {
        tracing::warn!("rollback failed: {err}");
    }
}

pub struct Engine {
    storage: Arc<dyn Storage>,
    timezone: Tz,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("timezone", &self.timezone)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Time zone used for period boundaries and bucket keys.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    storage: Option<Arc<dyn Storage>>,
    timezone: Option<Tz>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.storage = Some(Arc::new(SeaStorage::new(db)));
        self
    }

    /// Use a custom storage backend instead of a database.
    pub fn storage(mut self, storage: impl Storage + 'static) -> EngineBuilder {
        self.storage = Some(Arc::new(storage));
        self
    }

    /// Defaults to UTC.
    pub fn timezone(mut self, timezone: Tz) -> EngineBuilder {
        self.timezone = Some(timezone);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let storage = self.storage.ok_or_else(|| {
            EngineError::Configuration("a database or storage backend is required".to_string())
        })?;
        Ok(Engine {
            storage,
            timezone: self.timezone.unwrap_or(Tz::UTC),
        })
    }
}
