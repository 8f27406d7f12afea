//! Unit of work and storage factory.
//!
//! A [`UnitOfWork`] goes `Idle -> Active -> {Committed, RolledBack}`. While
//! active, every repository it hands out shares one storage session, so the
//! writes they make land or vanish together. A failed commit leaves the unit
//! in `Failed`; rolling back from any terminal state is a no-op.

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::{
    EngineError, ResultEngine,
    repository::{
        CategoryReader, CategoryRepository, LineDetailsRepository, SeaCategoryRepository,
        SeaLineDetailsRepository, SeaTransactionReader, SeaTransactionRepository,
        TransactionReader, TransactionRepository,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitOfWorkStatus {
    Idle,
    Active,
    Committed,
    RolledBack,
    Failed,
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Opens the storage session. Fails if the unit was already started.
    async fn start(&mut self) -> ResultEngine<()>;

    fn categories(&self) -> ResultEngine<Box<dyn CategoryRepository + '_>>;

    fn transactions(&self) -> ResultEngine<Box<dyn TransactionRepository + '_>>;

    fn line_details(&self) -> ResultEngine<Box<dyn LineDetailsRepository + '_>>;

    /// Applies every write made through this unit's repositories.
    async fn commit(&mut self) -> ResultEngine<()>;

    /// Discards pending writes. Does nothing unless the unit is active.
    async fn rollback(&mut self) -> ResultEngine<()>;

    fn status(&self) -> UnitOfWorkStatus;
}

/// Produces fresh units of work and read-only views. Writes are only
/// possible through a started [`UnitOfWork`].
pub trait Storage: Send + Sync {
    fn unit_of_work(&self) -> Box<dyn UnitOfWork>;

    fn categories(&self) -> Box<dyn CategoryReader + '_>;

    fn reader(&self) -> Box<dyn TransactionReader + '_>;
}

/// Lifecycle of a unit of work holding a session of type `S`.
#[derive(Debug)]
pub(crate) enum Phase<S> {
    Idle,
    Active(S),
    Committed,
    RolledBack,
    Failed,
}

impl<S> Phase<S> {
    pub(crate) fn status(&self) -> UnitOfWorkStatus {
        match self {
            Self::Idle => UnitOfWorkStatus::Idle,
            Self::Active(_) => UnitOfWorkStatus::Active,
            Self::Committed => UnitOfWorkStatus::Committed,
            Self::RolledBack => UnitOfWorkStatus::RolledBack,
            Self::Failed => UnitOfWorkStatus::Failed,
        }
    }

    pub(crate) fn ensure_idle(&self) -> ResultEngine<()> {
        match self {
            Self::Idle => Ok(()),
            other => Err(EngineError::UnitOfWorkState(format!(
                "cannot start a unit of work that is {:?}",
                other.status()
            ))),
        }
    }

    pub(crate) fn session(&self) -> ResultEngine<&S> {
        match self {
            Self::Active(session) => Ok(session),
            Self::Idle => Err(EngineError::UnitOfWorkNotStarted(
                "call start() before requesting a repository".to_string(),
            )),
            other => Err(EngineError::UnitOfWorkState(format!(
                "repositories are unavailable once the unit of work is {:?}",
                other.status()
            ))),
        }
    }

    /// Takes the session out for commit, leaving `Failed` behind until the
    /// caller records the outcome.
    pub(crate) fn take_for_commit(&mut self) -> ResultEngine<S> {
        match std::mem::replace(self, Self::Failed) {
            Self::Active(session) => Ok(session),
            Self::Idle => {
                *self = Self::Idle;
                Err(EngineError::UnitOfWorkNotStarted(
                    "call start() before commit()".to_string(),
                ))
            }
            other => {
                let status = other.status();
                *self = other;
                Err(EngineError::UnitOfWorkState(format!(
                    "cannot commit a unit of work that is {status:?}"
                )))
            }
        }
    }

    /// Takes the session out for rollback, if there is one.
    pub(crate) fn take_for_rollback(&mut self) -> Option<S> {
        match self {
            Self::Active(_) => match std::mem::replace(self, Self::RolledBack) {
                Self::Active(session) => Some(session),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Unit of work over a SeaORM database transaction.
pub struct SeaUnitOfWork {
    db: DatabaseConnection,
    phase: Phase<DatabaseTransaction>,
}

impl SeaUnitOfWork {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            phase: Phase::Idle,
        }
    }
}

#[async_trait]
impl UnitOfWork for SeaUnitOfWork {
    async fn start(&mut self) -> ResultEngine<()> {
        self.phase.ensure_idle()?;
        let db_tx = self.db.begin().await?;
        self.phase = Phase::Active(db_tx);
        tracing::debug!("unit of work started");
        Ok(())
    }

    fn categories(&self) -> ResultEngine<Box<dyn CategoryRepository + '_>> {
        let db_tx = self.phase.session()?;
        Ok(Box::new(SeaCategoryRepository::new(db_tx)))
    }

    fn transactions(&self) -> ResultEngine<Box<dyn TransactionRepository + '_>> {
        let db_tx = self.phase.session()?;
        Ok(Box::new(SeaTransactionRepository::new(db_tx)))
    }

    fn line_details(&self) -> ResultEngine<Box<dyn LineDetailsRepository + '_>> {
        let db_tx = self.phase.session()?;
        Ok(Box::new(SeaLineDetailsRepository::new(db_tx)))
    }

    async fn commit(&mut self) -> ResultEngine<()> {
        let db_tx = self.phase.take_for_commit()?;
        // On error the transaction is dropped, which rolls it back.
        db_tx.commit().await?;
        self.phase = Phase::Committed;
        tracing::debug!("unit of work committed");
        Ok(())
    }

    async fn rollback(&mut self) -> ResultEngine<()> {
        if let Some(db_tx) = self.phase.take_for_rollback() {
            db_tx.rollback().await?;
            tracing::debug!("unit of work rolled back");
        }
        Ok(())
    }

    fn status(&self) -> UnitOfWorkStatus {
        self.phase.status()
    }
}

/// [`Storage`] backed by a SeaORM connection.
#[derive(Clone, Debug)]
pub struct SeaStorage {
    db: DatabaseConnection,
}

impl SeaStorage {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl Storage for SeaStorage {
    fn unit_of_work(&self) -> Box<dyn UnitOfWork> {
        Box::new(SeaUnitOfWork::new(self.db.clone()))
    }

    fn categories(&self) -> Box<dyn CategoryReader + '_> {
        Box::new(SeaCategoryRepository::new(&self.db))
    }

    fn reader(&self) -> Box<dyn TransactionReader + '_> {
        Box::new(SeaTransactionReader::new(&self.db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_transitions() {
        let mut phase: Phase<u8> = Phase::Idle;
        assert_eq!(
            phase.session().unwrap_err().kind(),
            crate::ErrorKind::State
        );
        assert!(matches!(
            phase.session().unwrap_err(),
            EngineError::UnitOfWorkNotStarted(_)
        ));
        assert!(phase.take_for_rollback().is_none());
        assert_eq!(phase.status(), UnitOfWorkStatus::Idle);

        phase.ensure_idle().unwrap();
        phase = Phase::Active(1);
        assert!(matches!(
            phase.ensure_idle().unwrap_err(),
            EngineError::UnitOfWorkState(_)
        ));
        assert_eq!(*phase.session().unwrap(), 1);

        assert_eq!(phase.take_for_commit().unwrap(), 1);
        assert_eq!(phase.status(), UnitOfWorkStatus::Failed);
        phase = Phase::Committed;
        assert!(phase.take_for_rollback().is_none());
        assert!(matches!(
            phase.take_for_commit().unwrap_err(),
            EngineError::UnitOfWorkState(_)
        ));
        assert_eq!(phase.status(), UnitOfWorkStatus::Committed);
        assert!(matches!(
            phase.session().unwrap_err(),
            EngineError::UnitOfWorkState(_)
        ));
    }

    #[test]
    fn rollback_releases_session_once() {
        let mut phase: Phase<u8> = Phase::Active(3);
        assert_eq!(phase.take_for_rollback(), Some(3));
        assert_eq!(phase.status(), UnitOfWorkStatus::RolledBack);
        assert_eq!(phase.take_for_rollback(), None);
    }
}
