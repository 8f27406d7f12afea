use uuid::Uuid;

use crate::{
    Amount, CreateTransactionCmd, LineDetails, LineDetailsInput, NewLineDetails, NewTransaction,
    Page, PageRequest, ResultEngine, Transaction, TransactionListFilter,
    repository::{CategoryReader, TransactionView},
    unit_of_work::UnitOfWork,
};

use super::{Engine, with_uow};

impl Engine {
    /// Creates a transaction, and its line details when given, atomically.
    ///
    /// Either the transaction and its line details are both committed or
    /// nothing is written.
    pub async fn create_transaction(&self, cmd: CreateTransactionCmd) -> ResultEngine<Transaction> {
        let category_id = cmd.category_id;
        let tx = with_uow!(self, |uow| Self::stage_transaction(uow.as_ref(), cmd).await)?;
        tracing::info!(
            "created transaction {} ({} {}) in category {category_id}",
            tx.id(),
            tx.kind().as_str(),
            tx.amount()
        );
        Ok(tx)
    }

    async fn stage_transaction(
        uow: &dyn UnitOfWork,
        cmd: CreateTransactionCmd,
    ) -> ResultEngine<Transaction> {
        let category = uow.categories()?.find_one_by_id(cmd.category_id).await?;
        let transaction_id = Uuid::new_v4();

        let (amount, line_details_id) = match cmd.line_details {
            Some(input) => {
                let details = Self::stage_line_details(uow, transaction_id, input).await?;
                (details.total(), Some(details.id()))
            }
            None => (
                cmd.amount
                    .map(Amount::from_major_units)
                    .transpose()?
                    .unwrap_or(Amount::ZERO),
                None,
            ),
        };

        let tx = Transaction::new(NewTransaction {
            id: Some(transaction_id),
            user_id: cmd.user_id,
            category_id: category.id(),
            description: cmd.description,
            amount,
            kind: cmd.kind,
            line_details_id,
            created_at: cmd.created_at,
        })?;
        uow.transactions()?.save(&tx).await?;
        Ok(tx)
    }

    async fn stage_line_details(
        uow: &dyn UnitOfWork,
        transaction_id: Uuid,
        input: LineDetailsInput,
    ) -> ResultEngine<LineDetails> {
        let details = LineDetails::new(NewLineDetails {
            id: None,
            transaction_id,
            amount_go: Amount::from_major_units(input.amount_go)?,
            amount_return: Amount::from_major_units(input.amount_return)?,
            drive_change: Amount::from_major_units(input.drive_change)?,
        })?;
        uow.line_details()?.save(&details).await?;
        tracing::debug!(
            "staged line details {} for transaction {transaction_id}",
            details.id()
        );
        Ok(details)
    }

    /// Fetches a transaction by id.
    pub async fn transaction(&self, id: Uuid) -> ResultEngine<Option<Transaction>> {
        self.storage.reader().find_transaction(id).await
    }

    /// Fetches the line details attached to a transaction, if any.
    pub async fn line_details(&self, transaction_id: Uuid) -> ResultEngine<Option<LineDetails>> {
        self.storage.reader().find_line_details(transaction_id).await
    }

    /// Lists transactions newest first.
    pub async fn list_transactions(
        &self,
        filter: &TransactionListFilter,
        page: PageRequest,
    ) -> ResultEngine<Page<TransactionView>> {
        self.storage.reader().list(filter, page).await
    }
}
