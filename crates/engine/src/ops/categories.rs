use uuid::Uuid;

use crate::{
    Category, CategoryListFilter, CreateCategoryCmd, EngineError, NewCategory, Page, PageRequest,
    ResultEngine, repository::CategoryReader, unit_of_work::UnitOfWork,
};

use super::{Engine, with_uow};

impl Engine {
    /// Creates a category. Names are unique ignoring case and accents.
    pub async fn create_category(&self, cmd: CreateCategoryCmd) -> ResultEngine<Category> {
        let category = Category::new(NewCategory {
            id: None,
            user_id: cmd.user_id,
            name: cmd.name,
            description: cmd.description,
            types: cmd.types,
        })?;
        with_uow!(self, |uow| Self::stage_category(uow.as_ref(), &category).await)?;
        tracing::info!("created category {} ({})", category.id(), category.name());
        Ok(category)
    }

    async fn stage_category(uow: &dyn UnitOfWork, category: &Category) -> ResultEngine<()> {
        let repo = uow.categories()?;
        if repo.find_by_name_key(&category.name_key()).await?.is_some() {
            return Err(EngineError::ExistingKey(category.name().to_string()));
        }
        repo.save(category).await
    }

    /// Fetches a category by id.
    pub async fn category(&self, id: Uuid) -> ResultEngine<Category> {
        self.storage.categories().find_one_by_id(id).await
    }

    /// Lists categories ordered by name.
    pub async fn list_categories(
        &self,
        filter: &CategoryListFilter,
        page: PageRequest,
    ) -> ResultEngine<Page<Category>> {
        self.storage.categories().list(filter, page).await
    }
}
