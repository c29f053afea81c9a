//! Category use-case service.
//!
//! # Responsibility
//! - Offer one-call create/rename/delete entry points that commit immediately.
//! - Keep the borrowed context clean after every call.
//!
//! # Invariants
//! - Service APIs never bypass context validation or commit contracts.
//! - A failed call discards its staged change, so storage and session agree.

use crate::context::{AppDbContext, CategoryListQuery, ContextError, ContextResult};
use crate::model::category::{Category, CategoryId};

/// Commit-per-call wrapper around an [`AppDbContext`].
pub struct CategoryService<'ctx> {
    context: &'ctx mut AppDbContext,
}

impl<'ctx> CategoryService<'ctx> {
    /// Wraps a context. Changes already staged on it are discarded.
    pub fn new(context: &'ctx mut AppDbContext) -> Self {
        context.discard_changes();
        Self { context }
    }

    /// Creates a category and returns the id storage assigned.
    pub fn create(&mut self, title: impl Into<String>) -> ContextResult<CategoryId> {
        let key = self.context.categories().add(Category::new(title));
        self.commit()?;

        let assigned = self
            .context
            .categories()
            .tracked(key)
            .and_then(|category| category.id);
        assigned.ok_or_else(|| ContextError::InvalidData("insert did not assign an id".to_string()))
    }

    /// Replaces the title of an existing category.
    pub fn rename(&mut self, id: CategoryId, title: impl Into<String>) -> ContextResult<Category> {
        let mut category = self
            .context
            .categories()
            .find(id)?
            .ok_or(ContextError::NotFound(id))?;
        category.set_title(title);

        self.context.categories().update(category.clone())?;
        self.commit()?;
        Ok(category)
    }

    /// Deletes a category by id.
    pub fn delete(&mut self, id: CategoryId) -> ContextResult<()> {
        self.context.categories().remove(id)?;
        self.commit()?;
        Ok(())
    }

    pub fn get(&mut self, id: CategoryId) -> ContextResult<Option<Category>> {
        self.context.categories().find(id)
    }

    pub fn list(&mut self, query: &CategoryListQuery) -> ContextResult<Vec<Category>> {
        self.context.categories().list(query)
    }

    fn commit(&mut self) -> ContextResult<()> {
        match self.context.save_changes() {
            Ok(_) => Ok(()),
            Err(err) => {
                self.context.discard_changes();
                Err(err)
            }
        }
    }
}
