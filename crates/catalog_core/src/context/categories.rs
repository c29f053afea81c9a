//! Typed `Categories` collection handle and its SQL.
//!
//! # Responsibility
//! - Stage inserts, updates and deletes in the change tracker.
//! - Serve reads as storage rows merged with the session's pending changes.
//!
//! # Invariants
//! - Nothing here writes to storage; writes happen in `save_changes`.
//! - Reads never return a category staged for deletion.

use super::tracker::{ChangeTracker, EntryKey, EntryState};
use super::{ContextError, ContextResult};
use crate::model::category::{Category, CategoryId};
use rusqlite::{params, Connection, OptionalExtension, Row};

const CATEGORY_SELECT_SQL: &str = "SELECT Id, Title FROM Categories";

/// Options for [`Categories::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryListQuery {
    /// Case-insensitive substring match on `Title`.
    pub title_contains: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Collection accessor returned by `AppDbContext::categories`.
pub struct Categories<'ctx> {
    conn: &'ctx Connection,
    tracker: &'ctx mut ChangeTracker,
}

impl<'ctx> Categories<'ctx> {
    pub(crate) fn new(conn: &'ctx Connection, tracker: &'ctx mut ChangeTracker) -> Self {
        Self { conn, tracker }
    }

    /// Stages an insert.
    ///
    /// A category that already carries an id is inserted with that id;
    /// storage rejects duplicates at commit. Re-adding an id staged for
    /// deletion revives that entry as modified and returns its key.
    pub fn add(&mut self, category: Category) -> EntryKey {
        if let Some(key) = category.id.and_then(|id| self.tracker.key_for_id(id)) {
            if let Some(entry) = self.tracker.get_mut(key) {
                if entry.state == EntryState::Deleted {
                    entry.category = category;
                    entry.state = EntryState::Modified;
                    return key;
                }
            }
        }

        self.tracker.attach(category, EntryState::Added)
    }

    /// Finds a category by id, preferring the tracked copy.
    ///
    /// A row loaded from storage becomes tracked as unchanged.
    pub fn find(&mut self, id: CategoryId) -> ContextResult<Option<Category>> {
        if let Some(key) = self.tracker.key_for_id(id) {
            return Ok(self
                .tracker
                .get(key)
                .filter(|entry| entry.state != EntryState::Deleted)
                .map(|entry| entry.category.clone()));
        }

        match load_category(self.conn, id)? {
            Some(category) => {
                self.tracker
                    .attach(category.clone(), EntryState::Unchanged);
                Ok(Some(category))
            }
            None => Ok(None),
        }
    }

    /// Stages an update of a persisted category.
    ///
    /// # Errors
    /// - `MissingId` when `category` was never committed.
    /// - `NotFound` when the category is already staged for deletion.
    ///
    /// An untracked category is attached as modified without a read; a
    /// missing row surfaces as `NotFound` at commit.
    pub fn update(&mut self, category: Category) -> ContextResult<EntryKey> {
        let id = category.id.ok_or(ContextError::MissingId)?;

        let Some(key) = self.tracker.key_for_id(id) else {
            return Ok(self.tracker.attach(category, EntryState::Modified));
        };

        let entry = self
            .tracker
            .get_mut(key)
            .ok_or(ContextError::NotFound(id))?;
        entry.state = match entry.state {
            EntryState::Deleted => return Err(ContextError::NotFound(id)),
            EntryState::Added => EntryState::Added,
            EntryState::Unchanged | EntryState::Modified => EntryState::Modified,
        };
        entry.category = category;
        Ok(key)
    }

    /// Stages a delete by id.
    ///
    /// # Errors
    /// - `NotFound` when neither the session nor storage knows `id`.
    pub fn remove(&mut self, id: CategoryId) -> ContextResult<()> {
        if let Some(key) = self.tracker.key_for_id(id) {
            return self.remove_entry(key, id);
        }

        let category = load_category(self.conn, id)?.ok_or(ContextError::NotFound(id))?;
        self.tracker.attach(category, EntryState::Deleted);
        Ok(())
    }

    fn remove_entry(&mut self, key: EntryKey, id: CategoryId) -> ContextResult<()> {
        let state = self.state(key).ok_or(ContextError::NotFound(id))?;
        match state {
            EntryState::Added => {
                self.tracker.detach(key);
            }
            EntryState::Deleted => return Err(ContextError::NotFound(id)),
            EntryState::Unchanged | EntryState::Modified => {
                if let Some(entry) = self.tracker.get_mut(key) {
                    entry.state = EntryState::Deleted;
                }
            }
        }
        Ok(())
    }

    /// Drops a staged insert that has no id yet.
    ///
    /// Returns whether an entry was discarded.
    pub fn discard(&mut self, key: EntryKey) -> bool {
        match self.tracker.get(key) {
            Some(entry) if entry.state == EntryState::Added => {
                self.tracker.detach(key);
                true
            }
            _ => false,
        }
    }

    /// Returns the tracked category behind `key`.
    pub fn tracked(&self, key: EntryKey) -> Option<&Category> {
        self.tracker.get(key).map(|entry| &entry.category)
    }

    /// Returns the pending-change state behind `key`.
    pub fn state(&self, key: EntryKey) -> Option<EntryState> {
        self.tracker.get(key).map(|entry| entry.state)
    }

    /// Enumerates storage rows merged with pending changes.
    ///
    /// Rows come ordered by id; staged inserts follow in staging order.
    pub fn to_list(&self) -> ContextResult<Vec<Category>> {
        let mut merged = Vec::new();

        for stored in load_all_categories(self.conn)? {
            let Some(id) = stored.id else { continue };
            match self.tracker.key_for_id(id).and_then(|key| self.tracker.get(key)) {
                Some(entry) if entry.state == EntryState::Deleted => {}
                Some(entry) if entry.state != EntryState::Added => {
                    merged.push(entry.category.clone())
                }
                _ => merged.push(stored),
            }
        }

        merged.extend(
            self.tracker
                .iter()
                .filter(|(_, entry)| entry.state == EntryState::Added)
                .map(|(_, entry)| entry.category.clone()),
        );
        Ok(merged)
    }

    /// Query-by-predicate over the merged view.
    pub fn filter<P>(&self, predicate: P) -> ContextResult<Vec<Category>>
    where
        P: Fn(&Category) -> bool,
    {
        Ok(self
            .to_list()?
            .into_iter()
            .filter(|category| predicate(category))
            .collect())
    }

    /// Title search with pagination over the merged view.
    pub fn list(&self, query: &CategoryListQuery) -> ContextResult<Vec<Category>> {
        let needle = query
            .title_contains
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
            .map(str::to_lowercase);

        let matches = self.filter(|category| match &needle {
            Some(needle) => category.title.to_lowercase().contains(needle.as_str()),
            None => true,
        })?;

        Ok(matches
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    /// Number of categories in the merged view.
    pub fn count(&self) -> ContextResult<usize> {
        Ok(self.to_list()?.len())
    }
}

fn load_category(conn: &Connection, id: CategoryId) -> ContextResult<Option<Category>> {
    let mut stmt = conn.prepare_cached(&format!("{CATEGORY_SELECT_SQL} WHERE Id = ?1;"))?;
    let row = stmt
        .query_row([id], |row| Ok(parse_category_row(row)))
        .optional()?;
    row.transpose()
}

fn load_all_categories(conn: &Connection) -> ContextResult<Vec<Category>> {
    let mut stmt = conn.prepare_cached(&format!("{CATEGORY_SELECT_SQL} ORDER BY Id ASC;"))?;
    let mut rows = stmt.query([])?;
    let mut categories = Vec::new();

    while let Some(row) = rows.next()? {
        categories.push(parse_category_row(row)?);
    }

    Ok(categories)
}

fn parse_category_row(row: &Row<'_>) -> ContextResult<Category> {
    let id: CategoryId = row.get("Id")?;
    let title = row
        .get::<_, Option<String>>("Title")?
        .ok_or_else(|| ContextError::InvalidData(format!("null Title for Categories.Id {id}")))?;
    Ok(Category::with_id(id, title))
}

pub(crate) fn insert_category(conn: &Connection, category: &Category) -> ContextResult<CategoryId> {
    conn.execute(
        "INSERT INTO Categories (Id, Title) VALUES (?1, ?2);",
        params![category.id, category.title.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn update_category(conn: &Connection, category: &Category) -> ContextResult<()> {
    let id = category.id.ok_or(ContextError::MissingId)?;
    let changed = conn.execute(
        "UPDATE Categories SET Title = ?1 WHERE Id = ?2;",
        params![category.title.as_str(), id],
    )?;

    if changed == 0 {
        return Err(ContextError::NotFound(id));
    }
    Ok(())
}

pub(crate) fn delete_category(conn: &Connection, id: CategoryId) -> ContextResult<()> {
    let changed = conn.execute("DELETE FROM Categories WHERE Id = ?1;", [id])?;

    if changed == 0 {
        return Err(ContextError::NotFound(id));
    }
    Ok(())
}
