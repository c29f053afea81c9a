use catalog_core::db::DbError;
use catalog_core::{
    AppDbContext, Category, CategoryListQuery, ConfigError, ContextError, ContextOptions,
    EntryState, OpenMode, SaveSummary, ValidationRule,
};
use rusqlite::Connection;
use std::path::Path;

#[test]
fn commit_assigns_id_and_row_is_retrievable() {
    let mut context = open_memory();

    let key = context.categories().add(Category::new("Electronics"));
    assert!(context.has_changes());
    let summary = context.save_changes().unwrap();

    assert_eq!(
        summary,
        SaveSummary {
            inserted: 1,
            updated: 0,
            deleted: 0,
        }
    );
    assert!(!context.has_changes());
    let categories = context.categories();
    assert_eq!(categories.tracked(key).unwrap().id, Some(1));
    assert_eq!(categories.state(key), Some(EntryState::Unchanged));
    assert_eq!(stored_title(context.connection(), 1).as_deref(), Some("Electronics"));
}

#[test]
fn short_title_is_rejected_and_nothing_is_stored() {
    let mut context = open_memory();

    let key = context.categories().add(Category::new("AB"));
    let err = context.save_changes().unwrap_err();

    match &err {
        ContextError::Validation { key: failed, errors } => {
            assert_eq!(*failed, key);
            assert_eq!(errors.messages(), vec!["Insira no mínimo 3 caracteres"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count_rows(context.connection()), 0);
    assert!(context.has_changes());
}

#[test]
fn long_title_is_rejected() {
    let mut context = open_memory();

    context.categories().add(Category::new("x".repeat(101)));
    let err = context.save_changes().unwrap_err();

    let errors = err.validation_errors().unwrap();
    assert!(errors.contains(ValidationRule::MaxLength(100)));
    assert_eq!(count_rows(context.connection()), 0);
}

#[test]
fn title_length_contract_holds_across_lengths() {
    for length in 1..=105 {
        let mut context = open_memory();
        let key = context.categories().add(Category::new("t".repeat(length)));
        let result = context.save_changes();

        if (3..=100).contains(&length) {
            result.unwrap();
            assert!(context.categories().tracked(key).unwrap().id.is_some());
            assert_eq!(count_rows(context.connection()), 1);
        } else {
            assert!(matches!(result, Err(ContextError::Validation { .. })));
            assert_eq!(count_rows(context.connection()), 0);
        }
    }
}

#[test]
fn emptying_title_is_rejected_and_stored_value_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let id = seed(&path, &["Electronics"])[0];

    let mut context = open_file(&path);
    let mut category = context.categories().find(id).unwrap().unwrap();
    category.set_title("");
    context.categories().update(category).unwrap();

    let err = context.save_changes().unwrap_err();
    assert_eq!(
        err.validation_errors().unwrap().messages(),
        vec!["Campo obrigatório"]
    );
    assert_eq!(stored_title(context.connection(), id).as_deref(), Some("Electronics"));

    let mut other = open_file(&path);
    assert_eq!(
        other.categories().find(id).unwrap().unwrap().title,
        "Electronics"
    );
}

#[test]
fn one_invalid_entry_blocks_the_whole_commit() {
    let mut context = open_memory();

    context.categories().add(Category::new("Books"));
    let invalid = context.categories().add(Category::new("x"));
    let err = context.save_changes().unwrap_err();

    assert!(matches!(err, ContextError::Validation { key, .. } if key == invalid));
    assert_eq!(count_rows(context.connection()), 0);

    assert!(context.categories().discard(invalid));
    assert_eq!(context.save_changes().unwrap().inserted, 1);
    assert_eq!(count_rows(context.connection()), 1);
}

#[test]
fn stored_category_roundtrips_through_a_new_context() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");

    let mut context = open_file(&path);
    let key = context.categories().add(Category::new("Garden & Outdoor"));
    context.save_changes().unwrap();
    let id = context.categories().tracked(key).unwrap().id.unwrap();
    context.close().unwrap();

    let mut reopened = open_file(&path);
    let first = reopened.categories().find(id).unwrap().unwrap();
    let second = reopened.categories().find(id).unwrap().unwrap();
    assert_eq!(first.title, "Garden & Outdoor");
    assert_eq!(first, second);
}

#[test]
fn pending_changes_are_local_to_the_context() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");

    let mut writer = open_file(&path);
    writer.categories().add(Category::new("Music"));
    assert_eq!(writer.categories().count().unwrap(), 1);

    let reader = open_file(&path);
    assert_eq!(count_rows(reader.connection()), 0);

    writer.save_changes().unwrap();
    assert_eq!(count_rows(reader.connection()), 1);
}

#[test]
fn update_and_remove_are_deferred_until_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let ids = seed(&path, &["Books", "Games"]);

    let mut context = open_file(&path);
    context
        .categories()
        .update(Category::with_id(ids[1], "Board Games"))
        .unwrap();
    context.categories().remove(ids[0]).unwrap();

    assert_eq!(stored_title(context.connection(), ids[0]).as_deref(), Some("Books"));
    assert_eq!(stored_title(context.connection(), ids[1]).as_deref(), Some("Games"));
    assert!(context.categories().find(ids[0]).unwrap().is_none());

    let summary = context.save_changes().unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.total(), 2);
    assert_eq!(stored_title(context.connection(), ids[0]), None);
    assert_eq!(
        stored_title(context.connection(), ids[1]).as_deref(),
        Some("Board Games")
    );
}

#[test]
fn failed_commit_rolls_back_every_statement() {
    let mut context = open_memory();
    context.categories().add(Category::new("Toys"));
    context.save_changes().unwrap();

    context.categories().remove(1).unwrap();
    context
        .categories()
        .update(Category::with_id(999, "Ghost"))
        .unwrap();
    context.categories().add(Category::new("Books"));

    let err = context.save_changes().unwrap_err();
    assert!(matches!(err, ContextError::NotFound(999)));
    assert_eq!(count_rows(context.connection()), 1);
    assert_eq!(stored_title(context.connection(), 1).as_deref(), Some("Toys"));
    assert!(context.has_changes());

    context.discard_changes();
    assert!(!context.has_changes());
    assert_eq!(context.categories().find(1).unwrap().unwrap().title, "Toys");
}

#[test]
fn remove_rules() {
    let mut context = open_memory();

    let err = context.categories().remove(42).unwrap_err();
    assert!(matches!(err, ContextError::NotFound(42)));

    context.categories().add(Category::new("Books"));
    context.save_changes().unwrap();
    context.categories().remove(1).unwrap();
    assert!(matches!(
        context.categories().remove(1).unwrap_err(),
        ContextError::NotFound(1)
    ));
    assert!(matches!(
        context
            .categories()
            .update(Category::with_id(1, "Novels"))
            .unwrap_err(),
        ContextError::NotFound(1)
    ));
}

#[test]
fn update_requires_a_persisted_category() {
    let mut context = open_memory();

    let err = context
        .categories()
        .update(Category::new("Books"))
        .unwrap_err();
    assert!(matches!(err, ContextError::MissingId));
}

#[test]
fn re_adding_a_removed_id_replaces_the_staged_delete() {
    let mut context = open_memory();
    context.categories().add(Category::new("Books"));
    context.save_changes().unwrap();

    let mut categories = context.categories();
    categories.remove(1).unwrap();
    let key = categories.add(Category::with_id(1, "Novels"));

    assert_eq!(categories.state(key), Some(EntryState::Modified));
    assert_eq!(
        categories.find(1).unwrap(),
        Some(Category::with_id(1, "Novels"))
    );
    assert_eq!(
        categories.to_list().unwrap(),
        vec![Category::with_id(1, "Novels")]
    );

    let summary = context.save_changes().unwrap();
    assert_eq!(
        summary,
        SaveSummary {
            inserted: 0,
            updated: 1,
            deleted: 0,
        }
    );
    assert_eq!(stored_title(context.connection(), 1).as_deref(), Some("Novels"));
}

#[test]
fn embedded_nul_is_a_validation_error_not_a_storage_error() {
    let mut context = open_memory();

    context.categories().add(Category::new("a\0bcd"));
    let err = context.save_changes().unwrap_err();

    let errors = err.validation_errors().unwrap();
    assert!(errors.contains(ValidationRule::NulCharacter));
    assert_eq!(count_rows(context.connection()), 0);
}

#[test]
fn explicit_duplicate_id_fails_at_commit() {
    let mut context = open_memory();
    context.categories().add(Category::new("Books"));
    context.save_changes().unwrap();

    context.categories().add(Category::with_id(1, "Duplicate"));
    let err = context.save_changes().unwrap_err();

    assert!(matches!(err, ContextError::Db(DbError::Sqlite(_))));
    assert_eq!(stored_title(context.connection(), 1).as_deref(), Some("Books"));
}

#[test]
fn merged_view_supports_enumerate_filter_and_list() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let ids = seed(&path, &["Books", "Games", "Video Games"]);

    let mut context = open_file(&path);
    context
        .categories()
        .update(Category::with_id(ids[1], "Board Games"))
        .unwrap();
    context.categories().remove(ids[0]).unwrap();
    context.categories().add(Category::new("Game Music"));

    let categories = context.categories();
    let titles: Vec<String> = categories
        .to_list()
        .unwrap()
        .into_iter()
        .map(|category| category.title)
        .collect();
    assert_eq!(titles, vec!["Board Games", "Video Games", "Game Music"]);

    let unsaved = categories
        .filter(|category| !category.is_persisted())
        .unwrap();
    assert_eq!(unsaved, vec![Category::new("Game Music")]);

    let page = categories
        .list(&CategoryListQuery {
            title_contains: Some("GAME".to_string()),
            limit: Some(1),
            offset: 1,
        })
        .unwrap();
    assert_eq!(page, vec![Category::with_id(ids[2], "Video Games")]);
    assert_eq!(categories.count().unwrap(), 3);
}

#[test]
fn unreachable_storage_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = ContextOptions::file(dir.path().join("missing.db")).with_mode(OpenMode::ReadWrite);

    let err = AppDbContext::open(&missing).err().unwrap();
    assert!(matches!(
        err,
        ContextError::Config(ConfigError::Unreachable { .. })
    ));

    let err = AppDbContext::from_connection_string("Mode=ReadWrite").err().unwrap();
    assert!(matches!(
        err,
        ContextError::Config(ConfigError::MissingConnectionString)
    ));
}

#[test]
fn read_only_context_fails_at_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    seed(&path, &["Books"]);

    let connection_string = format!("Data Source={};Mode=ReadOnly", path.display());
    let mut context = AppDbContext::from_connection_string(&connection_string).unwrap();
    assert_eq!(context.categories().count().unwrap(), 1);

    context.categories().add(Category::new("Games"));
    let err = context.save_changes().unwrap_err();
    assert!(matches!(err, ContextError::Db(_)));
    assert_eq!(count_rows(context.connection()), 1);
}

#[test]
fn empty_commit_is_a_no_op() {
    let mut context = open_memory();
    assert_eq!(context.save_changes().unwrap(), SaveSummary::default());
    context.close().unwrap();
}

fn open_memory() -> AppDbContext {
    AppDbContext::open(&ContextOptions::in_memory()).unwrap()
}

fn open_file(path: &Path) -> AppDbContext {
    AppDbContext::open(&ContextOptions::file(path)).unwrap()
}

fn seed(path: &Path, titles: &[&str]) -> Vec<i64> {
    let mut context = open_file(path);
    let keys: Vec<_> = titles
        .iter()
        .map(|title| context.categories().add(Category::new(*title)))
        .collect();
    context.save_changes().unwrap();

    let categories = context.categories();
    let ids = keys
        .into_iter()
        .map(|key| categories.tracked(key).unwrap().id.unwrap())
        .collect();
    ids
}

fn count_rows(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM Categories;", [], |row| row.get(0))
        .unwrap()
}

fn stored_title(conn: &Connection, id: i64) -> Option<String> {
    conn.query_row("SELECT Title FROM Categories WHERE Id = ?1;", [id], |row| {
        row.get(0)
    })
    .ok()
}
