//! Category domain model and its validation contract.
//!
//! # Responsibility
//! - Define the single persisted record of the catalog.
//! - Provide an explicit validation function for the `Title` field.
//!
//! # Invariants
//! - `id` is `None` until storage assigns one on first commit.
//! - Once assigned, `id` never changes for the same row.
//! - `Title` must be non-blank and between 3 and 100 characters.
//!
//! # See also
//! - migrations/0001_categories.sql

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-assigned primary key (`Categories.Id`).
pub type CategoryId = i64;

/// Minimum accepted title length, in characters.
pub const TITLE_MIN_CHARS: usize = 3;
/// Maximum accepted title length, in characters.
pub const TITLE_MAX_CHARS: usize = 100;

const MESSAGE_REQUIRED: &str = "Campo obrigatório";
const MESSAGE_MAX_LENGTH: &str = "Insira no máximo 100 caracteres";
const MESSAGE_MIN_LENGTH: &str = "Insira no mínimo 3 caracteres";
const MESSAGE_NUL_CHARACTER: &str = "Caractere nulo não permitido";

/// One row of the `Categories` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// `None` for categories that were never committed.
    #[serde(rename = "Id")]
    pub id: Option<CategoryId>,
    #[serde(rename = "Title")]
    pub title: String,
}

impl Category {
    /// Creates an unsaved category. Storage assigns the id on commit.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
        }
    }

    /// Creates a category for an already persisted row.
    pub fn with_id(id: CategoryId, title: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            title: title.into(),
        }
    }

    /// Replaces the title. Validation happens at commit, not here.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Returns whether storage has assigned an id to this category.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Checks every field rule and returns all violations.
    ///
    /// # Invariants
    /// - A blank title reports only `Required`; length rules are skipped.
    /// - Length is counted in Unicode scalar values, matching SQLite `length()`.
    ///   Characters outside the BMP count once, not twice as UTF-16 code
    ///   units would, so `"😀😀"` is too short.
    /// - A title containing `'\0'` fails `NulCharacter`; SQLite `length()`
    ///   stops at the first NUL and would disagree with the count here.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        validate_title(&self.title, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn validate_title(title: &str, errors: &mut ValidationErrors) {
    if title.trim().is_empty() {
        errors.push(CategoryField::Title, ValidationRule::Required);
        return;
    }

    if title.contains('\0') {
        errors.push(CategoryField::Title, ValidationRule::NulCharacter);
    }

    let chars = title.chars().count();
    if chars < TITLE_MIN_CHARS {
        errors.push(
            CategoryField::Title,
            ValidationRule::MinLength(TITLE_MIN_CHARS),
        );
    }
    if chars > TITLE_MAX_CHARS {
        errors.push(
            CategoryField::Title,
            ValidationRule::MaxLength(TITLE_MAX_CHARS),
        );
    }
}

/// Validated fields of [`Category`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryField {
    Title,
}

impl CategoryField {
    /// Column name of the field in the `Categories` table.
    pub fn column_name(self) -> &'static str {
        match self {
            Self::Title => "Title",
        }
    }
}

/// Field rule that a value failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    Required,
    MinLength(usize),
    MaxLength(usize),
    NulCharacter,
}

impl ValidationRule {
    /// Human-readable message shown to end users.
    pub fn message(self) -> &'static str {
        match self {
            Self::Required => MESSAGE_REQUIRED,
            Self::MinLength(_) => MESSAGE_MIN_LENGTH,
            Self::MaxLength(_) => MESSAGE_MAX_LENGTH,
            Self::NulCharacter => MESSAGE_NUL_CHARACTER,
        }
    }
}

/// One violated rule on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: CategoryField,
    pub rule: ValidationRule,
}

impl ValidationIssue {
    pub fn message(&self) -> &'static str {
        self.rule.message()
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field.column_name(), self.message())
    }
}

/// Structured list of rules violated by one category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    issues: Vec<ValidationIssue>,
}

impl ValidationErrors {
    fn push(&mut self, field: CategoryField, rule: ValidationRule) {
        self.issues.push(ValidationIssue { field, rule });
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns whether `rule` is among the violations.
    pub fn contains(&self, rule: ValidationRule) -> bool {
        self.issues.iter().any(|issue| issue.rule == rule)
    }

    /// Messages of all violations, in rule order.
    pub fn messages(&self) -> Vec<&'static str> {
        self.issues.iter().map(ValidationIssue::message).collect()
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, issue) in self.issues.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl Error for ValidationErrors {}
