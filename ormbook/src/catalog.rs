//! The numbered index of patterns and a runner that executes one by number.
//!
//! [`run`] calls each pattern with the demo arguments listed in its
//! description and turns the result into JSON for the CLI.

use ormbook_core::logging::pattern_span;
use ormbook_core::{OrmError, OrmResult, Settings};
use ormbook_db::DbExecutor;
use serde::Serialize;
use serde_json::json;
use tracing::Instrument;

use crate::patterns;

/// One entry in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pattern {
    pub number: u8,
    pub title: &'static str,
    pub description: &'static str,
}

const fn pattern(number: u8, title: &'static str, description: &'static str) -> Pattern {
    Pattern {
        number,
        title,
        description,
    }
}

/// Every pattern, in order.
pub static PATTERNS: [Pattern; 20] = [
    pattern(1, "First user", "The user with the lowest id, or nothing on an empty table."),
    pattern(2, "All users", "Every user in default (id) order."),
    pattern(3, "Filter by name", "Users whose name is exactly \"John\"."),
    pattern(
        4,
        "Get by id",
        "The user with id 1; a missing id raises DoesNotExist.",
    ),
    pattern(5, "Exclude", "Users that are not admins."),
    pattern(6, "Count", "The number of users."),
    pattern(7, "Order by", "All users sorted by name."),
    pattern(8, "Aggregate", "The average age of all users."),
    pattern(
        9,
        "Chained filters",
        "Active users whose name starts with \"J\".",
    ),
    pattern(10, "OR condition", "Users that are active or admins."),
    pattern(
        11,
        "Update",
        "Sets user 1's email to newemail@example.com and reports rows changed.",
    ),
    pattern(
        12,
        "Delete",
        "Deletes user 1 and reports rows removed; the profile goes with it.",
    ),
    pattern(13, "Group by", "User counts per role."),
    pattern(14, "Subquery", "Users whose id is among the admin ids."),
    pattern(
        15,
        "Join",
        "Users with a profile whose age is at least 18, loaded in one query.",
    ),
    pattern(
        16,
        "Having",
        "Roles with more users than the configured threshold.",
    ),
    pattern(17, "Raw SQL", "Hand-written SQL for users older than 18."),
    pattern(
        18,
        "Transaction",
        "Creates John (john@example.com, 30) with a profile in one transaction; \
         a duplicate email rolls both back.",
    ),
    pattern(19, "Select columns", "Only the name and email of every user."),
    pattern(
        20,
        "Advanced filtering",
        "Users named John or Jane, and users whose email contains \"example\".",
    ),
];

/// Lookup over [`PATTERNS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternCatalog;

impl PatternCatalog {
    pub fn all() -> &'static [Pattern] {
        &PATTERNS
    }

    /// Returns the pattern with the given number.
    pub fn get(number: u8) -> Option<&'static Pattern> {
        PATTERNS.iter().find(|p| p.number == number)
    }

    pub fn numbers() -> impl Iterator<Item = u8> {
        PATTERNS.iter().map(|p| p.number)
    }
}

fn to_json<T: Serialize>(value: &T) -> OrmResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| OrmError::SerializationError(e.to_string()))
}

/// Runs one pattern and returns its result as JSON.
///
/// Pattern 16 uses `settings.having_threshold`. Pattern 4 reports a missing
/// user as `null` rather than failing.
pub async fn run(
    number: u8,
    db: &dyn DbExecutor,
    settings: &Settings,
) -> OrmResult<serde_json::Value> {
    let info = PatternCatalog::get(number)
        .ok_or_else(|| OrmError::ConfigurationError(format!("No pattern numbered {number}")))?;
    let span = pattern_span(info.number, info.title);
    async move {
        tracing::info!("running");
        let value = dispatch(number, db, settings).await?;
        tracing::info!("done");
        Ok(value)
    }
    .instrument(span)
    .await
}

async fn dispatch(
    number: u8,
    db: &dyn DbExecutor,
    settings: &Settings,
) -> OrmResult<serde_json::Value> {
    match number {
        1 => to_json(&patterns::first_user(db).await?),
        2 => to_json(&patterns::all_users(db).await?),
        3 => to_json(&patterns::users_named(db, "John").await?),
        4 => to_json(&patterns::find_user(db, 1).await?),
        5 => to_json(&patterns::non_admin_users(db).await?),
        6 => Ok(json!(patterns::user_count(db).await?)),
        7 => to_json(&patterns::users_ordered_by_name(db).await?),
        8 => Ok(json!({ "age__avg": patterns::average_age(db).await? })),
        9 => to_json(&patterns::active_users_starting_with(db, "J").await?),
        10 => to_json(&patterns::active_or_admin_users(db).await?),
        11 => Ok(json!({
            "rows_affected": patterns::update_email(db, 1, "newemail@example.com").await?
        })),
        12 => Ok(json!({ "rows_affected": patterns::delete_user(db, 1).await? })),
        13 => to_json(&patterns::user_counts_by_role(db).await?),
        14 => to_json(&patterns::users_with_admin_status(db).await?),
        15 => to_json(&patterns::adult_users_with_profiles(db).await?),
        16 => to_json(&patterns::roles_with_more_than(db, settings.having_threshold).await?),
        17 => to_json(&patterns::raw_users_older_than(db, 18).await?),
        18 => to_json(
            &patterns::create_user_with_profile(db, "John", "john@example.com", 30).await?,
        ),
        19 => to_json(&patterns::user_names_and_emails(db).await?),
        20 => Ok(json!({
            "named_john_or_jane": to_json(&patterns::users_named_any(db, &["John", "Jane"]).await?)?,
            "email_contains_example": to_json(
                &patterns::users_with_email_containing(db, "example").await?
            )?,
        })),
        _ => Err(OrmError::ConfigurationError(format!(
            "No pattern numbered {number}"
        ))),
    }
}
