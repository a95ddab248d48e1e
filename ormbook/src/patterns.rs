//! The twenty query patterns.
//!
//! Each pattern is an independent async function over a [`DbExecutor`]. The
//! comment above each one shows the SQL it issues against SQLite.

use ormbook_core::{OrmError, OrmResult};
use ormbook_db::query::compiler::OrderBy;
use ormbook_db::query::lookups::{Lookup, Q};
use ormbook_db::transactions::atomic;
use ormbook_db::{create_model, DbExecutor, Expression, RawQuerySet, Row, Value};
use serde::Serialize;

use crate::models::{Profile, User};

/// One row of a `GROUP BY role` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleCount {
    pub role: String,
    pub count: i64,
}

impl RoleCount {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(Self {
            role: row.get("role")?,
            count: row.get("count")?,
        })
    }
}

/// The two columns selected by pattern 19.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameEmail {
    pub name: String,
    pub email: String,
}

/// A user loaded together with its profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserWithProfile {
    pub user: User,
    pub profile: Profile,
}

/// What the transactional create of pattern 18 ended with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreateOutcome {
    /// Both rows were written and committed.
    Created { user: User, profile: Profile },
    /// An integrity error rolled the whole block back.
    RolledBack { reason: String },
}

fn exact(field: &str, value: impl Into<Value>) -> Q {
    Q::filter(field, Lookup::Exact(value.into()))
}

// 1. SELECT * FROM "users" ORDER BY "id" ASC LIMIT 1
pub async fn first_user(db: &dyn DbExecutor) -> OrmResult<Option<User>> {
    User::objects().all().first_exec(db).await
}

// 2. SELECT * FROM "users" ORDER BY "id" ASC
pub async fn all_users(db: &dyn DbExecutor) -> OrmResult<Vec<User>> {
    User::objects().all().execute_query(db).await
}

// 3. SELECT * FROM "users" WHERE "name" = ? ORDER BY "id" ASC
pub async fn users_named(db: &dyn DbExecutor, name: &str) -> OrmResult<Vec<User>> {
    User::objects()
        .filter(exact("name", name))
        .execute_query(db)
        .await
}

// 4. SELECT * FROM "users" WHERE "id" = ? LIMIT 2
/// Fails with `DoesNotExist` when there is no such user.
pub async fn user_by_id(db: &dyn DbExecutor, id: i64) -> OrmResult<User> {
    User::objects().get(exact("id", id), db).await
}

/// Like [`user_by_id`], with a missing user as `None`.
pub async fn find_user(db: &dyn DbExecutor, id: i64) -> OrmResult<Option<User>> {
    match user_by_id(db, id).await {
        Ok(user) => Ok(Some(user)),
        Err(e) if e.is_does_not_exist() => Ok(None),
        Err(e) => Err(e),
    }
}

// 5. SELECT * FROM "users" WHERE NOT ("is_admin" = ?) ORDER BY "id" ASC
pub async fn non_admin_users(db: &dyn DbExecutor) -> OrmResult<Vec<User>> {
    User::objects()
        .exclude(exact("is_admin", true))
        .execute_query(db)
        .await
}

// 6. SELECT COUNT(*) AS "count" FROM "users"
pub async fn user_count(db: &dyn DbExecutor) -> OrmResult<i64> {
    User::objects().all().count_exec(db).await
}

// 7. SELECT * FROM "users" ORDER BY "name" ASC
pub async fn users_ordered_by_name(db: &dyn DbExecutor) -> OrmResult<Vec<User>> {
    User::objects()
        .all()
        .order_by(vec![OrderBy::asc("name")])
        .execute_query(db)
        .await
}

// 8. SELECT AVG("age") AS "age__avg" FROM "users"
/// `None` when there are no users.
pub async fn average_age(db: &dyn DbExecutor) -> OrmResult<Option<f64>> {
    let result = User::objects()
        .all()
        .aggregate_exec(&[("age__avg", Expression::avg("age"))], db)
        .await?;
    Ok(result.get("age__avg").and_then(Value::as_float))
}

// 9. SELECT * FROM "users" WHERE ("name" LIKE ? ESCAPE '\' AND "is_active" = ?) ORDER BY "id" ASC
pub async fn active_users_starting_with(
    db: &dyn DbExecutor,
    prefix: &str,
) -> OrmResult<Vec<User>> {
    User::objects()
        .filter(Q::filter("name", Lookup::StartsWith(prefix.to_string())))
        .filter(exact("is_active", true))
        .execute_query(db)
        .await
}

// 10. SELECT * FROM "users" WHERE ("is_active" = ? OR "is_admin" = ?) ORDER BY "id" ASC
pub async fn active_or_admin_users(db: &dyn DbExecutor) -> OrmResult<Vec<User>> {
    User::objects()
        .filter(exact("is_active", true) | exact("is_admin", true))
        .execute_query(db)
        .await
}

// 11. UPDATE "users" SET "email" = ? WHERE "id" = ?
/// Returns the number of rows changed.
pub async fn update_email(db: &dyn DbExecutor, id: i64, email: &str) -> OrmResult<u64> {
    User::objects()
        .filter(exact("id", id))
        .update(vec![("email", Value::from(email))])
        .update_exec(db)
        .await
}

// 12. DELETE FROM "users" WHERE "id" = ?
/// Returns the number of users removed. Their profiles go with them.
pub async fn delete_user(db: &dyn DbExecutor, id: i64) -> OrmResult<u64> {
    User::objects()
        .filter(exact("id", id))
        .delete()
        .delete_exec(db)
        .await
}

// 13. SELECT "role", COUNT("id") AS "count" FROM "users" GROUP BY "role" ORDER BY "role" ASC
pub async fn user_counts_by_role(db: &dyn DbExecutor) -> OrmResult<Vec<RoleCount>> {
    let rows = User::objects()
        .all()
        .values(&["role"])
        .annotate("count", Expression::count("id"))
        .order_by(vec![OrderBy::asc("role")])
        .execute_rows(db)
        .await?;
    rows.iter().map(RoleCount::from_row).collect()
}

// 14. SELECT * FROM "users" WHERE "id" IN (SELECT "id" FROM "users" WHERE "is_admin" = ?) ORDER BY "id" ASC
pub async fn users_with_admin_status(db: &dyn DbExecutor) -> OrmResult<Vec<User>> {
    let admins = User::objects()
        .filter(exact("is_admin", true))
        .values(&["id"])
        .as_subquery();
    User::objects()
        .filter(Q::filter("id", Lookup::InQuery(Box::new(admins))))
        .execute_query(db)
        .await
}

// 15. SELECT "users".*, "profile"."id" AS "profile__id", ... FROM "users"
//     LEFT JOIN "profiles" AS "profile" ON "profile"."user_id" = "users"."id"
//     WHERE "profile"."age" >= ? ORDER BY "users"."id" ASC
/// One query; the age filter drops users without a profile.
pub async fn adult_users_with_profiles(db: &dyn DbExecutor) -> OrmResult<Vec<UserWithProfile>> {
    let pairs = User::objects()
        .all()
        .select_related(&["profile"])
        .filter(Q::filter("profile__age", Lookup::Gte(Value::from(18))))
        .execute_with_related::<Profile>("profile", db)
        .await?;
    Ok(pairs
        .into_iter()
        .filter_map(|(user, profile)| profile.map(|profile| UserWithProfile { user, profile }))
        .collect())
}

// 16. SELECT "role", COUNT("id") AS "count" FROM "users" GROUP BY "role"
//     HAVING COUNT("id") > ? ORDER BY "role" ASC
pub async fn roles_with_more_than(db: &dyn DbExecutor, n: i64) -> OrmResult<Vec<RoleCount>> {
    let rows = User::objects()
        .all()
        .values(&["role"])
        .annotate("count", Expression::count("id"))
        .filter(Q::filter("count", Lookup::Gt(Value::from(n))))
        .order_by(vec![OrderBy::asc("role")])
        .execute_rows(db)
        .await?;
    rows.iter().map(RoleCount::from_row).collect()
}

// 17. SELECT * FROM users WHERE age > ? ORDER BY id
pub async fn raw_users_older_than(db: &dyn DbExecutor, age: i64) -> OrmResult<Vec<User>> {
    RawQuerySet::<User>::new(
        "SELECT * FROM users WHERE age > ? ORDER BY id",
        vec![Value::from(age)],
    )
    .execute(db)
    .await
}

// 18. BEGIN; INSERT INTO "users" ...; INSERT INTO "profiles" ...; COMMIT (or ROLLBACK)
/// Creates a user and its profile atomically.
///
/// An integrity error (a duplicate email, say) rolls both inserts back and is
/// reported as [`CreateOutcome::RolledBack`]; other errors propagate.
pub async fn create_user_with_profile(
    db: &dyn DbExecutor,
    name: &str,
    email: &str,
    age: i64,
) -> OrmResult<CreateOutcome> {
    let user = User::new(name, email, age);
    let result = atomic(db, |txn| async move {
        let mut user = user;
        create_model(&mut user, &*txn).await?;
        let user_id = user.id.ok_or_else(|| {
            OrmError::DatabaseError("insert returned no primary key for user".to_string())
        })?;
        let mut profile = Profile::new(user_id, age);
        create_model(&mut profile, &*txn).await?;
        Ok((user, profile))
    })
    .await;

    match result {
        Ok((user, profile)) => Ok(CreateOutcome::Created { user, profile }),
        Err(e) if e.is_integrity_error() => {
            tracing::warn!(error = %e, "create_user_with_profile rolled back");
            Ok(CreateOutcome::RolledBack {
                reason: e.to_string(),
            })
        }
        Err(e) => Err(e),
    }
}

// 19. SELECT "name", "email" FROM "users" ORDER BY "id" ASC
pub async fn user_names_and_emails(db: &dyn DbExecutor) -> OrmResult<Vec<NameEmail>> {
    let rows = User::objects()
        .all()
        .values(&["name", "email"])
        .execute_rows(db)
        .await?;
    rows.iter()
        .map(|row| {
            Ok(NameEmail {
                name: row.get("name")?,
                email: row.get("email")?,
            })
        })
        .collect()
}

// 20a. SELECT * FROM "users" WHERE "name" IN (?, ?) ORDER BY "id" ASC
pub async fn users_named_any(db: &dyn DbExecutor, names: &[&str]) -> OrmResult<Vec<User>> {
    let names = names.iter().map(|n| Value::from(*n)).collect();
    User::objects()
        .filter(Q::filter("name", Lookup::In(names)))
        .execute_query(db)
        .await
}

// 20b. SELECT * FROM "users" WHERE "email" LIKE ? ESCAPE '\' ORDER BY "id" ASC
pub async fn users_with_email_containing(
    db: &dyn DbExecutor,
    keyword: &str,
) -> OrmResult<Vec<User>> {
    User::objects()
        .filter(Q::filter("email", Lookup::Contains(keyword.to_string())))
        .execute_query(db)
        .await
}
