//! Every pattern against the seeded fixtures on in-memory SQLite.

use ormbook::models::{Profile, User};
use ormbook::patterns::{self, CreateOutcome, NameEmail, RoleCount};
use ormbook::{catalog, fixtures, schema};
use ormbook_core::{OrmError, Settings};
use ormbook_db::{DbExecutor, Model};
use ormbook_db_backends::SqliteBackend;
use ormbook_test::{assert_num_queries, TestDatabase};

async fn seeded() -> TestDatabase {
    let db = TestDatabase::with_models(&[User::meta(), Profile::meta()])
        .await
        .unwrap();
    fixtures::seed(&db).await.unwrap();
    db.reset_query_count();
    db
}

fn names(users: &[User]) -> Vec<&str> {
    users.iter().map(|u| u.name.as_str()).collect()
}

fn ids(users: &[User]) -> Vec<i64> {
    users.iter().filter_map(|u| u.id).collect()
}

async fn profile_count(db: &TestDatabase) -> i64 {
    Profile::objects().all().count_exec(db).await.unwrap()
}

#[tokio::test]
async fn test_first_user() {
    let db = seeded().await;
    let user = patterns::first_user(&db).await.unwrap().unwrap();
    assert_eq!(user.name, "John");
    assert_eq!(user.id, Some(1));
}

#[tokio::test]
async fn test_first_user_on_empty_table() {
    let db = TestDatabase::with_models(&[User::meta(), Profile::meta()])
        .await
        .unwrap();
    assert!(patterns::first_user(&db).await.unwrap().is_none());
}

#[tokio::test]
async fn test_all_users() {
    let db = seeded().await;
    let users = patterns::all_users(&db).await.unwrap();
    assert_eq!(users.len(), 10);
    assert_eq!(ids(&users), (1..=10).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_users_named() {
    let db = seeded().await;
    let users = patterns::users_named(&db, "John").await.unwrap();
    assert_eq!(names(&users), ["John"]);
    assert!(patterns::users_named(&db, "john").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_user_by_id() {
    let db = seeded().await;
    let user = patterns::user_by_id(&db, 1).await.unwrap();
    assert_eq!(user.name, "John");
    assert_eq!(user.email, "john@example.com");

    let err = patterns::user_by_id(&db, 99).await.unwrap_err();
    assert!(matches!(err, OrmError::DoesNotExist(_)));

    assert!(patterns::find_user(&db, 99).await.unwrap().is_none());
    assert_eq!(
        patterns::find_user(&db, 2).await.unwrap().map(|u| u.name),
        Some("Jane".to_string())
    );
}

#[tokio::test]
async fn test_non_admin_users() {
    let db = seeded().await;
    let users = patterns::non_admin_users(&db).await.unwrap();
    assert_eq!(ids(&users), [1, 3, 4, 6, 7, 8, 9, 10]);
    assert!(users.iter().all(|u| !u.is_admin));
}

#[tokio::test]
async fn test_user_count() {
    let db = seeded().await;
    assert_eq!(patterns::user_count(&db).await.unwrap(), 10);
}

#[tokio::test]
async fn test_users_ordered_by_name() {
    let db = seeded().await;
    let users = patterns::users_ordered_by_name(&db).await.unwrap();
    assert_eq!(
        names(&users),
        ["Alice", "Bob", "Carol", "Dave", "Erin", "Frank", "Jane", "Jill", "Jim", "John"]
    );
}

#[tokio::test]
async fn test_average_age() {
    let db = seeded().await;
    let avg = patterns::average_age(&db).await.unwrap().unwrap();
    assert!((avg - 31.3).abs() < 1e-9, "got {avg}");
}

#[tokio::test]
async fn test_average_age_of_nobody() {
    let db = TestDatabase::with_models(&[User::meta(), Profile::meta()])
        .await
        .unwrap();
    assert_eq!(patterns::average_age(&db).await.unwrap(), None);
}

#[tokio::test]
async fn test_active_users_starting_with() {
    let db = seeded().await;
    let users = patterns::active_users_starting_with(&db, "J")
        .await
        .unwrap();
    // Jill starts with J but is inactive.
    assert_eq!(names(&users), ["John", "Jane", "Jim"]);
}

#[tokio::test]
async fn test_active_or_admin_users() {
    let db = seeded().await;
    let users = patterns::active_or_admin_users(&db).await.unwrap();
    assert_eq!(ids(&users), [1, 2, 3, 5, 6, 7, 8, 10]);
}

#[tokio::test]
async fn test_update_email() {
    let db = seeded().await;
    let changed = patterns::update_email(&db, 1, "newemail@example.com")
        .await
        .unwrap();
    assert_eq!(changed, 1);
    let user = patterns::user_by_id(&db, 1).await.unwrap();
    assert_eq!(user.email, "newemail@example.com");

    assert_eq!(
        patterns::update_email(&db, 99, "ghost@example.com")
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_update_email_to_taken_address() {
    let db = seeded().await;
    let err = patterns::update_email(&db, 1, "jane@example.com")
        .await
        .unwrap_err();
    assert!(err.is_integrity_error());
}

#[tokio::test]
async fn test_delete_user_cascades_to_profile() {
    let db = seeded().await;
    assert_eq!(profile_count(&db).await, 5);

    assert_eq!(patterns::delete_user(&db, 1).await.unwrap(), 1);
    assert_eq!(patterns::user_count(&db).await.unwrap(), 9);
    assert_eq!(profile_count(&db).await, 4);

    assert_eq!(patterns::delete_user(&db, 1).await.unwrap(), 0);
}

#[tokio::test]
async fn test_user_counts_by_role() {
    let db = seeded().await;
    let counts = patterns::user_counts_by_role(&db).await.unwrap();
    assert_eq!(
        counts,
        vec![
            RoleCount {
                role: "admin".into(),
                count: 2
            },
            RoleCount {
                role: "editor".into(),
                count: 2
            },
            RoleCount {
                role: "member".into(),
                count: 6
            },
        ]
    );
}

#[tokio::test]
async fn test_users_with_admin_status() {
    let db = seeded().await;
    let users = patterns::users_with_admin_status(&db).await.unwrap();
    assert_eq!(ids(&users), [2, 5]);

    let sql = db.captured_sql();
    assert_eq!(sql.len(), 1);
    assert!(sql[0].contains("IN (SELECT"), "{}", sql[0]);
}

#[tokio::test]
async fn test_adult_users_with_profiles() {
    let db = seeded().await;
    let pairs = patterns::adult_users_with_profiles(&db).await.unwrap();
    let user_ids: Vec<i64> = pairs.iter().filter_map(|p| p.user.id).collect();
    // Jim's profile is 17; the other users have no profile at all.
    assert_eq!(user_ids, [1, 2, 5, 7]);
    for pair in &pairs {
        assert_eq!(Some(pair.profile.user_id), pair.user.id);
        assert!(pair.profile.age >= 18);
    }
}

#[tokio::test]
async fn test_adult_users_with_profiles_is_one_query() {
    let db = seeded().await;
    assert_num_queries(&db, 1, || async {
        patterns::adult_users_with_profiles(&db).await.unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_roles_with_more_than() {
    let db = seeded().await;
    let roles = patterns::roles_with_more_than(&db, 5).await.unwrap();
    assert_eq!(
        roles,
        vec![RoleCount {
            role: "member".into(),
            count: 6
        }]
    );

    let roles = patterns::roles_with_more_than(&db, 1).await.unwrap();
    assert_eq!(roles.len(), 3);
    assert!(patterns::roles_with_more_than(&db, 6)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_raw_users_older_than() {
    let db = seeded().await;
    let users = patterns::raw_users_older_than(&db, 18).await.unwrap();
    assert_eq!(users.len(), 9);
    assert!(users.iter().all(|u| u.age > 18));
    assert!(!names(&users).contains(&"Jim"));
}

#[tokio::test]
async fn test_create_user_with_profile() {
    let db = seeded().await;
    let outcome = patterns::create_user_with_profile(&db, "Gina", "gina@example.com", 29)
        .await
        .unwrap();
    let CreateOutcome::Created { user, profile } = outcome else {
        panic!("expected a commit, got {outcome:?}");
    };
    assert_eq!(user.id, Some(11));
    assert_eq!(profile.user_id, 11);
    assert_eq!(profile.age, 29);
    assert_eq!(patterns::user_count(&db).await.unwrap(), 11);
    assert_eq!(profile_count(&db).await, 6);
}

#[tokio::test]
async fn test_create_user_with_duplicate_email_rolls_back() {
    let db = seeded().await;
    let outcome = patterns::create_user_with_profile(&db, "John", "john@example.com", 30)
        .await
        .unwrap();
    assert!(matches!(outcome, CreateOutcome::RolledBack { .. }));
    assert_eq!(patterns::user_count(&db).await.unwrap(), 10);
    assert_eq!(profile_count(&db).await, 5);
    assert!(db.captured_sql().iter().any(|sql| sql == "ROLLBACK"));
}

#[tokio::test]
async fn test_create_user_with_invalid_name_propagates() {
    let db = seeded().await;
    let err = patterns::create_user_with_profile(&db, &"x".repeat(101), "long@example.com", 30)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::ValidationError(_)));
    assert_eq!(patterns::user_count(&db).await.unwrap(), 10);
}

#[tokio::test]
async fn test_user_names_and_emails() {
    let db = seeded().await;
    let rows = patterns::user_names_and_emails(&db).await.unwrap();
    assert_eq!(rows.len(), 10);
    assert_eq!(
        rows[0],
        NameEmail {
            name: "John".into(),
            email: "john@example.com".into()
        }
    );
    assert!(db.captured_sql()[0].starts_with("SELECT \"name\", \"email\" FROM"));
}

#[tokio::test]
async fn test_advanced_filtering() {
    let db = seeded().await;
    let users = patterns::users_named_any(&db, &["John", "Jane"]).await.unwrap();
    assert_eq!(names(&users), ["John", "Jane"]);
    assert!(patterns::users_named_any(&db, &[]).await.unwrap().is_empty());

    let users = patterns::users_with_email_containing(&db, "example")
        .await
        .unwrap();
    assert_eq!(ids(&users), [1, 2, 4, 6, 7, 9, 10]);
}

#[tokio::test]
async fn test_like_lookups_treat_wildcards_literally() {
    let db = seeded().await;
    assert!(patterns::users_with_email_containing(&db, "%")
        .await
        .unwrap()
        .is_empty());
    assert!(patterns::users_with_email_containing(&db, "_")
        .await
        .unwrap()
        .is_empty());
    assert!(patterns::active_users_starting_with(&db, "_")
        .await
        .unwrap()
        .is_empty());
    assert!(patterns::active_users_starting_with(&db, "%")
        .await
        .unwrap()
        .is_empty());

    patterns::update_email(&db, 3, "jim_100%@sample.org")
        .await
        .unwrap();
    let users = patterns::users_with_email_containing(&db, "_100%")
        .await
        .unwrap();
    assert_eq!(ids(&users), [3]);
}

#[tokio::test]
async fn test_catalog_runs_every_pattern() {
    let db = seeded().await;
    let settings = Settings::default();
    for number in 1..=20 {
        let value = catalog::run(number, &db, &settings).await;
        assert!(value.is_ok(), "pattern {number}: {value:?}");
    }
}

#[tokio::test]
async fn test_catalog_results() {
    let db = seeded().await;
    let settings = Settings::default();
    assert_eq!(
        catalog::run(6, &db, &settings).await.unwrap(),
        serde_json::json!(10)
    );
    assert_eq!(
        catalog::run(16, &db, &settings).await.unwrap(),
        serde_json::json!([{ "role": "member", "count": 6 }])
    );
    let outcome = catalog::run(18, &db, &settings).await.unwrap();
    assert_eq!(outcome["outcome"], "rolled_back");
    assert!(catalog::run(21, &db, &settings).await.is_err());
}

#[tokio::test]
async fn test_patterns_run_inside_transaction_executor() {
    let db = seeded().await;
    let count = ormbook_db::atomic(&db, |txn| async move {
        patterns::delete_user(&*txn, 10).await?;
        patterns::user_count(&*txn).await
    })
    .await
    .unwrap();
    assert_eq!(count, 9);
    assert_eq!(db.backend_type(), ormbook_db::DatabaseBackendType::SQLite);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_transactions_on_one_backend_both_commit() {
    let db = SqliteBackend::memory().unwrap();
    schema::migrate(&db).await.unwrap();
    fixtures::seed(&db).await.unwrap();

    let (gina, hank) = tokio::join!(
        patterns::create_user_with_profile(&db, "Gina", "gina@example.com", 29),
        patterns::create_user_with_profile(&db, "Hank", "hank@example.com", 44),
    );
    let gina = gina.unwrap();
    let hank = hank.unwrap();
    assert!(matches!(gina, CreateOutcome::Created { .. }), "{gina:?}");
    assert!(matches!(hank, CreateOutcome::Created { .. }), "{hank:?}");

    assert_eq!(patterns::user_count(&db).await.unwrap(), 12);
    assert_eq!(Profile::objects().all().count_exec(&db).await.unwrap(), 7);
    let created = patterns::users_named_any(&db, &["Gina", "Hank"]).await.unwrap();
    assert_eq!(created.len(), 2);
}
