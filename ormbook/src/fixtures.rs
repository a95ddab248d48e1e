//! Deterministic demo data.
//!
//! | id | name  | email             | age | admin | active | role   | profile age |
//! |----|-------|-------------------|-----|-------|--------|--------|-------------|
//! | 1  | John  | john@example.com  | 34  |       | yes    | member | 34          |
//! | 2  | Jane  | jane@example.com  | 28  | yes   | yes    | admin  | 28          |
//! | 3  | Jim   | jim@sample.org    | 17  |       | yes    | member | 17          |
//! | 4  | Jill  | jill@example.com  | 45  |       |        | member |             |
//! | 5  | Alice | alice@sample.org  | 52  | yes   |        | admin  | 52          |
//! | 6  | Bob   | bob@example.com   | 23  |       | yes    | member |             |
//! | 7  | Carol | carol@example.com | 31  |       | yes    | editor | 31          |
//! | 8  | Dave  | dave@sample.org   | 19  |       | yes    | member |             |
//! | 9  | Erin  | erin@example.com  | 38  |       |        | editor |             |
//! | 10 | Frank | frank@example.com | 26  |       | yes    | member |             |

use ormbook_core::OrmResult;
use ormbook_db::transactions::atomic;
use ormbook_db::{create_model, DbExecutor};

use crate::models::{Profile, User};

/// The demo users, unsaved, in insertion order.
pub fn users() -> Vec<User> {
    vec![
        User::new("John", "john@example.com", 34),
        User::new("Jane", "jane@example.com", 28).admin(),
        User::new("Jim", "jim@sample.org", 17),
        User::new("Jill", "jill@example.com", 45).inactive(),
        User::new("Alice", "alice@sample.org", 52).admin().inactive(),
        User::new("Bob", "bob@example.com", 23),
        User::new("Carol", "carol@example.com", 31).with_role("editor"),
        User::new("Dave", "dave@sample.org", 19),
        User::new("Erin", "erin@example.com", 38)
            .with_role("editor")
            .inactive(),
        User::new("Frank", "frank@example.com", 26),
    ]
}

/// Names of the users who get a profile.
const WITH_PROFILE: [&str; 5] = ["John", "Jane", "Jim", "Alice", "Carol"];

/// Inserts the demo users and their profiles in one transaction.
///
/// Returns the saved users. Fails with an integrity error if the data is
/// already present.
pub async fn seed(db: &dyn DbExecutor) -> OrmResult<Vec<User>> {
    let users = atomic(db, |txn| async move {
        let mut saved = Vec::new();
        for mut user in users() {
            create_model(&mut user, &*txn).await?;
            if let (Some(id), true) = (user.id, WITH_PROFILE.contains(&user.name.as_str())) {
                create_model(&mut Profile::new(id, user.age), &*txn).await?;
            }
            saved.push(user);
        }
        Ok(saved)
    })
    .await?;
    tracing::info!(users = users.len(), "fixtures loaded");
    Ok(users)
}
