//! Table bootstrap for the showcase database.

use ormbook_core::OrmResult;
use ormbook_db::{DbExecutor, Model, SchemaEditor};

use crate::models::{Profile, User};

/// Creates `users` and `profiles` if they do not exist yet.
pub async fn migrate(db: &dyn DbExecutor) -> OrmResult<()> {
    SchemaEditor::new(db.backend_type())
        .create_tables(db, &[User::meta(), Profile::meta()])
        .await?;
    tracing::info!("schema ready");
    Ok(())
}

/// Drops both tables, profiles first.
pub async fn reset(db: &dyn DbExecutor) -> OrmResult<()> {
    SchemaEditor::new(db.backend_type())
        .drop_tables(db, &[User::meta(), Profile::meta()])
        .await
}
