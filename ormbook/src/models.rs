//! The `User` and `Profile` models every pattern runs against.
//!
//! Models implement [`Model`] by hand: metadata lives in a `LazyLock`
//! static, and rows map onto structs through [`Row::get`].

use std::sync::LazyLock;

use ormbook_core::OrmResult;
use ormbook_db::fields::{FieldDef, FieldType, OnDelete};
use ormbook_db::model::{Model, ModelMeta, Relation, Row};
use ormbook_db::query::compiler::OrderBy;
use ormbook_db::query::Manager;
use ormbook_db::value::Value;
use serde::Serialize;

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Primary key; `None` until saved.
    pub id: Option<i64>,
    pub name: String,
    /// Unique across all users.
    pub email: String,
    pub age: i64,
    pub is_admin: bool,
    pub is_active: bool,
    pub role: String,
}

impl User {
    /// An unsaved, active, non-admin member.
    pub fn new(name: impl Into<String>, email: impl Into<String>, age: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            age,
            is_admin: false,
            is_active: true,
            role: "member".to_string(),
        }
    }

    /// Marks the user as an admin with the `admin` role.
    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self.role = "admin".to_string();
        self
    }

    /// Marks the user as inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// The manager for `users`.
    pub const fn objects() -> Manager<Self> {
        Manager::new()
    }
}

impl Model for User {
    fn meta() -> &'static ModelMeta {
        static META: LazyLock<ModelMeta> = LazyLock::new(|| ModelMeta {
            model_name: "user",
            db_table: "users",
            ordering: vec![OrderBy::asc("id")],
            fields: vec![
                FieldDef::new("id", FieldType::AutoField).primary_key(),
                FieldDef::new("name", FieldType::CharField).max_length(100),
                FieldDef::new("email", FieldType::EmailField)
                    .max_length(254)
                    .unique(),
                FieldDef::new("age", FieldType::IntegerField),
                FieldDef::new("is_admin", FieldType::BooleanField).default(false),
                FieldDef::new("is_active", FieldType::BooleanField).default(true),
                FieldDef::new("role", FieldType::CharField)
                    .max_length(50)
                    .default("member"),
            ],
        });
        &META
    }

    fn pk(&self) -> Option<Value> {
        self.id.map(Value::Int)
    }

    fn set_pk(&mut self, value: Value) {
        self.id = value.as_int();
    }

    fn field_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("name", Value::from(self.name.as_str())),
            ("email", Value::from(self.email.as_str())),
            ("age", Value::Int(self.age)),
            ("is_admin", Value::Bool(self.is_admin)),
            ("is_active", Value::Bool(self.is_active)),
            ("role", Value::from(self.role.as_str())),
        ]
    }

    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            age: row.get("age")?,
            is_admin: row.get("is_admin")?,
            is_active: row.get("is_active")?,
            role: row.get("role")?,
        })
    }

    fn relation(name: &str) -> Option<Relation> {
        match name {
            "profile" => Some(Relation {
                name: "profile",
                table: "profiles",
                local_column: "id",
                remote_column: "user_id",
                columns: &["id", "user_id", "age"],
            }),
            _ => None,
        }
    }
}

/// A user's profile. At most one per user; removed with its user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: Option<i64>,
    pub user_id: i64,
    pub age: i64,
}

impl Profile {
    pub fn new(user_id: i64, age: i64) -> Self {
        Self {
            id: None,
            user_id,
            age,
        }
    }

    /// The manager for `profiles`.
    pub const fn objects() -> Manager<Self> {
        Manager::new()
    }
}

impl Model for Profile {
    fn meta() -> &'static ModelMeta {
        static META: LazyLock<ModelMeta> = LazyLock::new(|| ModelMeta {
            model_name: "profile",
            db_table: "profiles",
            ordering: vec![],
            fields: vec![
                FieldDef::new("id", FieldType::AutoField).primary_key(),
                FieldDef::new(
                    "user_id",
                    FieldType::OneToOneField {
                        to: "users",
                        on_delete: OnDelete::Cascade,
                    },
                ),
                FieldDef::new("age", FieldType::IntegerField),
            ],
        });
        &META
    }

    fn pk(&self) -> Option<Value> {
        self.id.map(Value::Int)
    }

    fn set_pk(&mut self, value: Value) {
        self.id = value.as_int();
    }

    fn field_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("user_id", Value::Int(self.user_id)),
            ("age", Value::Int(self.age)),
        ]
    }

    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            age: row.get("age")?,
        })
    }
}
