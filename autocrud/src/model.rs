//! # Model description
//!
//! A model is any struct that can report its identity field and describe its
//! fields. Everything else (routes, queries, association handling) is derived
//! from that description once, when the model's [`ModelSchema`] is built.
//!
//! Most models get these traits from `#[derive(Model)]`:
//!
//! ```rust,ignore
//! use autocrud::{BasicModel, Model};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, Default, Serialize, Deserialize, Model)]
//! pub struct Todo {
//!     #[serde(flatten)]
//!     #[model(embed)]
//!     pub base: BasicModel,
//!     pub title: String,
//!     pub done: bool,
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::resolver::FieldResolver;

/// Values that can act as a model identity.
///
/// The default value is the "zero" identity: a model carrying it has not been
/// persisted yet.
pub trait Identity:
    Serialize
    + DeserializeOwned
    + FromStr
    + Default
    + PartialEq
    + Clone
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
{
    fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl Identity for i32 {}
impl Identity for i64 {}
impl Identity for u32 {}
impl Identity for u64 {}
impl Identity for String {}
impl Identity for uuid::Uuid {}

/// Reports the identity (primary key) of a model instance.
pub trait Identify {
    type Id: Identity;

    /// Returns the canonical name of the identity field and its value.
    fn identity(&self) -> (&'static str, Self::Id);
}

/// Static description of a model's fields, in declaration order.
pub trait Fields {
    fn fields() -> Vec<FieldDef>;
}

/// A persisted entity served by the generated endpoints.
pub trait Model:
    Identify + Fields + Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    /// Type name used in response keys and route tokens, e.g. `Todo`.
    const TYPE_NAME: &'static str;
    /// Backing table.
    const TABLE: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    CreatedAt,
    UpdatedAt,
    /// Soft-delete marker: rows with a value here are invisible to reads.
    DeletedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// A parent-to-child relationship stored in a join table.
#[derive(Debug, Clone, Copy)]
pub struct Relation {
    pub target: fn() -> ModelSchema,
    pub join_table: &'static str,
    /// Join-table column referencing the parent's identity.
    pub parent_key: &'static str,
    /// Join-table column referencing the child's identity.
    pub child_key: &'static str,
    pub cardinality: Cardinality,
}

impl Relation {
    #[must_use]
    pub fn target_schema(&self) -> ModelSchema {
        (self.target)()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Integer,
    Float,
    Boolean,
    Text,
    Timestamp,
    Uuid,
    Json,
    Relation(Relation),
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Serialized key, e.g. `ID` or `title`.
    pub name: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
    pub role: Option<FieldRole>,
}

impl FieldDef {
    #[must_use]
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            column,
            kind,
            nullable: false,
            role: None,
        }
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub const fn role(mut self, role: FieldRole) -> Self {
        self.role = Some(role);
        self
    }

    #[must_use]
    pub fn relation(&self) -> Option<&Relation> {
        match &self.kind {
            FieldKind::Relation(relation) => Some(relation),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.relation().is_none()
    }
}

/// The standard identity and timestamp block: an auto-increment `ID` plus
/// creation, update and soft-delete timestamps.
///
/// Embed it with `#[serde(flatten)]` and `#[model(embed)]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicModel {
    #[serde(rename = "ID", default)]
    pub id: i64,
    #[serde(rename = "CreatedAt", default)]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "UpdatedAt", default)]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "DeletedAt", default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Identify for BasicModel {
    type Id = i64;

    fn identity(&self) -> (&'static str, i64) {
        ("ID", self.id)
    }
}

impl Fields for BasicModel {
    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::new("ID", "id", FieldKind::Integer),
            FieldDef::new("CreatedAt", "created_at", FieldKind::Timestamp)
                .role(FieldRole::CreatedAt),
            FieldDef::new("UpdatedAt", "updated_at", FieldKind::Timestamp)
                .role(FieldRole::UpdatedAt),
            FieldDef::new("DeletedAt", "deleted_at", FieldKind::Timestamp)
                .nullable()
                .role(FieldRole::DeletedAt),
        ]
    }
}

/// Everything the request pipeline needs to know about a model, computed once
/// per registration.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    pub type_name: &'static str,
    pub table: &'static str,
    fields: Vec<FieldDef>,
    identity: usize,
    resolver: FieldResolver,
}

impl ModelSchema {
    /// Builds the schema of `M`.
    ///
    /// # Panics
    ///
    /// Panics if `M` reports an empty identity field name, or one that is not
    /// among its scalar fields. Both are programming errors in the model.
    #[must_use]
    pub fn of<M: Model>() -> Self {
        let (identity_name, _) = M::default().identity();
        assert!(
            !identity_name.is_empty(),
            "{} reports an empty identity field name",
            M::TYPE_NAME
        );

        let fields = M::fields();
        let identity = fields
            .iter()
            .position(|f| f.name == identity_name && f.is_scalar())
            .unwrap_or_else(|| {
                panic!(
                    "{} reports identity field `{identity_name}` which it does not declare",
                    M::TYPE_NAME
                )
            });
        let resolver = FieldResolver::new(fields.iter().map(|f| f.name));

        Self {
            type_name: M::TYPE_NAME,
            table: M::TABLE,
            fields,
            identity,
            resolver,
        }
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_scalar())
    }

    /// Looks up a field by canonical name.
    #[must_use]
    pub fn field(&self, canonical: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == canonical)
    }

    /// Resolves a loosely spelled field name to its canonical form.
    ///
    /// Unknown names come back normalized, not as an error.
    #[must_use]
    pub fn resolve(&self, name: &str) -> String {
        self.resolver.resolve(name)
    }

    /// Resolves `name` and returns the matching field, if any.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&FieldDef> {
        self.field(&self.resolve(name))
    }

    #[must_use]
    pub fn identity_field(&self) -> &FieldDef {
        &self.fields[self.identity]
    }

    /// Route token for this model's identity, e.g. `TodoID`.
    #[must_use]
    pub fn id_param(&self) -> String {
        format!("{}{}", self.type_name, self.identity_field().name)
    }

    #[must_use]
    pub fn field_with_role(&self, role: FieldRole) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.role == Some(role))
    }

    #[must_use]
    pub fn soft_delete(&self) -> Option<&FieldDef> {
        self.field_with_role(FieldRole::DeletedAt)
    }
}
