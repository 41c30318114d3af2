//! The persistence capability the request pipeline runs against.
//!
//! Rows travel as [`Record`]s: JSON objects keyed by canonical field names.
//! The typed layer ([`crate::repository::Repository`]) converts between
//! records and models, so a backend only needs the [`ModelSchema`].

mod preload;
pub mod sql;

use async_trait::async_trait;
use sea_orm::DbErr;
use serde_json::Value;

use crate::model::{FieldDef, ModelSchema};
use crate::query::QueryPlan;

pub use preload::load_preloads;
pub use sql::SqlStore;

pub type Record = serde_json::Map<String, Value>;

/// Storage operations for any described model.
///
/// `relation` arguments are always relation fields of `parent`. Reads run the
/// plan's preloads before returning, so callers see fully shaped rows.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn read(&self, schema: &ModelSchema, plan: &QueryPlan) -> Result<Vec<Record>, DbErr>;

    /// Counts rows matching the plan's conditions. Paging and ordering are
    /// ignored.
    async fn count(&self, schema: &ModelSchema, plan: &QueryPlan) -> Result<u64, DbErr>;

    /// Inserts `record` and returns the stored row, identity included.
    async fn insert(&self, schema: &ModelSchema, record: Record) -> Result<Record, DbErr>;

    /// Saves every scalar field of `record` over the row with the same
    /// identity. Returns the number of rows touched.
    async fn update(&self, schema: &ModelSchema, record: Record) -> Result<u64, DbErr>;

    async fn delete(&self, schema: &ModelSchema, id: &Value) -> Result<u64, DbErr>;

    async fn association_read(
        &self,
        parent: &ModelSchema,
        parent_id: &Value,
        relation: &FieldDef,
        plan: &QueryPlan,
    ) -> Result<Vec<Record>, DbErr>;

    async fn association_count(
        &self,
        parent: &ModelSchema,
        parent_id: &Value,
        relation: &FieldDef,
        plan: &QueryPlan,
    ) -> Result<u64, DbErr>;

    /// Links `child_id` to the parent. Linking twice is a no-op. For a
    /// to-one relation the previous link is replaced.
    async fn association_append(
        &self,
        parent: &ModelSchema,
        parent_id: &Value,
        relation: &FieldDef,
        child_id: &Value,
    ) -> Result<(), DbErr>;

    /// Inserts `record` as a new row of the relation's target and links it to
    /// the parent. Both writes commit together or not at all. Returns the
    /// stored child.
    async fn create_and_link(
        &self,
        parent: &ModelSchema,
        parent_id: &Value,
        relation: &FieldDef,
        record: Record,
    ) -> Result<Record, DbErr>;

    /// Removes the link only. The child row stays.
    async fn association_remove(
        &self,
        parent: &ModelSchema,
        parent_id: &Value,
        relation: &FieldDef,
        child_id: &Value,
    ) -> Result<u64, DbErr>;
}
