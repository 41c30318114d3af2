//! # autocrud
//!
//! REST CRUD endpoints for any described model, including one level of nested
//! associations, on Axum and Sea-ORM.
//!
//! ```rust,ignore
//! use autocrud::prelude::*;
//!
//! #[derive(Clone, Debug, Default, Serialize, Deserialize, Model)]
//! pub struct Todo {
//!     #[serde(flatten)]
//!     #[model(embed)]
//!     pub base: BasicModel,
//!     pub title: String,
//!     pub done: bool,
//! }
//!
//! let store: Arc<dyn Persistence> = Arc::new(SqlStore::new(db));
//! let app = crud::<Todo>("/todos", store).into_router();
//! ```
//!
//! Reads accept `limit`, `offset`, `order_by`, `desc`, `filter_by`,
//! `filter_value`, repeated `preload` and `total` query parameters (see
//! [`QueryParams`]). Responses are objects keyed by the model name: `{"Todo":
//! {...}}` for one, `{"Todos": [...]}` for many.

pub mod association;
pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod model;
pub mod openapi;
pub mod params;
pub mod persistence;
pub mod query;
pub mod repository;
pub mod resolver;
pub mod response;
pub mod router;
pub mod server;

#[cfg(feature = "derive")]
pub use autocrud_derive::Model;

pub use association::{Association, FieldValue};
pub use errors::CrudError;
pub use model::{
    BasicModel, Cardinality, FieldDef, FieldKind, FieldRole, Fields, Identify, Identity, Model,
    ModelSchema, Relation,
};
pub use params::QueryParams;
pub use persistence::{Persistence, Record, SqlStore};
pub use query::{Operator, Predicate, QueryOption, QueryPlan};
pub use repository::Repository;
pub use response::{Envelope, Shape, response_key};
pub use router::{CrudRouter, RouteSpec, RouterOptions, crud, layered};

/// Trait and derive share the name `Model`, as `serde` does with `Serialize`.
pub mod prelude {
    pub use crate::{
        BasicModel, CrudError, Identify, Model, Persistence, QueryOption, QueryParams,
        Repository, SqlStore, crud, layered,
    };
    pub use crate::router::RouterOptions;
    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;
}
