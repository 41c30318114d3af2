//! `#[derive(Model)]` for `autocrud`.
//!
//! Generates `Identify`, `Fields` and `Model` for a struct with named fields.
//!
//! Struct attributes:
//! - `#[model(table = "todos")]`: backing table, default `snake_case(Type) + "s"`
//! - `#[model(name = "Todo")]`: type name in responses and routes, default the
//!   struct name
//!
//! Field attributes:
//! - `identity`: the primary key. Without it the first embedded model, then a
//!   field named `id`, is used
//! - `embed`: splice in the fields of another model (implied by
//!   `#[serde(flatten)]`)
//! - `skip`: not a column (implied by `#[serde(skip)]`)
//! - `column = "..."` and `name = "..."`: storage column and JSON key
//! - `created_at`, `updated_at`, `deleted_at`: timestamp roles
//! - `many(join_table, parent_key, child_key)` and `one(...)`: association
//!   through a join table, default `{owner}_{field}`, `{owner}_id` and
//!   `{target}_id`
//!
//! JSON keys follow serde: `rename` and the container's `rename_all` apply.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attributes;
mod codegen;
mod field_analysis;

#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    codegen::expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
