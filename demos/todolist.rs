//! Todo list API: todos, projects, and the todos of each project.
//!
//! ```bash
//! cargo run --example todolist
//! AUTOCRUD_DB__DSN=todolist.db AUTOCRUD_LOG_LEVEL=info cargo run --example todolist
//! cargo run --example todolist -- todolist.toml
//! ```
//!
//! Then try:
//! - `curl -XPOST localhost:8086/todos -d '{"title":"milk"}'`
//! - `curl -XPOST localhost:8086/projects -d '{"title":"shopping"}'`
//! - `curl -XPOST localhost:8086/projects/1/todos -d '{"ID":1}'`
//! - `curl 'localhost:8086/projects?preload=todos&total=true'`
//! - `curl localhost:8086/openapi.json`

use std::env;

use autocrud::config::Config;
use autocrud::prelude::*;
use autocrud::{database, logging, openapi, server};
use axum::{Json, Router, routing::get};
use sea_orm::sea_query::{Alias, ColumnDef, Index, Table, TableCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};

#[derive(Debug, Clone, Default, Serialize, Deserialize, autocrud::Model)]
#[serde(default)]
pub struct Todo {
    #[serde(flatten)]
    #[model(embed)]
    pub base: BasicModel,
    pub title: String,
    pub detail: Option<String>,
    pub done: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, autocrud::Model)]
#[serde(default)]
pub struct Project {
    #[serde(flatten)]
    #[model(embed)]
    pub base: BasicModel,
    pub title: String,
    #[model(many(join_table = "project_todos"))]
    pub todos: Vec<Todo>,
}

fn with_basic_columns(name: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(name))
        .if_not_exists()
        .col(
            ColumnDef::new(Alias::new("id"))
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(Alias::new("created_at"))
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(
            ColumnDef::new(Alias::new("updated_at"))
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(ColumnDef::new(Alias::new("deleted_at")).timestamp_with_time_zone().null())
        .col(ColumnDef::new(Alias::new("title")).string().not_null())
        .to_owned()
}

async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    let todos = with_basic_columns("todos")
        .col(ColumnDef::new(Alias::new("detail")).string().null())
        .col(
            ColumnDef::new(Alias::new("done"))
                .boolean()
                .not_null()
                .default(false),
        )
        .to_owned();
    let projects = with_basic_columns("projects");
    let links = Table::create()
        .table(Alias::new("project_todos"))
        .if_not_exists()
        .col(ColumnDef::new(Alias::new("project_id")).integer().not_null())
        .col(ColumnDef::new(Alias::new("todo_id")).integer().not_null())
        .primary_key(
            Index::create()
                .col(Alias::new("project_id"))
                .col(Alias::new("todo_id")),
        )
        .to_owned();

    let backend = db.get_database_backend();
    for table in [todos, projects, links] {
        db.execute(backend.build(&table)).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = match env::args().nth(1) {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    logging::init_tracing(config.log_level)?;

    let db = database::connect(&config.db).await?;
    create_tables(&db).await?;
    let store: Arc<dyn Persistence> = Arc::new(SqlStore::new(db));

    let (todos, mut routes) = crud::<Todo>("/todos", Arc::clone(&store)).into_parts();
    let (projects, project_routes) = crud::<Project>("/projects", store)
        .nested::<Todo>("todos")
        .into_parts();
    routes.extend(project_routes);

    let doc = openapi::document("todolist", env!("CARGO_PKG_VERSION"), &routes);
    let app = Router::new()
        .merge(todos)
        .merge(projects)
        .route(
            "/openapi.json",
            get(move || {
                let doc = doc.clone();
                async move { Json(doc) }
            }),
        );
    let app = layered(app, RouterOptions { allow_all_cors: true });

    server::serve(&config.http, app).await?;
    Ok(())
}
