#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use autocrud::prelude::*;
use autocrud::{FieldDef, ModelSchema, QueryPlan, Record};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::prelude::*;
use serde_json::Value;
use tower::ServiceExt;

#[derive(Debug, Clone, Default, Serialize, Deserialize, autocrud::Model)]
#[serde(default)]
pub struct Todo {
    #[serde(flatten)]
    pub base: BasicModel,
    pub title: String,
    pub detail: Option<String>,
    pub done: bool,
    #[model(many)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, autocrud::Model)]
#[serde(default)]
pub struct Tag {
    #[serde(flatten)]
    pub base: BasicModel,
    pub label: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, autocrud::Model)]
#[serde(default)]
pub struct Owner {
    #[serde(flatten)]
    pub base: BasicModel,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, autocrud::Model)]
#[serde(default)]
pub struct Project {
    #[serde(flatten)]
    pub base: BasicModel,
    pub title: String,
    #[model(many)]
    pub todos: Vec<Todo>,
    #[model(one)]
    pub owner: Option<Owner>,
}

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;

    // Run migrations
    Migrator::up(&db, None).await?;

    Ok(db)
}

pub async fn setup_test_store() -> Arc<dyn Persistence> {
    let db = setup_test_db()
        .await
        .expect("Failed to setup test database");
    Arc::new(SqlStore::new(db))
}

pub fn setup_test_app(store: Arc<dyn Persistence>) -> Router {
    Router::new()
        .merge(
            crud::<Todo>("/todos", Arc::clone(&store))
                .nested::<Tag>("tags")
                .into_router(),
        )
        .merge(crud::<Tag>("/tags", Arc::clone(&store)).into_router())
        .merge(crud::<Owner>("/owners", Arc::clone(&store)).into_router())
        .merge(
            crud::<Project>("/projects", store)
                .nested::<Todo>("todos")
                .nested::<Owner>("owner")
                .field("title")
                .into_router(),
        )
}

/// Sends one request and returns the status and the JSON body.
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Creates a todo over HTTP and returns its ID.
pub async fn create_todo(app: &Router, title: &str) -> i64 {
    let (status, body) = send(app, "POST", "/todos", Some(serde_json::json!({ "title": title }))).await;
    assert_eq!(status, StatusCode::OK, "create todo failed: {body}");
    body["Todo"]["ID"].as_i64().unwrap()
}

/// Creates a row at `path` from `body` and returns its ID.
pub async fn create_at(app: &Router, path: &str, key: &str, body: Value) -> i64 {
    let (status, created) = send(app, "POST", path, Some(body)).await;
    assert_eq!(status, StatusCode::OK, "create at {path} failed: {created}");
    created[key]["ID"].as_i64().unwrap()
}

/// Creates a project over HTTP and returns its ID.
pub async fn create_project(app: &Router, title: &str) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/projects",
        Some(serde_json::json!({ "title": title })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create project failed: {body}");
    body["Project"]["ID"].as_i64().unwrap()
}

/// A store whose counts always fail, for exercising `totalError`.
pub struct FailingCountStore {
    inner: Arc<dyn Persistence>,
}

impl FailingCountStore {
    pub fn wrap(inner: Arc<dyn Persistence>) -> Arc<dyn Persistence> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl Persistence for FailingCountStore {
    async fn read(&self, schema: &ModelSchema, plan: &QueryPlan) -> Result<Vec<Record>, DbErr> {
        self.inner.read(schema, plan).await
    }

    async fn count(&self, _schema: &ModelSchema, _plan: &QueryPlan) -> Result<u64, DbErr> {
        Err(DbErr::Custom("count unavailable".to_string()))
    }

    async fn insert(&self, schema: &ModelSchema, record: Record) -> Result<Record, DbErr> {
        self.inner.insert(schema, record).await
    }

    async fn update(&self, schema: &ModelSchema, record: Record) -> Result<u64, DbErr> {
        self.inner.update(schema, record).await
    }

    async fn delete(&self, schema: &ModelSchema, id: &Value) -> Result<u64, DbErr> {
        self.inner.delete(schema, id).await
    }

    async fn association_read(
        &self,
        parent: &ModelSchema,
        parent_id: &Value,
        relation: &FieldDef,
        plan: &QueryPlan,
    ) -> Result<Vec<Record>, DbErr> {
        self.inner
            .association_read(parent, parent_id, relation, plan)
            .await
    }

    async fn association_count(
        &self,
        _parent: &ModelSchema,
        _parent_id: &Value,
        _relation: &FieldDef,
        _plan: &QueryPlan,
    ) -> Result<u64, DbErr> {
        Err(DbErr::Custom("count unavailable".to_string()))
    }

    async fn association_append(
        &self,
        parent: &ModelSchema,
        parent_id: &Value,
        relation: &FieldDef,
        child_id: &Value,
    ) -> Result<(), DbErr> {
        self.inner
            .association_append(parent, parent_id, relation, child_id)
            .await
    }

    async fn create_and_link(
        &self,
        parent: &ModelSchema,
        parent_id: &Value,
        relation: &FieldDef,
        record: Record,
    ) -> Result<Record, DbErr> {
        self.inner
            .create_and_link(parent, parent_id, relation, record)
            .await
    }

    async fn association_remove(
        &self,
        parent: &ModelSchema,
        parent_id: &Value,
        relation: &FieldDef,
        child_id: &Value,
    ) -> Result<u64, DbErr> {
        self.inner
            .association_remove(parent, parent_id, relation, child_id)
            .await
    }
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateTodolistTables)]
    }
}

pub struct CreateTodolistTables;

#[async_trait::async_trait]
impl MigrationName for CreateTodolistTables {
    fn name(&self) -> &'static str {
        "m20240101_000001_create_todolist_tables"
    }
}

fn basic_columns(table: &mut TableCreateStatement) -> &mut TableCreateStatement {
    table
        .col(
            ColumnDef::new(BasicColumn::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(BasicColumn::CreatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(
            ColumnDef::new(BasicColumn::UpdatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(
            ColumnDef::new(BasicColumn::DeletedAt)
                .timestamp_with_time_zone()
                .null(),
        )
}

fn join_table(
    table: impl IntoIden + 'static,
    parent: LinkColumn,
    child: LinkColumn,
) -> TableCreateStatement {
    Table::create()
        .table(table)
        .if_not_exists()
        .col(ColumnDef::new(parent).integer().not_null())
        .col(ColumnDef::new(child).integer().not_null())
        .primary_key(Index::create().col(parent).col(child))
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for CreateTodolistTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut todos = Table::create();
        todos.table(TodoEntity).if_not_exists();
        basic_columns(&mut todos)
            .col(ColumnDef::new(TodoColumn::Title).string().not_null())
            .col(ColumnDef::new(TodoColumn::Detail).string().null())
            .col(
                ColumnDef::new(TodoColumn::Done)
                    .boolean()
                    .not_null()
                    .default(false),
            );
        manager.create_table(todos).await?;

        let mut projects = Table::create();
        projects.table(ProjectEntity).if_not_exists();
        basic_columns(&mut projects)
            .col(ColumnDef::new(TodoColumn::Title).string().not_null());
        manager.create_table(projects).await?;

        let mut tags = Table::create();
        tags.table(TagEntity).if_not_exists();
        basic_columns(&mut tags).col(ColumnDef::new(NamedColumn::Label).string().not_null());
        manager.create_table(tags).await?;

        let mut owners = Table::create();
        owners.table(OwnerEntity).if_not_exists();
        basic_columns(&mut owners).col(ColumnDef::new(NamedColumn::Name).string().not_null());
        manager.create_table(owners).await?;

        manager
            .create_table(join_table(ProjectTodosEntity, LinkColumn::ProjectId, LinkColumn::TodoId))
            .await?;
        manager
            .create_table(join_table(TodoTagsEntity, LinkColumn::TodoId, LinkColumn::TagId))
            .await?;
        manager
            .create_table(join_table(ProjectOwnerEntity, LinkColumn::ProjectId, LinkColumn::OwnerId))
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectOwnerEntity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TodoTagsEntity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProjectTodosEntity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OwnerEntity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TagEntity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProjectEntity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TodoEntity).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Debug)]
pub enum BasicColumn {
    Id,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

impl Iden for BasicColumn {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(
            s,
            "{}",
            match self {
                Self::Id => "id",
                Self::CreatedAt => "created_at",
                Self::UpdatedAt => "updated_at",
                Self::DeletedAt => "deleted_at",
            }
        )
        .unwrap();
    }
}

#[derive(Debug)]
pub enum TodoColumn {
    Title,
    Detail,
    Done,
}

impl Iden for TodoColumn {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(
            s,
            "{}",
            match self {
                Self::Title => "title",
                Self::Detail => "detail",
                Self::Done => "done",
            }
        )
        .unwrap();
    }
}

#[derive(Debug)]
pub enum NamedColumn {
    Label,
    Name,
}

impl Iden for NamedColumn {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(
            s,
            "{}",
            match self {
                Self::Label => "label",
                Self::Name => "name",
            }
        )
        .unwrap();
    }
}

#[derive(Debug, Clone, Copy)]
pub enum LinkColumn {
    ProjectId,
    TodoId,
    TagId,
    OwnerId,
}

impl Iden for LinkColumn {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(
            s,
            "{}",
            match self {
                Self::ProjectId => "project_id",
                Self::TodoId => "todo_id",
                Self::TagId => "tag_id",
                Self::OwnerId => "owner_id",
            }
        )
        .unwrap();
    }
}

#[derive(Debug)]
pub struct TodoEntity;

impl Iden for TodoEntity {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "todos").unwrap();
    }
}

#[derive(Debug)]
pub struct ProjectEntity;

impl Iden for ProjectEntity {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "projects").unwrap();
    }
}

#[derive(Debug)]
pub struct ProjectTodosEntity;

impl Iden for ProjectTodosEntity {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "project_todos").unwrap();
    }
}

#[derive(Debug)]
pub struct TagEntity;

impl Iden for TagEntity {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "tags").unwrap();
    }
}

#[derive(Debug)]
pub struct OwnerEntity;

impl Iden for OwnerEntity {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "owners").unwrap();
    }
}

#[derive(Debug)]
pub struct TodoTagsEntity;

impl Iden for TodoTagsEntity {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "todo_tags").unwrap();
    }
}

#[derive(Debug)]
pub struct ProjectOwnerEntity;

impl Iden for ProjectOwnerEntity {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "project_owner").unwrap();
    }
}
