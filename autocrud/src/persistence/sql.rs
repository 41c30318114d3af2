//! Sea-ORM backed [`Persistence`].
//!
//! Statements are assembled dynamically with `sea_query` from the model's
//! [`ModelSchema`], so no Sea-ORM entity is needed per model. Relations are
//! join tables holding `(parent_key, child_key)` pairs.
//!
//! Writes that touch more than one table (linking, create-and-link) run in a
//! single transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{
    Alias, Expr, Func, Order as SeaOrder, Query, SelectStatement, SimpleExpr,
};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, ExecResult, QueryResult,
    StatementBuilder, TransactionTrait, Value as SeaValue,
};
use serde_json::Value;

use super::{Persistence, Record, load_preloads};
use crate::model::{Cardinality, FieldDef, FieldKind, FieldRole, ModelSchema, Relation};
use crate::query::{Operator, Predicate, QueryPlan};

const COUNT_ALIAS: &str = "autocrud_count";

#[derive(Debug, Clone)]
pub struct SqlStore {
    db: DatabaseConnection,
}

impl SqlStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl Persistence for SqlStore {
    async fn read(&self, schema: &ModelSchema, plan: &QueryPlan) -> Result<Vec<Record>, DbErr> {
        let mut select = select_rows(schema);
        apply_plan(schema, &mut select, plan)?;
        let mut records = query_all(&self.db, &select)
            .await?
            .iter()
            .map(|row| decode(schema, row))
            .collect::<Result<Vec<_>, _>>()?;
        load_preloads(self, schema, &mut records, plan).await?;
        Ok(records)
    }

    async fn count(&self, schema: &ModelSchema, plan: &QueryPlan) -> Result<u64, DbErr> {
        let mut select = select_count(schema);
        apply_conditions(schema, &mut select, &plan.conditions)?;
        count_rows(&self.db, &select).await
    }

    async fn insert(&self, schema: &ModelSchema, record: Record) -> Result<Record, DbErr> {
        insert_row(&self.db, schema, record).await
    }

    async fn update(&self, schema: &ModelSchema, record: Record) -> Result<u64, DbErr> {
        let identity = schema.identity_field();
        let id = record.get(identity.name).cloned().unwrap_or(Value::Null);
        let now = Utc::now();

        let mut update = Query::update();
        update.table(Alias::new(schema.table));
        for field in schema.scalar_fields() {
            match field.role {
                _ if field.name == identity.name => {}
                Some(FieldRole::CreatedAt | FieldRole::DeletedAt) => {}
                Some(FieldRole::UpdatedAt) => {
                    update.value(Alias::new(field.column), now);
                }
                None => {
                    if let Some(value) = record.get(field.name) {
                        update.value(Alias::new(field.column), to_sea_value(field, value)?);
                    }
                }
            }
        }
        update.and_where(identity_col(schema).eq(identity_value(schema, &id)?));
        if let Some(deleted) = schema.soft_delete() {
            update.and_where(column(schema, deleted).is_null());
        }

        Ok(execute(&self.db, &update).await?.rows_affected())
    }

    async fn delete(&self, schema: &ModelSchema, id: &Value) -> Result<u64, DbErr> {
        let matches_id = identity_col(schema).eq(identity_value(schema, id)?);
        let result = if let Some(deleted) = schema.soft_delete() {
            let mut update = Query::update();
            update
                .table(Alias::new(schema.table))
                .value(Alias::new(deleted.column), Utc::now())
                .and_where(matches_id)
                .and_where(column(schema, deleted).is_null());
            execute(&self.db, &update).await?
        } else {
            let mut delete = Query::delete();
            delete.from_table(Alias::new(schema.table)).and_where(matches_id);
            execute(&self.db, &delete).await?
        };
        Ok(result.rows_affected())
    }

    async fn association_read(
        &self,
        parent: &ModelSchema,
        parent_id: &Value,
        relation: &FieldDef,
        plan: &QueryPlan,
    ) -> Result<Vec<Record>, DbErr> {
        let rel = relation_of(parent, relation)?;
        let child = rel.target_schema();
        let mut select = association_select(parent, parent_id, rel, &child, select_rows(&child))?;
        apply_plan(&child, &mut select, plan)?;

        let mut records = query_all(&self.db, &select)
            .await?
            .iter()
            .map(|row| decode(&child, row))
            .collect::<Result<Vec<_>, _>>()?;
        load_preloads(self, &child, &mut records, plan).await?;
        Ok(records)
    }

    async fn association_count(
        &self,
        parent: &ModelSchema,
        parent_id: &Value,
        relation: &FieldDef,
        plan: &QueryPlan,
    ) -> Result<u64, DbErr> {
        let rel = relation_of(parent, relation)?;
        let child = rel.target_schema();
        let mut select = association_select(parent, parent_id, rel, &child, select_count(&child))?;
        apply_conditions(&child, &mut select, &plan.conditions)?;
        count_rows(&self.db, &select).await
    }

    async fn association_append(
        &self,
        parent: &ModelSchema,
        parent_id: &Value,
        relation: &FieldDef,
        child_id: &Value,
    ) -> Result<(), DbErr> {
        let rel = relation_of(parent, relation)?;
        let txn = self.db.begin().await?;
        let linked = append_link(&txn, parent, parent_id, rel, child_id).await;
        finish(txn, linked).await
    }

    async fn create_and_link(
        &self,
        parent: &ModelSchema,
        parent_id: &Value,
        relation: &FieldDef,
        record: Record,
    ) -> Result<Record, DbErr> {
        let rel = relation_of(parent, relation)?;
        let txn = self.db.begin().await?;
        let stored = insert_and_link(&txn, parent, parent_id, rel, record).await;
        finish(txn, stored).await
    }

    async fn association_remove(
        &self,
        parent: &ModelSchema,
        parent_id: &Value,
        relation: &FieldDef,
        child_id: &Value,
    ) -> Result<u64, DbErr> {
        let rel = relation_of(parent, relation)?;
        let child = rel.target_schema();

        let mut unlink = Query::delete();
        unlink
            .from_table(Alias::new(rel.join_table))
            .and_where(Expr::col(Alias::new(rel.parent_key)).eq(identity_value(parent, parent_id)?))
            .and_where(Expr::col(Alias::new(rel.child_key)).eq(identity_value(&child, child_id)?));
        Ok(execute(&self.db, &unlink).await?.rows_affected())
    }
}

/// Commits on success. On failure the transaction is rolled back and the
/// original error returned.
async fn finish<T>(txn: DatabaseTransaction, result: Result<T, DbErr>) -> Result<T, DbErr> {
    match result {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            tracing::warn!(error = %err, "rolling back");
            txn.rollback().await?;
            Err(err)
        }
    }
}

async fn query_all<C, S>(conn: &C, stmt: &S) -> Result<Vec<QueryResult>, DbErr>
where
    C: ConnectionTrait,
    S: StatementBuilder + Sync,
{
    let statement = conn.get_database_backend().build(stmt);
    tracing::trace!(sql = %statement, "query");
    conn.query_all(statement).await
}

async fn query_one<C, S>(conn: &C, stmt: &S) -> Result<Option<QueryResult>, DbErr>
where
    C: ConnectionTrait,
    S: StatementBuilder + Sync,
{
    let statement = conn.get_database_backend().build(stmt);
    tracing::trace!(sql = %statement, "query");
    conn.query_one(statement).await
}

async fn execute<C, S>(conn: &C, stmt: &S) -> Result<ExecResult, DbErr>
where
    C: ConnectionTrait,
    S: StatementBuilder + Sync,
{
    let statement = conn.get_database_backend().build(stmt);
    tracing::trace!(sql = %statement, "execute");
    conn.execute(statement).await
}

async fn count_rows<C: ConnectionTrait>(conn: &C, select: &SelectStatement) -> Result<u64, DbErr> {
    let row = query_one(conn, select)
        .await?
        .ok_or_else(|| DbErr::Custom("count returned no rows".into()))?;
    let count: i64 = row.try_get("", COUNT_ALIAS)?;
    Ok(count.try_into().unwrap_or_default())
}

async fn read_by_id<C: ConnectionTrait>(
    conn: &C,
    schema: &ModelSchema,
    id: &Value,
) -> Result<Record, DbErr> {
    let mut select = select_rows(schema);
    select.and_where(identity_col(schema).eq(identity_value(schema, id)?));
    let row = query_one(conn, &select)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("{} not found", schema.type_name)))?;
    decode(schema, &row)
}

/// Inserts `record`, stamping the timestamp roles, and reads the stored row
/// back. A zero UUID identity is generated here; a zero integer identity is
/// left to the database.
async fn insert_row<C: ConnectionTrait>(
    conn: &C,
    schema: &ModelSchema,
    mut record: Record,
) -> Result<Record, DbErr> {
    let now = timestamp(Utc::now())?;
    for role in [FieldRole::CreatedAt, FieldRole::UpdatedAt] {
        if let Some(field) = schema.field_with_role(role) {
            record.insert(field.name.to_string(), now.clone());
        }
    }

    let identity = schema.identity_field();
    let mut id = record.get(identity.name).cloned().unwrap_or(Value::Null);
    if is_zero(&id) && matches!(identity.kind, FieldKind::Uuid) {
        id = Value::String(uuid::Uuid::new_v4().to_string());
        record.insert(identity.name.to_string(), id.clone());
    }

    let mut columns = Vec::new();
    let mut values: Vec<SimpleExpr> = Vec::new();
    for field in schema.scalar_fields() {
        if field.name == identity.name && is_zero(&id) {
            continue;
        }
        let value = record.get(field.name).unwrap_or(&Value::Null);
        columns.push(Alias::new(field.column));
        values.push(to_sea_value(field, value)?.into());
    }

    let mut insert = Query::insert();
    insert
        .into_table(Alias::new(schema.table))
        .columns(columns)
        .values(values)
        .map_err(|e| DbErr::Custom(e.to_string()))?;

    if is_zero(&id) {
        id = if conn.get_database_backend().support_returning() {
            insert.returning_col(Alias::new(identity.column));
            let row = query_one(conn, &insert)
                .await?
                .ok_or_else(|| DbErr::Custom("insert returned no rows".into()))?;
            decode_field(identity, &row)?
        } else {
            Value::from(execute(conn, &insert).await?.last_insert_id())
        };
    } else {
        execute(conn, &insert).await?;
    }

    read_by_id(conn, schema, &id).await
}

/// Writes the join row for `(parent_id, child_id)` unless it exists. For a
/// to-one relation the parent's other links are removed first.
async fn append_link<C: ConnectionTrait>(
    conn: &C,
    parent: &ModelSchema,
    parent_id: &Value,
    rel: &Relation,
    child_id: &Value,
) -> Result<(), DbErr> {
    let child = rel.target_schema();
    let join = Alias::new(rel.join_table);
    let parent_value = identity_value(parent, parent_id)?;
    let child_value = identity_value(&child, child_id)?;

    let mut existing = Query::select();
    existing
        .expr_as(Func::count(Expr::col(Alias::new(rel.child_key))), Alias::new(COUNT_ALIAS))
        .from(join.clone())
        .and_where(Expr::col(Alias::new(rel.parent_key)).eq(parent_value.clone()))
        .and_where(Expr::col(Alias::new(rel.child_key)).eq(child_value.clone()));
    if count_rows(conn, &existing).await? > 0 {
        return Ok(());
    }

    if rel.cardinality == Cardinality::One {
        let mut unlink = Query::delete();
        unlink
            .from_table(join.clone())
            .and_where(Expr::col(Alias::new(rel.parent_key)).eq(parent_value.clone()));
        execute(conn, &unlink).await?;
    }

    let mut link = Query::insert();
    link.into_table(join)
        .columns([Alias::new(rel.parent_key), Alias::new(rel.child_key)])
        .values([parent_value.into(), child_value.into()])
        .map_err(|e| DbErr::Custom(e.to_string()))?;
    execute(conn, &link).await?;
    Ok(())
}

async fn insert_and_link<C: ConnectionTrait>(
    conn: &C,
    parent: &ModelSchema,
    parent_id: &Value,
    rel: &Relation,
    record: Record,
) -> Result<Record, DbErr> {
    let child = rel.target_schema();
    let stored = insert_row(conn, &child, record).await?;
    let child_id = stored
        .get(child.identity_field().name)
        .cloned()
        .unwrap_or(Value::Null);
    append_link(conn, parent, parent_id, rel, &child_id).await?;
    Ok(stored)
}

fn association_select(
    parent: &ModelSchema,
    parent_id: &Value,
    relation: &Relation,
    child: &ModelSchema,
    mut select: SelectStatement,
) -> Result<SelectStatement, DbErr> {
    let join = Alias::new(relation.join_table);
    select
        .inner_join(
            join.clone(),
            Expr::col((join.clone(), Alias::new(relation.child_key))).equals((
                Alias::new(child.table),
                Alias::new(child.identity_field().column),
            )),
        )
        .and_where(
            Expr::col((join, Alias::new(relation.parent_key))).eq(identity_value(parent, parent_id)?),
        );
    Ok(select)
}

fn relation_of<'a>(parent: &ModelSchema, field: &'a FieldDef) -> Result<&'a Relation, DbErr> {
    field.relation().ok_or_else(|| {
        DbErr::Custom(format!(
            "{}.{} is not a relation",
            parent.type_name, field.name
        ))
    })
}

fn column(schema: &ModelSchema, field: &FieldDef) -> Expr {
    Expr::col((Alias::new(schema.table), Alias::new(field.column)))
}

fn identity_col(schema: &ModelSchema) -> Expr {
    column(schema, schema.identity_field())
}

fn identity_value(schema: &ModelSchema, id: &Value) -> Result<SeaValue, DbErr> {
    to_sea_value(schema.identity_field(), id)
}

/// Selects every scalar column of live (not soft-deleted) rows.
fn select_rows(schema: &ModelSchema) -> SelectStatement {
    let table = Alias::new(schema.table);
    let mut select = Query::select();
    for field in schema.scalar_fields() {
        select.column((table.clone(), Alias::new(field.column)));
    }
    select.from(table);
    if let Some(deleted) = schema.soft_delete() {
        select.and_where(column(schema, deleted).is_null());
    }
    select
}

fn select_count(schema: &ModelSchema) -> SelectStatement {
    let mut select = Query::select();
    select
        .expr_as(Func::count(identity_col(schema)), Alias::new(COUNT_ALIAS))
        .from(Alias::new(schema.table));
    if let Some(deleted) = schema.soft_delete() {
        select.and_where(column(schema, deleted).is_null());
    }
    select
}

fn scalar_field<'a>(schema: &'a ModelSchema, name: &str) -> Result<&'a FieldDef, DbErr> {
    schema
        .field(name)
        .filter(|f| f.is_scalar())
        .ok_or_else(|| DbErr::Custom(format!("{}: unknown field `{name}`", schema.type_name)))
}

fn apply_conditions(
    schema: &ModelSchema,
    select: &mut SelectStatement,
    conditions: &[Predicate],
) -> Result<(), DbErr> {
    for predicate in conditions {
        select.and_where(condition(schema, predicate)?);
    }
    Ok(())
}

fn apply_plan(
    schema: &ModelSchema,
    select: &mut SelectStatement,
    plan: &QueryPlan,
) -> Result<(), DbErr> {
    apply_conditions(schema, select, &plan.conditions)?;
    for order in &plan.order {
        let field = scalar_field(schema, &order.field)?;
        let direction = if order.descending {
            SeaOrder::Desc
        } else {
            SeaOrder::Asc
        };
        select.order_by((Alias::new(schema.table), Alias::new(field.column)), direction);
    }
    if let Some(page) = plan.page {
        select.limit(page.limit).offset(page.offset);
    }
    Ok(())
}

fn condition(schema: &ModelSchema, predicate: &Predicate) -> Result<SimpleExpr, DbErr> {
    let field = scalar_field(schema, &predicate.field)?;
    let col = column(schema, field);
    let expr = match predicate.op {
        Operator::IsNull => col.is_null(),
        Operator::IsNotNull => col.is_not_null(),
        Operator::Eq if predicate.value.is_null() => col.is_null(),
        Operator::Ne if predicate.value.is_null() => col.is_not_null(),
        Operator::Like => {
            let pattern = match &predicate.value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            col.like(pattern)
        }
        op => {
            let value = to_sea_value(field, &predicate.value)?;
            match op {
                Operator::Ne => col.ne(value),
                Operator::Gt => col.gt(value),
                Operator::Gte => col.gte(value),
                Operator::Lt => col.lt(value),
                Operator::Lte => col.lte(value),
                _ => col.eq(value),
            }
        }
    };
    Ok(expr)
}

fn is_zero(id: &Value) -> bool {
    match id {
        Value::Null => true,
        Value::Number(n) => n.as_i64() == Some(0) || n.as_u64() == Some(0),
        Value::String(s) => s.is_empty() || s == &uuid::Uuid::nil().to_string(),
        _ => false,
    }
}

fn timestamp(at: DateTime<Utc>) -> Result<Value, DbErr> {
    serde_json::to_value(at).map_err(|e| DbErr::Json(e.to_string()))
}

/// Converts a JSON value into the column's SQL type. String input is parsed,
/// so query-string filter values work for every kind.
fn to_sea_value(field: &FieldDef, value: &Value) -> Result<SeaValue, DbErr> {
    let invalid = || DbErr::Type(format!("invalid value for `{}`: {value}", field.name));

    let converted = match (&field.kind, value) {
        (FieldKind::Integer, Value::Null) => SeaValue::BigInt(None),
        (FieldKind::Float, Value::Null) => SeaValue::Double(None),
        (FieldKind::Boolean, Value::Null) => SeaValue::Bool(None),
        (FieldKind::Text, Value::Null) => SeaValue::String(None),
        (FieldKind::Timestamp, Value::Null) => SeaValue::ChronoDateTimeUtc(None),
        (FieldKind::Uuid, Value::Null) => SeaValue::Uuid(None),
        (FieldKind::Json, Value::Null) => SeaValue::Json(None),

        (FieldKind::Integer, Value::Number(n)) => n.as_i64().ok_or_else(invalid)?.into(),
        (FieldKind::Integer, Value::String(s)) => s.parse::<i64>().map_err(|_| invalid())?.into(),
        (FieldKind::Integer, Value::Bool(b)) => i64::from(*b).into(),

        (FieldKind::Float, Value::Number(n)) => n.as_f64().ok_or_else(invalid)?.into(),
        (FieldKind::Float, Value::String(s)) => s.parse::<f64>().map_err(|_| invalid())?.into(),

        (FieldKind::Boolean, Value::Bool(b)) => (*b).into(),
        (FieldKind::Boolean, Value::Number(n)) => (n.as_f64().unwrap_or_default() != 0.0).into(),
        (FieldKind::Boolean, Value::String(s)) => match s.as_str() {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => true.into(),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => false.into(),
            _ => return Err(invalid()),
        },

        (FieldKind::Text, Value::String(s)) => s.clone().into(),
        (FieldKind::Text, other) => other.to_string().into(),

        (FieldKind::Timestamp, Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map_err(|_| invalid())?
            .with_timezone(&Utc)
            .into(),

        (FieldKind::Uuid, Value::String(s)) => uuid::Uuid::parse_str(s).map_err(|_| invalid())?.into(),

        (FieldKind::Json, other) => other.clone().into(),

        _ => return Err(invalid()),
    };
    Ok(converted)
}

fn decode(schema: &ModelSchema, row: &QueryResult) -> Result<Record, DbErr> {
    schema
        .scalar_fields()
        .map(|field| Ok((field.name.to_string(), decode_field(field, row)?)))
        .collect()
}

fn decode_field(field: &FieldDef, row: &QueryResult) -> Result<Value, DbErr> {
    let col = field.column;
    let value = match field.kind {
        FieldKind::Integer => row
            .try_get::<Option<i64>>("", col)
            .or_else(|_| row.try_get::<Option<i32>>("", col).map(|v| v.map(i64::from)))?
            .map(Value::from),
        FieldKind::Float => row
            .try_get::<Option<f64>>("", col)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        FieldKind::Boolean => row.try_get::<Option<bool>>("", col)?.map(Value::Bool),
        FieldKind::Text => row.try_get::<Option<String>>("", col)?.map(Value::String),
        FieldKind::Timestamp => row
            .try_get::<Option<DateTime<Utc>>>("", col)?
            .map(timestamp)
            .transpose()?,
        FieldKind::Uuid => row
            .try_get::<Option<uuid::Uuid>>("", col)?
            .map(|u| Value::String(u.to_string())),
        FieldKind::Json => row.try_get::<Option<Value>>("", col)?,
        FieldKind::Relation(_) => None,
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::Tag;
    use sea_orm::sea_query::QueryStatementWriter;
    use serde_json::json;

    fn label() -> FieldDef {
        ModelSchema::of::<Tag>().field("label").cloned().unwrap()
    }

    #[test]
    fn test_string_inputs_are_parsed_per_kind() {
        let id = FieldDef::new("ID", "id", FieldKind::Integer);
        assert_eq!(to_sea_value(&id, &json!("42")).unwrap(), SeaValue::BigInt(Some(42)));

        let done = FieldDef::new("done", "done", FieldKind::Boolean);
        assert_eq!(to_sea_value(&done, &json!("true")).unwrap(), SeaValue::Bool(Some(true)));
        assert!(to_sea_value(&done, &json!("maybe")).is_err());

        assert_eq!(
            to_sea_value(&label(), &json!(3)).unwrap(),
            SeaValue::String(Some(Box::new("3".to_string())))
        );
    }

    #[test]
    fn test_null_keeps_column_type() {
        let id = FieldDef::new("ID", "id", FieldKind::Integer);
        assert_eq!(to_sea_value(&id, &Value::Null).unwrap(), SeaValue::BigInt(None));
    }

    #[test]
    fn test_zero_identity_detection() {
        assert!(is_zero(&Value::Null));
        assert!(is_zero(&json!(0)));
        assert!(is_zero(&json!("")));
        assert!(!is_zero(&json!(3)));
    }

    #[test]
    fn test_unknown_condition_field_is_rejected() {
        let schema = ModelSchema::of::<Tag>();
        let err = condition(&schema, &Predicate::new("nope", Operator::Eq, 1)).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn test_select_skips_soft_deleted_rows() {
        let schema = ModelSchema::of::<Tag>();
        let sql = select_rows(&schema).to_string(sea_orm::sea_query::SqliteQueryBuilder);
        assert!(sql.contains(r#""tags"."deleted_at" IS NULL"#), "{sql}");
    }
}
