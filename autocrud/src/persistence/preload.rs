use sea_orm::DbErr;
use serde_json::Value;

use super::{Persistence, Record};
use crate::model::{Cardinality, FieldDef, ModelSchema};
use crate::query::{QueryOption, QueryPlan};

/// Fills the plan's preloaded relations into `rows`.
///
/// Paths are resolved one segment at a time: `Todos.Tags` loads `Todos` on
/// each row and then `Tags` on each loaded todo. Paths sharing a head segment
/// load that relation once.
///
/// # Errors
///
/// Fails when a path segment is not a relation of the model it addresses, or
/// when the store fails.
pub async fn load_preloads(
    store: &dyn Persistence,
    schema: &ModelSchema,
    rows: &mut [Record],
    plan: &QueryPlan,
) -> Result<(), DbErr> {
    if rows.is_empty() || !plan.has_preloads() {
        return Ok(());
    }

    let identity = schema.identity_field().name;
    for (field, options) in group_by_head(schema, plan)? {
        let Some(relation) = field.relation() else {
            continue;
        };
        let child_plan = QueryPlan::compose(&relation.target_schema(), &options);
        tracing::trace!(model = schema.type_name, relation = field.name, "preloading");

        for row in rows.iter_mut() {
            let parent_id = row.get(identity).cloned().unwrap_or(Value::Null);
            let children = store
                .association_read(schema, &parent_id, &field, &child_plan)
                .await?;
            let value = match relation.cardinality {
                Cardinality::Many => Value::Array(children.into_iter().map(Value::Object).collect()),
                Cardinality::One => children.into_iter().next().map_or(Value::Null, Value::Object),
            };
            row.insert(field.name.to_string(), value);
        }
    }
    Ok(())
}

fn group_by_head(
    schema: &ModelSchema,
    plan: &QueryPlan,
) -> Result<Vec<(FieldDef, Vec<QueryOption>)>, DbErr> {
    let mut groups: Vec<(FieldDef, Vec<QueryOption>)> = Vec::new();

    if plan.preload_all {
        groups.extend(
            schema
                .fields()
                .iter()
                .filter(|f| !f.is_scalar())
                .map(|f| (f.clone(), Vec::new())),
        );
    }

    for spec in &plan.preloads {
        let (head, tail) = match spec.path.split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (spec.path.as_str(), None),
        };
        let field = schema
            .lookup(head)
            .filter(|f| !f.is_scalar())
            .ok_or_else(|| {
                DbErr::Custom(format!(
                    "{}: unsupported relation `{head}`",
                    schema.type_name
                ))
            })?;

        let nested = match tail {
            Some(tail) => vec![QueryOption::preload_with(tail, spec.options.clone())],
            None => spec.options.clone(),
        };
        match groups.iter_mut().find(|(f, _)| f.name == field.name) {
            Some((_, options)) => options.extend(nested),
            None => groups.push((field.clone(), nested)),
        }
    }
    Ok(groups)
}
