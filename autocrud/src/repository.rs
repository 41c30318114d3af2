//! Typed CRUD operations for one model over a [`Persistence`] store.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::CrudError;
use crate::model::{Cardinality, FieldKind, Model, ModelSchema};
use crate::persistence::{Persistence, Record};
use crate::query::{QueryOption, QueryPlan};

pub struct Repository<M> {
    store: Arc<dyn Persistence>,
    schema: Arc<ModelSchema>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for Repository<M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            schema: Arc::clone(&self.schema),
            _model: PhantomData,
        }
    }
}

impl<M: Model> Repository<M> {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self::with_schema(store, Arc::new(ModelSchema::of::<M>()))
    }

    pub fn with_schema(store: Arc<dyn Persistence>, schema: Arc<ModelSchema>) -> Self {
        Self {
            store,
            schema,
            _model: PhantomData,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Persistence> {
        &self.store
    }

    /// Reads every row the options select.
    ///
    /// # Errors
    ///
    /// Any store failure, as [`CrudError::ProcessFailed`].
    pub async fn get_many(&self, options: &[QueryOption]) -> Result<Vec<M>, CrudError> {
        tracing::trace!(model = M::TYPE_NAME, options = %DisplayOptions(options), "get_many");
        let plan = QueryPlan::compose(&self.schema, options);
        let records = self.store.read(&self.schema, &plan).await.map_err(|e| {
            tracing::warn!(model = M::TYPE_NAME, error = %e, "get_many failed");
            CrudError::from(e)
        })?;
        records
            .into_iter()
            .map(|r| from_record(&self.schema, r))
            .collect()
    }

    /// Reads the first row the options select. A page offset in `options`
    /// is kept; the limit becomes 1.
    ///
    /// # Errors
    ///
    /// [`CrudError::NotFound`] when nothing matches.
    pub async fn get(&self, options: &[QueryOption]) -> Result<M, CrudError> {
        let offset = options
            .iter()
            .rev()
            .find_map(|option| match option {
                QueryOption::Paginate { offset, .. } => Some(*offset),
                _ => None,
            })
            .unwrap_or_default();
        let mut options = options.to_vec();
        options.push(QueryOption::paginate(1, offset));
        self.get_many(&options)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CrudError::not_found(M::TYPE_NAME, None))
    }

    /// # Errors
    ///
    /// [`CrudError::NotFound`] when no live row has this identity.
    pub async fn get_by_id(&self, id: &M::Id, options: &[QueryOption]) -> Result<M, CrudError> {
        let record = self.find_record(&id_value(id)?, options).await?;
        from_record(&self.schema, record)
    }

    /// Untyped lookup by identity, used by the association engine.
    pub(crate) async fn find_record(
        &self,
        id: &Value,
        options: &[QueryOption],
    ) -> Result<Record, CrudError> {
        let mut plan = QueryPlan::compose(&self.schema, options);
        plan.conditions.push(crate::query::Predicate::new(
            self.schema.identity_field().name,
            crate::query::Operator::Eq,
            id.clone(),
        ));
        plan.page = Some(crate::query::Page { limit: 1, offset: 0 });

        self.store
            .read(&self.schema, &plan)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CrudError::not_found(M::TYPE_NAME, Some(display_id(id))))
    }

    /// Counts rows matching the options' filters.
    ///
    /// # Errors
    ///
    /// Any store failure.
    pub async fn count(&self, options: &[QueryOption]) -> Result<u64, CrudError> {
        let plan = QueryPlan::compose(&self.schema, options);
        Ok(self.store.count(&self.schema, &plan).await?)
    }

    /// Persists a new row and returns it as stored.
    ///
    /// A zero identity lets the store assign one. Relation fields are ignored.
    ///
    /// # Errors
    ///
    /// Any store failure, e.g. a duplicate identity.
    pub async fn create(&self, model: &M) -> Result<M, CrudError> {
        tracing::trace!(model = M::TYPE_NAME, "create");
        let record = to_record(model)?;
        let stored = self.store.insert(&self.schema, record).await.map_err(|e| {
            tracing::warn!(model = M::TYPE_NAME, error = %e, "create failed");
            CrudError::from(e)
        })?;
        from_record(&self.schema, stored)
    }

    /// Saves every scalar field of `model` over the stored row.
    ///
    /// # Errors
    ///
    /// [`CrudError::NotFound`] when the row does not exist.
    pub async fn update(&self, model: &M) -> Result<M, CrudError> {
        let (_, id) = model.identity();
        tracing::trace!(model = M::TYPE_NAME, %id, "update");
        let touched = self.store.update(&self.schema, to_record(model)?).await?;
        if touched == 0 {
            return Err(CrudError::not_found(M::TYPE_NAME, Some(id.to_string())));
        }
        self.get_by_id(&id, &[]).await
    }

    /// Sets one scalar field on an existing row.
    ///
    /// # Errors
    ///
    /// [`CrudError::NotFound`] when the row does not exist, and a 422 when
    /// `field` is not a writable scalar field.
    pub async fn update_field(&self, id: &M::Id, field: &str, value: Value) -> Result<M, CrudError> {
        let target = self
            .schema
            .lookup(field)
            .filter(|f| f.is_scalar())
            .ok_or_else(|| CrudError::rejected("field not found"))?;
        if target.name == self.schema.identity_field().name {
            return Err(CrudError::identity_mismatch(target.name));
        }

        let mut record = self.find_record(&id_value(id)?, &[]).await?;
        record.insert(target.name.to_string(), value);
        self.store.update(&self.schema, record).await?;
        self.get_by_id(id, &[]).await
    }

    /// Deletes (or soft-deletes) the row with this identity.
    ///
    /// # Errors
    ///
    /// [`CrudError::NotFound`] when no live row has this identity.
    pub async fn delete_by_id(&self, id: &M::Id) -> Result<(), CrudError> {
        tracing::trace!(model = M::TYPE_NAME, %id, "delete");
        let touched = self.store.delete(&self.schema, &id_value(id)?).await?;
        if touched == 0 {
            return Err(CrudError::not_found(M::TYPE_NAME, Some(id.to_string())));
        }
        Ok(())
    }
}

struct DisplayOptions<'a>(&'a [QueryOption]);

impl std::fmt::Display for DisplayOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (i, option) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{option}")?;
        }
        f.write_str("]")
    }
}

pub(crate) fn id_value<I: Serialize>(id: &I) -> Result<Value, CrudError> {
    serde_json::to_value(id).map_err(|e| CrudError::process_failed(sea_orm::DbErr::Json(e.to_string())))
}

pub(crate) fn display_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn to_record<T: Serialize>(model: &T) -> Result<Record, CrudError> {
    match serde_json::to_value(model) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CrudError::rejected("model must serialize to an object")),
        Err(e) => Err(CrudError::process_failed(sea_orm::DbErr::Json(e.to_string()))),
    }
}

/// Relations that were not preloaded read as empty.
pub(crate) fn fill_relation_defaults(schema: &ModelSchema, record: &mut Record) {
    for field in schema.fields() {
        if let FieldKind::Relation(relation) = &field.kind {
            record.entry(field.name).or_insert_with(|| match relation.cardinality {
                Cardinality::Many => Value::Array(Vec::new()),
                Cardinality::One => Value::Null,
            });
        }
    }
}

pub(crate) fn from_record<T: DeserializeOwned>(
    schema: &ModelSchema,
    mut record: Record,
) -> Result<T, CrudError> {
    fill_relation_defaults(schema, &mut record);
    serde_json::from_value(Value::Object(record))
        .map_err(|e| CrudError::process_failed(sea_orm::DbErr::Json(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::Tag;
    use serde_json::json;

    #[test]
    fn test_to_record_uses_serialized_names() {
        let mut tag = Tag::default();
        tag.base.id = 3;
        tag.label = "x".into();
        let record = to_record(&tag).unwrap();
        assert_eq!(record.get("ID"), Some(&json!(3)));
        assert_eq!(record.get("label"), Some(&json!("x")));
        assert!(record.contains_key("DeletedAt"));
    }

    #[test]
    fn test_from_record_round_trips_a_stored_row() {
        let schema = ModelSchema::of::<Tag>();
        let record = to_record(&Tag {
            label: "y".into(),
            ..Tag::default()
        })
        .unwrap();
        let tag: Tag = from_record(&schema, record).unwrap();
        assert_eq!(tag.label, "y");
    }

    #[test]
    fn test_display_id() {
        assert_eq!(display_id(&json!(5)), "5");
        assert_eq!(display_id(&json!("abc")), "abc");
    }
}
