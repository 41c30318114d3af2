//! # Nested associations
//!
//! Operations on a parent's field: fetching it (scalar or relation), counting
//! related rows, and creating, linking or unlinking children.
//!
//! Linking never deletes anything. Unlinking removes the join row and keeps
//! the child, so a child unlinked from every parent is still reachable through
//! its own endpoints.

use serde_json::Value;

use crate::errors::CrudError;
use crate::model::{Cardinality, FieldDef, Identify, Identity, Model, ModelSchema};
use crate::persistence::Record;
use crate::query::{QueryOption, QueryPlan};
use crate::repository::{Repository, fill_relation_defaults, id_value, to_record};

/// The value of one field of a parent record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    One {
        type_name: &'static str,
        value: Value,
    },
    Many {
        type_name: &'static str,
        values: Vec<Value>,
    },
}

impl FieldValue {
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Scalar(value) | Self::One { value, .. } => value,
            Self::Many { values, .. } => Value::Array(values),
        }
    }
}

/// Reads `field` of the parent with identity `parent_id`.
///
/// Scalar fields come from the parent row itself. Relations are read through
/// the join table with `options` applied to the related rows.
///
/// # Errors
///
/// - [`CrudError::NotFound`] if the parent does not exist
/// - a 422 "field not found" if `field` names nothing on the parent
/// - any store failure
pub async fn fetch_field<P: Model>(
    parent: &Repository<P>,
    parent_id: &P::Id,
    field: &str,
    options: &[QueryOption],
) -> Result<FieldValue, CrudError> {
    let pid = id_value(parent_id)?;
    let record = parent.find_record(&pid, &[]).await?;
    let def = lookup_field(parent.schema(), field)?;

    let Some(relation) = def.relation() else {
        tracing::debug!(model = P::TYPE_NAME, field = def.name, "scalar field");
        return Ok(FieldValue::Scalar(
            record.get(def.name).cloned().unwrap_or(Value::Null),
        ));
    };

    let child = relation.target_schema();
    let plan = QueryPlan::compose(&child, options);
    let rows = parent
        .store()
        .association_read(parent.schema(), &pid, def, &plan)
        .await
        .map_err(|e| {
            tracing::warn!(model = P::TYPE_NAME, field = def.name, error = %e, "association read failed");
            CrudError::from(e)
        })?;
    let mut values = rows.into_iter().map(|r| shaped(&child, r));

    Ok(match relation.cardinality {
        Cardinality::Many => FieldValue::Many {
            type_name: child.type_name,
            values: values.collect(),
        },
        Cardinality::One => FieldValue::One {
            type_name: child.type_name,
            value: values.next().unwrap_or(Value::Null),
        },
    })
}

/// Counts the rows related through `field`, honouring only the filters in
/// `options`.
///
/// # Errors
///
/// As [`fetch_field`]. Scalar fields are rejected.
pub async fn count_field<P: Model>(
    parent: &Repository<P>,
    parent_id: &P::Id,
    field: &str,
    options: &[QueryOption],
) -> Result<u64, CrudError> {
    let pid = id_value(parent_id)?;
    let def = lookup_field(parent.schema(), field)?;
    let relation = def
        .relation()
        .ok_or_else(|| CrudError::rejected(format!("{} is not a relation", def.name)))?;
    let plan = QueryPlan::compose(&relation.target_schema(), options);
    Ok(parent
        .store()
        .association_count(parent.schema(), &pid, def, &plan)
        .await?)
}

fn lookup_field<'a>(schema: &'a ModelSchema, field: &str) -> Result<&'a FieldDef, CrudError> {
    schema
        .lookup(field)
        .ok_or_else(|| CrudError::rejected("field not found"))
}

fn shaped(schema: &ModelSchema, mut record: Record) -> Value {
    fill_relation_defaults(schema, &mut record);
    Value::Object(record)
}

/// Looks up `field` of `P` and checks that it is a relation whose rows are
/// `T`s.
///
/// # Errors
///
/// A 422 naming the field otherwise.
pub fn relation_to<P: Model, T: Model>(schema: &ModelSchema, field: &str) -> Result<FieldDef, CrudError> {
    schema
        .lookup(field)
        .filter(|f| {
            f.relation().is_some_and(|r| {
                let target = r.target_schema();
                target.type_name == T::TYPE_NAME && target.table == T::TABLE
            })
        })
        .cloned()
        .ok_or_else(|| {
            CrudError::rejected(format!(
                "{}.{field} is not a relation to {}",
                P::TYPE_NAME,
                T::TYPE_NAME
            ))
        })
}

/// A relation of `P` whose rows are `T`s.
pub struct Association<P, T> {
    parent: Repository<P>,
    child: Repository<T>,
    field: FieldDef,
}

impl<P, T> Clone for Association<P, T> {
    fn clone(&self) -> Self {
        Self {
            parent: self.parent.clone(),
            child: self.child.clone(),
            field: self.field.clone(),
        }
    }
}

impl<P: Model, T: Model> Association<P, T> {
    /// Binds `field` of `P` as a relation to `T`.
    ///
    /// # Errors
    ///
    /// A 422 if `field` does not resolve to a relation of `P` targeting `T`.
    pub fn new(parent: Repository<P>, child: Repository<T>, field: &str) -> Result<Self, CrudError> {
        let field = relation_to::<P, T>(parent.schema(), field)?;
        Ok(Self {
            parent,
            child,
            field,
        })
    }

    #[must_use]
    pub fn field(&self) -> &FieldDef {
        &self.field
    }

    #[must_use]
    pub fn parent(&self) -> &Repository<P> {
        &self.parent
    }

    #[must_use]
    pub fn child(&self) -> &Repository<T> {
        &self.child
    }

    /// Creates `child` (zero identity) or links the existing row with the
    /// child's identity, then returns the parent with this relation loaded.
    ///
    /// In link mode the payload's other fields are ignored; the stored child
    /// is not modified. In create mode the new row and its link are written
    /// in one transaction, so a failed link leaves no child behind.
    ///
    /// # Errors
    ///
    /// [`CrudError::NotFound`] for a missing parent, or a missing child in
    /// link mode. Store failures otherwise.
    pub async fn create(&self, parent_id: &P::Id, child: &T) -> Result<P, CrudError> {
        let pid = id_value(parent_id)?;
        self.parent.find_record(&pid, &[]).await?;

        let (_, child_id) = child.identity();
        let store = self.parent.store();
        if child_id.is_zero() {
            tracing::debug!(parent = P::TYPE_NAME, child = T::TYPE_NAME, "creating nested child");
            store
                .create_and_link(self.parent.schema(), &pid, &self.field, to_record(child)?)
                .await
                .map_err(|e| {
                    tracing::warn!(parent = P::TYPE_NAME, child = T::TYPE_NAME, error = %e, "nested create failed");
                    CrudError::from(e)
                })?;
        } else {
            tracing::debug!(parent = P::TYPE_NAME, child = T::TYPE_NAME, %child_id, "linking existing child");
            self.child.get_by_id(&child_id, &[]).await?;
            store
                .association_append(self.parent.schema(), &pid, &self.field, &id_value(&child_id)?)
                .await?;
        }

        self.parent
            .get_by_id(parent_id, &[QueryOption::preload(self.field.name)])
            .await
    }

    /// Removes the link between the parent and the child.
    ///
    /// # Errors
    ///
    /// [`CrudError::NotFound`] if either row does not exist.
    pub async fn delete(&self, parent_id: &P::Id, child_id: &T::Id) -> Result<(), CrudError> {
        let pid = id_value(parent_id)?;
        self.parent.find_record(&pid, &[]).await?;
        self.child.get_by_id(child_id, &[]).await?;

        let removed = self
            .parent
            .store()
            .association_remove(self.parent.schema(), &pid, &self.field, &id_value(child_id)?)
            .await?;
        tracing::debug!(parent = P::TYPE_NAME, child = T::TYPE_NAME, removed, "unlinked");
        Ok(())
    }
}
