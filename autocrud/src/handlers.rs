//! Generic axum handlers behind the routes [`crate::router::CrudRouter`]
//! registers.
//!
//! Every handler answers 200 with an [`Envelope`] or fails with a
//! [`CrudError`]. Path parameters are looked up by the model's route token
//! (`TodoID`, `ProjectID`, ...), so one handler serves every model.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, State};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::association::{self, Association, FieldValue};
use crate::errors::CrudError;
use crate::model::{Identify, Identity, Model};
use crate::params::QueryParams;
use crate::repository::{Repository, to_record};
use crate::response::Envelope;

/// State of a field route: the parent repository and the field it serves.
pub struct FieldState<P> {
    pub parent: Repository<P>,
    pub field: String,
}

impl<P> Clone for FieldState<P> {
    fn clone(&self) -> Self {
        Self {
            parent: self.parent.clone(),
            field: self.field.clone(),
        }
    }
}

type PathParams = Path<HashMap<String, String>>;

/// `GET /Ms`
pub async fn list<M: Model>(
    State(repo): State<Repository<M>>,
    params: QueryParams,
) -> Result<Envelope, CrudError> {
    let models = repo.get_many(&params.query_options()).await?;
    let envelope = Envelope::models(&models)?;
    if !params.total {
        return Ok(envelope);
    }
    Ok(attach_total(envelope, repo.count(&params.count_options()).await))
}

/// `GET /Ms/{MID}`
pub async fn get_by_id<M: Model>(
    State(repo): State<Repository<M>>,
    Path(path): PathParams,
    params: QueryParams,
) -> Result<Envelope, CrudError> {
    let id = model_id::<M::Id>(&path, &repo.schema().id_param())?;
    let model = repo.get_by_id(&id, &params.query_options()).await?;
    Envelope::model(&model)
}

/// `POST /Ms`
pub async fn create<M: Model>(
    State(repo): State<Repository<M>>,
    body: Bytes,
) -> Result<Envelope, CrudError> {
    let model: M = bind(&body)?;
    let created = repo.create(&model).await?;
    Envelope::model(&created)
}

/// `PUT /Ms/{MID}`
///
/// The body is merged over the stored record, so absent keys keep their
/// values. Changing the identity is rejected.
pub async fn update<M: Model>(
    State(repo): State<Repository<M>>,
    Path(path): PathParams,
    body: Bytes,
) -> Result<Envelope, CrudError> {
    let id = model_id::<M::Id>(&path, &repo.schema().id_param())?;
    let existing = repo.get_by_id(&id, &[]).await?;

    let Value::Object(patch) = bind::<Value>(&body)? else {
        return Err(CrudError::bind_failed("expected a JSON object"));
    };
    let mut record = to_record(&existing)?;
    record.extend(patch);
    let merged: M = serde_json::from_value(Value::Object(record)).map_err(CrudError::bind_failed)?;

    let (field, merged_id) = merged.identity();
    if merged_id != id {
        tracing::debug!(model = M::TYPE_NAME, %id, %merged_id, "identity change rejected");
        return Err(CrudError::identity_mismatch(field));
    }

    let saved = repo.update(&merged).await?;
    Envelope::model(&saved)
}

/// `DELETE /Ms/{MID}`
pub async fn delete<M: Model>(
    State(repo): State<Repository<M>>,
    Path(path): PathParams,
) -> Result<Envelope, CrudError> {
    let id = model_id::<M::Id>(&path, &repo.schema().id_param())?;
    repo.delete_by_id(&id).await?;
    Ok(Envelope::default().with("deleted", true))
}

/// `GET /Ps/{PID}/field`
pub async fn get_field<P: Model>(
    State(state): State<FieldState<P>>,
    Path(path): PathParams,
    params: QueryParams,
) -> Result<Envelope, CrudError> {
    let pid = parent_id::<P::Id>(&path, &state.parent.schema().id_param())?;
    let value =
        association::fetch_field(&state.parent, &pid, &state.field, &params.query_options())
            .await?;

    let is_relation = !matches!(value, FieldValue::Scalar(_));
    let envelope = Envelope::field(value);
    if !(params.total && is_relation) {
        return Ok(envelope);
    }
    let total =
        association::count_field(&state.parent, &pid, &state.field, &params.count_options()).await;
    Ok(attach_total(envelope, total))
}

/// `POST /Ps/{PID}/field`
///
/// A child with a zero identity is created; otherwise the existing child is
/// linked. Responds with the parent, relation loaded.
pub async fn create_nested<P: Model, T: Model>(
    State(assoc): State<Association<P, T>>,
    Path(path): PathParams,
    body: Bytes,
) -> Result<Envelope, CrudError> {
    let pid = parent_id::<P::Id>(&path, &assoc.parent().schema().id_param())?;
    let child: T = bind(&body)?;
    let parent = assoc.create(&pid, &child).await?;
    Envelope::model(&parent)
}

/// `DELETE /Ps/{PID}/field/{TID}`
pub async fn delete_nested<P: Model, T: Model>(
    State(assoc): State<Association<P, T>>,
    Path(path): PathParams,
) -> Result<Envelope, CrudError> {
    let pid = parent_id::<P::Id>(&path, &assoc.parent().schema().id_param())?;
    let cid = model_id::<T::Id>(&path, &assoc.child().schema().id_param())?;
    assoc.delete(&pid, &cid).await?;
    Ok(Envelope::default().with("deleted", true))
}

fn attach_total(envelope: Envelope, total: Result<u64, CrudError>) -> Envelope {
    match total {
        Ok(total) => envelope.with("total", total),
        Err(err) => {
            tracing::warn!(error = %err, "total count failed");
            envelope.with("totalError", err.to_string())
        }
    }
}

fn bind<T: DeserializeOwned>(body: &[u8]) -> Result<T, CrudError> {
    serde_json::from_slice(body).map_err(CrudError::bind_failed)
}

fn model_id<I: Identity>(path: &HashMap<String, String>, param: &str) -> Result<I, CrudError> {
    path_id(path, param, CrudError::missing_identifier)
}

fn parent_id<I: Identity>(path: &HashMap<String, String>, param: &str) -> Result<I, CrudError> {
    path_id(path, param, CrudError::missing_parent_identifier)
}

fn path_id<I: Identity>(
    path: &HashMap<String, String>,
    param: &str,
    missing: fn(String) -> CrudError,
) -> Result<I, CrudError> {
    let raw = path
        .get(param)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| missing(param.to_string()))?;
    raw.parse()
        .map_err(|_| CrudError::bind_failed(format!("{param}: invalid identifier `{raw}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_path_id_parses_identity() {
        let id: i64 = model_id(&path(&[("TodoID", "12")]), "TodoID").unwrap();
        assert_eq!(id, 12);
    }

    #[test]
    fn test_missing_ids_map_to_their_errors() {
        let err = model_id::<i64>(&path(&[]), "TodoID").unwrap_err();
        assert!(matches!(err, CrudError::MissingIdentifier { .. }));

        let err = parent_id::<i64>(&path(&[("ProjectID", "")]), "ProjectID").unwrap_err();
        assert!(matches!(err, CrudError::MissingParentIdentifier { .. }));
    }

    #[test]
    fn test_unparsable_id_fails_to_bind() {
        let err = model_id::<i64>(&path(&[("TodoID", "abc")]), "TodoID").unwrap_err();
        assert!(matches!(err, CrudError::BindFailed { .. }));
    }

    #[test]
    fn test_total_failure_is_reported_not_raised() {
        let envelope = attach_total(
            Envelope::default(),
            Err(CrudError::process_failed(sea_orm::DbErr::Custom("x".into()))),
        );
        assert!(envelope.get("totalError").is_some());
        assert!(envelope.get("total").is_none());
    }
}
