//! Route registration.
//!
//! ```rust,ignore
//! let store: Arc<dyn Persistence> = Arc::new(SqlStore::new(db));
//!
//! let app = Router::new()
//!     .merge(crud::<Todo>("/todos", store.clone()).into_router())
//!     .merge(
//!         crud::<Project>("/projects", store)
//!             .nested::<Todo>("todos")
//!             .into_router(),
//!     );
//! let app = layered(app, RouterOptions { allow_all_cors: true });
//! ```
//!
//! This registers:
//!
//! ```text
//! GET    /todos                       POST   /todos
//! GET    /todos/{TodoID}              PUT    /todos/{TodoID}
//! DELETE /todos/{TodoID}
//! ...same for /projects...
//! GET    /projects/{ProjectID}/todos  POST   /projects/{ProjectID}/todos
//! DELETE /projects/{ProjectID}/todos/{TodoID}
//! ```

use std::fmt;
use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderName, Method};
use axum::routing::{MethodRouter, delete, get, post, put};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

/// Header carrying the request id, set when the client sends none.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

use crate::association::{self, Association};
use crate::handlers::{self, FieldState};
use crate::model::{FieldDef, Model};
use crate::persistence::Persistence;
use crate::repository::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    List,
    Get,
    Create,
    Update,
    Delete,
    NestedGet,
    NestedCreate,
    NestedDelete,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::NestedGet => "nested_get",
            Self::NestedCreate => "nested_create",
            Self::NestedDelete => "nested_delete",
        };
        f.write_str(name)
    }
}

/// One registered route, for listings and the OpenAPI document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub method: Method,
    pub path: String,
    pub kind: RouteKind,
    /// Type name of the model the route serves.
    pub model: &'static str,
}

impl RouteSpec {
    /// Names of the `{param}` segments in the path.
    pub fn path_params(&self) -> impl Iterator<Item = &str> {
        self.path
            .split('/')
            .filter_map(|seg| seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
    }
}

/// Registers the CRUD routes of `M` under `base`.
pub fn crud<M: Model>(base: &str, store: Arc<dyn Persistence>) -> CrudRouter<M> {
    CrudRouter::new(base, store)
}

pub struct CrudRouter<M> {
    base: String,
    repo: Repository<M>,
    endpoints: Vec<(String, MethodRouter)>,
    routes: Vec<RouteSpec>,
}

impl<M: Model> CrudRouter<M> {
    pub fn new(base: &str, store: Arc<dyn Persistence>) -> Self {
        let repo = Repository::<M>::new(store);
        let base = format!("/{}", base.trim_matches('/'));
        let mut router = Self {
            base,
            repo,
            endpoints: Vec::new(),
            routes: Vec::new(),
        };

        let collection = router.base.clone();
        let item = format!("{collection}/{{{}}}", router.repo.schema().id_param());
        let repo = router.repo.clone();

        router.add(
            RouteKind::List,
            Method::GET,
            &collection,
            M::TYPE_NAME,
            get(handlers::list::<M>).with_state(repo.clone()),
        );
        router.add(
            RouteKind::Get,
            Method::GET,
            &item,
            M::TYPE_NAME,
            get(handlers::get_by_id::<M>).with_state(repo.clone()),
        );
        router.add(
            RouteKind::Create,
            Method::POST,
            &collection,
            M::TYPE_NAME,
            post(handlers::create::<M>).with_state(repo.clone()),
        );
        router.add(
            RouteKind::Update,
            Method::PUT,
            &item,
            M::TYPE_NAME,
            put(handlers::update::<M>).with_state(repo.clone()),
        );
        router.add(
            RouteKind::Delete,
            Method::DELETE,
            &item,
            M::TYPE_NAME,
            delete(handlers::delete::<M>).with_state(repo),
        );
        router
    }

    #[must_use]
    pub fn repository(&self) -> &Repository<M> {
        &self.repo
    }

    /// `GET {base}/{PID}/{field}` for a relation to `T`.
    ///
    /// # Panics
    ///
    /// Panics if `field` is not a relation of `M` targeting `T`.
    #[must_use]
    pub fn get_nested<T: Model>(mut self, field: &str) -> Self {
        let relation = self.relation_to::<T>(field);
        let path = self.field_path(field);
        let state = FieldState {
            parent: self.repo.clone(),
            field: relation.name.to_string(),
        };
        self.add(
            RouteKind::NestedGet,
            Method::GET,
            &path,
            T::TYPE_NAME,
            get(handlers::get_field::<M>).with_state(state),
        );
        self
    }

    /// `POST {base}/{PID}/{field}`: create a `T` or link an existing one.
    ///
    /// # Panics
    ///
    /// Panics if `field` is not a relation of `M` targeting `T`.
    #[must_use]
    pub fn create_nested<T: Model>(mut self, field: &str) -> Self {
        let assoc = self.association::<T>(field);
        let path = self.field_path(field);
        self.add(
            RouteKind::NestedCreate,
            Method::POST,
            &path,
            T::TYPE_NAME,
            post(handlers::create_nested::<M, T>).with_state(assoc),
        );
        self
    }

    /// `DELETE {base}/{PID}/{field}/{TID}`: unlink a `T`.
    ///
    /// # Panics
    ///
    /// Panics if `field` is not a relation of `M` targeting `T`.
    #[must_use]
    pub fn delete_nested<T: Model>(mut self, field: &str) -> Self {
        let assoc = self.association::<T>(field);
        let path = format!(
            "{}/{{{}}}",
            self.field_path(field),
            assoc.child().schema().id_param()
        );
        self.add(
            RouteKind::NestedDelete,
            Method::DELETE,
            &path,
            T::TYPE_NAME,
            delete(handlers::delete_nested::<M, T>).with_state(assoc),
        );
        self
    }

    /// All three nested routes for the relation `field`.
    ///
    /// # Panics
    ///
    /// Panics if `field` is not a relation of `M` targeting `T`.
    #[must_use]
    pub fn nested<T: Model>(self, field: &str) -> Self {
        self.get_nested::<T>(field)
            .create_nested::<T>(field)
            .delete_nested::<T>(field)
    }

    /// `GET {base}/{PID}/{field}` for any field, scalar or relation.
    ///
    /// # Panics
    ///
    /// Panics if `M` has no such field.
    #[must_use]
    pub fn field(mut self, field: &str) -> Self {
        assert!(
            self.repo.schema().lookup(field).is_some(),
            "{} has no field `{field}`",
            M::TYPE_NAME
        );
        let path = self.field_path(field);
        let state = FieldState {
            parent: self.repo.clone(),
            field: field.to_string(),
        };
        self.add(
            RouteKind::NestedGet,
            Method::GET,
            &path,
            M::TYPE_NAME,
            get(handlers::get_field::<M>).with_state(state),
        );
        self
    }

    #[must_use]
    pub fn routes(&self) -> &[RouteSpec] {
        &self.routes
    }

    /// Returns the router together with its route table.
    #[must_use]
    pub fn into_parts(self) -> (Router, Vec<RouteSpec>) {
        let router = self
            .endpoints
            .into_iter()
            .fold(Router::new(), |router, (path, endpoint)| router.route(&path, endpoint));
        (router, self.routes)
    }

    #[must_use]
    pub fn into_router(self) -> Router {
        self.into_parts().0
    }

    fn relation_to<T: Model>(&self, field: &str) -> FieldDef {
        association::relation_to::<M, T>(self.repo.schema(), field)
            .unwrap_or_else(|err| panic!("{err}"))
    }

    fn association<T: Model>(&self, field: &str) -> Association<M, T> {
        let child = Repository::<T>::new(Arc::clone(self.repo.store()));
        Association::new(self.repo.clone(), child, field).unwrap_or_else(|err| panic!("{err}"))
    }

    fn field_path(&self, field: &str) -> String {
        format!("{}/{{{}}}/{field}", self.base, self.repo.schema().id_param())
    }

    fn add(
        &mut self,
        kind: RouteKind,
        method: Method,
        path: &str,
        model: &'static str,
        endpoint: MethodRouter,
    ) {
        tracing::info!(%method, path, %kind, model, "registered route");
        match self.endpoints.iter_mut().find(|(p, _)| p == path) {
            Some((_, existing)) => {
                let current = std::mem::replace(existing, MethodRouter::new());
                *existing = current.merge(endpoint);
            }
            None => self.endpoints.push((path.to_string(), endpoint)),
        }
        self.routes.push(RouteSpec {
            method,
            path: path.to_string(),
            kind,
            model,
        });
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterOptions {
    /// Answer CORS preflights and allow every origin.
    pub allow_all_cors: bool,
}

/// Wraps `router` with request ids, request tracing and panic recovery, plus
/// permissive CORS when asked for.
///
/// Every request gets an `x-request-id` (the client's, or a fresh UUID). It is
/// recorded on the request's tracing span and echoed on the response.
pub fn layered(router: Router, options: RouterOptions) -> Router {
    let router = router
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(REQUEST_ID_HEADER)))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static(REQUEST_ID_HEADER),
            MakeRequestUuid,
        ));
    if options.allow_all_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

fn request_span(request: &Request) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id,
    )
}
