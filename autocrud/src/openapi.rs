//! OpenAPI description of registered routes.
//!
//! Request and response bodies are free-form JSON objects keyed by the
//! model's serialized field names, so only paths, parameters and status codes
//! are described.

use std::collections::BTreeMap;

use axum::http::Method;
use utoipa::IntoParams;
use utoipa::openapi::path::{Operation, OperationBuilder, ParameterBuilder, ParameterIn};
use utoipa::openapi::{
    InfoBuilder, OpenApi, OpenApiBuilder, PathItem, PathsBuilder, Required, ResponseBuilder,
};

use crate::params::QueryParams;
use crate::router::{RouteKind, RouteSpec};

#[must_use]
pub fn document(title: &str, version: &str, routes: &[RouteSpec]) -> OpenApi {
    let mut items: BTreeMap<String, PathItem> = BTreeMap::new();
    for route in routes {
        let item = items.entry(route.path.clone()).or_default();
        let slot = match route.method {
            Method::GET => &mut item.get,
            Method::POST => &mut item.post,
            Method::PUT => &mut item.put,
            Method::DELETE => &mut item.delete,
            _ => continue,
        };
        *slot = Some(operation(route));
    }

    let paths = items
        .into_iter()
        .fold(PathsBuilder::new(), |paths, (path, item)| paths.path(path, item));

    OpenApiBuilder::new()
        .info(InfoBuilder::new().title(title).version(version).build())
        .paths(paths.build())
        .build()
}

fn operation(route: &RouteSpec) -> Operation {
    let summary = match route.kind {
        RouteKind::List => format!("List {}s", route.model),
        RouteKind::Get => format!("Get one {}", route.model),
        RouteKind::Create => format!("Create a {}", route.model),
        RouteKind::Update => format!("Update a {}", route.model),
        RouteKind::Delete => format!("Delete a {}", route.model),
        RouteKind::NestedGet => format!("Read a field ({})", route.model),
        RouteKind::NestedCreate => format!("Create or link a nested {}", route.model),
        RouteKind::NestedDelete => format!("Unlink a nested {}", route.model),
    };

    let mut builder = OperationBuilder::new()
        .operation_id(Some(format!("{}_{}", route.kind, route.path.replace(['/', '{', '}'], "_"))))
        .summary(Some(summary))
        .tags(Some(vec![route.model.to_string()]))
        .response("200", ResponseBuilder::new().description("Success").build())
        .response("400", ResponseBuilder::new().description("Bad request").build())
        .response("404", ResponseBuilder::new().description("Not found").build())
        .response("422", ResponseBuilder::new().description("Process failed").build());

    for name in route.path_params() {
        builder = builder.parameter(
            ParameterBuilder::new()
                .name(name)
                .parameter_in(ParameterIn::Path)
                .required(Required::True)
                .build(),
        );
    }
    if matches!(route.kind, RouteKind::List | RouteKind::Get | RouteKind::NestedGet) {
        for parameter in QueryParams::into_params(|| Some(ParameterIn::Query)) {
            builder = builder.parameter(parameter);
        }
    }
    builder.build()
}
