use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use utoipa::IntoParams;

use crate::errors::CrudError;
use crate::query::QueryOption;

/// Query-string parameters shared by every read endpoint.
///
/// ```text
/// GET /todos?limit=10&offset=20&order_by=created_at&desc=true
///           &filter_by=done&filter_value=false&preload=Tags&total=true
/// ```
///
/// Every parameter is optional. A missing or empty value turns its shaping
/// option off. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QueryParams {
    /// Page size; values <= 0 disable pagination
    #[param(required = false)]
    pub limit: i64,
    /// Rows to skip before the page starts
    #[param(required = false)]
    pub offset: i64,
    /// Field to order by
    #[param(required = false)]
    pub order_by: String,
    /// Order descending
    #[param(required = false)]
    pub desc: bool,
    /// Field for an equality filter
    #[param(required = false)]
    pub filter_by: String,
    /// Value for the equality filter
    #[param(required = false)]
    pub filter_value: String,
    /// Relation paths to eager-load, repeatable (`preload=Todos&preload=Owner.Team`)
    #[param(required = false)]
    pub preload: Vec<String>,
    /// Also report the number of rows matching the filter
    #[param(required = false)]
    pub total: bool,
}

impl QueryParams {
    /// Parses a raw query string.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::BindFailed`] when a numeric or boolean parameter
    /// does not parse.
    pub fn parse(query: &str) -> Result<Self, CrudError> {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "limit" => params.limit = parse_int("limit", &value)?,
                "offset" => params.offset = parse_int("offset", &value)?,
                "order_by" => params.order_by = value.into_owned(),
                "desc" => params.desc = parse_bool("desc", &value)?,
                "filter_by" => params.filter_by = value.into_owned(),
                "filter_value" => params.filter_value = value.into_owned(),
                "preload" | "preload[]" => {
                    if !value.is_empty() {
                        params.preload.push(value.into_owned());
                    }
                }
                "total" => params.total = parse_bool("total", &value)?,
                _ => {}
            }
        }
        Ok(params)
    }

    /// Options for a read: pagination, ordering, filtering and preloads, each
    /// only when its parameters are present.
    #[must_use]
    pub fn query_options(&self) -> Vec<QueryOption> {
        let mut options = Vec::new();
        if self.limit > 0 {
            options.push(QueryOption::paginate(
                self.limit.unsigned_abs(),
                self.offset.max(0).unsigned_abs(),
            ));
        }
        if !self.order_by.is_empty() {
            options.push(QueryOption::order_by(self.order_by.clone(), self.desc));
        }
        options.extend(self.filter_option());
        options.extend(self.preload.iter().map(QueryOption::preload));
        options
    }

    /// Options for the total count: the filter only.
    #[must_use]
    pub fn count_options(&self) -> Vec<QueryOption> {
        self.filter_option().into_iter().collect()
    }

    fn filter_option(&self) -> Option<QueryOption> {
        (!self.filter_by.is_empty() && !self.filter_value.is_empty())
            .then(|| QueryOption::filter_by(self.filter_by.clone(), self.filter_value.clone()))
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64, CrudError> {
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse()
        .map_err(|e| CrudError::bind_failed(format!("{key}: {e}")))
}

/// Accepts the usual spellings: `1 t T true TRUE True` and their negatives.
/// An empty value reads as false.
fn parse_bool(key: &str, value: &str) -> Result<bool, CrudError> {
    match value {
        "" | "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        other => Err(CrudError::bind_failed(format!(
            "{key}: invalid boolean `{other}`"
        ))),
    }
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = CrudError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::parse(parts.uri.query().unwrap_or_default())
    }
}
