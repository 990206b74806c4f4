//! Read handlers: `_select` and `_search`
//!
//! Handles GET /media/{provider}/{archive}/{action} requests.

use axum::{
    extract::{Path, RawQuery, State},
    Json,
};
use mediasearch_core::media::validate_ref;
use mediasearch_core::{
    Action, Envelope, MediaClass, MediaItem, SearchQuery, SelectQuery, SortOrder, TagFilter,
};
use url::form_urlencoded;

use crate::error::ApiError;
use crate::state::AppState;

/// Query-string parameters of a read.
///
/// `ref`, `order`, `with` and `without` may repeat; each `with`/`without`
/// value is one comma-joined OR-group. Unparseable numbers are ignored.
#[derive(Debug, Default, PartialEq)]
pub struct ReadParams {
    pub refs: Vec<String>,
    pub order: Option<String>,
    pub with: Vec<Vec<String>>,
    pub without: Vec<Vec<String>>,
    pub class: Option<String>,
    pub threshold: Option<f64>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

fn tag_group(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

impl ReadParams {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(raw) = raw else {
            return params;
        };

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "ref" if !value.is_empty() => params.refs.push(value.into_owned()),
                "order" if params.order.is_none() => params.order = Some(value.into_owned()),
                "with" => params.with.push(tag_group(&value)),
                "without" => params.without.push(tag_group(&value)),
                "class" if !value.is_empty() => params.class = Some(value.into_owned()),
                "threshold" => {
                    params.threshold = value.parse::<f64>().ok().filter(|t| t.is_finite())
                }
                "offset" => params.offset = value.parse().ok(),
                "limit" => params.limit = value.parse().ok(),
                _ => {}
            }
        }
        params
    }

    fn class(&self) -> Result<Option<MediaClass>, ApiError> {
        Ok(self.class.as_deref().map(str::parse::<MediaClass>).transpose()?)
    }

    fn refs(&self) -> Result<Vec<String>, ApiError> {
        for reference in &self.refs {
            validate_ref(reference)?;
        }
        Ok(self.refs.clone())
    }

    fn tags(&self) -> TagFilter {
        TagFilter {
            with: self.with.clone(),
            without: self.without.clone(),
        }
    }

    fn order(&self) -> SortOrder {
        self.order
            .as_deref()
            .map(SortOrder::from_token)
            .unwrap_or_default()
    }

    pub fn select_query(&self) -> Result<SelectQuery, ApiError> {
        let refs = self.refs()?;
        Ok(SelectQuery {
            refs: (!refs.is_empty()).then_some(refs),
            class: self.class()?,
            tags: self.tags(),
            order: self.order(),
            offset: self.offset.unwrap_or(0),
            limit: self.limit,
        })
    }

    pub fn search_query(&self) -> Result<SearchQuery, ApiError> {
        Ok(SearchQuery {
            seeds: self.refs()?,
            class: self.class()?,
            tags: self.tags(),
            threshold: self.threshold,
            order: self.order(),
            offset: self.offset.unwrap_or(0),
            limit: self.limit,
        })
    }
}

/// Select or search media in an archive.
///
/// `_select` lists records matching the filters. `_search` returns records
/// alike to the `ref` seeds, closest first. A missing archive yields an empty
/// envelope.
#[utoipa::path(
    get,
    path = "/media/{provider}/{archive}/{action}",
    tag = "Media",
    params(
        ("provider" = String, Path, description = "Provider namespace"),
        ("archive" = String, Path, description = "Archive name"),
        ("action" = String, Path, description = "`_select` or `_search`"),
        ("ref" = Option<Vec<String>>, Query, description = "Record refs (select) or seeds (search); repeatable"),
        ("class" = Option<String>, Query, description = "Media class filter"),
        ("with" = Option<Vec<String>>, Query, description = "Comma-joined OR-group of required tags; repeatable"),
        ("without" = Option<Vec<String>>, Query, description = "Comma-joined group of excluded tags; repeatable"),
        ("order" = Option<String>, Query, description = "`ref`, `created`, `updated` or `reliked`"),
        ("threshold" = Option<f64>, Query, description = "Maximum normalized distance (search)"),
        ("offset" = Option<usize>, Query, description = "Items to skip"),
        ("limit" = Option<usize>, Query, description = "Maximum items returned")
    ),
    responses(
        (status = 200, description = "Matching media", body = crate::openapi::MediaEnvelope),
        (status = 400, description = "Invalid ref, class or action", body = crate::openapi::ErrorBody),
        (status = 503, description = "Document store unavailable", body = crate::openapi::ErrorBody)
    )
)]
pub async fn read_handler(
    State(state): State<AppState>,
    Path((provider, name, action)): Path<(String, String, String)>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Envelope<MediaItem>>, ApiError> {
    let action: Action = action.parse()?;
    if !action.is_read() {
        return Err(ApiError::bad_request(format!(
            "{action} is a mutation; use POST"
        )));
    }

    let params = ReadParams::parse(raw.as_deref());
    let mut archive = state.archive();
    archive.resolve(&provider, &name, false).await?;

    let envelope = match action {
        Action::Search => {
            state
                .engine
                .search(&archive, &params.search_query()?)
                .await?
        }
        _ => {
            state
                .engine
                .select(&archive, &params.select_query()?)
                .await?
        }
    };

    tracing::debug!(
        provider = %provider,
        archive = %name,
        action = %action,
        total = envelope.meta.total,
        "Read finished"
    );
    Ok(Json(envelope))
}
