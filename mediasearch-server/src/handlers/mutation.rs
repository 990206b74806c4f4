//! Mutation handler: `_insert`, `_update`, `_delete`, `_drop`, `_repair`
//!
//! Handles POST /media/{provider}/{archive}/{action} requests.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use mediasearch_core::{Action, Envelope, MediaInput, Meta, MutationFlags, Outcome, TagsMode};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::ApiError;
use crate::state::AppState;

/// Query flags of a mutation.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MutationParams {
    /// Overwrite on insert; ignore a missing ref on update and delete
    pub pass: Option<String>,
    /// Drop the archive even when it still holds records
    pub force: Option<String>,
    /// Tag update mode: `set` (default), `add` or `pop`
    pub mode: Option<String>,
}

/// Flag values starting with `1`, `t` or `T` are true.
fn truthy(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.starts_with(['1', 't', 'T']))
}

impl MutationParams {
    pub fn flags(&self) -> Result<MutationFlags, ApiError> {
        let tags_mode = match self.mode.as_deref() {
            None | Some("") => TagsMode::default(),
            Some(mode) => mode.parse()?,
        };
        Ok(MutationFlags {
            pass: truthy(self.pass.as_deref()),
            force: truthy(self.force.as_deref()),
            tags_mode,
        })
    }
}

/// An empty body is an empty input; `_drop` and `_repair` need none.
fn parse_input(body: &[u8]) -> Result<MediaInput, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(MediaInput::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))
}

/// Run one mutation against an archive.
///
/// `_insert` fetches the media at `url`, fingerprints it, links it to alike
/// records and creates the archive when missing. Every other mutation needs
/// an existing archive.
#[utoipa::path(
    post,
    path = "/media/{provider}/{archive}/{action}",
    tag = "Media",
    params(
        ("provider" = String, Path, description = "Provider namespace"),
        ("archive" = String, Path, description = "Archive name"),
        ("action" = String, Path, description = "`_insert`, `_update`, `_delete`, `_drop` or `_repair`"),
        MutationParams
    ),
    request_body(content = crate::openapi::MediaInputSchema, description = "Record payload; may be empty for `_drop` and `_repair`"),
    responses(
        (status = 201, description = "Record inserted", body = crate::openapi::OutcomeEnvelope),
        (status = 200, description = "Mutation applied", body = crate::openapi::OutcomeEnvelope),
        (status = 400, description = "Invalid input", body = crate::openapi::ErrorBody),
        (status = 404, description = "Archive or ref not found", body = crate::openapi::ErrorBody),
        (status = 409, description = "Ref exists, or archive not empty", body = crate::openapi::ErrorBody),
        (status = 422, description = "Media could not be fingerprinted", body = crate::openapi::ErrorBody),
        (status = 502, description = "Media could not be fetched", body = crate::openapi::ErrorBody),
        (status = 503, description = "Document store unavailable", body = crate::openapi::ErrorBody)
    )
)]
pub async fn mutation_handler(
    State(state): State<AppState>,
    Path((provider, name, action)): Path<(String, String, String)>,
    Query(params): Query<MutationParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<Envelope<Outcome>>), ApiError> {
    let action: Action = action.parse()?;
    if action.is_read() {
        return Err(ApiError::bad_request(format!(
            "{action} is a read; use GET"
        )));
    }

    let flags = params.flags()?;
    let input = parse_input(&body)?;

    let mut archive = state.archive();
    let outcome = state
        .lifecycle
        .execute(&mut archive, &provider, &name, action, &input, flags)
        .await?;

    let status = match outcome {
        Outcome::Inserted { .. } => StatusCode::CREATED,
        _ => StatusCode::OK,
    };

    Ok((
        status,
        Json(Envelope {
            meta: Meta { base: 0, total: 1 },
            items: vec![outcome],
        }),
    ))
}
