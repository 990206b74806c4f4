//! Namespace listing handlers
//!
//! Providers, archives of a provider and the actions of an archive.

use axum::{
    extract::{Path, State},
    Json,
};
use mediasearch_core::media::validate_namespace;
use mediasearch_core::{Action, Envelope, Meta};

use crate::error::ApiError;
use crate::state::AppState;

fn names(items: Vec<String>) -> Envelope<String> {
    Envelope {
        meta: Meta {
            base: 0,
            total: items.len() as u64,
        },
        items,
    }
}

/// List providers that own at least one archive.
#[utoipa::path(
    get,
    path = "/media",
    tag = "Archives",
    responses(
        (status = 200, description = "Provider names, sorted", body = crate::openapi::NamesEnvelope),
        (status = 503, description = "Document store unavailable", body = crate::openapi::ErrorBody)
    )
)]
pub async fn list_providers(
    State(state): State<AppState>,
) -> Result<Json<Envelope<String>>, ApiError> {
    let providers = state.archive().list_providers().await?;
    Ok(Json(names(providers)))
}

/// List the archives of a provider.
#[utoipa::path(
    get,
    path = "/media/{provider}",
    tag = "Archives",
    params(("provider" = String, Path, description = "Provider namespace")),
    responses(
        (status = 200, description = "Archive names, sorted", body = crate::openapi::NamesEnvelope),
        (status = 400, description = "Invalid provider name", body = crate::openapi::ErrorBody)
    )
)]
pub async fn list_archives(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<Envelope<String>>, ApiError> {
    let archives = state.archive().list_archives(&provider).await?;
    Ok(Json(names(archives)))
}

/// List the actions addressable on an archive.
#[utoipa::path(
    get,
    path = "/media/{provider}/{archive}",
    tag = "Archives",
    params(
        ("provider" = String, Path, description = "Provider namespace"),
        ("archive" = String, Path, description = "Archive name")
    ),
    responses(
        (status = 200, description = "Action tokens", body = crate::openapi::NamesEnvelope),
        (status = 400, description = "Invalid provider or archive name", body = crate::openapi::ErrorBody)
    )
)]
pub async fn list_actions(
    Path((provider, archive)): Path<(String, String)>,
) -> Result<Json<Envelope<String>>, ApiError> {
    validate_namespace("provider", &provider)?;
    validate_namespace("archive", &archive)?;

    let actions = Action::ALL.iter().map(|a| a.token().to_string()).collect();
    Ok(Json(names(actions)))
}
