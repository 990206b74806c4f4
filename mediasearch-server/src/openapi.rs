//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document for the mediasearch API. The core crate
//! stays free of schema derives, so response shapes are described here.

use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::handlers::{HealthResponse, ReadyResponse};

/// Pagination metadata of every envelope.
#[derive(Serialize, ToSchema)]
#[schema(as = Meta)]
pub struct MetaSchema {
    /// Offset of the first returned item
    #[schema(example = 0)]
    pub base: usize,
    /// Size of the filtered set before pagination
    #[schema(example = 42)]
    pub total: u64,
}

/// One evaluation of an alike link.
#[derive(Serialize, ToSchema)]
#[schema(as = Evaluation)]
pub struct EvaluationSchema {
    #[schema(example = "dhash")]
    pub method: String,
    #[schema(example = 8)]
    pub dim: u32,
    /// Hamming distance in bits
    #[schema(example = 3)]
    pub diff: u32,
    /// `diff / (dim * dim)`
    #[schema(example = 0.046875)]
    pub dist: Option<f64>,
}

/// A media record as returned by `_select` and `_search`.
#[derive(Serialize, ToSchema)]
#[schema(as = MediaItem)]
pub struct MediaItemSchema {
    #[serde(rename = "ref")]
    #[schema(example = "img1")]
    pub reference: String,
    #[schema(example = "image")]
    pub class: String,
    #[schema(example = json!(["cat"]))]
    pub tags: Vec<String>,
    pub created_on: String,
    pub updated_on: String,
    pub reliked_on: String,
    /// Evaluations that placed the item in a search result
    pub evals: Option<Vec<EvaluationSchema>>,
}

#[derive(Serialize, ToSchema)]
pub struct MediaEnvelope {
    pub meta: MetaSchema,
    pub items: Vec<MediaItemSchema>,
}

#[derive(Serialize, ToSchema)]
pub struct NamesEnvelope {
    pub meta: MetaSchema,
    #[schema(example = json!(["acme"]))]
    pub items: Vec<String>,
}

/// Mutation payload.
#[derive(Serialize, ToSchema)]
#[schema(as = MediaInput)]
pub struct MediaInputSchema {
    /// Record identifier, `[A-Za-z0-9_.,-]+`
    #[serde(rename = "ref")]
    #[schema(example = "img1")]
    pub reference: Option<String>,
    /// `file:`, `http:` or `https:` URL of the media (insert)
    #[schema(example = "https://example.com/a.png")]
    pub url: Option<String>,
    /// Mime type of the media (insert)
    #[schema(example = "image/png")]
    pub mime: Option<String>,
    #[schema(example = json!(["cat"]))]
    pub tags: Option<Vec<String>>,
}

/// Result of a mutation, tagged by `action`.
#[derive(Serialize, ToSchema)]
#[schema(as = Outcome, example = json!({"action": "inserted", "ref": "img1", "alike": 2}))]
pub struct OutcomeSchema {
    /// `inserted`, `updated`, `deleted`, `dropped` or `repaired`
    pub action: String,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    /// Alike links created (inserted)
    pub alike: Option<usize>,
    /// Whether the record existed (updated)
    pub applied: Option<bool>,
    /// Whether the record existed (deleted)
    pub removed: Option<bool>,
    /// Records removed with the archive (dropped)
    pub records: Option<u64>,
    /// Missing mirror links appended (repaired)
    pub mirrors_restored: Option<u64>,
    /// Links to vanished records excised (repaired)
    pub dangling_pruned: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct OutcomeEnvelope {
    pub meta: MetaSchema,
    pub items: Vec<OutcomeSchema>,
}

/// Error body of every non-2xx response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = "Conflict: ref already exists: img1")]
    pub message: String,
    #[schema(example = "CONFLICT")]
    pub code: String,
}

/// Mediasearch API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mediasearch API",
        version = "0.1.0",
        description = r#"
## Perceptual Similarity Search for Media Archives

Mediasearch fingerprints images with **dhash** and **phash**, links every new
record to the alike records already in its archive, and answers tag-filtered
listings and similarity-ranked searches.

### How It Works

1. **Insert** media via `POST /media/{provider}/{archive}/_insert` with a `url` and `mime`
2. The image is fingerprinted and compared with every record of the same class
3. Matches within the method threshold are linked in both directions
4. **Search** alike media via `GET /media/{provider}/{archive}/_search?ref=...`
5. **Select** with tag groups: `with=cat,dog&with=pet&without=draft`
"#,
        license(
            name = "MIT OR Apache-2.0",
            url = "https://github.com/ArthurDEV44/mediasearch/blob/main/LICENSE"
        ),
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Media", description = "Record mutations, listings and similarity search"),
        (name = "Archives", description = "Provider and archive namespaces"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::listing::list_providers,
        crate::handlers::listing::list_archives,
        crate::handlers::listing::list_actions,
        crate::handlers::query::read_handler,
        crate::handlers::mutation::mutation_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            MetaSchema,
            EvaluationSchema,
            MediaItemSchema,
            MediaEnvelope,
            NamesEnvelope,
            MediaInputSchema,
            OutcomeSchema,
            OutcomeEnvelope,
            ErrorBody,
        )
    )
)]
pub struct ApiDoc;
