// Only compile this module if the 'openapi' feature is enabled
#![cfg(feature = "openapi")]
// The documented functions are anchors for the path macro
#![allow(dead_code)]

use utoipa::OpenApi;

use crate::handlers::{ModelResponse, StatusResponse};

#[utoipa::path(
    get,
    path = "/db/status",
    responses(
        (status = 200, description = "Connection is ready or open", body = StatusResponse),
        (status = 503, description = "Connection is not usable", body = StatusResponse)
    ),
    tag = "Database"
)]
fn doc_db_status() {}

#[utoipa::path(
    get,
    path = "/db/models/{name}",
    params(
        ("name" = String, Path, description = "Registered model name", example = "Post")
    ),
    responses(
        (status = 200, description = "Model is registered", body = ModelResponse),
        (status = 404, description = "Model does not exist", body = String, example = json!("Not found: Model 'Comment' does not exist"))
    ),
    tag = "Database"
)]
fn doc_db_model() {}

#[derive(OpenApi)]
#[openapi(
    paths(doc_db_status, doc_db_model),
    components(schemas(StatusResponse, ModelResponse)),
    tags(
        (name = "Database", description = "Connection state and registered models")
    )
)]
pub struct DbApiDoc;
