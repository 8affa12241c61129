//! Blog posts stored through the registered `Post` model

use axum::{http::StatusCode, response::Response, Extension, Json};
use bson::{doc, oid::ObjectId};
use chrono::{DateTime, Utc};
use docbridge_common::error::{database_error, validation_error, DocbridgeError};
use docbridge_common::http::handle_json_result;
use docbridge_db::{Connector, MongoDriver, MongoSchema};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const POST_MODEL: &str = "Post";
const RECENT_LIMIT: i64 = 20;

/// Posts live in `posts`, newest first
pub fn post_schema() -> MongoSchema {
    MongoSchema::new().index(doc! { "createdAt": -1 }, None)
}

#[derive(Debug, Serialize, Deserialize)]
struct PostDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    title: String,
    content: String,
    #[serde(
        rename = "createdAt",
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime"
    )]
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Option<String>,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<PostDocument> for PostResponse {
    fn from(post: PostDocument) -> Self {
        Self {
            id: post.id.map(|id| id.to_hex()),
            title: post.title,
            content: post.content,
            created_at: post.created_at,
        }
    }
}

async fn recent_posts(connector: &Connector<MongoDriver>) -> Result<Vec<PostResponse>, DocbridgeError> {
    let posts = connector
        .get_model(POST_MODEL)?
        .typed_collection::<PostDocument>()
        .await
        .map_err(database_error)?;

    let cursor = posts
        .find(doc! {})
        .sort(doc! { "createdAt": -1 })
        .limit(RECENT_LIMIT)
        .await
        .map_err(database_error)?;
    let found: Vec<PostDocument> = cursor.try_collect().await.map_err(database_error)?;

    Ok(found.into_iter().map(PostResponse::from).collect())
}

async fn insert_post(
    connector: &Connector<MongoDriver>,
    new_post: NewPost,
) -> Result<PostResponse, DocbridgeError> {
    if new_post.title.trim().is_empty() {
        return Err(validation_error("title must not be empty"));
    }

    let posts = connector
        .get_model(POST_MODEL)?
        .typed_collection::<PostDocument>()
        .await
        .map_err(database_error)?;

    let mut post = PostDocument {
        id: None,
        title: new_post.title,
        content: new_post.content,
        created_at: Utc::now(),
    };
    let inserted = posts.insert_one(&post).await.map_err(database_error)?;
    post.id = inserted.inserted_id.as_object_id();
    info!(id = ?post.id, "Created post");

    Ok(post.into())
}

/// `GET /api/posts`
pub async fn recent_posts_handler(
    Extension(connector): Extension<Arc<Connector<MongoDriver>>>,
) -> Result<Json<Vec<PostResponse>>, Response> {
    handle_json_result(recent_posts(&connector).await)
}

/// `POST /api/posts`
pub async fn create_post_handler(
    Extension(connector): Extension<Arc<Connector<MongoDriver>>>,
    Json(new_post): Json<NewPost>,
) -> Result<(StatusCode, Json<PostResponse>), Response> {
    let created = handle_json_result(insert_post(&connector, new_post).await)?;
    Ok((StatusCode::CREATED, created))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_document_uses_stored_field_names() {
        let post = PostDocument {
            id: None,
            title: "Hello".to_string(),
            content: "first post".to_string(),
            created_at: Utc::now(),
        };

        let document = bson::to_document(&post).unwrap();

        assert!(document.contains_key("createdAt"));
        assert!(!document.contains_key("_id"));
        assert!(document.get_datetime("createdAt").is_ok());
    }

    #[test]
    fn test_response_uses_hex_id() {
        let id = ObjectId::new();
        let response = PostResponse::from(PostDocument {
            id: Some(id),
            title: "Hello".to_string(),
            content: String::new(),
            created_at: Utc::now(),
        });

        assert_eq!(response.id, Some(id.to_hex()));
    }
}
