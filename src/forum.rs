use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::models::{Comment, ForumPost};

#[derive(Debug, Serialize)]
pub struct NewPost<'a> {
    pub title: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Default, Serialize)]
pub struct PostUpdate<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct NewComment<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct PostsResponse {
    #[serde(default)]
    posts: Vec<ForumPost>,
}

impl ApiClient {
    pub async fn list_posts(&self) -> Result<Vec<ForumPost>, ApiError> {
        let response: PostsResponse = self.get_json("/api/forum/posts").await?;
        Ok(response.posts)
    }

    pub async fn get_post(&self, post_id: &str) -> Result<ForumPost, ApiError> {
        self.get_json(&format!("/api/forum/posts/{}", post_id)).await
    }

    pub async fn create_post(&self, post: &NewPost<'_>) -> Result<ForumPost, ApiError> {
        self.send_json(Method::POST, "/api/forum/posts", post).await
    }

    pub async fn update_post(&self, post_id: &str, update: &PostUpdate<'_>) -> Result<ForumPost, ApiError> {
        self.send_json(Method::PUT, &format!("/api/forum/posts/{}", post_id), update)
            .await
    }

    pub async fn delete_post(&self, post_id: &str) -> Result<(), ApiError> {
        self.send_unit::<()>(Method::DELETE, &format!("/api/forum/posts/{}", post_id), None)
            .await
    }

    pub async fn add_comment(&self, post_id: &str, content: &str) -> Result<Comment, ApiError> {
        self.send_json(
            Method::POST,
            &format!("/api/forum/posts/{}/comments", post_id),
            &NewComment { content },
        )
        .await
    }

    pub async fn delete_comment(&self, post_id: &str, comment_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/forum/posts/{}/comments/{}", post_id, comment_id);
        self.send_unit::<()>(Method::DELETE, &path, None).await
    }
}
