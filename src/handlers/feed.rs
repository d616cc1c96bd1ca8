//! Feed API (I, §4.7). Thin handlers delegating to `FeedQuery`, the way
//! `handlers/artists.rs` dispatches straight to a service function instead
//! of embedding query logic in the route.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use newsroom_core::models::Story;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub category: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub stories: Vec<Story>,
    pub has_more: bool,
}

pub async fn get_feed(State(state): State<AppState>, Query(params): Query<FeedParams>) -> Result<Json<FeedResponse>> {
    let limit = params.limit.unwrap_or(state.config.feed_query.default_limit);
    let offset = params.offset.unwrap_or(0);

    let page = state.feed_query.feed(params.category.as_deref(), limit, offset).await?;
    Ok(Json(FeedResponse { stories: page.stories, has_more: page.has_more }))
}

#[derive(Debug, Deserialize)]
pub struct LastModifiedParams {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LastModifiedResponse {
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn get_last_modified(
    State(state): State<AppState>,
    Query(params): Query<LastModifiedParams>,
) -> Result<Json<LastModifiedResponse>> {
    let last_modified = state.feed_query.last_modified(params.category.as_deref()).await?;
    Ok(Json(LastModifiedResponse { last_modified }))
}

#[derive(Debug, Deserialize)]
pub struct BreakingParams {
    pub limit: Option<usize>,
}

pub async fn get_breaking(
    State(state): State<AppState>,
    Query(params): Query<BreakingParams>,
) -> Result<Json<Vec<Story>>> {
    let limit = params.limit.unwrap_or(state.config.feed_query.default_limit);
    let stories = state.feed_query.breaking(limit).await?;
    Ok(Json(stories))
}

pub async fn get_story(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Story>> {
    let story = state
        .feed_query
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound { resource: format!("story/{id}") })?;
    Ok(Json(story))
}

pub async fn get_story_sources(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<newsroom_core::models::SourceArticleRef>>> {
    let story = state
        .feed_query
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound { resource: format!("story/{id}") })?;
    Ok(Json(story.source_articles))
}
