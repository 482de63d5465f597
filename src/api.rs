// src/api.rs
//! Read-only presentation boundary. Serves the latest daily records and
//! summaries; never mutates pipeline state.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use tower_http::cors::CorsLayer;

use crate::aggregate::DailyStore;
use crate::summary::SummaryCache;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DailyStore>,
    pub summaries: Arc<SummaryCache>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/dates", get(list_dates))
        .route("/api/news/{date}", get(get_news))
        .route("/api/summary/{date}", get(get_summary))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn parse_date(s: &str) -> Result<NaiveDate, Response> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "success": false,
                "error": "date must be YYYY-MM-DD",
            })),
        )
            .into_response()
    })
}

async fn list_dates(State(state): State<AppState>) -> Json<Vec<String>> {
    let dates = state
        .store
        .dates()
        .into_iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect();
    Json(dates)
}

#[derive(serde::Serialize)]
struct NewsItem {
    title: String,
    url: Option<String>,
    source_name: String,
    rank: u32,
}

#[derive(serde::Serialize)]
struct NewsResp {
    success: bool,
    date: String,
    news: Vec<NewsItem>,
    total: usize,
}

async fn get_news(State(state): State<AppState>, Path(date): Path<String>) -> Response {
    let day = match parse_date(&date) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let Some(record) = state.store.get(day) else {
        return not_found(&date);
    };

    let mut news = Vec::with_capacity(record.item_count());
    for (source_id, items) in &record.sources {
        for item in items {
            news.push(NewsItem {
                title: item.title.clone(),
                url: item.link.clone(),
                source_name: source_id.clone(),
                rank: item.rank,
            });
        }
    }

    let total = news.len();
    Json(NewsResp {
        success: true,
        date,
        news,
        total,
    })
    .into_response()
}

async fn get_summary(State(state): State<AppState>, Path(date): Path<String>) -> Response {
    let day = match parse_date(&date) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    match state.summaries.latest(day) {
        Some(rec) => Json(rec).into_response(),
        None => not_found(&date),
    }
}

fn not_found(date: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "success": false,
            "error": format!("no data for {date}"),
        })),
    )
        .into_response()
}
