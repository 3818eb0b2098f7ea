//! Standard response envelope helpers.

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaPage,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaPage {
    /// Rows in this page.
    pub count: u64,
    /// Rows matching the filters.
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::CREATED, Json(SuccessOne { data, meta: None }))
}

pub fn success_one_ok<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { data, meta: None }))
}

pub fn success_page<T: Serialize>(data: Vec<T>, total: u64, page: u32, per_page: u32) -> (StatusCode, Json<SuccessMany<T>>) {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(SuccessMany {
            data,
            meta: MetaPage {
                count,
                total,
                page,
                per_page,
            },
        }),
    )
}

/// `text/csv` download named after the model.
pub fn csv_attachment(model: &str, body: String) -> impl IntoResponse {
    let disposition = format!("attachment; filename=\"{}.csv\"", crate::case::to_snake_case(model));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
}
