// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

/// Message returned for every 5xx response. Details only go to the log.
pub const UNEXPECTED_MESSAGE: &str =
    "an unexpected error has occurred, try again if request did not complete";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub context: String,
    detail: Option<String>,
    headers: HeaderMap,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    reference: Uuid,
    server_error: bool,
    client_error: bool,
    message: String,
    context: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            context: String::new(),
            detail: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, message)
    }

    /// 500 with `detail` logged but never sent.
    pub fn internal(detail: impl ToString) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, UNEXPECTED_MESSAGE).with_detail(detail)
    }

    pub fn bad_gateway(detail: impl ToString) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, UNEXPECTED_MESSAGE).with_detail(detail)
    }

    /// What the gateway was doing when the error happened.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_detail(mut self, detail: impl ToString) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let reference = Uuid::new_v4();
        let detail = self.detail.as_deref().unwrap_or("");
        if self.is_server_error() {
            error!(
                %reference,
                status = self.status.as_u16(),
                context = %self.context,
                detail,
                "request failed"
            );
        } else {
            info!(
                %reference,
                status = self.status.as_u16(),
                context = %self.context,
                message = %self.message,
                detail,
                "request rejected"
            );
        }

        let message = if self.is_server_error() {
            UNEXPECTED_MESSAGE.to_string()
        } else {
            self.message
        };
        let body = Json(ErrorBody {
            reference,
            server_error: self.status.is_server_error(),
            client_error: self.status.is_client_error(),
            message,
            context: self.context,
        });
        (self.status, self.headers, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::header::WWW_AUTHENTICATE;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);

        let taken = ApiError::conflict("taken");
        assert_eq!(taken.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn client_error_body() {
        let response = ApiError::bad_request("bad data")
            .with_context("creating user")
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["message"], "bad data");
        assert_eq!(body["context"], "creating user");
        assert_eq!(body["clientError"], true);
        assert_eq!(body["serverError"], false);
        assert!(Uuid::parse_str(body["reference"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn server_error_hides_detail() {
        let response = ApiError::internal("connection refused (os error 111)").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert!(!body.contains("connection refused"));
        assert!(body.contains(UNEXPECTED_MESSAGE));
    }

    #[test]
    fn extra_headers_are_sent() {
        let response = ApiError::unauthorized("no")
            .with_header(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))
            .into_response();
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
    }
}
