//! API 层错误类型定义
//!
//! 把领域错误映射为 HTTP 状态码与统一的失败响应体。
//! 系统级错误只返回通用提示，详细信息仅记录日志，防止信息泄露。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use coupon_shared::error::CouponError;

/// API 错误包装
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub CouponError);

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            CouponError::CouponNotFound(_) => StatusCode::NOT_FOUND,
            CouponError::WindowInvalid { .. } => StatusCode::BAD_REQUEST,
            // 409：请求合法但与当前发放状态冲突
            CouponError::QuantityExceeded { .. } | CouponError::DuplicateIssue { .. } => {
                StatusCode::CONFLICT
            }
            // 锁竞争超时是瞬时状态，客户端可重试
            CouponError::LockTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let comment = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(code = self.0.code(), error = %self.0, "issue request failed");
            "服务内部错误，请稍后重试".to_string()
        } else {
            self.0.to_string()
        };

        let body = json!({
            "isSuccess": false,
            "code": self.0.code(),
            "comment": comment
        });

        (status, axum::Json(body)).into_response()
    }
}

/// API 层 Result 类型别名
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn all_business_variants() -> Vec<(CouponError, StatusCode, &'static str)> {
        vec![
            (
                CouponError::CouponNotFound(1),
                StatusCode::NOT_FOUND,
                "COUPON_NOT_FOUND",
            ),
            (
                CouponError::WindowInvalid {
                    coupon_id: 1,
                    issue_start: Utc::now(),
                    issue_end: Utc::now(),
                },
                StatusCode::BAD_REQUEST,
                "WINDOW_INVALID",
            ),
            (
                CouponError::QuantityExceeded { coupon_id: 1 },
                StatusCode::CONFLICT,
                "QUANTITY_EXCEEDED",
            ),
            (
                CouponError::DuplicateIssue {
                    coupon_id: 1,
                    user_id: 2,
                },
                StatusCode::CONFLICT,
                "DUPLICATE_ISSUE",
            ),
            (
                CouponError::LockTimeout {
                    name: "lock_1".to_string(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
                "LOCK_TIMEOUT",
            ),
        ]
    }

    #[test]
    fn test_business_error_status_codes() {
        for (error, expected_status, label) in all_business_variants() {
            assert_eq!(
                ApiError(error).status_code(),
                expected_status,
                "状态码不匹配: variant={label}"
            );
        }
    }

    #[tokio::test]
    async fn test_into_response_body_structure() {
        for (error, expected_status, expected_code) in all_business_variants() {
            let response = ApiError(error).into_response();
            assert_eq!(response.status(), expected_status);

            let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("读取响应体失败");
            let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

            assert_eq!(body["isSuccess"], json!(false));
            assert_eq!(body["code"], json!(expected_code));
            assert!(!body["comment"].as_str().unwrap_or("").is_empty());
        }
    }

    #[tokio::test]
    async fn test_system_errors_hide_internal_details() {
        let error = ApiError(CouponError::Internal(
            "redis://10.0.0.1:6379 connection refused".to_string(),
        ));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        let comment = body["comment"].as_str().unwrap();

        assert!(!comment.contains("redis://10.0.0.1:6379"));
        assert!(comment.contains("服务内部错误"));
    }
}
