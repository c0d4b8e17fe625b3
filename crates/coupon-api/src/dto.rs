//! 发放接口的请求与响应 DTO
//!
//! 字段使用 camelCase，与队列里的发放事实载荷保持同一风格。

use serde::{Deserialize, Serialize};

/// 发放请求体
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponIssueRequestDto {
    pub coupon_id: i64,
    pub user_id: i64,
}

/// 发放响应体
///
/// 成功时 comment 省略；失败响应由 `ApiError` 统一构造，
/// 带稳定错误码与面向用户的说明。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponIssueResponseDto {
    pub is_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl CouponIssueResponseDto {
    pub fn success() -> Self {
        Self {
            is_success: true,
            comment: None,
        }
    }
}

/// 队列长度响应体
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueLengthDto {
    pub length: i64,
}
