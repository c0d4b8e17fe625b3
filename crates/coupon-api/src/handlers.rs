//! 发放接口 handler
//!
//! 同步端点直接落库；异步端点走配置选定的准入策略，返回成功
//! 只代表请求被接受入队，落库由消费者异步完成。

use axum::Json;
use axum::extract::State;
use tracing::instrument;

use coupon_core::service::AdmissionControl;

use crate::dto::{CouponIssueRequestDto, CouponIssueResponseDto, QueueLengthDto};
use crate::error::Result;
use crate::state::AppState;

/// 同步发放：行级锁直接落库，返回即发放完成
#[instrument(skip(state))]
pub async fn issue(
    State(state): State<AppState>,
    Json(request): Json<CouponIssueRequestDto>,
) -> Result<Json<CouponIssueResponseDto>> {
    state
        .issue_service
        .issue(request.coupon_id, request.user_id)
        .await?;
    Ok(Json(CouponIssueResponseDto::success()))
}

/// 异步发放：配置选定的准入策略判定后入队
#[instrument(skip(state))]
pub async fn issue_async(
    State(state): State<AppState>,
    Json(request): Json<CouponIssueRequestDto>,
) -> Result<Json<CouponIssueResponseDto>> {
    state
        .admission
        .admit(request.coupon_id, request.user_id)
        .await?;
    Ok(Json(CouponIssueResponseDto::success()))
}

/// 发放队列当前长度（运维观测用）
#[instrument(skip(state))]
pub async fn queue_length(State(state): State<AppState>) -> Result<Json<QueueLengthDto>> {
    let length = state.repository.queue_len().await?;
    Ok(Json(QueueLengthDto { length }))
}
