//! 发放终结事件
//!
//! 优惠券在事务提交后被判定为发放终结（数量耗尽或期间结束）时，
//! `CouponIssueService` 通过通道投递事件，监听任务收到后主动刷新
//! 两级缓存，避免热点券耗尽后继续提供可发放的过期视图。
//!
//! 事件在事务提交之后才投递，投递语义为至少一次；刷新本身幂等，
//! 重复投递无害。

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::service::cache_service::CouponCacheService;

/// 发放终结事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponIssueCompleteEvent {
    pub coupon_id: i64,
}

/// 事件发布端
///
/// 包装无界通道发送端。发送失败说明监听任务已退出，
/// 缓存只能等 TTL 到期自然更新，记录错误便于排查。
#[derive(Clone)]
pub struct CouponEventPublisher {
    tx: mpsc::UnboundedSender<CouponIssueCompleteEvent>,
}

impl CouponEventPublisher {
    /// 发布发放终结事件
    pub fn publish(&self, event: CouponIssueCompleteEvent) {
        if self.tx.send(event).is_err() {
            error!(
                coupon_id = event.coupon_id,
                "event listener is gone, cache refresh will rely on TTL expiry"
            );
        }
    }
}

/// 事件监听任务
///
/// 消费发放终结事件并强制刷新两级缓存。采用 refresh 而非
/// 失效后惰性加载，避免热点券耗尽瞬间大量并发回源打到数据库。
pub struct CouponEventListener {
    rx: mpsc::UnboundedReceiver<CouponIssueCompleteEvent>,
    cache_service: Arc<CouponCacheService>,
}

impl CouponEventListener {
    /// 事件主循环，发布端全部关闭后退出
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            info!(coupon_id = event.coupon_id, "issue complete, cache refresh start");
            match self.cache_service.refresh(event.coupon_id).await {
                Ok(_) => {
                    info!(coupon_id = event.coupon_id, "issue complete, cache refresh end");
                }
                Err(e) => {
                    // 刷新失败时缓存仍受 TTL 约束，稍后会自然过期
                    error!(
                        coupon_id = event.coupon_id,
                        error = %e,
                        "cache refresh failed after issue complete"
                    );
                }
            }
        }
    }
}

/// 创建事件通道
pub fn issue_complete_channel(
    cache_service: Arc<CouponCacheService>,
) -> (CouponEventPublisher, CouponEventListener) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        CouponEventPublisher { tx },
        CouponEventListener { rx, cache_service },
    )
}
