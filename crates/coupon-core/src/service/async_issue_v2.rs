//! 异步准入 V2：单脚本原子检查并入队
//!
//! 去重、容量、准入登记与入队由一个 Redis Lua 脚本原子完成，
//! 引擎对脚本串行执行，同一张券的并发调用之间不存在交错。
//! 没有锁等待延迟，也不会出现 LockTimeout。
//!
//! 不限量（total_quantity 为 None）以哨兵最大值参与同一条容量比较，
//! 无需分支，也只发起一次脚本调用。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;

use coupon_shared::error::Result;

use crate::repository::{RedisRepository, UNBOUNDED_QUANTITY_SENTINEL};
use crate::service::AdmissionControl;
use crate::service::cache_service::CouponCacheService;

/// V2 异步发放服务
pub struct AsyncCouponIssueServiceV2 {
    repository: Arc<RedisRepository>,
    cache_service: Arc<CouponCacheService>,
}

impl AsyncCouponIssueServiceV2 {
    pub fn new(repository: Arc<RedisRepository>, cache_service: Arc<CouponCacheService>) -> Self {
        Self {
            repository,
            cache_service,
        }
    }

    /// 异步发放请求
    ///
    /// 1. 读取缓存视图并校验发放期间
    /// 2. 单次原子脚本调用完成准入判定与入队
    #[instrument(skip(self))]
    pub async fn issue(&self, coupon_id: i64, user_id: i64) -> Result<()> {
        let coupon = self.cache_service.get(coupon_id).await?;
        coupon.check_issuable(Utc::now())?;

        let total_quantity = coupon
            .total_quantity
            .unwrap_or(UNBOUNDED_QUANTITY_SENTINEL);
        self.repository
            .issue_request(coupon_id, user_id, total_quantity)
            .await
    }
}

#[async_trait]
impl AdmissionControl for AsyncCouponIssueServiceV2 {
    async fn admit(&self, coupon_id: i64, user_id: i64) -> Result<()> {
        self.issue(coupon_id, user_id).await
    }
}
