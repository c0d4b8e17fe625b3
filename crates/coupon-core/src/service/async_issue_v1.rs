//! 异步准入 V1：分布式锁保护的检查后入队
//!
//! 发放期间校验在锁外完成（便宜的快速拒绝），容量检查、用户去重、
//! 准入登记与入队在 `lock_<couponId>` 分布式锁内串行执行。
//! 锁的等待/租约时间固定（默认各 3 秒），等待超时返回 LockTimeout。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;

use coupon_shared::error::Result;

use crate::lock::DistributedLock;
use crate::repository::{RedisKeys, RedisRepository};
use crate::service::AdmissionControl;
use crate::service::cache_service::CouponCacheService;
use crate::service::redis_issue_service::CouponIssueRedisService;

/// V1 异步发放服务
pub struct AsyncCouponIssueServiceV1 {
    repository: Arc<RedisRepository>,
    redis_service: CouponIssueRedisService,
    cache_service: Arc<CouponCacheService>,
    lock: Arc<DistributedLock>,
    lock_wait: Duration,
    lock_lease: Duration,
}

impl AsyncCouponIssueServiceV1 {
    pub fn new(
        repository: Arc<RedisRepository>,
        cache_service: Arc<CouponCacheService>,
        lock: Arc<DistributedLock>,
        lock_wait: Duration,
        lock_lease: Duration,
    ) -> Self {
        Self {
            redis_service: CouponIssueRedisService::new(repository.clone()),
            repository,
            cache_service,
            lock,
            lock_wait,
            lock_lease,
        }
    }

    /// 异步发放请求
    ///
    /// 1. 读取缓存视图并校验发放期间（锁外）
    /// 2. 获取该券的分布式锁
    /// 3. 锁内：容量检查 → 用户去重 → 准入登记 + 入队
    ///
    /// 准入登记与入队必须成对完成：入队失败会作为
    /// IssueRequestFailed 上抛，绝不静默丢弃。
    #[instrument(skip(self))]
    pub async fn issue(&self, coupon_id: i64, user_id: i64) -> Result<()> {
        let coupon = self.cache_service.get(coupon_id).await?;
        coupon.check_issuable(Utc::now())?;

        self.lock
            .with_lock(
                &RedisKeys::issue_lock(coupon_id),
                self.lock_wait,
                self.lock_lease,
                || async {
                    self.redis_service
                        .check_issue_quantity(&coupon, user_id)
                        .await?;
                    self.repository
                        .enqueue_issue_request(coupon_id, user_id)
                        .await
                },
            )
            .await
    }
}

#[async_trait]
impl AdmissionControl for AsyncCouponIssueServiceV1 {
    async fn admit(&self, coupon_id: i64, user_id: i64) -> Result<()> {
        self.issue(coupon_id, user_id).await
    }
}
