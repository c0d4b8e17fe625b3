//! 快路径发放校验
//!
//! 基于准入 Set 的容量与去重校验，供 V1 策略在分布式锁内使用。
//! Set 大小是 `issued_quantity` 的快路径代理：允许短暂领先台账
//! （持久化是异步的），但绝不允许超过配置容量。

use std::sync::Arc;

use coupon_shared::error::{CouponError, Result};

use crate::repository::{RedisKeys, RedisRepository};
use crate::service::cache_service::CachedCoupon;

/// 快路径发放校验服务
pub struct CouponIssueRedisService {
    repository: Arc<RedisRepository>,
}

impl CouponIssueRedisService {
    pub fn new(repository: Arc<RedisRepository>) -> Self {
        Self { repository }
    }

    /// 综合校验：先容量，后用户去重
    ///
    /// 调用方必须持有该券的分布式锁，否则校验与写入之间存在竞态。
    pub async fn check_issue_quantity(&self, coupon: &CachedCoupon, user_id: i64) -> Result<()> {
        if !self
            .available_total_issue_quantity(coupon.total_quantity, coupon.id)
            .await?
        {
            return Err(CouponError::QuantityExceeded {
                coupon_id: coupon.id,
            });
        }
        if !self.available_user_issue_quantity(coupon.id, user_id).await? {
            return Err(CouponError::DuplicateIssue {
                coupon_id: coupon.id,
                user_id,
            });
        }
        Ok(())
    }

    /// 总量校验
    ///
    /// 不限量（None）恒可发放；否则比较准入 Set 大小与总量。
    pub async fn available_total_issue_quantity(
        &self,
        total_quantity: Option<i32>,
        coupon_id: i64,
    ) -> Result<bool> {
        let Some(total) = total_quantity else {
            return Ok(true);
        };

        let key = RedisKeys::issue_request(coupon_id);
        Ok(i64::from(total) > self.repository.scard(&key).await?)
    }

    /// 用户去重校验
    ///
    /// Set 中不存在该用户时可发放。
    pub async fn available_user_issue_quantity(
        &self,
        coupon_id: i64,
        user_id: i64,
    ) -> Result<bool> {
        let key = RedisKeys::issue_request(coupon_id);
        Ok(!self
            .repository
            .sismember(&key, &user_id.to_string())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use redis::Client;

    use crate::model::CouponType;

    fn cached(coupon_id: i64, total: Option<i32>) -> CachedCoupon {
        let now = Utc::now();
        CachedCoupon {
            id: coupon_id,
            coupon_type: CouponType::FirstComeFirstServed,
            total_quantity: total,
            date_issue_start: now - Duration::days(1),
            date_issue_end: now + Duration::days(1),
        }
    }

    async fn service_with_clean_set(coupon_id: i64) -> CouponIssueRedisService {
        let client = Client::open("redis://localhost:6379").unwrap();
        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = redis::cmd("DEL")
            .arg(RedisKeys::issue_request(coupon_id))
            .query_async(&mut conn)
            .await
            .unwrap();
        CouponIssueRedisService::new(Arc::new(RedisRepository::new(client)))
    }

    #[tokio::test]
    #[ignore] // 需要 Redis 连接
    async fn test_check_issue_quantity_rejects_duplicate_user() {
        let coupon_id = 910_001;
        let service = service_with_clean_set(coupon_id).await;
        let coupon = cached(coupon_id, Some(10));

        assert!(service.check_issue_quantity(&coupon, 7).await.is_ok());

        service
            .repository
            .sadd(&RedisKeys::issue_request(coupon_id), "7")
            .await
            .unwrap();

        let err = service.check_issue_quantity(&coupon, 7).await.unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_ISSUE");
        // 其他用户不受影响
        assert!(service.check_issue_quantity(&coupon, 8).await.is_ok());
    }

    #[tokio::test]
    #[ignore] // 需要 Redis 连接
    async fn test_check_issue_quantity_rejects_when_capacity_full() {
        let coupon_id = 910_002;
        let service = service_with_clean_set(coupon_id).await;
        let coupon = cached(coupon_id, Some(2));

        let key = RedisKeys::issue_request(coupon_id);
        service.repository.sadd(&key, "1").await.unwrap();
        service.repository.sadd(&key, "2").await.unwrap();

        let err = service.check_issue_quantity(&coupon, 3).await.unwrap_err();
        assert_eq!(err.code(), "QUANTITY_EXCEEDED");

        // 容量先于去重：满载时已准入用户同样得到数量超限
        let err = service.check_issue_quantity(&coupon, 1).await.unwrap_err();
        assert_eq!(err.code(), "QUANTITY_EXCEEDED");
    }

    #[tokio::test]
    #[ignore] // 需要 Redis 连接
    async fn test_unbounded_total_quantity_always_available() {
        let coupon_id = 910_003;
        let service = service_with_clean_set(coupon_id).await;

        let key = RedisKeys::issue_request(coupon_id);
        for user_id in 0..20 {
            service
                .repository
                .sadd(&key, &user_id.to_string())
                .await
                .unwrap();
        }

        assert!(
            service
                .available_total_issue_quantity(None, coupon_id)
                .await
                .unwrap()
        );
        // 不限量只豁免容量检查，去重依然生效
        let coupon = cached(coupon_id, None);
        let err = service.check_issue_quantity(&coupon, 5).await.unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_ISSUE");
    }
}
