//! 优惠券两级缓存服务
//!
//! 读路径：本地缓存 → 共享缓存（Redis）→ 数据库，未命中时逐级回源
//! 并把结果写回两级。两级缓存都是派生状态，过期由 TTL 兜底；
//! 发放终结事件触发 refresh 主动回源，不等 TTL。
//!
//! 本地缓存容量有界（默认 1000 条、TTL 10 秒），共享缓存 TTL 30 分钟。
//! 两级组合是显式的：本服务直接持有两个缓存层并按顺序回落，
//! 不存在自代理间接调用。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use coupon_shared::cache::Cache;
use coupon_shared::error::{CouponError, Result};

use crate::model::{Coupon, CouponType};
use crate::repository::RedisKeys;

/// 缓存中的优惠券视图
///
/// 只保留准入路径需要的最小字段。派生自政策行，绝非权威数据。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedCoupon {
    pub id: i64,
    pub coupon_type: CouponType,
    /// 可发放总数量，None 表示不限量
    pub total_quantity: Option<i32>,
    pub date_issue_start: DateTime<Utc>,
    pub date_issue_end: DateTime<Utc>,
}

impl From<&Coupon> for CachedCoupon {
    fn from(coupon: &Coupon) -> Self {
        Self {
            id: coupon.id,
            coupon_type: coupon.coupon_type,
            total_quantity: coupon.total_quantity,
            date_issue_start: coupon.date_issue_start,
            date_issue_end: coupon.date_issue_end,
        }
    }
}

impl CachedCoupon {
    /// 当前是否在发放可用期间内
    pub fn available_issue_date(&self, now: DateTime<Utc>) -> bool {
        self.date_issue_start < now && now < self.date_issue_end
    }

    /// 发放期间校验，期间外返回 WindowInvalid
    pub fn check_issuable(&self, now: DateTime<Utc>) -> Result<()> {
        if !self.available_issue_date(now) {
            return Err(CouponError::WindowInvalid {
                coupon_id: self.id,
                issue_start: self.date_issue_start,
                issue_end: self.date_issue_end,
            });
        }
        Ok(())
    }
}

/// 本地缓存条目
struct LocalEntry {
    value: CachedCoupon,
    inserted_at: Instant,
}

/// 容量有界的本地缓存
///
/// 写入时若已满则逐出最旧条目；读取时过期条目视为未命中。
pub struct LocalCouponCache {
    entries: RwLock<HashMap<i64, LocalEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl LocalCouponCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// 读取未过期的条目
    pub async fn get(&self, coupon_id: i64) -> Option<CachedCoupon> {
        let entries = self.entries.read().await;
        entries
            .get(&coupon_id)
            .filter(|e| e.inserted_at.elapsed() < self.ttl)
            .map(|e| e.value)
    }

    /// 写入条目，必要时逐出
    ///
    /// 先清掉过期条目；仍然满载时逐出写入时间最旧的一条。
    pub async fn insert(&self, coupon_id: i64, value: CachedCoupon) {
        let mut entries = self.entries.write().await;

        entries.retain(|_, e| e.inserted_at.elapsed() < self.ttl);

        if entries.len() >= self.max_entries && !entries.contains_key(&coupon_id) {
            if let Some((&oldest, _)) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            coupon_id,
            LocalEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// 当前条目数（含未被惰性清理的过期条目）
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// 优惠券两级缓存服务
pub struct CouponCacheService {
    pool: PgPool,
    shared: Arc<Cache>,
    local: LocalCouponCache,
    shared_ttl: Duration,
}

impl CouponCacheService {
    pub fn new(
        pool: PgPool,
        shared: Arc<Cache>,
        shared_ttl: Duration,
        local_ttl: Duration,
        local_max_entries: usize,
    ) -> Self {
        Self {
            pool,
            shared,
            local: LocalCouponCache::new(local_ttl, local_max_entries),
            shared_ttl,
        }
    }

    /// 读取优惠券缓存视图
    ///
    /// 本地 → 共享 → 数据库逐级回落，回源结果写回两级后返回。
    #[instrument(skip(self))]
    pub async fn get(&self, coupon_id: i64) -> Result<CachedCoupon> {
        if let Some(cached) = self.local.get(coupon_id).await {
            return Ok(cached);
        }

        let key = RedisKeys::coupon_cache(coupon_id);
        if let Some(cached) = self.shared.get::<CachedCoupon>(&key).await? {
            self.local.insert(coupon_id, cached).await;
            debug!(coupon_id, "coupon cache hit on shared level");
            return Ok(cached);
        }

        self.refresh(coupon_id).await
    }

    /// 强制回源并写穿两级缓存
    ///
    /// 发放终结事件走这里：直接用最新政策覆盖两级缓存，
    /// 而不是失效后等待并发读各自回源。
    #[instrument(skip(self))]
    pub async fn refresh(&self, coupon_id: i64) -> Result<CachedCoupon> {
        let coupon = self.load_coupon(coupon_id).await?;
        let cached = CachedCoupon::from(&coupon);

        let key = RedisKeys::coupon_cache(coupon_id);
        self.shared.set(&key, &cached, self.shared_ttl).await?;
        self.local.insert(coupon_id, cached).await;

        debug!(coupon_id, "coupon cache refreshed on both levels");
        Ok(cached)
    }

    /// 从数据库加载政策行
    async fn load_coupon(&self, coupon_id: i64) -> Result<Coupon> {
        sqlx::query_as::<_, Coupon>(
            r#"
            SELECT id, title, coupon_type, total_quantity, issued_quantity,
                   discount_amount, min_available_amount,
                   date_issue_start, date_issue_end
            FROM coupons
            WHERE id = $1
            "#,
        )
        .bind(coupon_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CouponError::CouponNotFound(coupon_id))
    }
}
