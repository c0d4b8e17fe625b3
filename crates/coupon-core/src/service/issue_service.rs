//! 同步权威发放服务
//!
//! 唯一的持久化发放写入方：`issued_quantity` 只在这里递增，
//! 台账记录只在这里追加，两者处于同一事务。
//!
//! 行级排他锁（SELECT ... FOR UPDATE）是并发发放的单一串行化点，
//! 任意并发度下数量不变量都由它保证。

use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, instrument};

use coupon_shared::error::{CouponError, Result};

use crate::event::{CouponEventPublisher, CouponIssueCompleteEvent};
use crate::model::{Coupon, CouponIssue};

/// 同步权威发放服务
pub struct CouponIssueService {
    pool: PgPool,
    event_publisher: CouponEventPublisher,
}

impl CouponIssueService {
    pub fn new(pool: PgPool, event_publisher: CouponEventPublisher) -> Self {
        Self {
            pool,
            event_publisher,
        }
    }

    /// 发放优惠券
    ///
    /// 在单个事务内完成：
    /// 1. 行级排他锁获取政策行（不存在则 CouponNotFound）
    /// 2. 容量与期间校验，失败快速返回且不改变任何状态
    /// 3. 递增 `issued_quantity`
    /// 4. 在同一锁范围内检查台账唯一性（重复发放不会消耗数量）
    /// 5. 追加台账记录
    /// 6. 提交后，若发放已终结则投递缓存刷新事件
    ///
    /// 任一步失败时事务整体回滚。
    #[instrument(skip(self))]
    pub async fn issue(&self, coupon_id: i64, user_id: i64) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut coupon = sqlx::query_as::<_, Coupon>(
            r#"
            SELECT id, title, coupon_type, total_quantity, issued_quantity,
                   discount_amount, min_available_amount,
                   date_issue_start, date_issue_end
            FROM coupons
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(coupon_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CouponError::CouponNotFound(coupon_id))?;

        // 容量/期间校验失败时直接返回，事务随 drop 回滚
        coupon.issue(now)?;

        sqlx::query("UPDATE coupons SET issued_quantity = $2 WHERE id = $1")
            .bind(coupon_id)
            .bind(coupon.issued_quantity)
            .execute(&mut *tx)
            .await?;

        // 台账唯一性检查与数量递增处于同一锁范围，
        // 重复请求不可能消耗两次数量
        let existing = sqlx::query_as::<_, CouponIssue>(
            r#"
            SELECT id, coupon_id, user_id, date_issued, date_used
            FROM coupon_issues
            WHERE coupon_id = $1 AND user_id = $2
            "#,
        )
        .bind(coupon_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if existing.is_some() {
            return Err(CouponError::DuplicateIssue { coupon_id, user_id });
        }

        sqlx::query(
            "INSERT INTO coupon_issues (coupon_id, user_id, date_issued) VALUES ($1, $2, NOW())",
        )
        .bind(coupon_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(coupon_id, user_id, "coupon issued");

        // 事件只在提交之后投递；数量耗尽或期间结束意味着
        // 这张券不会再被发放，立即刷新缓存视图
        if coupon.is_issue_complete(now) {
            self.event_publisher
                .publish(CouponIssueCompleteEvent { coupon_id });
        }

        Ok(())
    }

    /// 查询政策行（不加锁）
    pub async fn find_coupon(&self, coupon_id: i64) -> Result<Coupon> {
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
