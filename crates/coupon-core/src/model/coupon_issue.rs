//! 优惠券发放台账实体
//!
//! 记录 (coupon_id, user_id) 的持久化发放事实，是防重复发放的
//! 权威依据。`(coupon_id, user_id)` 在数据库层面唯一。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 发放台账行
///
/// 由 `CouponIssueService` 在发放事务内创建，创建后除 `date_used`
/// 外不可变（使用流程不在本系统范围内）。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CouponIssue {
    pub id: i64,
    pub coupon_id: i64,
    pub user_id: i64,
    /// 发放时间
    pub date_issued: DateTime<Utc>,
    /// 使用时间，未使用为 None
    pub date_used: Option<DateTime<Utc>>,
}
