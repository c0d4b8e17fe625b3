//! 优惠券政策实体
//!
//! 承载发放数量、发放期间等政策信息以及发放校验逻辑。
//! `issued_quantity` 只允许在持有该行排他锁的事务内递增，
//! 且同一事务必须同时追加一条发放台账记录。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use coupon_shared::error::{CouponError, Result};

/// 优惠券类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponType {
    /// 先到先得 - 限量秒杀发放
    #[default]
    FirstComeFirstServed,
    /// 促销活动 - 通常不限量
    Promotion,
}

/// 优惠券政策行
///
/// `total_quantity` 为 None 表示不限量发放。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: i64,
    /// 优惠券标题
    pub title: String,
    /// 优惠券类型
    pub coupon_type: CouponType,
    /// 可发放总数量，None 表示不限量
    pub total_quantity: Option<i32>,
    /// 截至当前已发放数量，单调不减
    pub issued_quantity: i32,
    /// 折扣金额
    pub discount_amount: i32,
    /// 可使用的最低订单金额
    pub min_available_amount: i32,
    /// 发放开始时间
    pub date_issue_start: DateTime<Utc>,
    /// 发放结束时间
    pub date_issue_end: DateTime<Utc>,
}

impl Coupon {
    /// 是否还有可发放数量
    ///
    /// total_quantity 为 None 时不限量，始终可发放。
    pub fn available_issue_quantity(&self) -> bool {
        match self.total_quantity {
            None => true,
            Some(total) => total > self.issued_quantity,
        }
    }

    /// 当前是否在发放可用期间内
    pub fn available_issue_date(&self, now: DateTime<Utc>) -> bool {
        self.date_issue_start < now && now < self.date_issue_end
    }

    /// 发放是否已经终结（期间结束或数量耗尽）
    ///
    /// 终结状态不可逆，用于判断是否需要刷新缓存。
    pub fn is_issue_complete(&self, now: DateTime<Utc>) -> bool {
        self.date_issue_end < now || !self.available_issue_quantity()
    }

    /// 发放校验并递增已发放数量
    ///
    /// 校验失败时不改变任何状态。调用方必须持有该行的排他锁，
    /// 并在同一事务内把递增后的数量写回。
    pub fn issue(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.available_issue_quantity() {
            return Err(CouponError::QuantityExceeded { coupon_id: self.id });
        }
        if !self.available_issue_date(now) {
            return Err(CouponError::WindowInvalid {
                coupon_id: self.id,
                issue_start: self.date_issue_start,
                issue_end: self.date_issue_end,
            });
        }

        self.issued_quantity += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(total: Option<i32>, issued: i32, start_offset_days: i64, end_offset_days: i64) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: 1,
            title: "限时秒杀测试券".to_string(),
            coupon_type: CouponType::FirstComeFirstServed,
            total_quantity: total,
            issued_quantity: issued,
            discount_amount: 1000,
            min_available_amount: 10000,
            date_issue_start: now + Duration::days(start_offset_days),
            date_issue_end: now + Duration::days(end_offset_days),
        }
    }

    #[test]
    fn test_available_issue_quantity() {
        assert!(coupon(Some(100), 99, -1, 1).available_issue_quantity());
        assert!(!coupon(Some(100), 100, -1, 1).available_issue_quantity());
    }

    #[test]
    fn test_unbounded_quantity_always_available() {
        // total_quantity 为 None 时不限量
        assert!(coupon(None, 1_000_000, -1, 1).available_issue_quantity());
    }

    #[test]
    fn test_available_issue_date() {
        let now = Utc::now();
        assert!(coupon(Some(100), 0, -1, 1).available_issue_date(now));
        // 尚未开始
        assert!(!coupon(Some(100), 0, 1, 2).available_issue_date(now));
        // 已经结束
        assert!(!coupon(Some(100), 0, -2, -1).available_issue_date(now));
    }

    #[test]
    fn test_issue_increments_quantity() {
        let mut c = coupon(Some(100), 0, -1, 1);
        c.issue(Utc::now()).unwrap();
        assert_eq!(c.issued_quantity, 1);
    }

    #[test]
    fn test_issue_quantity_exceeded() {
        let mut c = coupon(Some(100), 100, -1, 1);
        let err = c.issue(Utc::now()).unwrap_err();
        assert_eq!(err.code(), "QUANTITY_EXCEEDED");
        // 校验失败不改变状态
        assert_eq!(c.issued_quantity, 100);
    }

    #[test]
    fn test_issue_window_invalid() {
        let mut c = coupon(Some(100), 0, -2, -1);
        let err = c.issue(Utc::now()).unwrap_err();
        assert_eq!(err.code(), "WINDOW_INVALID");
        assert_eq!(c.issued_quantity, 0);
    }

    #[test]
    fn test_is_issue_complete() {
        let now = Utc::now();
        // 数量耗尽
        assert!(coupon(Some(10), 10, -1, 1).is_issue_complete(now));
        // 期间已过
        assert!(coupon(Some(10), 0, -2, -1).is_issue_complete(now));
        // 仍可发放
        assert!(!coupon(Some(10), 5, -1, 1).is_issue_complete(now));
        // 不限量且期间内永不终结
        assert!(!coupon(None, 1_000_000, -1, 1).is_issue_complete(now));
    }
}
