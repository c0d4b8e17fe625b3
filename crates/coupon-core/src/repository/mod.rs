//! 发放准入存储（Redis）
//!
//! 准入 Set（每张券一个，成员为已通过快路径准入的用户）、
//! 全局 FIFO 发放请求队列，以及原子发放脚本的封装。

pub mod redis_repository;
pub mod request;

pub use redis_repository::{RedisRepository, UNBOUNDED_QUANTITY_SENTINEL};
pub use request::{CouponIssueRequest, IssueRequestCode};

/// Redis 键生成器
///
/// 键模板是协议的一部分：准入 Set 按券 ID 确定性生成，
/// 发放请求队列是全局单一固定键。
pub struct RedisKeys;

impl RedisKeys {
    /// 某张优惠券的发放请求 Set 键
    ///
    /// Set 成员为已通过准入的用户 ID，兼做去重与容量代理。
    pub fn issue_request(coupon_id: i64) -> String {
        format!("issue.request.couponId={}", coupon_id)
    }

    /// 发放请求队列键（全局唯一）
    pub fn issue_request_queue() -> &'static str {
        "issue.request"
    }

    /// 优惠券共享缓存键
    pub fn coupon_cache(coupon_id: i64) -> String {
        format!("coupon:cache:{}", coupon_id)
    }

    /// 某张优惠券的 V1 准入分布式锁名
    pub fn issue_lock(coupon_id: i64) -> String {
        format!("lock_{}", coupon_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        assert_eq!(RedisKeys::issue_request(123), "issue.request.couponId=123");
        assert_eq!(RedisKeys::issue_request_queue(), "issue.request");
        assert_eq!(RedisKeys::coupon_cache(7), "coupon:cache:7");
        assert_eq!(RedisKeys::issue_lock(7), "lock_7");
    }
}
