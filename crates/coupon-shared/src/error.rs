//! 统一错误处理模块
//!
//! 定义优惠券系统所有共享的错误类型，使用 thiserror 提供良好的错误信息。
//!
//! 错误分为三类：
//! - 业务拒绝（数量超限、发放期间无效、重复发放等）：并发场景下的正常结果，
//!   始终返回给调用方，不自动重试
//! - 基础设施瞬时错误（锁等待超时、存储不可用）：调用方可自行退避重试
//! - 不变量违反（发放请求入队失败）：快路径与持久化路径出现分歧，必须大声上报

use chrono::{DateTime, Utc};
use thiserror::Error;

/// 优惠券系统错误类型
#[derive(Debug, Error)]
pub enum CouponError {
    // ==================== 业务拒绝 ====================
    #[error("优惠券不存在: coupon_id={0}")]
    CouponNotFound(i64),

    #[error("发放可用数量已超限: coupon_id={coupon_id}")]
    QuantityExceeded { coupon_id: i64 },

    #[error("不在发放可用期间内: coupon_id={coupon_id}, issue_start={issue_start}, issue_end={issue_end}")]
    WindowInvalid {
        coupon_id: i64,
        issue_start: DateTime<Utc>,
        issue_end: DateTime<Utc>,
    },

    #[error("优惠券已发放过: coupon_id={coupon_id}, user_id={user_id}")]
    DuplicateIssue { coupon_id: i64, user_id: i64 },

    // ==================== 基础设施瞬时错误 ====================
    #[error("获取分布式锁超时: {name}")]
    LockTimeout { name: String },

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    // ==================== 不变量违反 ====================
    #[error("发放请求入队失败: {input}")]
    IssueRequestFailed { input: String },

    // ==================== 通用错误 ====================
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, CouponError>;

impl CouponError {
    /// 获取稳定的错误码
    ///
    /// 供 API 响应和日志使用，调用方可依据错误码区分
    /// 数量超限 / 期间无效 / 重复发放等不同的拒绝原因。
    pub fn code(&self) -> &'static str {
        match self {
            Self::CouponNotFound(_) => "COUPON_NOT_FOUND",
            Self::QuantityExceeded { .. } => "QUANTITY_EXCEEDED",
            Self::WindowInvalid { .. } => "WINDOW_INVALID",
            Self::DuplicateIssue { .. } => "DUPLICATE_ISSUE",
            Self::LockTimeout { .. } => "LOCK_TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::IssueRequestFailed { .. } => "ISSUE_REQUEST_FAILED",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 仅基础设施瞬时错误可以安全重试，业务拒绝重试只会得到相同结果。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Redis(_) | Self::LockTimeout { .. }
        )
    }

    /// 是否为业务拒绝（而非系统错误）
    ///
    /// 业务拒绝是并发发放下的预期结果，消费端排空队列时
    /// 遇到这类错误只记录日志、不中断处理。
    pub fn is_business_reject(&self) -> bool {
        matches!(
            self,
            Self::CouponNotFound(_)
                | Self::QuantityExceeded { .. }
                | Self::WindowInvalid { .. }
                | Self::DuplicateIssue { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = CouponError::QuantityExceeded { coupon_id: 1 };
        assert_eq!(err.code(), "QUANTITY_EXCEEDED");

        let err = CouponError::DuplicateIssue {
            coupon_id: 1,
            user_id: 2,
        };
        assert_eq!(err.code(), "DUPLICATE_ISSUE");
    }

    #[test]
    fn test_is_retryable() {
        let db_err = CouponError::Database(sqlx::Error::PoolTimedOut);
        assert!(db_err.is_retryable());

        let lock_err = CouponError::LockTimeout {
            name: "lock_1".to_string(),
        };
        assert!(lock_err.is_retryable());

        let reject = CouponError::QuantityExceeded { coupon_id: 1 };
        assert!(!reject.is_retryable());
    }

    #[test]
    fn test_is_business_reject() {
        assert!(CouponError::CouponNotFound(1).is_business_reject());
        assert!(
            CouponError::WindowInvalid {
                coupon_id: 1,
                issue_start: Utc::now(),
                issue_end: Utc::now(),
            }
            .is_business_reject()
        );

        // 锁超时是瞬时错误而非业务拒绝
        assert!(
            !CouponError::LockTimeout {
                name: "lock_1".to_string()
            }
            .is_business_reject()
        );
        // 入队失败意味着快路径与持久化路径分歧，不属于业务拒绝
        assert!(
            !CouponError::IssueRequestFailed {
                input: "{}".to_string()
            }
            .is_business_reject()
        );
    }
}
