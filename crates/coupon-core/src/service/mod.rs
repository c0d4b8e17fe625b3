//! 发放服务层
//!
//! 同步权威发放、两种异步准入策略、快路径校验与两级缓存读取。

pub mod async_issue_v1;
pub mod async_issue_v2;
pub mod cache_service;
pub mod issue_service;
pub mod redis_issue_service;

use std::str::FromStr;

use async_trait::async_trait;

use coupon_shared::error::{CouponError, Result};

pub use async_issue_v1::AsyncCouponIssueServiceV1;
pub use async_issue_v2::AsyncCouponIssueServiceV2;
pub use cache_service::{CachedCoupon, CouponCacheService};
pub use issue_service::CouponIssueService;
pub use redis_issue_service::CouponIssueRedisService;

/// 准入控制能力
///
/// V1（分布式锁）与 V2（原子脚本）是同一能力的两种实现，
/// 由部署配置选择。两者共享同一个准入 Set，同一张券的生命周期内
/// 只能启用其中一种，混用会破坏容量不变量。
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// 快路径准入：通过后发放事实已入队，等待消费端落库
    async fn admit(&self, coupon_id: i64, user_id: i64) -> Result<()>;
}

/// 部署配置选定的准入策略
///
/// 由 `issue.admission_strategy` 配置项解析而来，启动时装配
/// 对应的 [`AdmissionControl`] 实现；无法识别的取值直接拒绝启动。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionStrategy {
    /// 分布式锁保护的检查后入队
    V1,
    /// 单脚本原子检查并入队
    V2,
}

impl FromStr for AdmissionStrategy {
    type Err = CouponError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "v1" => Ok(Self::V1),
            "v2" => Ok(Self::V2),
            other => Err(CouponError::Internal(format!(
                "unknown admission strategy: {other} (expected \"v1\" or \"v2\")"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_strategy_parse() {
        assert_eq!("v1".parse::<AdmissionStrategy>().unwrap(), AdmissionStrategy::V1);
        assert_eq!("v2".parse::<AdmissionStrategy>().unwrap(), AdmissionStrategy::V2);
    }

    #[test]
    fn test_admission_strategy_rejects_unknown_value() {
        // 配置错误要在启动时暴露，而不是静默回落到某个默认策略
        let err = "v3".parse::<AdmissionStrategy>().unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
