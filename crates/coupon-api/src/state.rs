//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;

use coupon_core::repository::RedisRepository;
use coupon_core::service::{AdmissionControl, CouponIssueService};

/// Axum 应用共享状态
///
/// 异步准入只持有 [`AdmissionControl`] 能力，具体策略（V1 分布式锁
/// 或 V2 原子脚本）由启动配置装配，handler 不感知。
#[derive(Clone)]
pub struct AppState {
    /// 同步权威发放服务（行级锁直接落库）
    pub issue_service: Arc<CouponIssueService>,
    /// 配置选定的异步准入策略
    pub admission: Arc<dyn AdmissionControl>,
    /// 发放请求仓储（队列长度查询）
    pub repository: Arc<RedisRepository>,
}

impl AppState {
    pub fn new(
        issue_service: Arc<CouponIssueService>,
        admission: Arc<dyn AdmissionControl>,
        repository: Arc<RedisRepository>,
    ) -> Self {
        Self {
            issue_service,
            admission,
            repository,
        }
    }
}
