//! 路由配置模块
//!
//! 定义发放 API 端点的路由映射

use axum::{
    Router,
    routing::{get, post},
};

use crate::{handlers, state::AppState};

/// 构建发放相关的路由
///
/// 异步端点背后的准入策略（V1 分布式锁 / V2 原子脚本）由启动
/// 配置选定，两种策略绝不同时在线。
pub fn issue_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/issue", post(handlers::issue))
        .route("/v1/issue-async", post(handlers::issue_async))
}

/// 构建运维观测路由
fn ops_routes() -> Router<AppState> {
    Router::new().route("/v1/issue-queue/length", get(handlers::queue_length))
}

/// 构建完整的 API 路由
///
/// 返回所有发放 API 路由（不含前缀，由调用方在 main.rs 中挂载）
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(issue_routes()).merge(ops_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_construction() {
        let _issue = issue_routes();
        let _ops = ops_routes();
        let _api = api_routes();
    }
}
