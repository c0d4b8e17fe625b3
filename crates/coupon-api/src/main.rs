//! 优惠券发放 API 服务入口
//!
//! 装配同步发放路径与配置选定的异步准入策略，暴露 REST 端点。

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, routing::get};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use coupon_api::{routes, state::AppState};
use coupon_core::event::issue_complete_channel;
use coupon_core::lock::DistributedLock;
use coupon_core::repository::RedisRepository;
use coupon_core::service::{
    AdmissionControl, AdmissionStrategy, AsyncCouponIssueServiceV1, AsyncCouponIssueServiceV2,
    CouponCacheService, CouponIssueService,
};
use coupon_shared::{cache::Cache, config::AppConfig, database::Database, observability};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("coupon-api")?;
    observability::init(&config.observability)?;

    info!("Starting coupon-api on {}", config.server_addr());

    // 初始化基础设施
    let db = Database::connect(&config.database).await?;
    let cache = Arc::new(Cache::new(&config.redis)?);

    let repository = Arc::new(RedisRepository::new(cache.client().clone()));

    let cache_service = Arc::new(CouponCacheService::new(
        db.pool().clone(),
        cache.clone(),
        Duration::from_secs(config.issue.shared_cache_ttl_seconds),
        Duration::from_secs(config.issue.local_cache_ttl_seconds),
        config.issue.local_cache_max_entries,
    ));

    // 发放终结事件：同步发放路径在事务提交后触发缓存刷新
    let (event_publisher, event_listener) = issue_complete_channel(cache_service.clone());
    tokio::spawn(event_listener.run());

    let issue_service = Arc::new(CouponIssueService::new(
        db.pool().clone(),
        event_publisher,
    ));

    // 异步准入策略由配置选定：两种实现共享同一个准入 Set，
    // 一次部署只装配其中一种
    let strategy: AdmissionStrategy = config.issue.admission_strategy.parse()?;
    let admission: Arc<dyn AdmissionControl> = match strategy {
        AdmissionStrategy::V1 => Arc::new(AsyncCouponIssueServiceV1::new(
            repository.clone(),
            cache_service.clone(),
            Arc::new(DistributedLock::new(cache.client().clone())),
            Duration::from_millis(config.issue.lock_wait_millis),
            Duration::from_millis(config.issue.lock_lease_millis),
        )),
        AdmissionStrategy::V2 => Arc::new(AsyncCouponIssueServiceV2::new(
            repository.clone(),
            cache_service,
        )),
    };
    info!(strategy = ?strategy, "admission strategy selected");

    let state = AppState::new(issue_service, admission, repository);

    // 发放端点面向 C 端流量，允许任意来源调用
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(routes::api_routes())
        .route("/health", get(health_check))
        .route(
            "/ready",
            get({
                let db_for_ready = db.clone();
                let cache_for_ready = cache.clone();
                move || readiness_check(db_for_ready.clone(), cache_for_ready.clone())
            }),
        )
        .layer(cors)
        .with_state(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    // 优雅关闭：收到 SIGTERM 或 Ctrl+C 时停止接收新连接，
    // 等待已有请求处理完毕
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("注册 Ctrl+C 处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("注册 SIGTERM 处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}

/// 存活探针：服务进程正常即返回 ok
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "coupon-api"
    }))
}

/// 就绪探针：检查数据库和 Redis 连接是否可用
async fn readiness_check(db: Database, cache: Arc<Cache>) -> Json<serde_json::Value> {
    let db_ok = db.health_check().await.is_ok();
    let cache_ok = cache.health_check().await.is_ok();
    let all_ok = db_ok && cache_ok;

    Json(serde_json::json!({
        "status": if all_ok { "ok" } else { "degraded" },
        "service": "coupon-api",
        "checks": {
            "database": if db_ok { "ok" } else { "fail" },
            "redis": if cache_ok { "ok" } else { "fail" }
        }
    }))
}
