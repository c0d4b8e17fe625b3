//! 优惠券发放队列消费者入口
//!
//! 装配数据库、Redis、两级缓存、发放终结事件通道与排空循环，
//! 收到 Ctrl-C 后在轮间优雅退出。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use coupon_consumer::CouponIssueWorker;
use coupon_core::event::issue_complete_channel;
use coupon_core::repository::RedisRepository;
use coupon_core::service::{CouponCacheService, CouponIssueService};
use coupon_shared::cache::Cache;
use coupon_shared::config::AppConfig;
use coupon_shared::database::Database;
use coupon_shared::observability;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("coupon-consumer")?;
    observability::init(&config.observability)?;

    info!(
        service = %config.service_name,
        environment = %config.environment,
        "starting coupon issue consumer"
    );

    let database = Database::connect(&config.database).await?;
    let cache = Arc::new(Cache::new(&config.redis)?);

    let repository = Arc::new(RedisRepository::new(cache.client().clone()));
    let cache_service = Arc::new(CouponCacheService::new(
        database.pool().clone(),
        cache.clone(),
        Duration::from_secs(config.issue.shared_cache_ttl_seconds),
        Duration::from_secs(config.issue.local_cache_ttl_seconds),
        config.issue.local_cache_max_entries,
    ));

    // 发放终结事件：落库侧判定终结后主动刷新缓存视图
    let (event_publisher, event_listener) = issue_complete_channel(cache_service);
    tokio::spawn(event_listener.run());

    let issue_service = Arc::new(CouponIssueService::new(
        database.pool().clone(),
        event_publisher,
    ));

    let worker = CouponIssueWorker::new(
        issue_service,
        repository,
        Duration::from_millis(config.issue.drain_interval_millis),
        config.issue.drain_max_retries,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    worker.run(shutdown_rx).await;

    database.close().await;
    info!("coupon issue consumer stopped");
    Ok(())
}
