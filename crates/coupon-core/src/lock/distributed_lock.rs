//! 分布式锁
//!
//! 基于 Redis SET NX PX 的命名租约互斥原语。租约到期自动失效，
//! 持有者崩溃不会造成死锁；调用方需要保证租约时间大于临界区的
//! 预期执行时间，极端缓慢时租约可能在临界区内到期（已知风险，
//! 不在本原语内消除）。

use std::future::Future;
use std::time::{Duration, Instant};

use redis::aio::MultiplexedConnection;
use redis::{Client, Script};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use coupon_shared::error::{CouponError, Result};

/// 只有当锁的 owner 匹配时才删除
///
/// 原子校验加删除，避免租约过期后误删其他持有者的锁。
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// 分布式锁
///
/// 获取失败时按固定间隔重试，直到等待预算耗尽。
pub struct DistributedLock {
    client: Client,
    /// 实例唯一标识，用于区分不同服务实例持有的锁
    instance_id: String,
    /// 获取失败后的重试间隔
    retry_delay: Duration,
}

impl DistributedLock {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            instance_id: Uuid::new_v4().to_string(),
            retry_delay: Duration::from_millis(100),
        }
    }

    /// 获取连接
    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(CouponError::from)
    }

    /// 在命名锁的保护下执行 `body`
    ///
    /// - 在 `wait_timeout` 内未获取到锁时返回 `LockTimeout`，不执行 `body`
    /// - 租约在 `lease_timeout` 后自动过期
    /// - 无论 `body` 成功还是失败，只要当前调用方仍持有锁就会释放
    /// - 返回值始终是 `body` 的结果，释放阶段的错误只记录告警
    #[instrument(skip(self, body), fields(instance_id = %self.instance_id))]
    pub async fn with_lock<T, F, Fut>(
        &self,
        name: &str,
        wait_timeout: Duration,
        lease_timeout: Duration,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // owner 格式: instance_id:uuid，确保每次获取的唯一性
        let owner = format!("{}:{}", self.instance_id, Uuid::new_v4());
        let deadline = Instant::now() + wait_timeout;

        loop {
            if self.try_acquire(name, &owner, lease_timeout).await? {
                debug!(name = %name, owner = %owner, "distributed lock acquired");
                break;
            }
            if Instant::now() + self.retry_delay >= deadline {
                return Err(CouponError::LockTimeout {
                    name: name.to_string(),
                });
            }
            tokio::time::sleep(self.retry_delay).await;
        }

        // 返回值只来自 body（或获取阶段的 LockTimeout）。
        // 释放失败不覆盖 body 的结果：临界区写入可能已经生效，
        // 向调用方报基础设施错误会诱发无意义的重试；租约到期自会失效。
        let result = body().await;
        if let Err(err) = self.release(name, &owner).await {
            warn!(
                name = %name,
                owner = %owner,
                error = %err,
                "failed to release lock, lease will expire on its own"
            );
        }
        result
    }

    /// 尝试获取锁（SET NX PX，不阻塞）
    async fn try_acquire(&self, name: &str, owner: &str, lease: Duration) -> Result<bool> {
        let mut conn = self.get_conn().await?;

        // NX: 只在 key 不存在时设置；PX: 租约毫秒数
        let result: Option<String> = redis::cmd("SET")
            .arg(name)
            .arg(owner)
            .arg("NX")
            .arg("PX")
            .arg(lease.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    /// 释放锁
    ///
    /// 通过 Lua 脚本校验 owner 后删除；锁已过期或被他人持有时
    /// 只记录告警，不视为错误。
    async fn release(&self, name: &str, owner: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;

        let deleted: i32 = Script::new(RELEASE_SCRIPT)
            .key(name)
            .arg(owner)
            .invoke_async(&mut conn)
            .await?;

        if deleted == 0 {
            warn!(
                name = %name,
                owner = %owner,
                "lock was already released or owned by another client"
            );
        } else {
            debug!(name = %name, "distributed lock released");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_format() {
        // owner 格式：instance_id:uuid，两段均为有效 UUID
        let instance_id = Uuid::new_v4().to_string();
        let owner = format!("{}:{}", instance_id, Uuid::new_v4());

        let parts: Vec<&str> = owner.split(':').collect();
        assert_eq!(parts.len(), 2);
        assert!(Uuid::parse_str(parts[0]).is_ok());
        assert!(Uuid::parse_str(parts[1]).is_ok());
    }

    #[test]
    fn test_release_script_checks_owner() {
        assert!(RELEASE_SCRIPT.contains(r#"redis.call("get", KEYS[1]) == ARGV[1]"#));
    }

    #[tokio::test]
    #[ignore] // 需要 Redis 连接
    async fn test_with_lock_mutual_exclusion() {
        let client = Client::open("redis://localhost:6379").unwrap();
        let lock = DistributedLock::new(client);

        let value = lock
            .with_lock(
                "lock_test",
                Duration::from_millis(3000),
                Duration::from_millis(3000),
                || async { Ok(42) },
            )
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    #[ignore] // 需要 Redis 连接
    async fn test_with_lock_returns_body_result_when_lease_lost() {
        let client = Client::open("redis://localhost:6379").unwrap();
        let lock = DistributedLock::new(client.clone());

        // 临界区内租约丢失（模拟到期被删）：释放阶段的异常
        // 不能覆盖 body 已经产生的结果
        let value = lock
            .with_lock(
                "lock_test_lease_lost",
                Duration::from_millis(3000),
                Duration::from_millis(3000),
                || async {
                    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
                    let _: () = redis::cmd("DEL")
                        .arg("lock_test_lease_lost")
                        .query_async(&mut conn)
                        .await
                        .unwrap();
                    Ok(42)
                },
            )
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    #[ignore] // 需要 Redis 连接
    async fn test_with_lock_propagates_body_error_verbatim() {
        let client = Client::open("redis://localhost:6379").unwrap();
        let lock = DistributedLock::new(client);

        // body 的业务错误原样上抛，不被释放路径替换
        let err = lock
            .with_lock(
                "lock_test_body_err",
                Duration::from_millis(3000),
                Duration::from_millis(3000),
                || async { Err::<(), _>(CouponError::QuantityExceeded { coupon_id: 1 }) },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "QUANTITY_EXCEEDED");
    }
}
