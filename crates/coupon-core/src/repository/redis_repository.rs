//! 发放准入存储仓储
//!
//! 封装准入 Set、全局发放队列的基本操作，以及 V2 策略使用的
//! 原子发放脚本。脚本由 Redis 引擎串行执行，同一张券的并发
//! 调用之间不存在交错。

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};
use tracing::{debug, instrument};

use coupon_shared::error::{CouponError, Result};

use super::RedisKeys;
use super::request::{CouponIssueRequest, IssueRequestCode};

/// 不限量优惠券的容量哨兵值
///
/// 脚本里的容量比较 `total > SCARD` 对该值恒为真，
/// 因此不限量与限量共用同一条比较路径。
pub const UNBOUNDED_QUANTITY_SENTINEL: i32 = i32::MAX;

/// 原子发放脚本
///
/// 1. 重复发放检查（SISMEMBER）
/// 2. 容量检查（SCARD 与总量比较）
/// 3. 准入登记（SADD）并入队发放事实（RPUSH），两步在脚本内原子完成
const ISSUE_REQUEST_SCRIPT: &str = r#"
if redis.call('SISMEMBER', KEYS[1], ARGV[1]) == 1 then
    return '2'
end

if tonumber(ARGV[2]) > redis.call('SCARD', KEYS[1]) then
    redis.call('SADD', KEYS[1], ARGV[1])
    redis.call('RPUSH', KEYS[2], ARGV[3])
    return '1'
end

return '3'
"#;

/// 发放准入存储仓储
pub struct RedisRepository {
    client: Client,
    issue_script: Script,
}

impl RedisRepository {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            issue_script: Script::new(ISSUE_REQUEST_SCRIPT),
        }
    }

    /// 获取连接
    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(CouponError::from)
    }

    /// Set 中添加成员
    pub async fn sadd(&self, key: &str, value: &str) -> Result<i64> {
        let mut conn = self.get_conn().await?;
        let added: i64 = conn.sadd(key, value).await?;
        Ok(added)
    }

    /// Set 的大小
    pub async fn scard(&self, key: &str) -> Result<i64> {
        let mut conn = self.get_conn().await?;
        let size: i64 = conn.scard(key).await?;
        Ok(size)
    }

    /// Set 成员存在性检查
    pub async fn sismember(&self, key: &str, value: &str) -> Result<bool> {
        let mut conn = self.get_conn().await?;
        let is_member: bool = conn.sismember(key, value).await?;
        Ok(is_member)
    }

    /// 队列尾部追加发放事实
    pub async fn rpush_queue(&self, value: &str) -> Result<i64> {
        let mut conn = self.get_conn().await?;
        let len: i64 = conn.rpush(RedisKeys::issue_request_queue(), value).await?;
        Ok(len)
    }

    /// 队列长度
    pub async fn queue_len(&self) -> Result<i64> {
        let mut conn = self.get_conn().await?;
        let len: i64 = conn.llen(RedisKeys::issue_request_queue()).await?;
        Ok(len)
    }

    /// 查看队首条目但不移除
    ///
    /// 排空循环先处理再移除，保证落库尝试完成前条目不丢失。
    pub async fn peek_queue_front(&self) -> Result<Option<String>> {
        let mut conn = self.get_conn().await?;
        let head: Option<String> = conn
            .lindex(RedisKeys::issue_request_queue(), 0)
            .await?;
        Ok(head)
    }

    /// 移除并返回队首条目
    pub async fn pop_queue_front(&self) -> Result<Option<String>> {
        let mut conn = self.get_conn().await?;
        let head: Option<String> = conn
            .lpop(RedisKeys::issue_request_queue(), None)
            .await?;
        Ok(head)
    }

    /// V1 准入成功后的两步写入：准入 Set 登记 + 发放事实入队
    ///
    /// 调用方必须持有该券的分布式锁。入队失败意味着准入 Set 中
    /// 存在一个没有对应队列事实的成员（丢失一次发放），
    /// 必须作为失败向上抛出，绝不能静默吞掉。
    #[instrument(skip(self))]
    pub async fn enqueue_issue_request(&self, coupon_id: i64, user_id: i64) -> Result<()> {
        let request = CouponIssueRequest::new(coupon_id, user_id);
        let payload = request
            .to_wire()
            .map_err(|_| CouponError::IssueRequestFailed {
                input: format!("couponId={}, userId={}", coupon_id, user_id),
            })?;

        self.sadd(&RedisKeys::issue_request(coupon_id), &user_id.to_string())
            .await?;
        self.rpush_queue(&payload).await?;

        debug!(coupon_id, user_id, "issue request enqueued");
        Ok(())
    }

    /// V2 原子发放请求
    ///
    /// 重复检查、容量检查、Set 登记与入队在单个 Lua 脚本内完成，
    /// 不限量时传入 [`UNBOUNDED_QUANTITY_SENTINEL`]。
    #[instrument(skip(self))]
    pub async fn issue_request(
        &self,
        coupon_id: i64,
        user_id: i64,
        total_quantity: i32,
    ) -> Result<()> {
        let request = CouponIssueRequest::new(coupon_id, user_id);
        let payload = request
            .to_wire()
            .map_err(|_| CouponError::IssueRequestFailed {
                input: format!("couponId={}, userId={}", coupon_id, user_id),
            })?;

        let mut conn = self.get_conn().await?;
        let code: String = self
            .issue_script
            .key(RedisKeys::issue_request(coupon_id))
            .key(RedisKeys::issue_request_queue())
            .arg(user_id.to_string())
            .arg(total_quantity.to_string())
            .arg(payload)
            .invoke_async(&mut conn)
            .await?;

        IssueRequestCode::parse(&code)?.into_result(coupon_id, user_id)
    }
}
