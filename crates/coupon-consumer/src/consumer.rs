//! 发放队列排空循环
//!
//! 单任务固定延迟调度：每轮把队列处理到空或遇到基础设施故障为止，
//! 下一轮在本轮结束后 `drain_interval` 才开始，两轮绝不重叠。
//!
//! 队头条目先处理后移除（LINDEX 0 → 落库 → LPOP）：成功或业务性
//! 拒绝都移除，基础设施故障保留队头下轮重试，重试超限后弃置并
//! 大声记录。队列顺序即落库顺序。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use coupon_core::repository::{CouponIssueRequest, RedisRepository};
use coupon_core::service::CouponIssueService;
use coupon_shared::error::Result;

/// 队头条目的处置决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainAction {
    /// 落库成功，移除队头
    Acknowledge,
    /// 业务性拒绝（重复、超量、期间外等），重试没有意义，移除队头
    Reject,
    /// 基础设施故障，保留队头下轮重试
    Retry,
    /// 重试次数超限，弃置队头防止队列永久阻塞
    Drop,
}

/// 根据落库结果与已重试次数决定队头去留
///
/// 拆分为独立函数而非方法，便于在测试中直接调用。
pub fn classify_issue_outcome(
    result: &Result<()>,
    head_retries: u32,
    max_retries: u32,
) -> DrainAction {
    match result {
        Ok(()) => DrainAction::Acknowledge,
        Err(err) if err.is_business_reject() => DrainAction::Reject,
        Err(_) if head_retries >= max_retries => DrainAction::Drop,
        Err(_) => DrainAction::Retry,
    }
}

/// 发放队列消费者
///
/// 队列的唯一消费方。单任务串行处理，队列 FIFO 顺序即发放台账顺序。
pub struct CouponIssueWorker {
    issue_service: Arc<CouponIssueService>,
    repository: Arc<RedisRepository>,
    poll_interval: Duration,
    max_retries: u32,
}

impl CouponIssueWorker {
    pub fn new(
        issue_service: Arc<CouponIssueService>,
        repository: Arc<RedisRepository>,
        poll_interval: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            issue_service,
            repository,
            poll_interval,
            max_retries,
        }
    }

    /// 排空主循环
    ///
    /// 固定延迟：本轮 drain 结束后等待 `poll_interval` 再开始下一轮。
    /// 收到停机信号后在轮间退出，不会打断正在处理的条目。
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.poll_interval.as_millis() as u64,
            max_retries = self.max_retries,
            "coupon issue worker started"
        );

        let mut head_retries: u32 = 0;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.changed() => {
                    info!("coupon issue worker shutting down");
                    break;
                }
            }

            if let Err(err) = self.drain_once(&mut head_retries).await {
                // 连队列操作本身都失败时本轮放弃，下轮从同一队头继续
                warn!(error = %err, "queue drain interrupted, will retry next tick");
            }
        }
    }

    /// 排空一轮队列
    ///
    /// 逐条处理直到队列为空，或队头遇到基础设施故障（留待下轮）。
    /// `head_retries` 跨轮记录当前队头已重试的次数，队头移除时归零。
    #[instrument(skip(self, head_retries))]
    pub async fn drain_once(&self, head_retries: &mut u32) -> Result<()> {
        while self.repository.queue_len().await? > 0 {
            let Some(raw) = self.repository.peek_queue_front().await? else {
                break;
            };

            let request = match CouponIssueRequest::from_wire(&raw) {
                Ok(request) => request,
                Err(err) => {
                    // 解析不了的队头会永久阻塞队列，记录后直接弃置
                    error!(payload = %raw, error = %err, "discarding unparseable issue request");
                    self.repository.pop_queue_front().await?;
                    *head_retries = 0;
                    continue;
                }
            };

            let result = self
                .issue_service
                .issue(request.coupon_id, request.user_id)
                .await;

            match classify_issue_outcome(&result, *head_retries, self.max_retries) {
                DrainAction::Acknowledge => {
                    debug!(
                        coupon_id = request.coupon_id,
                        user_id = request.user_id,
                        "issue request persisted"
                    );
                    self.repository.pop_queue_front().await?;
                    *head_retries = 0;
                }
                DrainAction::Reject => {
                    if let Err(err) = &result {
                        warn!(
                            coupon_id = request.coupon_id,
                            user_id = request.user_id,
                            code = err.code(),
                            "issue request rejected"
                        );
                    }
                    self.repository.pop_queue_front().await?;
                    *head_retries = 0;
                }
                DrainAction::Drop => {
                    if let Err(err) = &result {
                        error!(
                            coupon_id = request.coupon_id,
                            user_id = request.user_id,
                            retries = *head_retries,
                            error = %err,
                            "dropping issue request after repeated failures"
                        );
                    }
                    self.repository.pop_queue_front().await?;
                    *head_retries = 0;
                }
                DrainAction::Retry => {
                    *head_retries += 1;
                    if let Err(err) = &result {
                        warn!(
                            coupon_id = request.coupon_id,
                            user_id = request.user_id,
                            retry = *head_retries,
                            error = %err,
                            "transient failure, keeping queue head for next tick"
                        );
                    }
                    // 队头保留，本轮结束
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coupon_shared::error::CouponError;

    #[test]
    fn test_success_acknowledges_head() {
        assert_eq!(
            classify_issue_outcome(&Ok(()), 0, 5),
            DrainAction::Acknowledge
        );
    }

    #[test]
    fn test_business_reject_removes_head() {
        let duplicate: Result<()> = Err(CouponError::DuplicateIssue {
            coupon_id: 1,
            user_id: 2,
        });
        assert_eq!(classify_issue_outcome(&duplicate, 0, 5), DrainAction::Reject);

        let exceeded: Result<()> = Err(CouponError::QuantityExceeded { coupon_id: 1 });
        assert_eq!(classify_issue_outcome(&exceeded, 0, 5), DrainAction::Reject);

        let not_found: Result<()> = Err(CouponError::CouponNotFound(1));
        assert_eq!(classify_issue_outcome(&not_found, 0, 5), DrainAction::Reject);

        let window: Result<()> = Err(CouponError::WindowInvalid {
            coupon_id: 1,
            issue_start: Utc::now(),
            issue_end: Utc::now(),
        });
        assert_eq!(classify_issue_outcome(&window, 0, 5), DrainAction::Reject);
    }

    #[test]
    fn test_infrastructure_failure_retries_then_drops() {
        let infra: Result<()> = Err(CouponError::Internal("connection reset".to_string()));

        // 未达上限：保留队头重试
        assert_eq!(classify_issue_outcome(&infra, 0, 5), DrainAction::Retry);
        assert_eq!(classify_issue_outcome(&infra, 4, 5), DrainAction::Retry);

        // 达到上限：弃置
        assert_eq!(classify_issue_outcome(&infra, 5, 5), DrainAction::Drop);
        assert_eq!(classify_issue_outcome(&infra, 6, 5), DrainAction::Drop);
    }

    #[test]
    fn test_business_reject_never_drops_regardless_of_retries() {
        // 业务性拒绝不计入重试，也永远不会走 Drop 分支
        let duplicate: Result<()> = Err(CouponError::DuplicateIssue {
            coupon_id: 1,
            user_id: 2,
        });
        assert_eq!(
            classify_issue_outcome(&duplicate, 100, 5),
            DrainAction::Reject
        );
    }
}
