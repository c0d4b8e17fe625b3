//! 优惠券发放队列消费者
//!
//! 从 Redis FIFO 队列取出准入请求，调用同步权威发放服务落库。
//! 队头成功或业务性拒绝后才出队，基础设施故障时保留队头重试。

pub mod consumer;

pub use consumer::CouponIssueWorker;
