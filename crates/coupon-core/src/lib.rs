//! 优惠券发放核心
//!
//! 高并发（秒杀）场景下的限量优惠券发放控制层：
//! - 同步路径：数据库行锁 + 事务内校验的权威发放（`CouponIssueService`）
//! - 异步 V1：分布式锁保护的检查后入队（`AsyncCouponIssueServiceV1`）
//! - 异步 V2：单个 Redis Lua 脚本的原子检查并入队（`AsyncCouponIssueServiceV2`）
//! - 队列排空由 coupon-consumer 周期执行，把快路径的准入事实落库
//! - 两级缓存（本地 + Redis）让热点读路径不触达关系库
//!
//! 三种策略对同一张优惠券的生命周期内只能启用一种准入机制，
//! V1 与 V2 共享同一个准入 Set，混用会破坏容量不变量。

pub mod event;
pub mod lock;
pub mod model;
pub mod repository;
pub mod service;

pub use coupon_shared::error::{CouponError, Result};
