//! 优惠券系统共享基础设施
//!
//! 提供配置加载、错误类型、数据库连接池、Redis 缓存客户端
//! 以及日志初始化，供 coupon-core / coupon-api / coupon-consumer 复用。

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod observability;

pub use error::{CouponError, Result};
