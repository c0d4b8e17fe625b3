//! 优惠券发放 API 服务
//!
//! 暴露同步发放与两个版本的异步准入端点。同步端点直接走
//! 行级锁落库；异步端点只做准入并入队，落库由消费者完成。

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
