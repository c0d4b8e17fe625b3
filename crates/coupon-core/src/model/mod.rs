//! 优惠券领域模型
//!
//! 优惠券政策行与发放台账行，以及发放校验的领域逻辑。

pub mod coupon;
pub mod coupon_issue;

pub use coupon::{Coupon, CouponType};
pub use coupon_issue::CouponIssue;
