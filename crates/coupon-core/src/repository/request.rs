//! 发放请求线缆格式与脚本结果码
//!
//! 队列中的发放事实必须经过入队/出队后字节不变，消费端据此还原
//! (coupon_id, user_id) 并落库。

use serde::{Deserialize, Serialize};

use coupon_shared::error::{CouponError, Result};

/// 队列中的发放请求事实
///
/// 序列化为 JSON 后入队，字段顺序固定以保证字节级往返一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponIssueRequest {
    pub coupon_id: i64,
    pub user_id: i64,
}

impl CouponIssueRequest {
    pub fn new(coupon_id: i64, user_id: i64) -> Self {
        Self { coupon_id, user_id }
    }

    /// 序列化为队列线缆格式
    pub fn to_wire(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// 从队列线缆格式还原
    pub fn from_wire(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// 原子发放脚本的结果码
///
/// 脚本返回 '1'（准入成功）/ '2'（重复发放）/ '3'（数量超限）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueRequestCode {
    Success,
    DuplicateIssue,
    QuantityExceeded,
}

impl IssueRequestCode {
    /// 解析脚本返回码
    pub fn parse(code: &str) -> Result<Self> {
        match code {
            "1" => Ok(Self::Success),
            "2" => Ok(Self::DuplicateIssue),
            "3" => Ok(Self::QuantityExceeded),
            other => Err(CouponError::Internal(format!(
                "未知的发放结果码: {}",
                other
            ))),
        }
    }

    /// 把结果码转换为调用方可见的发放结果
    pub fn into_result(self, coupon_id: i64, user_id: i64) -> Result<()> {
        match self {
            Self::Success => Ok(()),
            Self::DuplicateIssue => Err(CouponError::DuplicateIssue { coupon_id, user_id }),
            Self::QuantityExceeded => Err(CouponError::QuantityExceeded { coupon_id }),
        }
    }
}
