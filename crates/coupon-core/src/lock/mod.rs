//! 分布式互斥原语

pub mod distributed_lock;

pub use distributed_lock::DistributedLock;
