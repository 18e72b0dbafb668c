// crates/tf_runtime/src/lib.rs

//! TetraFlow 运行时层
//!
//! 提供分区间协作所需的消息传递原语：
//! - `comm`: 分区边界贡献的接收缓冲区，保证"每轮恰好合并一次"
//! - `exchange`: 基于通道的分区通信器（条目交换、标量归约、中止广播）
//!
//! # 并发模型
//!
//! SPMD：每个网格分区一个逻辑工作者，分区之间不共享内存，
//! 只通过显式消息交换边界贡献。工作者在通信/归约点逻辑阻塞，
//! 直到本轮所有期望的对端贡献到齐并完成合并。
//! 任一分区检测到致命错误时向所有对端广播中止，
//! 其余分区在下一个通信点观察到中止并停止推进。

pub mod comm;
pub mod exchange;

pub use comm::{ContribBuffer, MergeOp};
pub use exchange::{Channels, Communicator, ReduceOp, Tag};
