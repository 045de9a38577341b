//! 多线程素数采集库
//! Multi-threaded prime harvester.
//!
//! 把一个很大的数值区间平均分给若干工作线程。每个线程在自己的子区间里
//! 反复随机挑选起点，向素数来源请求固定数量的素数，并把每个批次写成
//! 以第一个素数命名的二进制文件。

// 声明子模块
pub mod control; // 停止标志
pub mod core; // 区间划分、起点选择、种子派生
pub mod engine; // 采集引擎 (主线程 + 工作线程)
pub mod error; // 错误类型定义
pub mod producer; // 素数来源接口及默认实现
pub mod rng; // 伪随机数生成器
pub mod types; // 配置、批次等数据结构
pub mod writer; // 批次文件读写

// 重新导出常用类型，方便直接从 crate 根路径引用
pub use crate::engine::{HarvestEngine, Harvester};
pub use crate::error::Error;
pub use crate::producer::{MillerRabinSource, PrimeSource};
pub use crate::rng::{RandomSource, XorShiftRng};
pub use crate::types::{
    Batch, BatchRecord, HarvestConfig, HarvestConfigBuilder, HarvestSummary, SubRange,
};
pub use crate::writer::{read_batch_file, BatchWriter};
