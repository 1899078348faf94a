//! 块设备抽象
//!
//! 缓冲区缓存在未命中和显式写回时通过 [`BlockIo`] 与磁盘驱动交互。
//! 驱动自身负责中断与完成等待，对缓存而言每次传输都是同步的。

mod device;

pub use device::BlockIo;
