//! 块设备接口

use crate::error::Result;
use crate::types::{BlockNo, DevNo};
use alloc::sync::Arc;

/// 块 I/O 接口
///
/// 实现此 trait 以把缓冲区缓存接到磁盘驱动上。每次传输恰好一个块，
/// 长度等于 [`block_size`](Self::block_size)。调用会挂起调用者直到硬件完成，
/// 驱动必须允许多个核并发调用。
///
/// # 示例
///
/// ```rust,ignore
/// use kresource_core::{BlockIo, Result};
///
/// struct VirtioDisk {
///     // ...
/// }
///
/// impl BlockIo for VirtioDisk {
///     fn block_size(&self) -> usize {
///         1024
///     }
///
///     fn read_block(&self, dev: u32, blockno: u32, buf: &mut [u8]) -> Result<()> {
///         self.rw(dev, blockno, buf.as_mut_ptr(), false)
///     }
///
///     fn write_block(&self, dev: u32, blockno: u32, buf: &[u8]) -> Result<()> {
///         self.rw(dev, blockno, buf.as_ptr() as *mut u8, true)
///     }
/// }
/// ```
pub trait BlockIo: Send + Sync {
    /// 块大小（字节）
    fn block_size(&self) -> usize;

    /// 从设备读取一个块到 `buf`
    ///
    /// # 参数
    ///
    /// * `dev` - 设备号
    /// * `blockno` - 块号
    /// * `buf` - 目标缓冲区，长度为 `block_size()`
    fn read_block(&self, dev: DevNo, blockno: BlockNo, buf: &mut [u8]) -> Result<()>;

    /// 把 `buf` 写入设备上的一个块
    ///
    /// # 参数
    ///
    /// * `dev` - 设备号
    /// * `blockno` - 块号
    /// * `buf` - 源缓冲区，长度为 `block_size()`
    fn write_block(&self, dev: DevNo, blockno: BlockNo, buf: &[u8]) -> Result<()>;
}

impl<T: BlockIo + ?Sized> BlockIo for &T {
    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn read_block(&self, dev: DevNo, blockno: BlockNo, buf: &mut [u8]) -> Result<()> {
        (**self).read_block(dev, blockno, buf)
    }

    fn write_block(&self, dev: DevNo, blockno: BlockNo, buf: &[u8]) -> Result<()> {
        (**self).write_block(dev, blockno, buf)
    }
}

impl<T: BlockIo + ?Sized> BlockIo for Arc<T> {
    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn read_block(&self, dev: DevNo, blockno: BlockNo, buf: &mut [u8]) -> Result<()> {
        (**self).read_block(dev, blockno, buf)
    }

    fn write_block(&self, dev: DevNo, blockno: BlockNo, buf: &[u8]) -> Result<()> {
        (**self).write_block(dev, blockno, buf)
    }
}
