//! 物理页句柄

use crate::types::PhysAddr;
use core::marker::PhantomData;

/// 已分配的物理页
///
/// 持有 `Page` 即独占该页内存。由 [`PageAllocator::allocate`](super::PageAllocator::allocate)
/// 产生，交还给 [`PageAllocator::free`](super::PageAllocator::free) 时被消费。
/// 生命周期参数把页绑定在分配器（及其管理的内存）上。
pub struct Page<'a> {
    ptr: *mut u8,
    size: usize,
    _marker: PhantomData<&'a mut [u8]>,
}

// SAFETY: Page 独占其内存，跨核传递所有权是安全的
unsafe impl Send for Page<'_> {}
// SAFETY: 共享引用只提供只读访问
unsafe impl Sync for Page<'_> {}

impl<'a> Page<'a> {
    /// 从原始地址重建页句柄
    ///
    /// # Safety
    ///
    /// `addr` 起的 `size` 字节必须是可读写的内存，在句柄存续期间由调用者独占，
    /// 并且不存在指向这段内存的其他 `Page`。
    pub unsafe fn from_raw(addr: PhysAddr, size: usize) -> Self {
        Self {
            ptr: addr as *mut u8,
            size,
            _marker: PhantomData,
        }
    }

    /// 放弃所有权，返回页地址
    pub fn into_raw(self) -> PhysAddr {
        self.addr()
    }

    /// 页起始地址
    pub fn addr(&self) -> PhysAddr {
        self.ptr as PhysAddr
    }

    /// 页大小（字节）
    pub fn size(&self) -> usize {
        self.size
    }

    /// 只读访问页内容
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: 构造时保证内存有效且独占
        unsafe { core::slice::from_raw_parts(self.ptr, self.size) }
    }

    /// 可变访问页内容
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: 同上，&mut self 保证引用唯一
        unsafe { core::slice::from_raw_parts_mut(self.ptr, self.size) }
    }
}

impl core::fmt::Debug for Page<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Page")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("size", &self.size)
            .finish()
    }
}
