//! 哈希桶链表
//!
//! 每个桶是一条以槽位索引串起的单链表。所有方法都通过 `&Bucket` / `&mut Bucket`
//! 调用，而这只能经由桶锁守卫取得，因此链表操作天然处于桶锁之下。

use super::buffer::Slot;
use crate::types::{BlockNo, DevNo, SlotId};

/// 哈希桶
#[derive(Debug, Default)]
pub(crate) struct Bucket {
    head: Option<SlotId>,
}

impl Bucket {
    pub(crate) const fn new() -> Self {
        Self { head: None }
    }

    /// 按链表顺序遍历，产出 `(前驱, 槽位)`
    pub(crate) fn chain<'a>(&'a self, slots: &'a [Slot]) -> Chain<'a> {
        Chain {
            slots,
            prev: None,
            cur: self.head,
        }
    }

    /// 查找身份匹配的槽位
    pub(crate) fn find(&self, slots: &[Slot], dev: DevNo, blockno: BlockNo) -> Option<SlotId> {
        self.chain(slots)
            .map(|(_, id)| id)
            .find(|&id| slots[id].matches(dev, blockno))
    }

    /// 插入到链表头部
    pub(crate) fn push_front(&mut self, slots: &[Slot], id: SlotId) {
        slots[id].set_next(self.head);
        self.head = Some(id);
    }

    /// 摘除 `id`，`prev` 为其在链表中的前驱
    pub(crate) fn unlink(&mut self, slots: &[Slot], id: SlotId, prev: Option<SlotId>) {
        let next = slots[id].next();
        match prev {
            Some(p) => slots[p].set_next(next),
            None => self.head = next,
        }
        slots[id].set_next(None);
    }
}

/// 桶链表迭代器
pub(crate) struct Chain<'a> {
    slots: &'a [Slot],
    prev: Option<SlotId>,
    cur: Option<SlotId>,
}

impl Iterator for Chain<'_> {
    type Item = (Option<SlotId>, SlotId);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        let item = (self.prev, id);
        self.prev = Some(id);
        self.cur = self.slots[id].next();
        Some(item)
    }
}
