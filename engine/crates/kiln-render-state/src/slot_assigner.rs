use std::collections::HashMap;
use std::hash::Hash;

/// 一次分配的结果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotPlan<Id> {
    /// `(id, slot, 是否需要重新 bind)`，按输入顺序
    pub assignments: Vec<(Id, usize, bool)>,
    /// 本次新启用的槽位
    pub newly_enabled: Vec<usize>,
    /// 本次需要关闭的槽位
    pub disabled: Vec<usize>,
}

impl<Id> SlotPlan<Id> {
    #[inline]
    pub fn rebind_count(&self) -> usize {
        self.assignments.iter().filter(|(_, _, rebind)| *rebind).count()
    }
}

/// 把逻辑对象（灯光、裁剪平面）分配到有限个硬件槽位
///
/// 规则：n 为新的数量。当前已绑定且槽位 < n 的对象不动；
/// 未绑定的对象优先使用上一次的槽位（必须 < n 且空闲），否则使用最小的空闲槽位；
/// n 之后仍启用的槽位被关闭。
#[derive(Debug)]
pub struct SlotAssigner<Id> {
    /// 当前每个启用的槽位绑定的对象；`None` 表示绑定已失效
    slots: Vec<Option<Id>>,
    /// 对象上一次使用的槽位，跨 scene 保留
    preferred: HashMap<Id, usize>,
}

impl<Id> SlotAssigner<Id> {
    /// 超过此数量时，只保留当前绑定对象的偏好
    pub const MAX_PREFERENCES: usize = 64;
}

impl<Id> Default for SlotAssigner<Id> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            preferred: HashMap::new(),
        }
    }
}

// getters
impl<Id: Copy + Eq + Hash> SlotAssigner<Id> {
    #[inline]
    pub fn enabled_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn slot_of(&self, id: Id) -> Option<usize> {
        self.slots.iter().position(|s| *s == Some(id))
    }
}
// tools
impl<Id: Copy + Eq + Hash> SlotAssigner<Id> {
    /// 分配 `ids` 中前 `max_slots` 个对象
    pub fn assign(&mut self, ids: &[Id], max_slots: usize) -> SlotPlan<Id> {
        let n = ids.len().min(max_slots);
        let old_count = self.slots.len();
        let mut new_slots: Vec<Option<Id>> = vec![None; n];
        let mut chosen: Vec<Option<usize>> = vec![None; n];

        // 第一轮：当前仍绑定的对象保留原槽位
        for (i, id) in ids.iter().take(n).enumerate() {
            if let Some(slot) = self.slot_of(*id)
                && slot < n
            {
                new_slots[slot] = Some(*id);
                chosen[i] = Some(slot);
            }
        }

        // 第二轮：未绑定的对象尝试上一次使用过的空闲槽位
        for (i, id) in ids.iter().take(n).enumerate() {
            if chosen[i].is_some() {
                continue;
            }
            if let Some(&slot) = self.preferred.get(id)
                && slot < n
                && new_slots[slot].is_none()
            {
                new_slots[slot] = Some(*id);
                chosen[i] = Some(slot);
            }
        }

        // 第三轮：其余对象按顺序取最小的空闲槽位
        for (i, id) in ids.iter().take(n).enumerate() {
            if chosen[i].is_some() {
                continue;
            }
            if let Some(slot) = new_slots.iter().position(Option::is_none) {
                new_slots[slot] = Some(*id);
                chosen[i] = Some(slot);
            }
        }

        let assignments = ids
            .iter()
            .take(n)
            .zip(chosen)
            .filter_map(|(id, slot)| slot.map(|slot| (*id, slot)))
            .map(|(id, slot)| {
                let rebind = self.slots.get(slot).copied().flatten() != Some(id);
                (id, slot, rebind)
            })
            .collect::<Vec<_>>();

        if self.preferred.len() > Self::MAX_PREFERENCES {
            self.preferred.retain(|id, _| new_slots.contains(&Some(*id)));
        }
        for (id, slot, _) in &assignments {
            self.preferred.insert(*id, *slot);
        }

        let plan = SlotPlan {
            assignments,
            newly_enabled: (old_count..n).collect(),
            disabled: (n..old_count).collect(),
        };
        self.slots = new_slots;
        plan
    }

    /// 关闭所有槽位，返回原来启用的槽位
    ///
    /// 关闭前绑定的对象，最后使用的槽位仍然作为下一次分配的偏好；其余偏好被丢弃
    pub fn reset(&mut self) -> Vec<usize> {
        let disabled = (0..self.slots.len()).collect();
        let bound = std::mem::take(&mut self.slots);
        self.preferred.retain(|id, _| bound.contains(&Some(*id)));
        disabled
    }

    /// 保留启用状态，但下一次分配时所有对象都需要重新 bind
    pub fn invalidate_bindings(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }
}
