//! 渲染例程的 descriptor set 绑定列表
//!
//! 每个例程显式列出 (set index, descriptor set, dynamic offset) 三元组，
//! 绑定前对照 pipeline layout 的静态描述做能力检查，并校验每个来自
//! 线性堆的分配仍然属于当前代。

use ash::vk;
use lumis_gfx::commands::command_buffer::GfxCommandBuffer;

use crate::heap::{ArenaGeneration, LinearHeapAllocator};
use crate::layouts::{PipelineLayoutInfo, PipelineLayoutMeta};

#[derive(Default)]
pub struct SetBindingList {
    sets: Vec<(u32, vk::DescriptorSet)>,
    dynamic_offsets: Vec<u32>,
    generations: Vec<ArenaGeneration>,
}

impl SetBindingList {
    pub fn new() -> Self {
        Self::default()
    }

    /// builder：没有 dynamic binding 的 set（bindless 纹理表等）
    pub fn fixed(mut self, set_index: u32, set: vk::DescriptorSet) -> Self {
        self.sets.push((set_index, set));
        self
    }

    /// builder：带一个 dynamic binding 的 set
    ///
    /// generation 只对线性堆的分配存在；持久 storage buffer 传 None，offset 为 0
    pub fn dynamic(
        mut self,
        set_index: u32,
        set: vk::DescriptorSet,
        offset: u32,
        generation: Option<ArenaGeneration>,
    ) -> Self {
        self.sets.push((set_index, set));
        self.dynamic_offsets.push(offset);
        if let Some(generation) = generation {
            self.generations.push(generation);
        }
        self
    }

    /// 能力检查，违反契约直接 panic：
    /// 这些都是编程错误，不是运行期条件
    fn validate(&self, meta: &PipelineLayoutMeta, current_generation: ArenaGeneration) {
        assert!(!self.sets.is_empty(), "binding list is empty");
        for (expected, (set_index, _)) in self.sets.iter().enumerate() {
            assert_eq!(
                *set_index, expected as u32,
                "descriptor sets must be listed contiguously from set 0, found set {set_index} at position {expected}"
            );
        }
        assert!(
            self.sets.len() <= meta.set_count(),
            "binding list has {} sets but the pipeline layout only declares {}",
            self.sets.len(),
            meta.set_count()
        );

        let expected_offsets = meta.dynamic_offsets_for(self.sets.len());
        assert_eq!(
            self.dynamic_offsets.len() as u32,
            expected_offsets,
            "pipeline layout expects {expected_offsets} dynamic offsets for {} sets, got {}",
            self.sets.len(),
            self.dynamic_offsets.len()
        );

        for generation in &self.generations {
            assert_eq!(
                *generation, current_generation,
                "stale heap allocation bound after reset_frame: allocation {generation:?}, arena {current_generation:?}"
            );
        }
    }

    /// 校验并录制一次 vkCmdBindDescriptorSets
    pub fn bind(
        &self,
        cmd: &GfxCommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: &PipelineLayoutInfo,
        heap: &LinearHeapAllocator,
    ) {
        self.validate(&layout.meta, heap.current_generation());

        let sets = self.sets.iter().map(|(_, set)| *set).collect::<Vec<_>>();
        cmd.bind_descriptor_sets(bind_point, layout.handle, 0, &sets, &self.dynamic_offsets);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_meta() -> PipelineLayoutMeta {
        PipelineLayoutMeta {
            set_dynamic_counts: vec![1, 1, 0, 0],
        }
    }

    fn generation(v: u64) -> ArenaGeneration {
        ArenaGeneration(v)
    }

    #[test]
    fn accepts_matching_list() {
        let list = SetBindingList::new()
            .dynamic(0, vk::DescriptorSet::null(), 256, Some(generation(7)))
            .dynamic(1, vk::DescriptorSet::null(), 0, None)
            .fixed(2, vk::DescriptorSet::null());

        list.validate(&standard_meta(), generation(7));
    }

    #[test]
    fn accepts_prefix_of_layout_sets() {
        let list = SetBindingList::new().dynamic(0, vk::DescriptorSet::null(), 0, Some(generation(1)));
        list.validate(&standard_meta(), generation(1));
    }

    #[test]
    #[should_panic(expected = "contiguously")]
    fn rejects_gap_in_set_indices() {
        let list = SetBindingList::new()
            .dynamic(0, vk::DescriptorSet::null(), 0, None)
            .fixed(2, vk::DescriptorSet::null());
        list.validate(&standard_meta(), generation(1));
    }

    #[test]
    #[should_panic(expected = "only declares")]
    fn rejects_more_sets_than_layout() {
        let list = SetBindingList::new()
            .dynamic(0, vk::DescriptorSet::null(), 0, None)
            .dynamic(1, vk::DescriptorSet::null(), 0, None)
            .fixed(2, vk::DescriptorSet::null())
            .fixed(3, vk::DescriptorSet::null())
            .fixed(4, vk::DescriptorSet::null());
        list.validate(&standard_meta(), generation(1));
    }

    #[test]
    #[should_panic(expected = "dynamic offsets")]
    fn rejects_missing_dynamic_offset() {
        // set1 是 dynamic storage，但是按 fixed 绑定，offset 数量就对不上了
        let list = SetBindingList::new()
            .dynamic(0, vk::DescriptorSet::null(), 0, None)
            .fixed(1, vk::DescriptorSet::null());
        list.validate(&standard_meta(), generation(1));
    }

    #[test]
    #[should_panic(expected = "stale heap allocation")]
    fn rejects_stale_generation() {
        let list = SetBindingList::new().dynamic(0, vk::DescriptorSet::null(), 0, Some(generation(3)));
        // arena 已经 reset 过，分配属于上一代
        list.validate(&standard_meta(), generation(4));
    }
}
