//! 帧流水线
//!
//! 每帧的顺序固定为：
//!
//! ```text
//! Idle --clear--> Cleared --submit--> Submitted --present--> Presented --move_to_next_frame--> Idle
//! ```
//!
//! `present` 内部完成提交和呈现两步。顺序错误的调用返回
//! `GraphicsError::CommandExecution`，不会录制任何命令。
//!
//! CPU/GPU 同步完全由 [`FrameFences`] 决定：一个槽位的命令分配器和后缓冲
//! 只有在 GPU 完成的 Fence 值达到该槽位记录的值之后才会被复用。

use tracing::trace;

use crate::core::error::{GraphicsError, Result};
use crate::core::log::GFX_TARGET;

use super::backend::{ClearValues, Extent, GraphicsDevice, ResourceState, SurfaceStatus, SWAP_BUFFER_COUNT};
use super::sync::{FenceValue, FrameFences};

/// 帧状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// 可以开始录制新的一帧
    Idle,
    /// 命令列表已打开，目标已清除
    Cleared,
    /// 命令列表已提交
    Submitted,
    /// 已呈现，等待推进到下一帧
    Presented,
}

/// 帧统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_cleared: u64,
    pub frames_presented: u64,
    pub frames_advanced: u64,
    /// CPU 实际阻塞等待 GPU 的次数
    pub gpu_waits: u64,
    pub resource_rebuilds: u64,
    pub device_losses: u64,
}

/// 帧流水线
#[derive(Debug)]
pub struct FramePipeline {
    fences: FrameFences,
    back_buffer_index: usize,
    state: FrameState,
    clear: ClearValues,
    sync_interval: u32,
    stats: FrameStats,
}

impl FramePipeline {
    /// 创建帧流水线
    ///
    /// # 参数
    ///
    /// * `clear_color` - 每帧的清屏颜色
    /// * `sync_interval` - Present 的垂直同步间隔
    pub fn new(clear_color: [f32; 4], sync_interval: u32) -> Self {
        Self {
            fences: FrameFences::new(),
            back_buffer_index: 0,
            state: FrameState::Idle,
            clear: ClearValues { color: clear_color, depth: 1.0 },
            sync_interval,
            stats: FrameStats::default(),
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn back_buffer_index(&self) -> usize {
        self.back_buffer_index
    }

    pub fn fences(&self) -> &FrameFences {
        &self.fences
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut FrameStats {
        &mut self.stats
    }

    pub fn sync_interval(&self) -> u32 {
        self.sync_interval
    }

    /// 当前槽位的 Fence 值（设备创建时作为 Fence 的初始值）
    pub fn current_fence_value(&self) -> FenceValue {
        self.fences.get(self.back_buffer_index)
    }

    /// 当前槽位的 Fence 值加一
    pub(crate) fn bump_current_fence(&mut self) {
        self.fences.increment(self.back_buffer_index);
    }

    /// 让所有槽位与当前槽位对齐
    pub(crate) fn resync_fences(&mut self) {
        self.fences.resync_to(self.back_buffer_index);
    }

    /// 从交换链读取后缓冲索引
    pub(crate) fn sync_back_buffer_index<D: GraphicsDevice>(&mut self, device: &D) {
        self.back_buffer_index = device.current_back_buffer_index();
        debug_assert!(self.back_buffer_index < SWAP_BUFFER_COUNT);
    }

    /// 设备重建前回到初始状态
    pub(crate) fn reset(&mut self) {
        self.fences.reset();
        self.back_buffer_index = 0;
        self.state = FrameState::Idle;
    }

    /// 录制清除命令
    ///
    /// 重置当前槽位的分配器和命令列表，把后缓冲从 PRESENT 转换到 RENDER_TARGET，
    /// 绑定并清除颜色和深度目标，设置覆盖整个输出的视口。
    pub fn clear<D: GraphicsDevice>(&mut self, device: &mut D, extent: Extent) -> Result<()> {
        self.expect_state(FrameState::Idle, "clear")?;

        let slot = self.back_buffer_index;
        device.reset_commands(slot)?;
        device.transition_back_buffer(slot, ResourceState::Present, ResourceState::RenderTarget)?;
        device.clear_targets(slot, &self.clear)?;
        device.set_viewport(extent);

        self.state = FrameState::Cleared;
        self.stats.frames_cleared += 1;
        Ok(())
    }

    /// 提交并呈现
    ///
    /// # 返回值
    ///
    /// 设备丢失时返回 `SurfaceStatus::DeviceLost`，此时不能调用 `move_to_next_frame`
    pub fn present<D: GraphicsDevice>(&mut self, device: &mut D) -> Result<SurfaceStatus> {
        self.expect_state(FrameState::Cleared, "present")?;

        let slot = self.back_buffer_index;
        device.transition_back_buffer(slot, ResourceState::RenderTarget, ResourceState::Present)?;
        device.submit()?;
        self.state = FrameState::Submitted;

        let status = device.present(self.sync_interval)?;
        if status == SurfaceStatus::Ok {
            self.state = FrameState::Presented;
            self.stats.frames_presented += 1;
        }
        Ok(status)
    }

    /// 准备渲染下一帧
    pub fn move_to_next_frame<D: GraphicsDevice>(&mut self, device: &mut D) -> Result<()> {
        self.expect_state(FrameState::Presented, "move_to_next_frame")?;

        let current = self.fences.get(self.back_buffer_index);
        device.signal(current.value())?;

        self.sync_back_buffer_index(device);

        // 新槽位上一次占用的工作尚未完成时阻塞等待
        let pending = self.fences.get(self.back_buffer_index);
        if !pending.is_reached_by(device.completed_value()) {
            device.wait_for_value(pending.value())?;
            self.stats.gpu_waits += 1;
        }

        self.fences.set(self.back_buffer_index, current.next());
        self.state = FrameState::Idle;
        self.stats.frames_advanced += 1;

        trace!(
            target: GFX_TARGET,
            back_buffer_index = self.back_buffer_index,
            fence = current.next().value(),
            "Advanced to next frame"
        );
        Ok(())
    }

    /// 等待 GPU 完成所有已提交的工作
    ///
    /// 连续调用两次不会阻塞：第二次 signal 的值紧跟在第一次之后，GPU 很快完成。
    pub fn wait_for_gpu<D: GraphicsDevice>(&mut self, device: &mut D) -> Result<()> {
        let value = self.fences.get(self.back_buffer_index);
        device.signal(value.value())?;

        if !value.is_reached_by(device.completed_value()) {
            device.wait_for_value(value.value())?;
            self.stats.gpu_waits += 1;
        }

        self.fences.increment(self.back_buffer_index);
        Ok(())
    }

    fn expect_state(&self, expected: FrameState, operation: &str) -> Result<()> {
        if self.state != expected {
            return Err(GraphicsError::CommandExecution(format!(
                "{} called in state {:?}, expected {:?}",
                operation, self.state, expected
            ))
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::TritonError;
    use crate::gfx::backend::{DeviceFactory, DeviceLostReason, DeviceSettings};
    use crate::gfx::headless::{HeadlessFactory, HeadlessDevice, HeadlessSurface};

    const EXTENT: Extent = Extent::new(1280, 720);

    fn setup() -> (FramePipeline, HeadlessDevice) {
        let mut pipeline = FramePipeline::new([0.0, 0.0, 0.0, 1.0], 1);
        let mut factory = HeadlessFactory::new();
        let mut device = factory
            .create_device(&DeviceSettings::default(), pipeline.current_fence_value().value())
            .unwrap();
        pipeline.bump_current_fence();

        device.create_swap_chain(&HeadlessSurface::default(), EXTENT).unwrap();
        device.create_render_target_views().unwrap();
        device.create_depth_stencil(EXTENT).unwrap();
        pipeline.sync_back_buffer_index(&device);
        (pipeline, device)
    }

    fn run_frame(pipeline: &mut FramePipeline, device: &mut HeadlessDevice) {
        pipeline.clear(device, EXTENT).unwrap();
        assert_eq!(pipeline.present(device).unwrap(), SurfaceStatus::Ok);
        pipeline.move_to_next_frame(device).unwrap();
    }

    #[test]
    fn test_index_stays_in_range() {
        let (mut pipeline, mut device) = setup();
        for _ in 0..16 {
            run_frame(&mut pipeline, &mut device);
            assert!(pipeline.back_buffer_index() < SWAP_BUFFER_COUNT);
        }
        assert_eq!(pipeline.stats().frames_advanced, 16);
    }

    #[test]
    fn test_slot_fence_values_strictly_increase() {
        let (mut pipeline, mut device) = setup();
        let mut last = [0u64; SWAP_BUFFER_COUNT];

        for _ in 0..12 {
            run_frame(&mut pipeline, &mut device);
            let slot = pipeline.back_buffer_index();
            let value = pipeline.fences().get(slot).value();
            assert!(value > last[slot], "slot {} went from {} to {}", slot, last[slot], value);
            last[slot] = value;
        }
    }

    #[test]
    fn test_slot_not_reused_before_gpu_finishes() {
        let (mut pipeline, mut device) = setup();
        device.set_latency(4);

        for _ in 0..10 {
            pipeline.clear(&mut device, EXTENT).unwrap();
            assert_eq!(pipeline.present(&mut device).unwrap(), SurfaceStatus::Ok);

            let before: Vec<u64> = pipeline.fences().iter().map(|v| v.value()).collect();
            pipeline.move_to_next_frame(&mut device).unwrap();

            // 新槽位上一次占用的工作必须已经完成
            let slot = pipeline.back_buffer_index();
            assert!(device.completed_value() >= before[slot]);
        }
        assert!(pipeline.stats().gpu_waits > 0);
    }

    #[test]
    fn test_wait_for_gpu_twice() {
        let (mut pipeline, mut device) = setup();
        pipeline.wait_for_gpu(&mut device).unwrap();
        pipeline.wait_for_gpu(&mut device).unwrap();

        let slot = pipeline.back_buffer_index();
        assert_eq!(device.completed_value() + 1, pipeline.fences().get(slot).value());
    }

    #[test]
    fn test_out_of_order_calls_rejected() {
        let (mut pipeline, mut device) = setup();

        let err = pipeline.present(&mut device).unwrap_err();
        assert!(matches!(err, TritonError::Graphics(GraphicsError::CommandExecution(_))));

        pipeline.clear(&mut device, EXTENT).unwrap();
        assert!(pipeline.clear(&mut device, EXTENT).is_err());
        assert!(pipeline.move_to_next_frame(&mut device).is_err());
        assert_eq!(device.submissions(), 0);
    }

    #[test]
    fn test_present_uses_sync_interval() {
        let (mut pipeline, mut device) = setup();
        run_frame(&mut pipeline, &mut device);
        assert_eq!(device.last_present_interval(), Some(1));
        assert_eq!(device.presents(), 1);
        assert_eq!(device.submissions(), 1);
    }

    #[test]
    fn test_device_lost_leaves_frame_unadvanced() {
        let (mut pipeline, mut device) = setup();
        device.inject_present_fault(DeviceLostReason::Removed);

        pipeline.clear(&mut device, EXTENT).unwrap();
        let status = pipeline.present(&mut device).unwrap();
        assert_eq!(status, SurfaceStatus::DeviceLost(DeviceLostReason::Removed));
        assert_eq!(pipeline.state(), FrameState::Submitted);
        assert!(pipeline.move_to_next_frame(&mut device).is_err());

        pipeline.reset();
        assert_eq!(pipeline.state(), FrameState::Idle);
        assert!(pipeline.fences().iter().all(|v| v.value() == 0));
    }
}
