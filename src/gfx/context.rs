//! 图形上下文
//!
//! [`Context`] 拥有设备、依赖输出尺寸的资源、帧流水线和计时器，
//! 对宿主暴露初始化、tick 和窗口生命周期通知。
//!
//! # 设备丢失
//!
//! Present 或 ResizeBuffers 报告设备丢失时，Context 会：
//!
//! 1. 通知 [`DeviceNotify::on_device_lost`]
//! 2. 释放所有依赖设备的对象，重置 Fence 值表和后缓冲索引
//! 3. 重新创建设备和依赖尺寸的资源
//! 4. 通知 [`DeviceNotify::on_device_restored`]
//!
//! 恢复过程中再次丢失设备视为致命错误。

use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::core::config::{GraphicsConfig, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::core::error::{GraphicsError, Result};
use crate::core::log::GFX_TARGET;
use crate::core::timer::StepTimer;

use super::backend::{DeviceFactory, DeviceLostReason, DeviceSettings, Extent, GraphicsDevice, SurfaceStatus};
use super::frame::{FramePipeline, FrameStats};
use super::resources;

type SurfaceOf<F> = <<F as DeviceFactory>::Device as GraphicsDevice>::Surface;

/// 设备丢失和恢复的观察者
pub trait DeviceNotify {
    /// 设备已丢失，所有依赖设备的对象即将被释放
    fn on_device_lost(&mut self);

    /// 设备和资源已重新创建
    fn on_device_restored(&mut self);
}

/// 图形上下文
pub struct Context<F: DeviceFactory> {
    factory: F,
    settings: DeviceSettings,

    device: Option<F::Device>,
    surface: Option<SurfaceOf<F>>,
    output: Extent,

    pipeline: FramePipeline,
    timer: StepTimer,

    notify: Option<Box<dyn DeviceNotify>>,
    active: bool,
    suspended: bool,
    recovering: bool,
}

impl<F: DeviceFactory> Context<F> {
    /// 创建图形上下文（不创建任何 GPU 对象）
    ///
    /// # 参数
    ///
    /// * `factory` - 设备工厂
    /// * `config` - 图形配置
    pub fn new(factory: F, config: &GraphicsConfig) -> Self {
        let settings = DeviceSettings {
            debug_layer: config.debug_layer && cfg!(debug_assertions),
            warp_fallback: config.warp_fallback,
            ..DeviceSettings::default()
        };

        let mut timer = StepTimer::new();
        timer.set_fixed_time_step(config.fixed_time_step);
        timer.set_target_elapsed_seconds(config.target_elapsed_seconds);

        Self {
            factory,
            settings,
            device: None,
            surface: None,
            output: Extent::new(DEFAULT_WIDTH, DEFAULT_HEIGHT),
            pipeline: FramePipeline::new(config.clear_color, config.sync_interval),
            timer,
            notify: None,
            active: false,
            suspended: false,
            recovering: false,
        }
    }

    /// 默认的窗口客户区尺寸
    pub fn default_size() -> (u32, u32) {
        (DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    /// 注册设备丢失的观察者
    pub fn register_device_notify(&mut self, notify: Box<dyn DeviceNotify>) {
        self.notify = Some(notify);
    }

    /// 初始化设备和依赖尺寸的资源
    ///
    /// # 参数
    ///
    /// * `surface` - 交换链绑定的目标
    /// * `width` / `height` - 输出尺寸
    ///
    /// # 返回值
    ///
    /// 没有可用适配器、设备或同步对象创建失败、硬件不满足要求时返回错误
    pub fn initialize(&mut self, surface: SurfaceOf<F>, width: u32, height: u32) -> Result<()> {
        self.surface = Some(surface);
        self.output = Extent::new(width, height);

        self.create_device()?;
        self.create_resources()?;

        // 设备创建耗时不计入第一帧
        self.timer.reset_elapsed_time();

        info!(target: GFX_TARGET, width, height, "Graphics context initialized");
        Ok(())
    }

    /// 创建设备及不依赖尺寸的对象
    ///
    /// 已有设备时先等待 GPU 空闲并释放旧设备。之后必须调用 `create_resources`。
    pub fn create_device(&mut self) -> Result<()> {
        if self.device.is_some() {
            self.wait_for_gpu()?;
            self.device = None;
            debug!(target: GFX_TARGET, "Released previous device");
        }

        let initial = self.pipeline.current_fence_value().value();
        let device = self.factory.create_device(&self.settings, initial)?;
        self.pipeline.bump_current_fence();

        let adapter = device.adapter_info();
        info!(
            target: GFX_TARGET,
            adapter = %adapter.description,
            software = adapter.software,
            dedicated_video_memory_mb = adapter.dedicated_video_memory / (1024 * 1024),
            "Device created"
        );

        self.device = Some(device);
        Ok(())
    }

    /// 创建或重建依赖输出尺寸的资源
    pub fn create_resources(&mut self) -> Result<()> {
        let device = self.device.as_mut().ok_or(GraphicsError::NotInitialized)?;
        let surface = self.surface.as_ref().ok_or(GraphicsError::NotInitialized)?;

        match resources::create_resources(device, &mut self.pipeline, surface, self.output)? {
            SurfaceStatus::Ok => Ok(()),
            SurfaceStatus::DeviceLost(reason) => self.handle_device_lost(reason),
        }
    }

    /// 推进计时器，需要时渲染一帧
    pub fn tick(&mut self) -> Result<()> {
        self.timer.tick(Self::update);
        self.render()
    }

    /// 按给定的时间增量推进计时器，需要时渲染一帧
    pub fn tick_with(&mut self, delta: Duration) -> Result<()> {
        self.timer.tick_with(delta, Self::update);
        self.render()
    }

    fn update(timer: &StepTimer) {
        trace!(
            target: GFX_TARGET,
            frame = timer.frame_count(),
            elapsed = timer.elapsed_seconds(),
            "Update"
        );
    }

    fn render(&mut self) -> Result<()> {
        // 第一次更新之前不渲染
        if self.timer.frame_count() == 0 || self.suspended {
            return Ok(());
        }

        let device = self.device.as_mut().ok_or(GraphicsError::NotInitialized)?;

        self.pipeline.clear(device, self.output)?;

        match self.pipeline.present(device)? {
            SurfaceStatus::Ok => self.pipeline.move_to_next_frame(device),
            SurfaceStatus::DeviceLost(reason) => self.handle_device_lost(reason),
        }
    }

    /// 等待 GPU 完成所有已提交的工作，没有设备时直接返回
    pub fn wait_for_gpu(&mut self) -> Result<()> {
        match self.device.as_mut() {
            Some(device) => self.pipeline.wait_for_gpu(device),
            None => Ok(()),
        }
    }

    fn handle_device_lost(&mut self, reason: DeviceLostReason) -> Result<()> {
        if self.recovering {
            error!(target: GFX_TARGET, ?reason, "Device lost during recovery");
            return Err(GraphicsError::DeviceCreation(format!(
                "device lost ({:?}) while recovering from a previous device loss",
                reason
            ))
            .into());
        }

        warn!(target: GFX_TARGET, ?reason, "Device lost, recreating device resources");
        self.pipeline.stats_mut().device_losses += 1;

        if let Some(notify) = self.notify.as_mut() {
            notify.on_device_lost();
        }

        self.device = None;
        self.pipeline.reset();

        self.recovering = true;
        let result = self.create_device().and_then(|_| self.create_resources());
        self.recovering = false;
        result?;

        if let Some(notify) = self.notify.as_mut() {
            notify.on_device_restored();
        }
        info!(target: GFX_TARGET, "Device restored");
        Ok(())
    }

    /// 窗口获得焦点
    pub fn on_activated(&mut self) {
        self.active = true;
        debug!(target: GFX_TARGET, "Activated");
    }

    /// 窗口失去焦点
    pub fn on_deactivated(&mut self) {
        self.active = false;
        debug!(target: GFX_TARGET, "Deactivated");
    }

    /// 应用被挂起（最小化、系统挂起），暂停渲染
    pub fn on_suspending(&mut self) {
        self.suspended = true;
        debug!(target: GFX_TARGET, "Suspending");
    }

    /// 应用恢复，丢弃挂起期间累积的时间
    pub fn on_resuming(&mut self) {
        self.suspended = false;
        self.timer.reset_elapsed_time();
        debug!(target: GFX_TARGET, "Resuming");
    }

    /// 窗口尺寸变化
    ///
    /// # 返回值
    ///
    /// 重建了资源返回 `true`；尺寸为 0（最小化）或未变化时返回 `false`
    pub fn on_window_size_changed(&mut self, width: u32, height: u32) -> Result<bool> {
        let extent = Extent::new(width, height);
        if extent.is_empty() || extent == self.output {
            return Ok(false);
        }

        self.output = extent;
        if self.device.is_none() {
            return Ok(false);
        }

        self.create_resources()?;
        Ok(true)
    }

    pub fn is_initialized(&self) -> bool {
        self.device.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn back_buffer_index(&self) -> usize {
        self.pipeline.back_buffer_index()
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.output.width, self.output.height)
    }

    pub fn timer(&self) -> &StepTimer {
        &self.timer
    }

    pub fn frame_stats(&self) -> &FrameStats {
        self.pipeline.stats()
    }

    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }

    pub fn device(&self) -> Option<&F::Device> {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> Option<&mut F::Device> {
        self.device.as_mut()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}

impl<F: DeviceFactory> Drop for Context<F> {
    fn drop(&mut self) {
        if let Err(e) = self.wait_for_gpu() {
            warn!(target: GFX_TARGET, "Failed to drain GPU on shutdown: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::core::error::TritonError;
    use crate::gfx::backend::SWAP_BUFFER_COUNT;
    use crate::gfx::headless::{HeadlessFactory, HeadlessSurface};

    const STEP: Duration = Duration::from_millis(5);

    fn context_with(factory: HeadlessFactory) -> Context<HeadlessFactory> {
        let mut context = Context::new(factory, &GraphicsConfig::default());
        context.initialize(HeadlessSurface::default(), 1280, 720).unwrap();
        context
    }

    fn context() -> Context<HeadlessFactory> {
        context_with(HeadlessFactory::new())
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<&'static str>>>);

    impl DeviceNotify for Recorder {
        fn on_device_lost(&mut self) {
            self.0.borrow_mut().push("lost");
        }

        fn on_device_restored(&mut self) {
            self.0.borrow_mut().push("restored");
        }
    }

    #[test]
    fn test_default_size() {
        assert_eq!(Context::<HeadlessFactory>::default_size(), (1280, 720));
    }

    #[test]
    fn test_initialize() {
        let context = context();
        assert!(context.is_initialized());
        assert!(context.back_buffer_index() < SWAP_BUFFER_COUNT);
        assert_eq!(context.output_size(), (1280, 720));

        let device = context.device().unwrap();
        assert_eq!(device.render_target_count(), SWAP_BUFFER_COUNT);
        assert_eq!(device.depth_stencil_extent(), Some(Extent::new(1280, 720)));
    }

    #[test]
    fn test_first_tick_does_not_render() {
        let mut context = context();
        context.tick_with(Duration::from_millis(1)).unwrap();

        assert_eq!(context.timer().frame_count(), 0);
        assert_eq!(context.device().unwrap().submissions(), 0);
    }

    #[test]
    fn test_first_real_clock_tick_ignores_initialization_time() {
        let mut context = Context::new(HeadlessFactory::new(), &GraphicsConfig::default());
        std::thread::sleep(Duration::from_millis(20));
        context.initialize(HeadlessSurface::default(), 1280, 720).unwrap();

        context.tick().unwrap();

        assert_eq!(context.timer().frame_count(), 0);
        assert_eq!(context.device().unwrap().submissions(), 0);
    }

    #[test]
    fn test_second_tick_renders_one_frame() {
        let mut context = context();
        context.tick_with(Duration::from_millis(1)).unwrap();
        context.tick_with(Duration::from_millis(4)).unwrap();

        let device = context.device().unwrap();
        assert_eq!(device.submissions(), 1);
        assert_eq!(device.clear_count(), 1);
        assert_eq!(device.presents(), 1);
        assert_eq!(device.last_present_interval(), Some(1));
        assert_eq!(device.viewport(), Some(Extent::new(1280, 720)));

        let stats = context.frame_stats();
        assert_eq!(stats.frames_cleared, 1);
        assert_eq!(stats.frames_presented, 1);
        assert_eq!(stats.frames_advanced, 1);
    }

    #[test]
    fn test_long_run_keeps_device_records_bounded() {
        let mut context = context();
        let named = context.device().unwrap().object_names().len();

        for i in 0..200u32 {
            context.tick_with(STEP).unwrap();
            if i % 20 == 0 {
                context.on_window_size_changed(640 + i, 480).unwrap();
            }
        }

        let device = context.device().unwrap();
        assert_eq!(device.object_names().len(), named);
        assert_eq!(device.presents(), 200);
        assert_eq!(device.clear_count(), 200);
    }

    #[test]
    fn test_clear_uses_configured_color() {
        let mut context = context();
        context.tick_with(STEP).unwrap();

        let clear = context.device().unwrap().last_clear().unwrap();
        assert_eq!(clear.color, GraphicsConfig::default().clear_color);
        assert_eq!(clear.depth, 1.0);
    }

    #[test]
    fn test_many_frames_keep_index_in_range() {
        let mut context = context_with(HeadlessFactory::new().with_latency(3));
        for _ in 0..32 {
            context.tick_with(STEP).unwrap();
            assert!(context.back_buffer_index() < SWAP_BUFFER_COUNT);
        }
        assert_eq!(context.frame_stats().frames_presented, 32);
    }

    #[test]
    fn test_wait_for_gpu_twice() {
        let mut context = context();
        context.tick_with(STEP).unwrap();
        context.wait_for_gpu().unwrap();
        context.wait_for_gpu().unwrap();
    }

    #[test]
    fn test_wait_for_gpu_without_device() {
        let mut context = Context::new(HeadlessFactory::new(), &GraphicsConfig::default());
        context.wait_for_gpu().unwrap();
        assert!(!context.is_initialized());
    }

    #[test]
    fn test_render_before_initialize_fails() {
        let mut context = Context::new(HeadlessFactory::new(), &GraphicsConfig::default());
        let err = context.tick_with(STEP).unwrap_err();
        assert!(matches!(err, TritonError::Graphics(GraphicsError::NotInitialized)));
    }

    #[test]
    fn test_device_removed_on_present_recovers() {
        let mut context = context();
        let recorder = Recorder::default();
        context.register_device_notify(Box::new(recorder.clone()));

        context.tick_with(STEP).unwrap();
        let advanced = context.frame_stats().frames_advanced;

        context.device_mut().unwrap().inject_present_fault(DeviceLostReason::Removed);
        context.tick_with(STEP).unwrap();

        assert_eq!(*recorder.0.borrow(), vec!["lost", "restored"]);
        assert_eq!(context.frame_stats().frames_advanced, advanced);
        assert_eq!(context.frame_stats().device_losses, 1);
        assert_eq!(context.factory().devices_created(), 2);

        // 新设备正常工作
        let device = context.device().unwrap();
        assert_eq!(device.submissions(), 0);
        assert_eq!(device.render_target_count(), SWAP_BUFFER_COUNT);
        context.tick_with(STEP).unwrap();
        assert_eq!(context.frame_stats().frames_advanced, advanced + 1);
    }

    #[test]
    fn test_device_reset_on_resize_recovers() {
        let mut context = context();
        let recorder = Recorder::default();
        context.register_device_notify(Box::new(recorder.clone()));

        context.device_mut().unwrap().inject_resize_fault(DeviceLostReason::Reset);
        assert!(context.on_window_size_changed(800, 600).unwrap());

        assert_eq!(*recorder.0.borrow(), vec!["lost", "restored"]);
        let device = context.device().unwrap();
        assert_eq!(device.swap_chain_extent(), Some(Extent::new(800, 600)));
    }

    #[test]
    fn test_failed_recovery_is_fatal() {
        let mut context = context_with(HeadlessFactory::new().with_device_limit(1));
        context.device_mut().unwrap().inject_present_fault(DeviceLostReason::Removed);

        let err = context.tick_with(STEP).unwrap_err();
        assert!(matches!(err, TritonError::Graphics(GraphicsError::DeviceCreation(_))));
        assert!(!context.is_initialized());
    }

    #[test]
    fn test_initialize_failure_is_reported() {
        let mut context = Context::new(
            HeadlessFactory::new().with_adapters(Vec::new()).with_warp(false),
            &GraphicsConfig::default(),
        );
        let err = context.initialize(HeadlessSurface::default(), 1280, 720).unwrap_err();
        match err {
            TritonError::Graphics(e) => assert!(e.is_initialization_failure()),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_create_device_twice_releases_previous() {
        let mut context = context();
        context.tick_with(STEP).unwrap();

        context.create_device().unwrap();
        context.create_resources().unwrap();
        assert_eq!(context.factory().devices_created(), 2);

        context.tick_with(STEP).unwrap();
        assert_eq!(context.device().unwrap().submissions(), 1);
    }

    #[test]
    fn test_window_size_changes() {
        let mut context = context();

        assert!(!context.on_window_size_changed(0, 0).unwrap());
        assert_eq!(context.output_size(), (1280, 720));

        assert!(!context.on_window_size_changed(1280, 720).unwrap());

        assert!(context.on_window_size_changed(1024, 768).unwrap());
        assert_eq!(context.output_size(), (1024, 768));
        assert_eq!(
            context.device().unwrap().depth_stencil_extent(),
            Some(Extent::new(1024, 768))
        );
        assert_eq!(context.frame_stats().resource_rebuilds, 2);

        context.tick_with(STEP).unwrap();
        assert_eq!(context.device().unwrap().viewport(), Some(Extent::new(1024, 768)));
    }

    #[test]
    fn test_suspend_and_resume() {
        let mut context = context();
        context.on_suspending();
        context.tick_with(STEP).unwrap();
        assert_eq!(context.device().unwrap().submissions(), 0);

        context.on_resuming();
        assert!(!context.is_suspended());
        context.tick_with(STEP).unwrap();
        assert_eq!(context.device().unwrap().submissions(), 1);
    }

    #[test]
    fn test_focus_tracking() {
        let mut context = context();
        context.on_activated();
        assert!(context.is_active());
        context.on_deactivated();
        assert!(!context.is_active());
    }
}
