//! Headless 后端
//!
//! 不依赖任何图形 API 的模拟设备：命令队列、Fence、交换链环和描述符都在内存中建模。
//! GPU 延迟可以配置（signal 之后经过多少次 signal 才算完成），
//! 也可以注入设备丢失，用来在任何平台上驱动完整的帧同步协议。
//!
//! 设备会检查协议本身：在分配器的工作完成前重置它、持有后缓冲引用时调整交换链、
//! 等待一个永远不会 signal 的值，都会返回错误而不是静默通过。

use std::collections::VecDeque;

use tracing::debug;

use crate::core::error::{GraphicsError, Result};
use crate::core::log::GFX_TARGET;

use super::adapter::select_adapter;
use super::backend::{
    debug_names, AdapterInfo, AdapterSource, ClearValues, DeviceFactory, DeviceLostReason, DeviceSettings, Extent,
    FeatureLevel, GraphicsDevice, ResourceState, ShaderModel, SurfaceStatus, SWAP_BUFFER_COUNT,
};

/// 默认的 GPU 延迟：signal 在下一次 signal 时完成
pub const DEFAULT_LATENCY: usize = 1;

/// Headless 交换链的目标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessSurface {
    pub id: u64,
}

/// 模拟适配器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessAdapter {
    pub info: AdapterInfo,
    pub feature_level: FeatureLevel,
}

impl HeadlessAdapter {
    pub fn hardware(description: &str, feature_level: FeatureLevel) -> Self {
        Self {
            info: AdapterInfo {
                description: description.to_string(),
                vendor_id: 0x1414,
                device_id: 0x0001,
                dedicated_video_memory: 512 * 1024 * 1024,
                software: false,
            },
            feature_level,
        }
    }

    pub fn software(description: &str) -> Self {
        let mut adapter = Self::hardware(description, FeatureLevel::Level12_1);
        adapter.info.software = true;
        adapter.info.dedicated_video_memory = 0;
        adapter
    }
}

/// 模拟设备工厂
#[derive(Debug, Clone)]
pub struct HeadlessFactory {
    adapters: Vec<HeadlessAdapter>,
    warp_available: bool,
    shader_model: ShaderModel,
    latency: usize,
    fail_event_creation: bool,
    device_limit: Option<usize>,
    devices_created: usize,
}

impl HeadlessFactory {
    /// 一个支持 12.1 和 Shader Model 6.0 的硬件适配器
    pub fn new() -> Self {
        Self {
            adapters: vec![HeadlessAdapter::hardware("Headless Adapter", FeatureLevel::Level12_1)],
            warp_available: true,
            shader_model: ShaderModel::SM_6_0,
            latency: DEFAULT_LATENCY,
            fail_event_creation: false,
            device_limit: None,
            devices_created: 0,
        }
    }

    pub fn with_adapters(mut self, adapters: Vec<HeadlessAdapter>) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_warp(mut self, available: bool) -> Self {
        self.warp_available = available;
        self
    }

    pub fn with_shader_model(mut self, shader_model: ShaderModel) -> Self {
        self.shader_model = shader_model;
        self
    }

    pub fn with_latency(mut self, latency: usize) -> Self {
        self.latency = latency;
        self
    }

    /// 之后创建设备时 Fence 事件创建失败
    pub fn with_event_failure(mut self) -> Self {
        self.fail_event_creation = true;
        self
    }

    /// 创建过 `limit` 个设备之后，D3D12CreateDevice 失败
    pub fn with_device_limit(mut self, limit: usize) -> Self {
        self.device_limit = Some(limit);
        self
    }

    /// 已成功创建的设备数量
    pub fn devices_created(&self) -> usize {
        self.devices_created
    }
}

impl Default for HeadlessFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterSource for HeadlessFactory {
    type Adapter = HeadlessAdapter;

    fn adapter(&self, index: u32) -> Result<Option<HeadlessAdapter>> {
        Ok(self.adapters.get(index as usize).cloned())
    }

    fn info(&self, adapter: &HeadlessAdapter) -> Result<AdapterInfo> {
        Ok(adapter.info.clone())
    }

    fn supports(&self, adapter: &HeadlessAdapter, level: FeatureLevel) -> bool {
        adapter.feature_level >= level
    }

    fn warp_adapter(&self) -> Result<HeadlessAdapter> {
        if self.warp_available {
            Ok(HeadlessAdapter::software("Microsoft Basic Render Driver"))
        } else {
            Err(GraphicsError::NoSuitableAdapter("WARP adapter is not available".into()).into())
        }
    }
}

impl DeviceFactory for HeadlessFactory {
    type Device = HeadlessDevice;

    fn create_device(&mut self, settings: &DeviceSettings, initial_fence_value: u64) -> Result<HeadlessDevice> {
        let selected = select_adapter(self, settings.min_feature_level, settings.warp_fallback)?;

        if self.device_limit.is_some_and(|limit| self.devices_created >= limit) {
            return Err(GraphicsError::DeviceCreation(format!(
                "{} does not accept more devices",
                selected.info.description
            ))
            .into());
        }

        if self.fail_event_creation {
            return Err(GraphicsError::SyncObjectCreation("CreateEvent failed".into()).into());
        }

        if self.shader_model < settings.min_shader_model {
            return Err(GraphicsError::UnsupportedHardware(format!(
                "Shader Model {} is required",
                settings.min_shader_model
            ))
            .into());
        }

        self.devices_created += 1;
        debug!(
            target: GFX_TARGET,
            adapter = %selected.info.description,
            initial_fence_value,
            "Headless device created"
        );
        Ok(HeadlessDevice::new(selected.info, initial_fence_value, self.latency))
    }
}

#[derive(Debug, Clone, Copy)]
struct SwapChainState {
    extent: Extent,
    index: usize,
}

/// 模拟设备
#[derive(Debug)]
pub struct HeadlessDevice {
    adapter_info: AdapterInfo,

    completed: u64,
    pending: VecDeque<u64>,
    last_signalled: u64,
    latency: usize,

    swap_chain: Option<SwapChainState>,
    render_targets: usize,
    back_buffer_states: [ResourceState; SWAP_BUFFER_COUNT],
    depth_stencil: Option<Extent>,
    object_names: Vec<String>,

    open_slot: Option<usize>,
    // 每个分配器最后一次提交对应的 Fence 值
    allocator_fences: [u64; SWAP_BUFFER_COUNT],
    unsignalled_submit: Option<usize>,

    viewport: Option<Extent>,
    last_clear: Option<ClearValues>,
    clear_count: usize,
    submissions: usize,
    last_present_interval: Option<u32>,
    presents: usize,
    present_fault: Option<DeviceLostReason>,
    resize_fault: Option<DeviceLostReason>,
}

impl HeadlessDevice {
    fn new(adapter_info: AdapterInfo, initial_fence_value: u64, latency: usize) -> Self {
        let mut object_names: Vec<String> = [
            debug_names::DEVICE,
            debug_names::COMMAND_QUEUE,
            debug_names::RTV_HEAP,
            debug_names::DSV_HEAP,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        object_names.extend((0..SWAP_BUFFER_COUNT).map(debug_names::command_allocator));
        object_names.push(debug_names::COMMAND_LIST.to_string());
        object_names.push(debug_names::FENCE.to_string());

        Self {
            adapter_info,
            completed: initial_fence_value,
            pending: VecDeque::new(),
            last_signalled: initial_fence_value,
            latency,
            swap_chain: None,
            render_targets: 0,
            back_buffer_states: [ResourceState::Present; SWAP_BUFFER_COUNT],
            depth_stencil: None,
            object_names,
            open_slot: None,
            allocator_fences: [initial_fence_value; SWAP_BUFFER_COUNT],
            unsignalled_submit: None,
            viewport: None,
            last_clear: None,
            clear_count: 0,
            submissions: 0,
            last_present_interval: None,
            presents: 0,
            present_fault: None,
            resize_fault: None,
        }
    }

    /// 修改 GPU 延迟
    pub fn set_latency(&mut self, latency: usize) {
        self.latency = latency;
    }

    /// 下一次 Present 报告设备丢失
    pub fn inject_present_fault(&mut self, reason: DeviceLostReason) {
        self.present_fault = Some(reason);
    }

    /// 下一次调整交换链大小时报告设备丢失
    pub fn inject_resize_fault(&mut self, reason: DeviceLostReason) {
        self.resize_fault = Some(reason);
    }

    pub fn submissions(&self) -> usize {
        self.submissions
    }

    pub fn presents(&self) -> usize {
        self.presents
    }

    /// 最近一次 Present 的同步间隔
    pub fn last_present_interval(&self) -> Option<u32> {
        self.last_present_interval
    }

    pub fn clear_count(&self) -> usize {
        self.clear_count
    }

    pub fn last_clear(&self) -> Option<ClearValues> {
        self.last_clear
    }

    pub fn last_signalled(&self) -> u64 {
        self.last_signalled
    }

    pub fn render_target_count(&self) -> usize {
        self.render_targets
    }

    pub fn swap_chain_extent(&self) -> Option<Extent> {
        self.swap_chain.map(|s| s.extent)
    }

    pub fn viewport(&self) -> Option<Extent> {
        self.viewport
    }

    /// 已命名的对象
    pub fn object_names(&self) -> &[String] {
        &self.object_names
    }

    // 重建的对象沿用原来的名字
    fn set_name(&mut self, name: String) {
        if !self.object_names.contains(&name) {
            self.object_names.push(name);
        }
    }

    fn retire_one(&mut self) -> bool {
        match self.pending.pop_front() {
            Some(value) => {
                self.completed = self.completed.max(value);
                true
            }
            None => false,
        }
    }

    fn open_slot(&self, operation: &str) -> Result<usize> {
        self.open_slot.ok_or_else(|| {
            GraphicsError::CommandExecution(format!("{}: command list is closed", operation)).into()
        })
    }
}

impl GraphicsDevice for HeadlessDevice {
    type Surface = HeadlessSurface;

    fn adapter_info(&self) -> &AdapterInfo {
        &self.adapter_info
    }

    fn signal(&mut self, value: u64) -> Result<()> {
        if let Some(slot) = self.unsignalled_submit.take() {
            self.allocator_fences[slot] = value;
        }

        self.pending.push_back(value);
        self.last_signalled = value;

        while self.pending.len() > self.latency {
            self.retire_one();
        }
        Ok(())
    }

    fn completed_value(&self) -> u64 {
        self.completed
    }

    fn wait_for_value(&mut self, value: u64) -> Result<()> {
        while self.completed < value {
            if !self.retire_one() {
                return Err(GraphicsError::Synchronization(format!(
                    "waiting for fence value {} that was never signalled (completed {})",
                    value, self.completed
                ))
                .into());
            }
        }
        Ok(())
    }

    fn has_swap_chain(&self) -> bool {
        self.swap_chain.is_some()
    }

    fn release_back_buffers(&mut self) {
        self.render_targets = 0;
        self.depth_stencil = None;
    }

    fn resize_swap_chain(&mut self, extent: Extent) -> Result<SurfaceStatus> {
        if let Some(reason) = self.resize_fault.take() {
            return Ok(SurfaceStatus::DeviceLost(reason));
        }
        if self.render_targets != 0 {
            return Err(GraphicsError::SwapchainError(
                "ResizeBuffers called while back buffers are still referenced".into(),
            )
            .into());
        }

        let swap_chain = self.swap_chain.as_mut().ok_or_else(|| {
            GraphicsError::SwapchainError("no swap chain to resize".to_string())
        })?;
        swap_chain.extent = extent;
        swap_chain.index = 0;
        self.back_buffer_states = [ResourceState::Present; SWAP_BUFFER_COUNT];
        Ok(SurfaceStatus::Ok)
    }

    fn create_swap_chain(&mut self, _surface: &HeadlessSurface, extent: Extent) -> Result<()> {
        if self.swap_chain.is_some() {
            return Err(GraphicsError::SwapchainError("swap chain already exists".into()).into());
        }
        self.swap_chain = Some(SwapChainState { extent, index: 0 });
        Ok(())
    }

    fn create_render_target_views(&mut self) -> Result<usize> {
        if self.swap_chain.is_none() {
            return Err(GraphicsError::ResourceCreation("no swap chain".into()).into());
        }
        for n in 0..SWAP_BUFFER_COUNT {
            self.set_name(debug_names::render_target(n));
        }
        self.render_targets = SWAP_BUFFER_COUNT;
        Ok(self.render_targets)
    }

    fn current_back_buffer_index(&self) -> usize {
        self.swap_chain.map(|s| s.index).unwrap_or(0)
    }

    fn create_depth_stencil(&mut self, extent: Extent) -> Result<()> {
        if extent.is_empty() {
            return Err(GraphicsError::ResourceCreation("depth stencil size is zero".into()).into());
        }
        self.set_name(debug_names::DEPTH_STENCIL.to_string());
        self.depth_stencil = Some(extent);
        Ok(())
    }

    fn depth_stencil_extent(&self) -> Option<Extent> {
        self.depth_stencil
    }

    fn reset_commands(&mut self, slot: usize) -> Result<()> {
        if self.open_slot.is_some() {
            return Err(GraphicsError::CommandExecution("command list is already open".into()).into());
        }
        if self.unsignalled_submit == Some(slot) || self.completed < self.allocator_fences[slot] {
            return Err(GraphicsError::CommandExecution(format!(
                "command allocator {} reset while the GPU is still using it",
                slot
            ))
            .into());
        }
        self.open_slot = Some(slot);
        Ok(())
    }

    fn transition_back_buffer(&mut self, slot: usize, before: ResourceState, after: ResourceState) -> Result<()> {
        self.open_slot("ResourceBarrier")?;
        if self.back_buffer_states[slot] != before {
            return Err(GraphicsError::CommandExecution(format!(
                "back buffer {} is in state {:?}, barrier expects {:?}",
                slot, self.back_buffer_states[slot], before
            ))
            .into());
        }
        self.back_buffer_states[slot] = after;
        Ok(())
    }

    fn clear_targets(&mut self, slot: usize, clear: &ClearValues) -> Result<()> {
        self.open_slot("ClearRenderTargetView")?;
        if self.render_targets == 0 || self.depth_stencil.is_none() {
            return Err(GraphicsError::CommandExecution("render targets are not created".into()).into());
        }
        if self.back_buffer_states[slot] != ResourceState::RenderTarget {
            return Err(GraphicsError::CommandExecution(format!(
                "back buffer {} is not in RENDER_TARGET state",
                slot
            ))
            .into());
        }
        self.last_clear = Some(*clear);
        self.clear_count += 1;
        Ok(())
    }

    fn set_viewport(&mut self, extent: Extent) {
        self.viewport = Some(extent);
    }

    fn submit(&mut self) -> Result<()> {
        let slot = self.open_slot("Close")?;
        self.open_slot = None;
        self.unsignalled_submit = Some(slot);
        self.submissions += 1;
        Ok(())
    }

    fn present(&mut self, sync_interval: u32) -> Result<SurfaceStatus> {
        if let Some(reason) = self.present_fault.take() {
            return Ok(SurfaceStatus::DeviceLost(reason));
        }

        let swap_chain = self.swap_chain.as_mut().ok_or_else(|| {
            GraphicsError::SwapchainError("present without a swap chain".to_string())
        })?;
        if self.back_buffer_states[swap_chain.index] != ResourceState::Present {
            return Err(GraphicsError::SwapchainError(
                "presented back buffer is not in PRESENT state".into(),
            )
            .into());
        }

        swap_chain.index = (swap_chain.index + 1) % SWAP_BUFFER_COUNT;
        self.last_present_interval = Some(sync_interval);
        self.presents += 1;
        Ok(SurfaceStatus::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::TritonError;

    fn device() -> HeadlessDevice {
        HeadlessFactory::new()
            .create_device(&DeviceSettings::default(), 0)
            .unwrap()
    }

    #[test]
    fn test_signal_completes_after_latency() {
        let mut device = device();
        device.set_latency(2);

        device.signal(1).unwrap();
        device.signal(2).unwrap();
        assert_eq!(device.completed_value(), 0);

        device.signal(3).unwrap();
        assert_eq!(device.completed_value(), 1);

        device.wait_for_value(3).unwrap();
        assert_eq!(device.completed_value(), 3);
    }

    #[test]
    fn test_device_objects_have_distinct_names() {
        let mut device = device();
        device.create_swap_chain(&HeadlessSurface::default(), Extent::new(64, 64)).unwrap();
        device.create_render_target_views().unwrap();
        device.create_depth_stencil(Extent::new(64, 64)).unwrap();

        let names = device.object_names();
        assert_eq!(names.len(), 11);
        for (i, name) in names.iter().enumerate() {
            assert!(!names[i + 1..].contains(name), "duplicate name {}", name);
        }
        assert!(names.iter().any(|n| n == debug_names::COMMAND_QUEUE));
        assert!(names.iter().any(|n| n == "Command Allocator 1"));
    }

    #[test]
    fn test_wait_for_unsignalled_value_fails() {
        let mut device = device();
        let err = device.wait_for_value(5).unwrap_err();
        assert!(matches!(err, TritonError::Graphics(GraphicsError::Synchronization(_))));
    }

    #[test]
    fn test_resize_requires_released_back_buffers() {
        let mut device = device();
        let extent = Extent::new(640, 480);
        device.create_swap_chain(&HeadlessSurface::default(), extent).unwrap();
        device.create_render_target_views().unwrap();

        assert!(device.resize_swap_chain(Extent::new(800, 600)).is_err());

        device.release_back_buffers();
        assert_eq!(device.resize_swap_chain(Extent::new(800, 600)).unwrap(), SurfaceStatus::Ok);
        assert_eq!(device.swap_chain_extent(), Some(Extent::new(800, 600)));
    }

    #[test]
    fn test_allocator_reset_checks_gpu_progress() {
        let mut device = device();
        device.set_latency(4);
        device.create_swap_chain(&HeadlessSurface::default(), Extent::new(64, 64)).unwrap();

        device.reset_commands(0).unwrap();
        device.submit().unwrap();
        assert!(device.reset_commands(0).is_err());

        device.signal(1).unwrap();
        assert!(device.reset_commands(0).is_err());

        device.wait_for_value(1).unwrap();
        device.reset_commands(0).unwrap();
    }

    #[test]
    fn test_factory_rejects_old_shader_model() {
        let mut factory = HeadlessFactory::new().with_shader_model(ShaderModel::SM_5_1);
        let err = factory.create_device(&DeviceSettings::default(), 0).unwrap_err();
        assert!(matches!(err, TritonError::Graphics(GraphicsError::UnsupportedHardware(_))));
        assert_eq!(factory.devices_created(), 0);
    }

    #[test]
    fn test_factory_uses_warp_when_allowed() {
        let mut factory = HeadlessFactory::new()
            .with_adapters(vec![HeadlessAdapter::hardware("Old GPU", FeatureLevel::Level11_0)]);

        let settings = DeviceSettings { warp_fallback: true, ..DeviceSettings::default() };
        let device = factory.create_device(&settings, 0).unwrap();
        assert!(device.adapter_info().software);

        let settings = DeviceSettings { warp_fallback: false, ..DeviceSettings::default() };
        assert!(factory.create_device(&settings, 0).is_err());
    }

    #[test]
    fn test_factory_event_failure() {
        let mut factory = HeadlessFactory::new().with_event_failure();
        let err = factory.create_device(&DeviceSettings::default(), 0).unwrap_err();
        assert!(matches!(err, TritonError::Graphics(GraphicsError::SyncObjectCreation(_))));
    }
}
