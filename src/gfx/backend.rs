//! 图形后端的统一抽象接口
//!
//! 帧流水线和资源构建器只依赖这里定义的 trait：
//!
//! - [`GraphicsDevice`]：帧循环需要的 GPU 原语（Fence、交换链、视图、命令录制、提交、Present）
//! - [`DeviceFactory`]：创建设备，初始化和设备丢失恢复时都会调用
//! - [`AdapterSource`]：供适配器选择策略枚举适配器
//!
//! DirectX 12 后端和 headless 后端都实现了这些 trait，
//! 因此同一套同步协议可以在任何平台上运行和测试。

use crate::core::error::Result;

/// 交换链后缓冲数量
pub const SWAP_BUFFER_COUNT: usize = 2;

/// 设备对象的调试名称
pub mod debug_names {
    pub const DEVICE: &str = "DeviceResources";
    pub const COMMAND_QUEUE: &str = "Command Queue";
    pub const RTV_HEAP: &str = "Render Target View Heap";
    pub const DSV_HEAP: &str = "Depth Stencil View Heap";
    pub const COMMAND_LIST: &str = "Command List";
    pub const FENCE: &str = "Fence";
    pub const DEPTH_STENCIL: &str = "Depth Stencil";

    pub fn command_allocator(slot: usize) -> String {
        format!("Command Allocator {}", slot)
    }

    pub fn render_target(slot: usize) -> String {
        format!("Render Target {}", slot)
    }
}

/// 输出尺寸（像素）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 任意一边为 0
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// 设备特性等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureLevel {
    Level11_0,
    Level11_1,
    Level12_0,
    Level12_1,
}

impl FeatureLevel {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureLevel::Level11_0 => "11.0",
            FeatureLevel::Level11_1 => "11.1",
            FeatureLevel::Level12_0 => "12.0",
            FeatureLevel::Level12_1 => "12.1",
        }
    }
}

/// 着色器模型版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShaderModel {
    pub major: u8,
    pub minor: u8,
}

impl ShaderModel {
    pub const SM_5_1: ShaderModel = ShaderModel { major: 5, minor: 1 };
    pub const SM_6_0: ShaderModel = ShaderModel { major: 6, minor: 0 };
}

impl std::fmt::Display for ShaderModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// 资源状态（只包含帧循环中用到的转换）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Present,
    RenderTarget,
}

/// 设备丢失的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceLostReason {
    /// `DXGI_ERROR_DEVICE_REMOVED`
    Removed,
    /// `DXGI_ERROR_DEVICE_RESET`
    Reset,
}

/// 交换链操作（Present、ResizeBuffers）的结果
///
/// 设备丢失是可预期的情况，以结果而不是错误的形式返回，
/// 由 Context 决定何时执行恢复。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SurfaceStatus {
    Ok,
    DeviceLost(DeviceLostReason),
}

/// 每帧的清屏参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    pub color: [f32; 4],
    pub depth: f32,
}

/// 适配器信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub description: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub dedicated_video_memory: u64,
    pub software: bool,
}

/// 创建设备所需的参数
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSettings {
    /// 设备必须支持的最低特性等级
    pub min_feature_level: FeatureLevel,
    /// 设备必须支持的最低着色器模型
    pub min_shader_model: ShaderModel,
    /// 是否启用调试层
    pub debug_layer: bool,
    /// 没有硬件适配器时是否使用 WARP
    pub warp_fallback: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            min_feature_level: FeatureLevel::Level11_1,
            min_shader_model: ShaderModel::SM_6_0,
            debug_layer: cfg!(debug_assertions),
            warp_fallback: cfg!(debug_assertions),
        }
    }
}

/// 枚举适配器的来源
pub trait AdapterSource {
    type Adapter;

    /// 按枚举顺序获取适配器，超出范围时返回 `None`
    fn adapter(&self, index: u32) -> Result<Option<Self::Adapter>>;

    /// 读取适配器描述
    fn info(&self, adapter: &Self::Adapter) -> Result<AdapterInfo>;

    /// 试探能否在该适配器上以给定特性等级创建设备（不保留设备）
    fn supports(&self, adapter: &Self::Adapter, level: FeatureLevel) -> bool;

    /// 获取软件光栅化（WARP）适配器
    fn warp_adapter(&self) -> Result<Self::Adapter>;
}

/// 帧循环需要的 GPU 原语
///
/// 所有方法都只在 UI 线程上调用；除了 [`wait_for_value`](Self::wait_for_value)
/// 以外都不会阻塞，只是把工作排入 GPU 队列。
pub trait GraphicsDevice {
    /// 交换链绑定的目标（窗口句柄等）
    type Surface;

    /// 适配器描述
    fn adapter_info(&self) -> &AdapterInfo;

    // ---- 同步 ----

    /// 在命令队列上排入 signal
    fn signal(&mut self, value: u64) -> Result<()>;

    /// GPU 已完成的 Fence 值
    fn completed_value(&self) -> u64;

    /// 阻塞直到 GPU 完成的 Fence 值不小于 `value`，没有超时
    fn wait_for_value(&mut self, value: u64) -> Result<()>;

    // ---- 交换链与视图 ----

    fn has_swap_chain(&self) -> bool;

    /// 释放对后缓冲的引用（ResizeBuffers 之前必须释放）
    fn release_back_buffers(&mut self);

    /// 原地调整交换链缓冲大小
    fn resize_swap_chain(&mut self, extent: Extent) -> Result<SurfaceStatus>;

    /// 创建交换链并禁用系统的 Alt+Enter 处理
    fn create_swap_chain(&mut self, surface: &Self::Surface, extent: Extent) -> Result<()>;

    /// 为每个后缓冲创建渲染目标视图，返回创建的数量
    fn create_render_target_views(&mut self) -> Result<usize>;

    /// 交换链当前的后缓冲索引
    fn current_back_buffer_index(&self) -> usize;

    /// 创建深度模板缓冲和视图
    fn create_depth_stencil(&mut self, extent: Extent) -> Result<()>;

    /// 当前深度缓冲的尺寸
    fn depth_stencil_extent(&self) -> Option<Extent>;

    // ---- 命令录制 ----

    /// 重置槽位对应的命令分配器，并在其上重置命令列表
    fn reset_commands(&mut self, slot: usize) -> Result<()>;

    /// 记录后缓冲的资源屏障
    fn transition_back_buffer(&mut self, slot: usize, before: ResourceState, after: ResourceState) -> Result<()>;

    /// 绑定 RTV + DSV 并清除颜色和深度
    fn clear_targets(&mut self, slot: usize, clear: &ClearValues) -> Result<()>;

    /// 视口和裁剪矩形覆盖整个输出
    fn set_viewport(&mut self, extent: Extent);

    /// 关闭命令列表并提交到队列
    fn submit(&mut self) -> Result<()>;

    /// 呈现当前后缓冲
    fn present(&mut self, sync_interval: u32) -> Result<SurfaceStatus>;
}

/// 创建 [`GraphicsDevice`]
pub trait DeviceFactory {
    type Device: GraphicsDevice;

    /// 创建设备及其不依赖输出尺寸的对象
    ///
    /// Fence 以 `initial_fence_value` 初始化。
    fn create_device(&mut self, settings: &DeviceSettings, initial_fence_value: u64) -> Result<Self::Device>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_empty() {
        assert!(Extent::new(0, 720).is_empty());
        assert!(Extent::new(1280, 0).is_empty());
        assert!(!Extent::new(1280, 720).is_empty());
    }

    #[test]
    fn test_feature_level_ordering() {
        assert!(FeatureLevel::Level11_0 < FeatureLevel::Level11_1);
        assert!(FeatureLevel::Level12_1 > FeatureLevel::Level11_1);
        assert!(ShaderModel::SM_5_1 < ShaderModel::SM_6_0);
        assert_eq!(ShaderModel::SM_6_0.to_string(), "6.0");
    }
}
