//! 图形模块
//!
//! 本模块实现图形上下文的完整生命周期：
//! - `backend`：后端抽象（设备、设备工厂、适配器来源）
//! - `adapter`：适配器选择策略
//! - `sync`：Fence 值和按后缓冲槽位的 Fence 值表
//! - `frame`：帧流水线（Clear → Present → MoveToNextFrame）和 WaitForGpu
//! - `resources`：依赖输出尺寸的资源重建
//! - `context`：对宿主暴露的图形上下文
//! - `headless`：内存中的模拟后端
//! - `dx12`：DirectX 12 后端（仅 Windows）

pub mod adapter;
pub mod backend;
pub mod context;
pub mod frame;
pub mod headless;
pub mod resources;
pub mod sync;

#[cfg(target_os = "windows")]
pub mod dx12;

pub use backend::{DeviceFactory, Extent, GraphicsDevice, SurfaceStatus, SWAP_BUFFER_COUNT};
pub use context::{Context, DeviceNotify};
pub use frame::{FramePipeline, FrameStats};
pub use headless::{HeadlessFactory, HeadlessSurface};

#[cfg(target_os = "windows")]
pub use dx12::{Dx12Factory, Win32Surface};
