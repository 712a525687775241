//! DirectX 12 后端
//!
//! 本模块包含所有 DirectX 12 / DXGI 相关的代码：
//! - adapter: DXGI 适配器枚举
//! - device: 设备、命令队列、描述符堆、命令分配器、Fence 的创建和同步
//! - swapchain: 交换链、渲染目标视图、深度模板缓冲
//! - commands: 每帧的命令录制、提交和 Present
//! - surface: 从 winit 窗口获取 HWND

pub mod adapter;
pub mod commands;
pub mod device;
pub mod surface;
pub mod swapchain;

pub use adapter::DxgiAdapterSource;
pub use device::{Dx12Device, Dx12Factory};
pub use surface::Win32Surface;

use windows::core::{Interface, PCWSTR};
use windows::Win32::Graphics::Direct3D12::ID3D12Object;
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT, DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_FORMAT_D32_FLOAT};
use windows::Win32::Graphics::Dxgi::{DXGI_ERROR_DEVICE_REMOVED, DXGI_ERROR_DEVICE_RESET};

use crate::core::error::{GraphicsError, TritonError};

use super::backend::DeviceLostReason;

/// 后缓冲格式
pub const BACK_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_B8G8R8A8_UNORM;

/// 深度缓冲格式
pub const DEPTH_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_D32_FLOAT;

/// 把 `windows` 的错误包装成图形错误
///
/// # 参数
///
/// * `kind` - 构造具体错误变体的函数，例如 `GraphicsError::ResourceCreation`
/// * `what` - 失败的调用
pub(crate) fn hr_error(kind: fn(String) -> GraphicsError, what: &'static str) -> impl Fn(windows::core::Error) -> TritonError {
    move |e| TritonError::Graphics(kind(format!("{} failed: {}", what, e)))
}

/// HRESULT 是否表示设备丢失
pub(crate) fn device_lost_reason(code: windows::core::HRESULT) -> Option<DeviceLostReason> {
    if code == DXGI_ERROR_DEVICE_REMOVED {
        Some(DeviceLostReason::Removed)
    } else if code == DXGI_ERROR_DEVICE_RESET {
        Some(DeviceLostReason::Reset)
    } else {
        None
    }
}

/// 设置调试名称（PIX 和调试层输出中可见）
pub(crate) fn set_debug_name<T: Interface>(object: &T, name: &str) {
    let wide_name: Vec<u16> = name.encode_utf16().chain(Some(0)).collect();
    if let Ok(object) = object.cast::<ID3D12Object>() {
        unsafe {
            let _ = object.SetName(PCWSTR(wide_name.as_ptr()));
        }
    }
}
