//! 交换链绑定的 Win32 窗口

use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use winit::window::Window;
use windows::Win32::Foundation::HWND;

use crate::core::error::{GraphicsError, Result};

/// 交换链输出的窗口句柄
#[derive(Debug, Clone, Copy)]
pub struct Win32Surface {
    hwnd: HWND,
}

impl Win32Surface {
    pub fn from_hwnd(hwnd: HWND) -> Self {
        Self { hwnd }
    }

    /// 从 winit 窗口获取 HWND
    pub fn from_window(window: &Window) -> Result<Self> {
        let handle = window
            .window_handle()
            .map_err(|e| GraphicsError::SwapchainError(format!("Failed to get window handle: {}", e)))?;

        match handle.as_raw() {
            RawWindowHandle::Win32(win32) => Ok(Self {
                hwnd: HWND(win32.hwnd.get() as *mut core::ffi::c_void),
            }),
            _ => Err(GraphicsError::SwapchainError("Expected a Win32 window handle".into()).into()),
        }
    }

    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }
}
