//! 渲染器模块
//!
//! 按配置选择图形后端，对宿主提供统一的接口。
//!
//! # 架构设计
//!
//! - `Renderer`：统一的渲染器接口，对外提供一致的 API
//! - `Backend`：内部枚举，封装不同后端的 `Context`
//! - 底层实现在 `gfx` 模块中

use std::time::Duration;

use tracing::info;
use winit::window::Window;

use crate::app::host::LifecycleEvent;
use crate::core::config::GraphicsBackend;
use crate::core::error::Result;
use crate::core::Config;
use crate::gfx::{Context, DeviceNotify, FrameStats, HeadlessFactory, HeadlessSurface};
#[cfg(target_os = "windows")]
use crate::gfx::{Dx12Factory, Win32Surface};

/// 图形后端枚举
///
/// 通过枚举分发，避免在每帧调用上使用动态分发。
enum Backend {
    #[cfg(target_os = "windows")]
    Dx12(Context<Dx12Factory>),
    Headless(Context<HeadlessFactory>),
}

pub struct Renderer {
    backend: Backend,
}

/// 对两个后端执行同一段代码
macro_rules! with_context {
    ($backend:expr, $ctx:ident => $body:expr) => {
        match $backend {
            #[cfg(target_os = "windows")]
            Backend::Dx12($ctx) => $body,
            Backend::Headless($ctx) => $body,
        }
    };
}

impl Renderer {
    /// 为窗口创建并初始化渲染器
    ///
    /// # 参数
    ///
    /// * `window` - 交换链输出的窗口
    /// * `config` - 应用配置
    pub fn new(window: &Window, config: &Config) -> Result<Self> {
        let size = window.inner_size();

        match config.graphics.backend {
            #[cfg(target_os = "windows")]
            GraphicsBackend::Dx12 => {
                info!("Initializing DX12 Backend");
                let surface = Win32Surface::from_window(window)?;
                let mut context = Context::new(Dx12Factory::new(), &config.graphics);
                context.initialize(surface, size.width, size.height)?;
                Ok(Self { backend: Backend::Dx12(context) })
            }
            #[cfg(not(target_os = "windows"))]
            GraphicsBackend::Dx12 => Err(crate::core::error::TritonError::Initialization(
                "DX12 backend is only available on Windows".to_string(),
            )),
            GraphicsBackend::Headless => {
                let surface = HeadlessSurface { id: u64::from(window.id()) };
                Self::headless(surface, config, size.width, size.height)
            }
        }
    }

    /// 创建无窗口的渲染器
    pub fn headless(surface: HeadlessSurface, config: &Config, width: u32, height: u32) -> Result<Self> {
        info!("Initializing Headless Backend");
        let mut context = Context::new(HeadlessFactory::new(), &config.graphics);
        context.initialize(surface, width, height)?;
        Ok(Self { backend: Backend::Headless(context) })
    }

    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            #[cfg(target_os = "windows")]
            Backend::Dx12(_) => GraphicsBackend::Dx12.name(),
            Backend::Headless(_) => GraphicsBackend::Headless.name(),
        }
    }

    pub fn register_device_notify(&mut self, notify: Box<dyn DeviceNotify>) {
        with_context!(&mut self.backend, ctx => ctx.register_device_notify(notify))
    }

    /// 推进计时器并渲染
    pub fn tick(&mut self) -> Result<()> {
        with_context!(&mut self.backend, ctx => ctx.tick())
    }

    pub fn tick_with(&mut self, delta: Duration) -> Result<()> {
        with_context!(&mut self.backend, ctx => ctx.tick_with(delta))
    }

    /// 把宿主的生命周期事件转发给图形上下文
    pub fn handle_lifecycle(&mut self, event: &LifecycleEvent) -> Result<()> {
        with_context!(&mut self.backend, ctx => {
            match *event {
                LifecycleEvent::Activated => ctx.on_activated(),
                LifecycleEvent::Deactivated => ctx.on_deactivated(),
                LifecycleEvent::Suspending => ctx.on_suspending(),
                LifecycleEvent::Resuming => ctx.on_resuming(),
                LifecycleEvent::SizeChanged { width, height } => {
                    ctx.on_window_size_changed(width, height)?;
                }
                LifecycleEvent::ToggleFullscreen | LifecycleEvent::CloseRequested => {}
            }
            Ok(())
        })
    }

    pub fn output_size(&self) -> (u32, u32) {
        with_context!(&self.backend, ctx => ctx.output_size())
    }

    pub fn frame_stats(&self) -> FrameStats {
        with_context!(&self.backend, ctx => *ctx.frame_stats())
    }

    /// 等待 GPU 空闲（退出前调用）
    pub fn wait_for_gpu(&mut self) -> Result<()> {
        with_context!(&mut self.backend, ctx => ctx.wait_for_gpu())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> Renderer {
        Renderer::headless(HeadlessSurface::default(), &Config::default(), 1280, 720).unwrap()
    }

    #[test]
    fn test_headless_renderer_ticks() {
        let mut renderer = renderer();
        assert_eq!(renderer.backend_name(), "Headless");

        renderer.tick_with(Duration::from_millis(5)).unwrap();
        renderer.tick_with(Duration::from_millis(5)).unwrap();
        assert_eq!(renderer.frame_stats().frames_presented, 2);
    }

    #[test]
    fn test_lifecycle_events_forwarded() {
        let mut renderer = renderer();

        renderer.handle_lifecycle(&LifecycleEvent::SizeChanged { width: 640, height: 480 }).unwrap();
        assert_eq!(renderer.output_size(), (640, 480));

        renderer.handle_lifecycle(&LifecycleEvent::Suspending).unwrap();
        renderer.tick_with(Duration::from_millis(5)).unwrap();
        assert_eq!(renderer.frame_stats().frames_presented, 0);

        renderer.handle_lifecycle(&LifecycleEvent::Resuming).unwrap();
        renderer.tick_with(Duration::from_millis(5)).unwrap();
        assert_eq!(renderer.frame_stats().frames_presented, 1);
    }
}
