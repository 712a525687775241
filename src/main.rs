//! TritonX - Direct3D 12 桌面应用骨架
//!
//! 创建一个窗口，初始化图形上下文，然后在每次重绘时清屏并呈现。
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件
//! cargo run
//!
//! # 使用无窗口后端（命令行覆盖）
//! cargo run -- --headless
//! ```
//!
//! # 架构概览
//!
//! ```text
//! ┌─────────────┐
//! │   main.rs   │  事件循环
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │     App     │  窗口状态 → 生命周期事件
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │  Renderer   │  后端分发
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ gfx Context │  设备、交换链、帧与 fence
//! └─────────────┘
//! ```

use std::cell::Cell;
use std::rc::Rc;

use anyhow::Context as _;
use tracing::{debug, error, info, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Fullscreen, Window, WindowBuilder};

use tritonx::app::{FullscreenChange, HostState, LifecycleEvent, WindowPlacement, WindowRegistry};
use tritonx::core::{log, Config};
use tritonx::gfx::DeviceNotify;
use tritonx::renderer::Renderer;

/// 设备丢失通知，只记录日志
struct LogDeviceNotify;

impl DeviceNotify for LogDeviceNotify {
    fn on_device_lost(&mut self) {
        warn!("Device lost, releasing device dependent resources");
    }

    fn on_device_restored(&mut self) {
        info!("Device restored");
    }
}

/// 应用程序入口点
///
/// # 初始化流程
///
/// 1. 加载配置文件（config.toml）并应用命令行参数
/// 2. 初始化日志系统
/// 3. 创建窗口和渲染器
/// 4. 启动主循环
///
/// # 命令行参数
///
/// - `--dx12`: 使用 DirectX 12 后端（仅 Windows）
/// - `--headless`: 使用无窗口后端
/// - `--warp`: 找不到硬件适配器时回退到 WARP
/// - `--width <value>` / `--height <value>`: 设置窗口大小
fn main() {
    let mut config = Config::from_file_or_default("config.toml");
    config.apply_args(std::env::args());

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let log_guard = match log::init_logger(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logger: {}", e);
            std::process::exit(1);
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), "TritonX starting...");
    info!(
        backend = ?config.graphics.backend,
        width = config.window.width,
        height = config.window.height,
        "Graphics configuration"
    );

    let code = match run(&config) {
        Ok(code) => code,
        Err(e) => {
            report_fatal(&config.window.title, &e);
            1
        }
    };

    // 退出前刷新文件日志
    drop(log_guard);
    std::process::exit(code);
}

/// 创建窗口和渲染器并运行事件循环
///
/// # 返回值
///
/// 进程退出码
fn run(config: &Config) -> anyhow::Result<i32> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;

    let window = WindowBuilder::new()
        .with_title(config.window.title.as_str())
        .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
        .with_min_inner_size(PhysicalSize::new(config.window.min_width, config.window.min_height))
        .with_resizable(config.window.resizable)
        .build(&event_loop)
        .context("Failed to create window")?;

    let mut renderer = Renderer::new(&window, config).context("Failed to initialize renderer")?;
    renderer.register_device_notify(Box::new(LogDeviceNotify));
    info!(backend = renderer.backend_name(), "Renderer initialized successfully");

    let mut host = HostState::new();
    host.add_size_change_handler(|width, height| debug!(width, height, "Window resized"));

    let mut windows = WindowRegistry::new();
    windows.insert(window.id(), host);

    let exit_code = Rc::new(Cell::new(0));
    let loop_exit_code = Rc::clone(&exit_code);
    let title = config.window.title.clone();

    info!("Entering main loop...");

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);

            let events = match &event {
                Event::WindowEvent { window_id, event } => match windows.get_mut(window_id) {
                    Some(host) => {
                        if let WindowEvent::RedrawRequested = event {
                            if let Err(e) = renderer.tick() {
                                report_fatal(&title, &anyhow::Error::new(e).context("Render failed"));
                                loop_exit_code.set(1);
                                elwt.exit();
                            }
                            return;
                        }
                        host.on_window_event(event)
                    }
                    None => return,
                },
                Event::Suspended => windows
                    .get_mut(&window.id())
                    .and_then(|host| host.on_app_suspended())
                    .into_iter()
                    .collect(),
                Event::Resumed => windows
                    .get_mut(&window.id())
                    .and_then(|host| host.on_app_resumed())
                    .into_iter()
                    .collect(),
                Event::AboutToWait => {
                    window.request_redraw();
                    return;
                }
                Event::LoopExiting => {
                    if let Err(e) = renderer.wait_for_gpu() {
                        warn!("Failed to drain GPU before exit: {}", e);
                    }
                    windows.remove(&window.id());
                    return;
                }
                _ => return,
            };

            for lifecycle in events {
                match lifecycle {
                    LifecycleEvent::CloseRequested => {
                        info!("Close requested, shutting down...");
                        elwt.exit();
                    }
                    LifecycleEvent::ToggleFullscreen => {
                        if let Some(host) = windows.get_mut(&window.id()) {
                            toggle_fullscreen(&window, host);
                        }
                    }
                    other => {
                        if let Err(e) = renderer.handle_lifecycle(&other) {
                            report_fatal(&title, &anyhow::Error::new(e).context("Lifecycle event failed"));
                            loop_exit_code.set(1);
                            elwt.exit();
                        }
                    }
                }
            }
        })
        .context("Event loop terminated with an error")?;

    Ok(exit_code.get())
}

/// 在窗口化和无边框全屏之间切换
fn toggle_fullscreen(window: &Window, host: &mut HostState) {
    let position = window.outer_position().unwrap_or(PhysicalPosition::new(0, 0));
    let size = window.inner_size();
    let current = WindowPlacement {
        x: position.x,
        y: position.y,
        width: size.width,
        height: size.height,
    };

    match host.toggle_fullscreen(current) {
        FullscreenChange::Enter => window.set_fullscreen(Some(Fullscreen::Borderless(None))),
        FullscreenChange::Exit(saved) => {
            window.set_fullscreen(None);
            if let Some(saved) = saved {
                window.set_outer_position(PhysicalPosition::new(saved.x, saved.y));
                let _ = window.request_inner_size(PhysicalSize::new(saved.width, saved.height));
            }
        }
    }
}

/// 记录致命错误并显示系统错误对话框
fn report_fatal(title: &str, err: &anyhow::Error) {
    error!("{:#}", err);
    show_error_dialog(title, &format!("{:#}", err));
}

#[cfg(target_os = "windows")]
fn show_error_dialog(title: &str, message: &str) {
    use windows::core::HSTRING;
    use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONERROR};

    unsafe {
        let _ = MessageBoxW(None, &HSTRING::from(message), &HSTRING::from(title), MB_ICONERROR);
    }
}

#[cfg(not(target_os = "windows"))]
fn show_error_dialog(title: &str, message: &str) {
    eprintln!("{}: {}", title, message);
}
