//! TritonX - Direct3D 12 应用骨架
//!
//! 由一个窗口消息循环和一个 Direct3D 12 图形上下文组成。
//! 核心是图形上下文的生命周期：适配器选择、设备和交换链的创建、
//! 每帧的命令录制，以及在多缓冲和设备丢失下保持渲染循环正确的 CPU/GPU Fence 协议。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（日志、配置、错误处理、计时器）
//! - `gfx`: 图形上下文和后端实现
//! - `renderer`: 按配置选择后端的渲染器
//! - `app`: 窗口宿主（窗口表、生命周期事件转换）
//!
//! # 使用示例
//!
//! ```no_run
//! use std::time::Duration;
//! use tritonx::core::Config;
//! use tritonx::gfx::{Context, HeadlessFactory, HeadlessSurface};
//!
//! let config = Config::default();
//! let mut context = Context::new(HeadlessFactory::new(), &config.graphics);
//! context.initialize(HeadlessSurface::default(), 1280, 720).unwrap();
//! context.tick_with(Duration::from_millis(5)).unwrap();
//! ```

pub mod app;
pub mod core;
pub mod gfx;
pub mod renderer;
