//! 宿主层
//!
//! 把 winit 的窗口事件转换为渲染器的生命周期通知。
//!
//! - `registry`：窗口 ID 到窗口状态的映射
//! - `host`：单个窗口的状态机（最小化、挂起、全屏）

pub mod host;
pub mod registry;

pub use host::{FullscreenChange, HostState, LifecycleEvent, WindowPlacement};
pub use registry::WindowRegistry;
