//! 核心功能模块
//!
//! 本模块提供与图形 API 无关的基础功能：日志系统、配置管理、错误处理和帧计时器。
//!
//! # 模块组织
//!
//! - `log`：日志系统，基于 `tracing` 的结构化日志
//! - `config`：配置管理，支持从配置文件和命令行加载设置
//! - `error`：错误处理，定义统一的错误类型
//! - `timer`：步进计时器，支持固定时间步长

pub mod config;
pub mod error;
pub mod log;
pub mod timer;

// 重新导出常用类型，方便使用
pub use config::Config;
pub use error::{Result, TritonError};
pub use timer::StepTimer;
