//! 错误处理模块
//!
//! 定义了 TritonX 中使用的统一错误类型。
//!
//! # 错误分类
//!
//! - 初始化阶段的致命错误（没有可用适配器、设备创建失败、硬件不支持、
//!   同步对象创建失败）会从 `Context::initialize` 返回，由宿主负责退出
//! - 设备丢失不是错误：它通过 `SurfaceStatus::DeviceLost` 作为结果返回，
//!   由 Context 执行恢复流程
//! - 其余任何失败的 GPU 调用都会转换成 `GraphicsError` 并用 `?` 向上传播

use std::fmt;

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, TritonError>;

/// TritonX 的错误类型
#[derive(Debug)]
pub enum TritonError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// IO 错误
    Io(std::io::Error),

    /// 日志系统错误
    Log(String),

    /// 初始化错误
    Initialization(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 没有找到满足特性等级的适配器（且 WARP 回退不可用）
    NoSuitableAdapter(String),

    /// 设备创建失败
    DeviceCreation(String),

    /// 硬件不满足最低着色器模型
    UnsupportedHardware(String),

    /// Fence 事件等同步对象创建失败
    SyncObjectCreation(String),

    /// 交换链错误
    SwapchainError(String),

    /// 资源创建失败
    ResourceCreation(String),

    /// 命令录制或提交失败
    CommandExecution(String),

    /// CPU/GPU 同步失败
    Synchronization(String),

    /// 设备尚未创建
    NotInitialized,
}

impl GraphicsError {
    /// 是否属于初始化阶段的致命错误
    pub fn is_initialization_failure(&self) -> bool {
        matches!(
            self,
            GraphicsError::NoSuitableAdapter(_)
                | GraphicsError::DeviceCreation(_)
                | GraphicsError::UnsupportedHardware(_)
                | GraphicsError::SyncObjectCreation(_)
        )
    }
}

impl fmt::Display for TritonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TritonError::Config(e) => write!(f, "Configuration error: {}", e),
            TritonError::Graphics(e) => write!(f, "Graphics error: {}", e),
            TritonError::Io(e) => write!(f, "IO error: {}", e),
            TritonError::Log(msg) => write!(f, "Log error: {}", msg),
            TritonError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::NoSuitableAdapter(msg) => write!(f, "No suitable adapter: {}", msg),
            GraphicsError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GraphicsError::UnsupportedHardware(msg) => write!(f, "Unsupported hardware: {}", msg),
            GraphicsError::SyncObjectCreation(msg) => {
                write!(f, "Synchronization object creation failed: {}", msg)
            }
            GraphicsError::SwapchainError(msg) => write!(f, "Swapchain error: {}", msg),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
            GraphicsError::Synchronization(msg) => write!(f, "GPU synchronization failed: {}", msg),
            GraphicsError::NotInitialized => write!(f, "Graphics device is not initialized"),
        }
    }
}

impl std::error::Error for TritonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TritonError::Io(e) => Some(e),
            TritonError::Config(e) => Some(e),
            TritonError::Graphics(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}

impl From<std::io::Error> for TritonError {
    fn from(err: std::io::Error) -> Self {
        TritonError::Io(err)
    }
}

impl From<ConfigError> for TritonError {
    fn from(err: ConfigError) -> Self {
        TritonError::Config(err)
    }
}

impl From<GraphicsError> for TritonError {
    fn from(err: GraphicsError) -> Self {
        TritonError::Graphics(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization_failure_classification() {
        assert!(GraphicsError::NoSuitableAdapter("none".into()).is_initialization_failure());
        assert!(GraphicsError::SyncObjectCreation("event".into()).is_initialization_failure());
        assert!(!GraphicsError::CommandExecution("close".into()).is_initialization_failure());
        assert!(!GraphicsError::NotInitialized.is_initialization_failure());
    }

    #[test]
    fn test_display_wraps_inner_error() {
        let err: TritonError = GraphicsError::UnsupportedHardware("Shader Model 6.0".into()).into();
        assert_eq!(
            err.to_string(),
            "Graphics error: Unsupported hardware: Shader Model 6.0"
        );
    }
}
