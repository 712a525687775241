//! 配置管理模块
//!
//! 提供应用配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//! title = "TritonX"
//!
//! [graphics]
//! backend = "dx12"      # 或 "headless"
//! sync_interval = 1
//! target_elapsed_seconds = 0.004166666666666667
//!
//! [logging]
//! level = "debug"       # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result, TritonError};

/// 默认输出尺寸
pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 客户区宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 客户区高度
    #[serde(default = "default_height")]
    pub height: u32,

    /// 窗口标题
    #[serde(default = "default_title")]
    pub title: String,

    /// 最小跟踪宽度
    #[serde(default = "default_min_width")]
    pub min_width: u32,

    /// 最小跟踪高度
    #[serde(default = "default_min_height")]
    pub min_height: u32,

    /// 是否可调整大小
    #[serde(default = "default_resizable")]
    pub resizable: bool,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 图形后端选择
    #[serde(default = "default_backend")]
    pub backend: GraphicsBackend,

    /// Present 的垂直同步间隔（0 表示不等待）
    #[serde(default = "default_sync_interval")]
    pub sync_interval: u32,

    /// 是否使用固定时间步长
    #[serde(default = "default_fixed_time_step")]
    pub fixed_time_step: bool,

    /// 固定时间步长的目标间隔（秒）
    #[serde(default = "default_target_elapsed_seconds")]
    pub target_elapsed_seconds: f64,

    /// 是否启用调试层（仅 debug 构建生效）
    #[serde(default = "default_debug_layer")]
    pub debug_layer: bool,

    /// 找不到硬件适配器时是否回退到 WARP
    #[serde(default = "default_warp_fallback")]
    pub warp_fallback: bool,

    /// 清屏颜色（RGBA）
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
}

/// 图形后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsBackend {
    /// DirectX 12 后端（仅 Windows）
    Dx12,
    /// 无窗口的模拟后端
    Headless,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_width() -> u32 { DEFAULT_WIDTH }
fn default_height() -> u32 { DEFAULT_HEIGHT }
fn default_title() -> String { "TritonX".to_string() }
fn default_min_width() -> u32 { 426 }
fn default_min_height() -> u32 { 240 }
fn default_resizable() -> bool { true }
fn default_backend() -> GraphicsBackend {
    if cfg!(target_os = "windows") {
        GraphicsBackend::Dx12
    } else {
        GraphicsBackend::Headless
    }
}
fn default_sync_interval() -> u32 { 1 }
fn default_fixed_time_step() -> bool { true }
fn default_target_elapsed_seconds() -> f64 { 1.0 / 240.0 }
fn default_debug_layer() -> bool { true }
fn default_warp_fallback() -> bool { cfg!(debug_assertions) }
// CornflowerBlue
fn default_clear_color() -> [f32; 4] { [0.392_156_9, 0.584_313_75, 0.929_411_8, 1.0] }
fn default_log_level() -> LogLevel { LogLevel::Debug }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "tritonx.log".to_string() }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
            min_width: default_min_width(),
            min_height: default_min_height(),
            resizable: default_resizable(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sync_interval: default_sync_interval(),
            fixed_time_step: default_fixed_time_step(),
            target_elapsed_seconds: default_target_elapsed_seconds(),
            debug_layer: default_debug_layer(),
            warp_fallback: default_warp_fallback(),
            clear_color: default_clear_color(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 参数
    ///
    /// * `path` - 配置文件路径
    ///
    /// # 返回值
    ///
    /// 成功返回 `Config` 实例，失败返回错误
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TritonError::from(ConfigError::FileNotFound(path_str.clone())),
            _ => TritonError::from(e),
        })?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 文本解析
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在或无法解析则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--dx12`: 使用 DirectX 12 后端
    /// - `--headless`: 使用无窗口模拟后端
    /// - `--warp`: 允许回退到 WARP 软件适配器
    /// - `--width <value>`: 设置窗口宽度
    /// - `--height <value>`: 设置窗口高度
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if args.iter().any(|a| a == "--dx12") {
            self.graphics.backend = GraphicsBackend::Dx12;
        }

        if args.iter().any(|a| a == "--headless") {
            self.graphics.backend = GraphicsBackend::Headless;
        }

        if args.iter().any(|a| a == "--warp") {
            self.graphics.warp_fallback = true;
        }

        if let Some(idx) = args.iter().position(|a| a == "--width") {
            if let Some(width_str) = args.get(idx + 1) {
                if let Ok(width) = width_str.parse() {
                    self.window.width = width;
                }
            }
        }

        if let Some(idx) = args.iter().position(|a| a == "--height") {
            if let Some(height_str) = args.get(idx + 1) {
                if let Ok(height) = height_str.parse() {
                    self.window.height = height;
                }
            }
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.width/height".to_string(),
                reason: "Window dimensions must be greater than 0".to_string(),
            }.into());
        }

        if self.graphics.sync_interval > 4 {
            return Err(ConfigError::InvalidValue {
                field: "graphics.sync_interval".to_string(),
                reason: "Sync interval must be between 0 and 4".to_string(),
            }.into());
        }

        if !(self.graphics.target_elapsed_seconds > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "graphics.target_elapsed_seconds".to_string(),
                reason: "Target elapsed time must be positive".to_string(),
            }.into());
        }

        Ok(())
    }
}

impl GraphicsBackend {
    /// 获取后端名称
    pub fn name(&self) -> &'static str {
        match self {
            GraphicsBackend::Dx12 => "DirectX 12",
            GraphicsBackend::Headless => "Headless",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_not_found() {
        let err = Config::from_file("does-not-exist/config.toml").unwrap_err();
        assert!(matches!(err, TritonError::Config(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_unreadable_path_is_io_error() {
        // 目录无法按文本读取
        let err = Config::from_file(std::env::temp_dir()).unwrap_err();
        assert!(matches!(err, TritonError::Io(_)));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.graphics.sync_interval, 1);
        assert!((config.graphics.target_elapsed_seconds - 1.0 / 240.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.window.width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.graphics.sync_interval = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [graphics]
            backend = "headless"
            sync_interval = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.graphics.backend, GraphicsBackend::Headless);
        assert_eq!(config.graphics.sync_interval, 0);
        assert_eq!(config.window.title, "TritonX");
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args(["tritonx", "--headless", "--width", "640", "--height", "480"]);

        assert_eq!(config.graphics.backend, GraphicsBackend::Headless);
        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, 480);
    }
}
