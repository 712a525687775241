//! 适配器选择
//!
//! 按枚举顺序选择第一个能以目标特性等级创建设备的硬件适配器。
//! 软件适配器总是跳过；找不到硬件适配器时，按配置回退到 WARP。

use tracing::{info, warn};

use crate::core::error::{GraphicsError, Result};
use crate::core::log::GFX_TARGET;

use super::backend::{AdapterInfo, AdapterSource, FeatureLevel};

/// 选中的适配器
#[derive(Debug)]
pub struct SelectedAdapter<A> {
    pub adapter: A,
    pub info: AdapterInfo,
    /// 枚举索引；WARP 适配器没有索引
    pub index: Option<u32>,
}

impl<A> SelectedAdapter<A> {
    pub fn is_warp(&self) -> bool {
        self.index.is_none()
    }
}

/// 选择适配器
///
/// # 参数
///
/// * `source` - 适配器来源
/// * `feature_level` - 必须支持的最低特性等级
/// * `warp_fallback` - 没有合适的硬件适配器时是否使用 WARP
///
/// # 返回值
///
/// 成功返回选中的适配器；没有可用适配器时返回 `GraphicsError::NoSuitableAdapter`
pub fn select_adapter<S: AdapterSource>(
    source: &S,
    feature_level: FeatureLevel,
    warp_fallback: bool,
) -> Result<SelectedAdapter<S::Adapter>> {
    let mut index = 0u32;
    while let Some(adapter) = source.adapter(index)? {
        let info = source.info(&adapter)?;

        if info.software {
            // 不选择 Basic Render Driver，需要软件光栅化时显式使用 WARP
            index += 1;
            continue;
        }

        if source.supports(&adapter, feature_level) {
            info!(
                target: GFX_TARGET,
                index,
                vendor_id = format_args!("{:04X}", info.vendor_id),
                device_id = format_args!("{:04X}", info.device_id),
                "Direct3D Adapter ({}): {}",
                index,
                info.description
            );
            return Ok(SelectedAdapter { adapter, info, index: Some(index) });
        }

        index += 1;
    }

    if warp_fallback {
        match source.warp_adapter().and_then(|adapter| {
            let info = source.info(&adapter)?;
            Ok((adapter, info))
        }) {
            Ok((adapter, info)) => {
                warn!(target: GFX_TARGET, "No hardware adapter found, using WARP: {}", info.description);
                return Ok(SelectedAdapter { adapter, info, index: None });
            }
            Err(e) => {
                warn!(target: GFX_TARGET, "WARP adapter unavailable: {}", e);
            }
        }
    }

    Err(GraphicsError::NoSuitableAdapter(format!(
        "no hardware adapter supports feature level {}",
        feature_level.name()
    ))
    .into())
}
