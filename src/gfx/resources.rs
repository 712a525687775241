//! 依赖输出尺寸的资源
//!
//! 交换链、后缓冲的渲染目标视图、深度模板缓冲在初始化和每次窗口尺寸变化时重建。

use tracing::{info, warn};

use crate::core::error::{GraphicsError, Result};
use crate::core::log::GFX_TARGET;

use super::backend::{Extent, GraphicsDevice, SurfaceStatus, SWAP_BUFFER_COUNT};
use super::frame::FramePipeline;

/// 创建或重建依赖输出尺寸的资源
///
/// 释放旧的后缓冲引用之前会先等待 GPU 空闲，并把所有槽位的 Fence 值
/// 对齐到当前槽位。已有交换链时原地调整大小，否则新建交换链。
///
/// # 参数
///
/// * `device` - 图形设备
/// * `pipeline` - 帧流水线（持有 Fence 值表和后缓冲索引）
/// * `surface` - 交换链绑定的目标
/// * `extent` - 输出尺寸，宽高都必须大于 0
///
/// # 返回值
///
/// 调整交换链时设备丢失返回 `SurfaceStatus::DeviceLost`，此时重建被中止，
/// 由调用方执行设备丢失恢复
pub fn create_resources<D: GraphicsDevice>(
    device: &mut D,
    pipeline: &mut FramePipeline,
    surface: &D::Surface,
    extent: Extent,
) -> Result<SurfaceStatus> {
    if extent.is_empty() {
        return Err(GraphicsError::SwapchainError(format!(
            "cannot create a {}x{} swap chain",
            extent.width, extent.height
        ))
        .into());
    }

    pipeline.wait_for_gpu(device)?;

    device.release_back_buffers();
    pipeline.resync_fences();

    if device.has_swap_chain() {
        let status = device.resize_swap_chain(extent)?;
        if let SurfaceStatus::DeviceLost(reason) = status {
            warn!(target: GFX_TARGET, ?reason, "Device lost on ResizeBuffers");
            return Ok(status);
        }
    } else {
        device.create_swap_chain(surface, extent)?;
    }

    let views = device.create_render_target_views()?;
    debug_assert_eq!(views, SWAP_BUFFER_COUNT);

    pipeline.sync_back_buffer_index(device);

    device.create_depth_stencil(extent)?;

    pipeline.stats_mut().resource_rebuilds += 1;
    info!(
        target: GFX_TARGET,
        width = extent.width,
        height = extent.height,
        back_buffer_index = pipeline.back_buffer_index(),
        "Window size dependent resources created"
    );
    Ok(SurfaceStatus::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::TritonError;
    use crate::gfx::backend::{DeviceFactory, DeviceLostReason, DeviceSettings};
    use crate::gfx::headless::{HeadlessDevice, HeadlessFactory, HeadlessSurface};

    fn setup() -> (FramePipeline, HeadlessDevice) {
        let mut pipeline = FramePipeline::new([0.0; 4], 1);
        let device = HeadlessFactory::new()
            .create_device(&DeviceSettings::default(), pipeline.current_fence_value().value())
            .unwrap();
        pipeline.bump_current_fence();
        (pipeline, device)
    }

    #[test]
    fn test_creates_views_and_depth() {
        let (mut pipeline, mut device) = setup();
        let extent = Extent::new(1280, 720);

        let status = create_resources(&mut device, &mut pipeline, &HeadlessSurface::default(), extent).unwrap();
        assert_eq!(status, SurfaceStatus::Ok);
        assert_eq!(device.render_target_count(), SWAP_BUFFER_COUNT);
        assert_eq!(device.depth_stencil_extent(), Some(extent));
        assert!(pipeline.back_buffer_index() < SWAP_BUFFER_COUNT);

        let names = device.object_names();
        assert!(names.iter().any(|n| n == "Render Target 0"));
        assert!(names.iter().any(|n| n == "Render Target 1"));
        assert!(names.iter().any(|n| n == "Depth Stencil"));
    }

    #[test]
    fn test_resize_resyncs_fences() {
        let (mut pipeline, mut device) = setup();
        let surface = HeadlessSurface::default();
        assert_eq!(
            create_resources(&mut device, &mut pipeline, &surface, Extent::new(1280, 720)).unwrap(),
            SurfaceStatus::Ok
        );

        assert_eq!(
            create_resources(&mut device, &mut pipeline, &surface, Extent::new(800, 600)).unwrap(),
            SurfaceStatus::Ok
        );
        assert_eq!(device.swap_chain_extent(), Some(Extent::new(800, 600)));
        assert_eq!(device.depth_stencil_extent(), Some(Extent::new(800, 600)));
        assert_eq!(pipeline.back_buffer_index(), 0);

        let first = pipeline.fences().get(0);
        assert!(pipeline.fences().iter().all(|v| v == first));
        assert_eq!(pipeline.stats().resource_rebuilds, 2);
    }

    #[test]
    fn test_zero_size_rejected() {
        let (mut pipeline, mut device) = setup();
        let err = create_resources(&mut device, &mut pipeline, &HeadlessSurface::default(), Extent::new(0, 720))
            .unwrap_err();
        assert!(matches!(err, TritonError::Graphics(GraphicsError::SwapchainError(_))));
        assert!(!device.has_swap_chain());
    }

    #[test]
    fn test_device_lost_on_resize_aborts() {
        let (mut pipeline, mut device) = setup();
        let surface = HeadlessSurface::default();
        assert_eq!(
            create_resources(&mut device, &mut pipeline, &surface, Extent::new(1280, 720)).unwrap(),
            SurfaceStatus::Ok
        );

        device.inject_resize_fault(DeviceLostReason::Reset);
        let status = create_resources(&mut device, &mut pipeline, &surface, Extent::new(640, 480)).unwrap();
        assert_eq!(status, SurfaceStatus::DeviceLost(DeviceLostReason::Reset));
        assert_eq!(device.render_target_count(), 0);
        assert_eq!(pipeline.stats().resource_rebuilds, 1);
    }
}
