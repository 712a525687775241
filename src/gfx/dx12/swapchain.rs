//! 交换链、后缓冲视图和深度缓冲

use tracing::{debug, warn};
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;

use crate::core::error::{GraphicsError, Result};
use crate::core::log::GFX_TARGET;
use crate::gfx::backend::{debug_names, Extent, SurfaceStatus, SWAP_BUFFER_COUNT};

use super::device::Dx12Device;
use super::surface::Win32Surface;
use super::{device_lost_reason, hr_error, set_debug_name, BACK_BUFFER_FORMAT, DEPTH_BUFFER_FORMAT};

impl Dx12Device {
    /// 创建 flip-discard 交换链，并禁用 DXGI 的 Alt+Enter 处理
    pub(super) fn create_swap_chain_for_hwnd(&mut self, surface: &Win32Surface, extent: Extent) -> Result<()> {
        let desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: extent.width,
            Height: extent.height,
            Format: BACK_BUFFER_FORMAT,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: SWAP_BUFFER_COUNT as u32,
            Scaling: DXGI_SCALING_STRETCH,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            AlphaMode: DXGI_ALPHA_MODE_IGNORE,
            ..Default::default()
        };

        let fullscreen_desc = DXGI_SWAP_CHAIN_FULLSCREEN_DESC {
            Windowed: true.into(),
            ..Default::default()
        };

        unsafe {
            let swap_chain: IDXGISwapChain1 = self
                .dxgi_factory
                .CreateSwapChainForHwnd(&self.queue, surface.hwnd(), &desc, Some(&fullscreen_desc), None)
                .map_err(hr_error(GraphicsError::SwapchainError, "CreateSwapChainForHwnd"))?;

            // 全屏切换由宿主处理
            self.dxgi_factory
                .MakeWindowAssociation(surface.hwnd(), DXGI_MWA_NO_ALT_ENTER)
                .map_err(hr_error(GraphicsError::SwapchainError, "MakeWindowAssociation"))?;

            let swap_chain: IDXGISwapChain3 = swap_chain
                .cast()
                .map_err(hr_error(GraphicsError::SwapchainError, "IDXGISwapChain3 cast"))?;
            self.swap_chain = Some(swap_chain);
        }

        debug!(
            target: GFX_TARGET,
            width = extent.width,
            height = extent.height,
            buffers = SWAP_BUFFER_COUNT,
            "Swap chain created"
        );
        Ok(())
    }

    /// 原地调整交换链缓冲大小，设备丢失时返回 `DeviceLost`
    pub(super) fn resize_buffers(&mut self, extent: Extent) -> Result<SurfaceStatus> {
        let swap_chain = self
            .swap_chain
            .as_ref()
            .ok_or_else(|| GraphicsError::SwapchainError("no swap chain to resize".to_string()))?;

        let result = unsafe {
            swap_chain.ResizeBuffers(
                SWAP_BUFFER_COUNT as u32,
                extent.width,
                extent.height,
                BACK_BUFFER_FORMAT,
                DXGI_SWAP_CHAIN_FLAG(0),
            )
        };

        match result {
            Ok(()) => Ok(SurfaceStatus::Ok),
            Err(e) => match device_lost_reason(e.code()) {
                Some(reason) => {
                    let removed = unsafe { self.device.GetDeviceRemovedReason() };
                    warn!(
                        target: GFX_TARGET,
                        ?reason,
                        removed_reason = ?removed.err().map(|e| e.code()),
                        "Device lost on ResizeBuffers"
                    );
                    Ok(SurfaceStatus::DeviceLost(reason))
                }
                None => Err(hr_error(GraphicsError::SwapchainError, "ResizeBuffers")(e)),
            },
        }
    }

    /// 为每个后缓冲创建 RTV
    pub(super) fn create_back_buffer_views(&mut self) -> Result<usize> {
        let swap_chain = self
            .swap_chain
            .as_ref()
            .ok_or_else(|| GraphicsError::ResourceCreation("no swap chain".to_string()))?;

        let rtv_desc = D3D12_RENDER_TARGET_VIEW_DESC {
            Format: BACK_BUFFER_FORMAT,
            ViewDimension: D3D12_RTV_DIMENSION_TEXTURE2D,
            ..Default::default()
        };

        for n in 0..SWAP_BUFFER_COUNT {
            unsafe {
                let buffer: ID3D12Resource = swap_chain
                    .GetBuffer(n as u32)
                    .map_err(hr_error(GraphicsError::ResourceCreation, "IDXGISwapChain::GetBuffer"))?;
                set_debug_name(&buffer, &debug_names::render_target(n));

                self.device
                    .CreateRenderTargetView(&buffer, Some(&rtv_desc), self.rtv_handle(n));
                self.render_targets[n] = Some(buffer);
            }
        }

        Ok(SWAP_BUFFER_COUNT)
    }

    /// 创建深度缓冲（DEPTH_WRITE，优化清除值 1.0）和 DSV
    pub(super) fn create_depth_buffer(&mut self, extent: Extent) -> Result<()> {
        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_DEFAULT,
            CreationNodeMask: 1,
            VisibleNodeMask: 1,
            ..Default::default()
        };

        let desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            Alignment: 0,
            Width: extent.width as u64,
            Height: extent.height,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: DEPTH_BUFFER_FORMAT,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            Flags: D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL,
        };

        let clear_value = D3D12_CLEAR_VALUE {
            Format: DEPTH_BUFFER_FORMAT,
            Anonymous: D3D12_CLEAR_VALUE_0 {
                DepthStencil: D3D12_DEPTH_STENCIL_VALUE { Depth: 1.0, Stencil: 0 },
            },
        };

        let dsv_desc = D3D12_DEPTH_STENCIL_VIEW_DESC {
            Format: DEPTH_BUFFER_FORMAT,
            ViewDimension: D3D12_DSV_DIMENSION_TEXTURE2D,
            ..Default::default()
        };

        unsafe {
            let mut depth_stencil: Option<ID3D12Resource> = None;
            self.device
                .CreateCommittedResource(
                    &heap_props,
                    D3D12_HEAP_FLAG_NONE,
                    &desc,
                    D3D12_RESOURCE_STATE_DEPTH_WRITE,
                    Some(&clear_value),
                    &mut depth_stencil,
                )
                .map_err(hr_error(GraphicsError::ResourceCreation, "CreateCommittedResource"))?;
            let depth_stencil = depth_stencil
                .ok_or_else(|| GraphicsError::ResourceCreation("depth stencil was not created".into()))?;
            set_debug_name(&depth_stencil, debug_names::DEPTH_STENCIL);

            self.device.CreateDepthStencilView(
                &depth_stencil,
                Some(&dsv_desc),
                self.dsv_heap.GetCPUDescriptorHandleForHeapStart(),
            );

            self.depth_stencil = Some(depth_stencil);
        }

        self.depth_extent = Some(extent);
        Ok(())
    }

    pub(super) fn rtv_handle(&self, slot: usize) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        let start = unsafe { self.rtv_heap.GetCPUDescriptorHandleForHeapStart() };
        D3D12_CPU_DESCRIPTOR_HANDLE {
            ptr: start.ptr + slot * self.rtv_descriptor_size,
        }
    }

    pub(super) fn dsv_handle(&self) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        unsafe { self.dsv_heap.GetCPUDescriptorHandleForHeapStart() }
    }
}
