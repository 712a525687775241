//! 每帧的命令录制、提交和 Present

use std::mem::ManuallyDrop;

use tracing::{trace, warn};
use windows::core::Interface;
use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::DXGI_PRESENT;

use crate::core::error::{GraphicsError, Result};
use crate::core::log::GFX_TARGET;
use crate::gfx::backend::{ClearValues, Extent, ResourceState, SurfaceStatus};

use super::device::Dx12Device;
use super::{device_lost_reason, hr_error};

impl ResourceState {
    fn to_d3d(self) -> D3D12_RESOURCE_STATES {
        match self {
            ResourceState::Present => D3D12_RESOURCE_STATE_PRESENT,
            ResourceState::RenderTarget => D3D12_RESOURCE_STATE_RENDER_TARGET,
        }
    }
}

impl Dx12Device {
    fn back_buffer(&self, slot: usize) -> Result<&ID3D12Resource> {
        self.render_targets[slot].as_ref().ok_or_else(|| {
            GraphicsError::CommandExecution(format!("render target {} is not created", slot)).into()
        })
    }

    /// 重置槽位的命令分配器并重新打开命令列表
    pub(super) fn reset_command_list(&mut self, slot: usize) -> Result<()> {
        let allocator = &self.command_allocators[slot];
        unsafe {
            allocator
                .Reset()
                .map_err(hr_error(GraphicsError::CommandExecution, "ID3D12CommandAllocator::Reset"))?;
            self.command_list
                .Reset(allocator, None)
                .map_err(hr_error(GraphicsError::CommandExecution, "ID3D12GraphicsCommandList::Reset"))?;
        }
        Ok(())
    }

    pub(super) fn record_transition(&mut self, slot: usize, before: ResourceState, after: ResourceState) -> Result<()> {
        let resource = self.back_buffer(slot)?.clone();

        let barrier = D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                    pResource: ManuallyDrop::new(Some(resource)),
                    Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                    StateBefore: before.to_d3d(),
                    StateAfter: after.to_d3d(),
                }),
            },
        };

        let barriers = [barrier];
        unsafe {
            self.command_list.ResourceBarrier(&barriers);

            // 释放 barrier 持有的资源引用
            let [barrier] = barriers;
            let transition = ManuallyDrop::into_inner(barrier.Anonymous.Transition);
            drop(ManuallyDrop::into_inner(transition.pResource));
        }
        Ok(())
    }

    pub(super) fn record_clear(&mut self, slot: usize, clear: &ClearValues) -> Result<()> {
        self.back_buffer(slot)?;
        if self.depth_stencil.is_none() {
            return Err(GraphicsError::CommandExecution("depth stencil is not created".into()).into());
        }

        let rtv = self.rtv_handle(slot);
        let dsv = self.dsv_handle();

        unsafe {
            self.command_list.OMSetRenderTargets(1, Some(&rtv), false, Some(&dsv));
            self.command_list.ClearRenderTargetView(rtv, &clear.color, None);
            self.command_list
                .ClearDepthStencilView(dsv, D3D12_CLEAR_FLAG_DEPTH, clear.depth, 0, None);
        }
        Ok(())
    }

    pub(super) fn record_viewport(&mut self, extent: Extent) {
        let viewport = D3D12_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: extent.width as f32,
            Height: extent.height as f32,
            MinDepth: D3D12_MIN_DEPTH,
            MaxDepth: D3D12_MAX_DEPTH,
        };
        let scissor = RECT {
            left: 0,
            top: 0,
            right: extent.width as i32,
            bottom: extent.height as i32,
        };

        unsafe {
            self.command_list.RSSetViewports(&[viewport]);
            self.command_list.RSSetScissorRects(&[scissor]);
        }
    }

    /// 关闭命令列表并提交到队列
    pub(super) fn execute_command_list(&mut self) -> Result<()> {
        unsafe {
            self.command_list
                .Close()
                .map_err(hr_error(GraphicsError::CommandExecution, "ID3D12GraphicsCommandList::Close"))?;

            let command_list: ID3D12CommandList = self
                .command_list
                .cast()
                .map_err(hr_error(GraphicsError::CommandExecution, "ID3D12CommandList cast"))?;
            self.queue.ExecuteCommandLists(&[Some(command_list)]);
        }
        Ok(())
    }

    /// 呈现当前后缓冲，设备丢失时返回 `DeviceLost`
    pub(super) fn present_back_buffer(&mut self, sync_interval: u32) -> Result<SurfaceStatus> {
        let swap_chain = self
            .swap_chain
            .as_ref()
            .ok_or_else(|| GraphicsError::SwapchainError("present without a swap chain".to_string()))?;

        let hr = unsafe { swap_chain.Present(sync_interval, DXGI_PRESENT(0)) };

        if let Some(reason) = device_lost_reason(hr) {
            let removed = unsafe { self.device.GetDeviceRemovedReason() };
            warn!(
                target: GFX_TARGET,
                ?reason,
                removed_reason = ?removed.err().map(|e| e.code()),
                "Device lost on Present"
            );
            return Ok(SurfaceStatus::DeviceLost(reason));
        }

        hr.ok().map_err(hr_error(GraphicsError::SwapchainError, "IDXGISwapChain::Present"))?;
        trace!(target: GFX_TARGET, sync_interval, "Presented");
        Ok(SurfaceStatus::Ok)
    }
}
