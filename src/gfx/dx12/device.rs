//! DirectX 12 设备
//!
//! [`Dx12Factory`] 负责创建不依赖输出尺寸的对象：
//!
//! 1. 启用调试层（仅 Debug 构建，失败只记录警告）
//! 2. 创建 DXGI 工厂，选择适配器
//! 3. 创建 D3D12 设备，屏蔽一组已知无害的调试层消息
//! 4. 检查 Shader Model
//! 5. 创建命令队列、RTV/DSV 描述符堆、每个后缓冲一个命令分配器、命令列表
//! 6. 创建 Fence 和等待事件

use std::ffi::c_void;

use tracing::{debug, info, warn};
use windows::core::Interface;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Graphics::Direct3D::D3D_SHADER_MODEL;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::*;
use windows::Win32::System::Threading::{CreateEventA, WaitForSingleObjectEx, INFINITE};

use crate::core::error::{GraphicsError, Result};
use crate::core::log::GFX_TARGET;
use crate::gfx::adapter::select_adapter;
use crate::gfx::backend::{
    debug_names, AdapterInfo, ClearValues, DeviceFactory, DeviceSettings, Extent, GraphicsDevice, ResourceState,
    ShaderModel, SurfaceStatus, SWAP_BUFFER_COUNT,
};

use super::adapter::DxgiAdapterSource;
use super::surface::Win32Surface;
use super::{hr_error, set_debug_name};

/// DirectX 12 设备工厂
#[derive(Debug, Default)]
pub struct Dx12Factory;

impl Dx12Factory {
    pub fn new() -> Self {
        Self
    }
}

/// DirectX 12 设备
///
/// 独占命令队列、描述符堆、命令分配器、命令列表、Fence、交换链、
/// 渲染目标和深度缓冲。所有对象只在 UI 线程上使用。
pub struct Dx12Device {
    pub(super) dxgi_factory: IDXGIFactory4,
    pub(super) device: ID3D12Device,
    pub(super) queue: ID3D12CommandQueue,

    pub(super) rtv_heap: ID3D12DescriptorHeap,
    pub(super) dsv_heap: ID3D12DescriptorHeap,
    pub(super) rtv_descriptor_size: usize,

    pub(super) command_allocators: [ID3D12CommandAllocator; SWAP_BUFFER_COUNT],
    pub(super) command_list: ID3D12GraphicsCommandList,

    pub(super) fence: ID3D12Fence,
    pub(super) fence_event: HANDLE,

    pub(super) swap_chain: Option<IDXGISwapChain3>,
    pub(super) render_targets: [Option<ID3D12Resource>; SWAP_BUFFER_COUNT],
    pub(super) depth_stencil: Option<ID3D12Resource>,
    pub(super) depth_extent: Option<Extent>,

    pub(super) adapter_info: AdapterInfo,
}

/// 启用调试层，返回创建 DXGI 工厂使用的标志
fn enable_debug_layer() -> DXGI_CREATE_FACTORY_FLAGS {
    let mut flags = DXGI_CREATE_FACTORY_FLAGS(0);

    unsafe {
        let mut debug: Option<ID3D12Debug> = None;
        match D3D12GetDebugInterface(&mut debug) {
            Ok(()) => {
                if let Some(debug) = debug {
                    debug.EnableDebugLayer();
                    debug!(target: GFX_TARGET, "Direct3D debug layer enabled");
                }
            }
            Err(e) => warn!(target: GFX_TARGET, "Direct3D Debug Device is not available: {}", e),
        }

        if let Ok(info_queue) = DXGIGetDebugInterface1::<IDXGIInfoQueue>(0) {
            flags = DXGI_CREATE_FACTORY_DEBUG;
            let _ = info_queue.SetBreakOnSeverity(DXGI_DEBUG_ALL, DXGI_INFO_QUEUE_MESSAGE_SEVERITY_ERROR, true);
            let _ = info_queue.SetBreakOnSeverity(DXGI_DEBUG_ALL, DXGI_INFO_QUEUE_MESSAGE_SEVERITY_CORRUPTION, true);
        }
    }

    flags
}

/// 调试层中断并屏蔽已知无害的消息
fn configure_info_queue(device: &ID3D12Device) {
    let Ok(info_queue) = device.cast::<ID3D12InfoQueue>() else {
        return;
    };

    let mut hide = [
        D3D12_MESSAGE_ID_MAP_INVALID_NULLRANGE,
        D3D12_MESSAGE_ID_UNMAP_INVALID_NULLRANGE,
        // 使用 Windows 10 的 Graphics Tools 时交换链出现在调试层输出里
        D3D12_MESSAGE_ID_EXECUTECOMMANDLISTS_WRONGSWAPCHAINBUFFERREFERENCE,
        D3D12_MESSAGE_ID_RESOURCE_BARRIER_MISMATCHING_COMMAND_LIST_TYPE,
    ];

    let filter = D3D12_INFO_QUEUE_FILTER {
        DenyList: D3D12_INFO_QUEUE_FILTER_DESC {
            NumIDs: hide.len() as u32,
            pIDList: hide.as_mut_ptr(),
            ..Default::default()
        },
        ..Default::default()
    };

    unsafe {
        let _ = info_queue.SetBreakOnSeverity(D3D12_MESSAGE_SEVERITY_CORRUPTION, true);
        let _ = info_queue.SetBreakOnSeverity(D3D12_MESSAGE_SEVERITY_ERROR, true);
        let _ = info_queue.AddStorageFilterEntries(&filter);
    }
}

fn supports_shader_model(device: &ID3D12Device, required: ShaderModel) -> bool {
    let required = D3D_SHADER_MODEL(((required.major as i32) << 4) | required.minor as i32);
    let mut data = D3D12_FEATURE_DATA_SHADER_MODEL { HighestShaderModel: required };

    let queried = unsafe {
        device.CheckFeatureSupport(
            D3D12_FEATURE_SHADER_MODEL,
            &mut data as *mut _ as *mut c_void,
            std::mem::size_of::<D3D12_FEATURE_DATA_SHADER_MODEL>() as u32,
        )
    };

    queried.is_ok() && data.HighestShaderModel.0 >= required.0
}

fn create_descriptor_heap(
    device: &ID3D12Device,
    heap_type: D3D12_DESCRIPTOR_HEAP_TYPE,
    count: u32,
    name: &str,
) -> Result<ID3D12DescriptorHeap> {
    let desc = D3D12_DESCRIPTOR_HEAP_DESC {
        Type: heap_type,
        NumDescriptors: count,
        Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
        NodeMask: 0,
    };

    let heap: ID3D12DescriptorHeap = unsafe { device.CreateDescriptorHeap(&desc) }
        .map_err(hr_error(GraphicsError::DeviceCreation, "CreateDescriptorHeap"))?;
    set_debug_name(&heap, name);
    Ok(heap)
}

impl DeviceFactory for Dx12Factory {
    type Device = Dx12Device;

    fn create_device(&mut self, settings: &DeviceSettings, initial_fence_value: u64) -> Result<Dx12Device> {
        let factory_flags = if settings.debug_layer {
            enable_debug_layer()
        } else {
            DXGI_CREATE_FACTORY_FLAGS(0)
        };

        let dxgi_factory: IDXGIFactory4 = unsafe { CreateDXGIFactory2(factory_flags) }
            .map_err(hr_error(GraphicsError::DeviceCreation, "CreateDXGIFactory2"))?;

        let selected = select_adapter(
            &DxgiAdapterSource::new(&dxgi_factory),
            settings.min_feature_level,
            settings.warp_fallback,
        )?;

        let mut device: Option<ID3D12Device> = None;
        unsafe { D3D12CreateDevice(&selected.adapter, settings.min_feature_level.to_d3d(), &mut device) }
            .map_err(hr_error(GraphicsError::DeviceCreation, "D3D12CreateDevice"))?;
        let device = device
            .ok_or_else(|| GraphicsError::DeviceCreation("D3D12CreateDevice returned no device".into()))?;
        set_debug_name(&device, debug_names::DEVICE);

        if settings.debug_layer {
            configure_info_queue(&device);
        }

        if !supports_shader_model(&device, settings.min_shader_model) {
            return Err(GraphicsError::UnsupportedHardware(format!(
                "Shader Model {} is not supported by {}",
                settings.min_shader_model, selected.info.description
            ))
            .into());
        }

        unsafe {
            let queue_desc = D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
                ..Default::default()
            };
            let queue: ID3D12CommandQueue = device
                .CreateCommandQueue(&queue_desc)
                .map_err(hr_error(GraphicsError::DeviceCreation, "CreateCommandQueue"))?;
            set_debug_name(&queue, debug_names::COMMAND_QUEUE);

            let rtv_heap = create_descriptor_heap(
                &device,
                D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
                SWAP_BUFFER_COUNT as u32,
                debug_names::RTV_HEAP,
            )?;
            let rtv_descriptor_size = device.GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_RTV) as usize;
            let dsv_heap = create_descriptor_heap(&device, D3D12_DESCRIPTOR_HEAP_TYPE_DSV, 1, debug_names::DSV_HEAP)?;

            let mut allocators = Vec::with_capacity(SWAP_BUFFER_COUNT);
            for n in 0..SWAP_BUFFER_COUNT {
                let allocator: ID3D12CommandAllocator = device
                    .CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)
                    .map_err(hr_error(GraphicsError::DeviceCreation, "CreateCommandAllocator"))?;
                set_debug_name(&allocator, &debug_names::command_allocator(n));
                allocators.push(allocator);
            }
            let command_allocators: [ID3D12CommandAllocator; SWAP_BUFFER_COUNT] = allocators
                .try_into()
                .map_err(|_| GraphicsError::DeviceCreation("command allocator count mismatch".into()))?;

            let command_list: ID3D12GraphicsCommandList = device
                .CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &command_allocators[0], None)
                .map_err(hr_error(GraphicsError::DeviceCreation, "CreateCommandList"))?;
            command_list
                .Close()
                .map_err(hr_error(GraphicsError::DeviceCreation, "ID3D12GraphicsCommandList::Close"))?;
            set_debug_name(&command_list, debug_names::COMMAND_LIST);

            let fence: ID3D12Fence = device
                .CreateFence(initial_fence_value, D3D12_FENCE_FLAG_NONE)
                .map_err(hr_error(GraphicsError::SyncObjectCreation, "CreateFence"))?;
            set_debug_name(&fence, debug_names::FENCE);

            let fence_event = CreateEventA(None, false, false, None)
                .map_err(hr_error(GraphicsError::SyncObjectCreation, "CreateEvent"))?;

            info!(
                target: GFX_TARGET,
                feature_level = settings.min_feature_level.name(),
                rtv_descriptor_size,
                "Direct3D 12 device created"
            );

            Ok(Dx12Device {
                dxgi_factory,
                device,
                queue,
                rtv_heap,
                dsv_heap,
                rtv_descriptor_size,
                command_allocators,
                command_list,
                fence,
                fence_event,
                swap_chain: None,
                render_targets: Default::default(),
                depth_stencil: None,
                depth_extent: None,
                adapter_info: selected.info,
            })
        }
    }
}

impl Dx12Device {
    /// 底层 D3D12 设备
    pub fn d3d_device(&self) -> &ID3D12Device {
        &self.device
    }

    pub fn command_queue(&self) -> &ID3D12CommandQueue {
        &self.queue
    }

    pub(super) fn wait_on_fence(&mut self, value: u64) -> Result<()> {
        unsafe {
            if self.fence.GetCompletedValue() < value {
                self.fence
                    .SetEventOnCompletion(value, self.fence_event)
                    .map_err(hr_error(GraphicsError::Synchronization, "SetEventOnCompletion"))?;
                WaitForSingleObjectEx(self.fence_event, INFINITE, false);
            }
        }
        Ok(())
    }
}

impl GraphicsDevice for Dx12Device {
    type Surface = Win32Surface;

    fn adapter_info(&self) -> &AdapterInfo {
        &self.adapter_info
    }

    fn signal(&mut self, value: u64) -> Result<()> {
        unsafe { self.queue.Signal(&self.fence, value) }
            .map_err(hr_error(GraphicsError::Synchronization, "ID3D12CommandQueue::Signal"))
    }

    fn completed_value(&self) -> u64 {
        unsafe { self.fence.GetCompletedValue() }
    }

    fn wait_for_value(&mut self, value: u64) -> Result<()> {
        self.wait_on_fence(value)
    }

    fn has_swap_chain(&self) -> bool {
        self.swap_chain.is_some()
    }

    fn release_back_buffers(&mut self) {
        self.render_targets = Default::default();
        self.depth_stencil = None;
        self.depth_extent = None;
    }

    fn resize_swap_chain(&mut self, extent: Extent) -> Result<SurfaceStatus> {
        self.resize_buffers(extent)
    }

    fn create_swap_chain(&mut self, surface: &Win32Surface, extent: Extent) -> Result<()> {
        self.create_swap_chain_for_hwnd(surface, extent)
    }

    fn create_render_target_views(&mut self) -> Result<usize> {
        self.create_back_buffer_views()
    }

    fn current_back_buffer_index(&self) -> usize {
        self.swap_chain
            .as_ref()
            .map(|swap_chain| unsafe { swap_chain.GetCurrentBackBufferIndex() } as usize)
            .unwrap_or(0)
    }

    fn create_depth_stencil(&mut self, extent: Extent) -> Result<()> {
        self.create_depth_buffer(extent)
    }

    fn depth_stencil_extent(&self) -> Option<Extent> {
        self.depth_extent
    }

    fn reset_commands(&mut self, slot: usize) -> Result<()> {
        self.reset_command_list(slot)
    }

    fn transition_back_buffer(&mut self, slot: usize, before: ResourceState, after: ResourceState) -> Result<()> {
        self.record_transition(slot, before, after)
    }

    fn clear_targets(&mut self, slot: usize, clear: &ClearValues) -> Result<()> {
        self.record_clear(slot, clear)
    }

    fn set_viewport(&mut self, extent: Extent) {
        self.record_viewport(extent)
    }

    fn submit(&mut self) -> Result<()> {
        self.execute_command_list()
    }

    fn present(&mut self, sync_interval: u32) -> Result<SurfaceStatus> {
        self.present_back_buffer(sync_interval)
    }
}

impl Drop for Dx12Device {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.fence_event);
        }
    }
}
