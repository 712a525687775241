//! DXGI 适配器枚举

use windows::Win32::Graphics::Direct3D::{
    D3D_FEATURE_LEVEL, D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_11_1, D3D_FEATURE_LEVEL_12_0,
    D3D_FEATURE_LEVEL_12_1,
};
use windows::Win32::Graphics::Direct3D12::{D3D12CreateDevice, ID3D12Device};
use windows::Win32::Graphics::Dxgi::{IDXGIAdapter1, IDXGIFactory4, DXGI_ADAPTER_FLAG_SOFTWARE, DXGI_ERROR_NOT_FOUND};

use crate::core::error::{GraphicsError, Result};
use crate::gfx::backend::{AdapterInfo, AdapterSource, FeatureLevel};

use super::hr_error;

impl FeatureLevel {
    pub fn to_d3d(self) -> D3D_FEATURE_LEVEL {
        match self {
            FeatureLevel::Level11_0 => D3D_FEATURE_LEVEL_11_0,
            FeatureLevel::Level11_1 => D3D_FEATURE_LEVEL_11_1,
            FeatureLevel::Level12_0 => D3D_FEATURE_LEVEL_12_0,
            FeatureLevel::Level12_1 => D3D_FEATURE_LEVEL_12_1,
        }
    }
}

/// 通过 DXGI 工厂枚举适配器
pub struct DxgiAdapterSource {
    factory: IDXGIFactory4,
}

impl DxgiAdapterSource {
    pub fn new(factory: &IDXGIFactory4) -> Self {
        Self { factory: factory.clone() }
    }
}

impl AdapterSource for DxgiAdapterSource {
    type Adapter = IDXGIAdapter1;

    fn adapter(&self, index: u32) -> Result<Option<IDXGIAdapter1>> {
        match unsafe { self.factory.EnumAdapters1(index) } {
            Ok(adapter) => Ok(Some(adapter)),
            Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => Ok(None),
            Err(e) => Err(hr_error(GraphicsError::NoSuitableAdapter, "EnumAdapters1")(e)),
        }
    }

    fn info(&self, adapter: &IDXGIAdapter1) -> Result<AdapterInfo> {
        let desc = unsafe { adapter.GetDesc1() }
            .map_err(hr_error(GraphicsError::NoSuitableAdapter, "GetDesc1"))?;

        let len = desc.Description.iter().position(|&c| c == 0).unwrap_or(desc.Description.len());
        Ok(AdapterInfo {
            description: String::from_utf16_lossy(&desc.Description[..len]),
            vendor_id: desc.VendorId,
            device_id: desc.DeviceId,
            dedicated_video_memory: desc.DedicatedVideoMemory as u64,
            software: (desc.Flags & DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32) != 0,
        })
    }

    fn supports(&self, adapter: &IDXGIAdapter1, level: FeatureLevel) -> bool {
        // 只检查能否创建，不保留设备
        unsafe {
            D3D12CreateDevice(adapter, level.to_d3d(), std::ptr::null_mut::<Option<ID3D12Device>>()).is_ok()
        }
    }

    fn warp_adapter(&self) -> Result<IDXGIAdapter1> {
        unsafe { self.factory.EnumWarpAdapter() }
            .map_err(hr_error(GraphicsError::NoSuitableAdapter, "EnumWarpAdapter"))
    }
}
