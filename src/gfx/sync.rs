//! GPU 同步机制模块
//!
//! 提供 CPU-GPU 帧同步使用的 Fence 值类型和按后缓冲槽位索引的 Fence 值表。
//!
//! # 同步协议
//!
//! - 每个后缓冲槽位记录一个期望的 Fence 值
//! - 帧提交后，命令队列 signal 当前槽位的值
//! - 在 CPU 复用某个槽位（重置其命令分配器）之前，
//!   GPU 完成的 Fence 值必须不小于该槽位记录的值
//!
//! 槽位数量是编译期常量，所以这里使用定长数组而不是 `Vec`。

use super::backend::SWAP_BUFFER_COUNT;

/// Fence 值
///
/// 用于 CPU-GPU 同步的单调递增值。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FenceValue(u64);

impl FenceValue {
    /// 创建新的 Fence 值
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// 获取内部值
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// 递增 Fence 值
    pub fn increment(&mut self) {
        self.0 += 1;
    }

    /// 下一个 Fence 值
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// GPU 已完成的值是否覆盖了当前值
    pub fn is_reached_by(&self, completed: u64) -> bool {
        completed >= self.0
    }
}

impl From<u64> for FenceValue {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// 每个后缓冲槽位的 Fence 值表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFences {
    values: [FenceValue; SWAP_BUFFER_COUNT],
}

impl FrameFences {
    pub fn new() -> Self {
        Self {
            values: [FenceValue::default(); SWAP_BUFFER_COUNT],
        }
    }

    /// 槽位数量
    pub const fn len(&self) -> usize {
        SWAP_BUFFER_COUNT
    }

    pub const fn is_empty(&self) -> bool {
        SWAP_BUFFER_COUNT == 0
    }

    /// 获取槽位的期望 Fence 值
    ///
    /// # Panics
    ///
    /// 槽位越界时 panic（后缓冲索引总是来自交换链，越界属于程序错误）
    pub fn get(&self, slot: usize) -> FenceValue {
        self.values[slot]
    }

    /// 设置槽位的期望 Fence 值
    pub fn set(&mut self, slot: usize, value: FenceValue) {
        self.values[slot] = value;
    }

    /// 槽位的期望值加一
    pub fn increment(&mut self, slot: usize) {
        self.values[slot].increment();
    }

    /// 让所有槽位与给定槽位对齐
    ///
    /// 资源重建前所有在途的工作都已完成，各槽位从同一个值重新开始。
    pub fn resync_to(&mut self, slot: usize) {
        let value = self.values[slot];
        self.values = [value; SWAP_BUFFER_COUNT];
    }

    /// 回到初始状态（设备重建时使用）
    pub fn reset(&mut self) {
        self.values = [FenceValue::default(); SWAP_BUFFER_COUNT];
    }

    pub fn iter(&self) -> impl Iterator<Item = FenceValue> + '_ {
        self.values.iter().copied()
    }
}

impl Default for FrameFences {
    fn default() -> Self {
        Self::new()
    }
}
