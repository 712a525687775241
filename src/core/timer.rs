//! 帧计时器
//!
//! 支持可变步长和固定步长两种更新模式。
//! 固定步长模式下，`tick` 会按目标间隔累积时间，并为每个完整的步长调用一次更新回调；
//! 帧数在第一次更新之前保持为 0，渲染层据此跳过第一帧。

use std::time::{Duration, Instant};

/// 每秒的 tick 数（100ns 精度）
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// 单次 tick 允许的最大时间增量，调试器中断后避免追赶过多的固定步长
const MAX_DELTA_TICKS: u64 = TICKS_PER_SECOND / 10;

/// 固定步长模式下视为“刚好一个步长”的误差范围
const FIXED_STEP_TOLERANCE_TICKS: u64 = TICKS_PER_SECOND / 4000;

pub fn seconds_to_ticks(seconds: f64) -> u64 {
    (seconds * TICKS_PER_SECOND as f64) as u64
}

pub fn ticks_to_seconds(ticks: u64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

fn duration_to_ticks(duration: Duration) -> u64 {
    duration.as_secs() * TICKS_PER_SECOND + u64::from(duration.subsec_nanos()) / 100
}

/// 步进计时器
#[derive(Debug, Clone)]
pub struct StepTimer {
    last_instant: Instant,

    elapsed_ticks: u64,
    total_ticks: u64,
    left_over_ticks: u64,

    frame_count: u32,
    frames_per_second: u32,
    frames_this_second: u32,
    second_counter: u64,

    fixed_time_step: bool,
    target_elapsed_ticks: u64,
}

impl StepTimer {
    pub fn new() -> Self {
        Self {
            last_instant: Instant::now(),
            elapsed_ticks: 0,
            total_ticks: 0,
            left_over_ticks: 0,
            frame_count: 0,
            frames_per_second: 0,
            frames_this_second: 0,
            second_counter: 0,
            fixed_time_step: false,
            target_elapsed_ticks: TICKS_PER_SECOND / 60,
        }
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks
    }

    pub fn elapsed_seconds(&self) -> f64 {
        ticks_to_seconds(self.elapsed_ticks)
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn total_seconds(&self) -> f64 {
        ticks_to_seconds(self.total_ticks)
    }

    /// 自启动以来执行过的更新次数
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn frames_per_second(&self) -> u32 {
        self.frames_per_second
    }

    pub fn is_fixed_time_step(&self) -> bool {
        self.fixed_time_step
    }

    pub fn set_fixed_time_step(&mut self, fixed: bool) {
        self.fixed_time_step = fixed;
    }

    pub fn set_target_elapsed_ticks(&mut self, ticks: u64) {
        self.target_elapsed_ticks = ticks.max(1);
    }

    pub fn set_target_elapsed_seconds(&mut self, seconds: f64) {
        self.set_target_elapsed_ticks(seconds_to_ticks(seconds));
    }

    pub fn target_elapsed_ticks(&self) -> u64 {
        self.target_elapsed_ticks
    }

    /// 在一段刻意的停顿（例如挂起、阻塞的 IO）之后调用，
    /// 避免固定步长逻辑为了追赶而连续执行大量更新。
    pub fn reset_elapsed_time(&mut self) {
        self.last_instant = Instant::now();
        self.left_over_ticks = 0;
        self.frames_per_second = 0;
        self.frames_this_second = 0;
        self.second_counter = 0;
    }

    /// 按真实时钟推进计时器，必要时调用 `update`
    pub fn tick<F: FnMut(&StepTimer)>(&mut self, update: F) {
        let now = Instant::now();
        let delta = now.saturating_duration_since(self.last_instant);
        self.last_instant = now;
        self.advance(duration_to_ticks(delta), update);
    }

    /// 按给定的时间增量推进计时器
    pub fn tick_with<F: FnMut(&StepTimer)>(&mut self, delta: Duration, update: F) {
        self.last_instant = Instant::now();
        self.advance(duration_to_ticks(delta), update);
    }

    fn advance<F: FnMut(&StepTimer)>(&mut self, delta_ticks: u64, mut update: F) {
        self.second_counter += delta_ticks;

        let mut time_delta = delta_ticks.min(MAX_DELTA_TICKS);
        let last_frame_count = self.frame_count;

        if self.fixed_time_step {
            // 与目标间隔足够接近时直接视为一个步长，避免微小误差累积出多余的更新
            if time_delta.abs_diff(self.target_elapsed_ticks) < FIXED_STEP_TOLERANCE_TICKS {
                time_delta = self.target_elapsed_ticks;
            }

            self.left_over_ticks += time_delta;

            while self.left_over_ticks >= self.target_elapsed_ticks {
                self.elapsed_ticks = self.target_elapsed_ticks;
                self.total_ticks += self.target_elapsed_ticks;
                self.left_over_ticks -= self.target_elapsed_ticks;
                self.frame_count += 1;

                update(self);
            }
        } else {
            self.elapsed_ticks = time_delta;
            self.total_ticks += time_delta;
            self.left_over_ticks = 0;
            self.frame_count += 1;

            update(self);
        }

        if self.frame_count != last_frame_count {
            self.frames_this_second += 1;
        }

        if self.second_counter >= TICKS_PER_SECOND {
            self.frames_per_second = self.frames_this_second;
            self.frames_this_second = 0;
            self.second_counter %= TICKS_PER_SECOND;
        }
    }
}

impl Default for StepTimer {
    fn default() -> Self {
        Self::new()
    }
}
