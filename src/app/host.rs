//! 窗口宿主状态
//!
//! `HostState` 记录单个窗口的最小化、挂起和全屏状态，
//! 把 winit 事件转换为 [`LifecycleEvent`]，由渲染器依次处理。
//!
//! # 状态转换
//!
//! ```text
//! Resized(0, 0)      → 最小化，未挂起时发出 Suspending
//! Resized(w, h)      → 从最小化恢复时发出 Resuming，随后发出 SizeChanged
//! Focused(bool)      → Activated / Deactivated
//! Suspended/Resumed  → Suspending / Resuming（与最小化共用挂起标志）
//! Alt + Enter        → ToggleFullscreen
//! ```

use tracing::debug;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{Key, NamedKey};

/// 发给渲染器的生命周期通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Activated,
    Deactivated,
    Suspending,
    Resuming,
    SizeChanged { width: u32, height: u32 },
    ToggleFullscreen,
    CloseRequested,
}

/// 窗口化时的位置和客户区大小
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlacement {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// 全屏切换的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenChange {
    /// 进入全屏
    Enter,
    /// 退出全屏，恢复保存的窗口化位置
    Exit(Option<WindowPlacement>),
}

type SizeChangeHandler = Box<dyn FnMut(u32, u32)>;

/// 单个窗口的宿主状态
pub struct HostState {
    minimized: bool,
    in_suspend: bool,
    fullscreen: bool,
    alt_down: bool,
    saved: Option<WindowPlacement>,
    size_handlers: Vec<SizeChangeHandler>,
}

impl HostState {
    pub fn new() -> Self {
        Self {
            minimized: false,
            in_suspend: false,
            fullscreen: false,
            alt_down: false,
            saved: None,
            size_handlers: Vec::new(),
        }
    }

    /// 注册尺寸变化回调，每次发出 `SizeChanged` 时调用
    pub fn add_size_change_handler<H>(&mut self, handler: H)
    where
        H: FnMut(u32, u32) + 'static,
    {
        self.size_handlers.push(Box::new(handler));
    }

    /// 转换一个窗口事件
    ///
    /// # 返回值
    ///
    /// 需要转发给渲染器的事件，按顺序处理
    pub fn on_window_event(&mut self, event: &WindowEvent) -> Vec<LifecycleEvent> {
        match event {
            WindowEvent::Resized(size) => self.on_resized(size.width, size.height),
            WindowEvent::Focused(focused) => vec![self.on_focus(*focused)],
            WindowEvent::CloseRequested => vec![LifecycleEvent::CloseRequested],
            WindowEvent::ModifiersChanged(modifiers) => {
                self.on_modifiers(modifiers.state().alt_key());
                Vec::new()
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let enter = matches!(event.logical_key, Key::Named(NamedKey::Enter));
                if enter && event.state == ElementState::Pressed {
                    self.on_enter_pressed(event.repeat).into_iter().collect()
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    /// 客户区尺寸变化，0×0 表示最小化
    pub fn on_resized(&mut self, width: u32, height: u32) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();

        if width == 0 || height == 0 {
            if !self.minimized {
                self.minimized = true;
                if !self.in_suspend {
                    events.push(LifecycleEvent::Suspending);
                }
                self.in_suspend = true;
            }
            return events;
        }

        if self.minimized {
            self.minimized = false;
            if self.in_suspend {
                events.push(LifecycleEvent::Resuming);
            }
            self.in_suspend = false;
        }

        for handler in self.size_handlers.iter_mut() {
            handler(width, height);
        }
        events.push(LifecycleEvent::SizeChanged { width, height });
        events
    }

    pub fn on_focus(&mut self, focused: bool) -> LifecycleEvent {
        if focused {
            LifecycleEvent::Activated
        } else {
            LifecycleEvent::Deactivated
        }
    }

    /// 应用被系统挂起
    pub fn on_app_suspended(&mut self) -> Option<LifecycleEvent> {
        if self.in_suspend {
            return None;
        }
        self.in_suspend = true;
        Some(LifecycleEvent::Suspending)
    }

    /// 应用从系统挂起恢复，仍处于最小化时保持挂起
    pub fn on_app_resumed(&mut self) -> Option<LifecycleEvent> {
        if !self.in_suspend || self.minimized {
            return None;
        }
        self.in_suspend = false;
        Some(LifecycleEvent::Resuming)
    }

    pub fn on_modifiers(&mut self, alt: bool) {
        self.alt_down = alt;
    }

    /// Alt + Enter 切换全屏，忽略按键重复
    pub fn on_enter_pressed(&mut self, repeat: bool) -> Option<LifecycleEvent> {
        (self.alt_down && !repeat).then_some(LifecycleEvent::ToggleFullscreen)
    }

    /// 保存窗口化时的位置和大小
    pub fn capture_state(&mut self, placement: WindowPlacement) {
        self.saved = Some(placement);
    }

    pub fn saved_state(&self) -> Option<WindowPlacement> {
        self.saved
    }

    /// 切换全屏标志
    ///
    /// # 参数
    ///
    /// * `current` - 当前的窗口化位置，进入全屏时保存
    pub fn toggle_fullscreen(&mut self, current: WindowPlacement) -> FullscreenChange {
        self.fullscreen = !self.fullscreen;
        if self.fullscreen {
            self.capture_state(current);
            debug!(?current, "Entering fullscreen");
            FullscreenChange::Enter
        } else {
            debug!(saved = ?self.saved, "Leaving fullscreen");
            FullscreenChange::Exit(self.saved)
        }
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    pub fn is_suspended(&self) -> bool {
        self.in_suspend
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }
}

impl Default for HostState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use winit::dpi::PhysicalSize;

    fn placement() -> WindowPlacement {
        WindowPlacement { x: 100, y: 50, width: 1280, height: 720 }
    }

    #[test]
    fn test_resize_emits_size_changed() {
        let mut host = HostState::new();
        let events = host.on_window_event(&WindowEvent::Resized(PhysicalSize::new(800, 600)));
        assert_eq!(events, vec![LifecycleEvent::SizeChanged { width: 800, height: 600 }]);
    }

    #[test]
    fn test_minimize_and_restore() {
        let mut host = HostState::new();

        assert_eq!(host.on_resized(0, 0), vec![LifecycleEvent::Suspending]);
        assert!(host.is_minimized());
        assert!(host.is_suspended());

        // 重复的最小化消息不再发出通知
        assert!(host.on_resized(0, 0).is_empty());

        assert_eq!(
            host.on_resized(1280, 720),
            vec![
                LifecycleEvent::Resuming,
                LifecycleEvent::SizeChanged { width: 1280, height: 720 },
            ]
        );
        assert!(!host.is_minimized());
        assert!(!host.is_suspended());
    }

    #[test]
    fn test_app_suspend_while_minimized() {
        let mut host = HostState::new();

        assert_eq!(host.on_app_suspended(), Some(LifecycleEvent::Suspending));
        // 已挂起，最小化不再发出 Suspending
        assert!(host.on_resized(0, 0).is_empty());
        // 仍然最小化，应用恢复时不恢复渲染
        assert_eq!(host.on_app_resumed(), None);

        assert_eq!(host.on_resized(640, 480)[0], LifecycleEvent::Resuming);
        assert_eq!(host.on_app_resumed(), None);
    }

    #[test]
    fn test_focus() {
        let mut host = HostState::new();
        assert_eq!(host.on_window_event(&WindowEvent::Focused(true)), vec![LifecycleEvent::Activated]);
        assert_eq!(host.on_window_event(&WindowEvent::Focused(false)), vec![LifecycleEvent::Deactivated]);
    }

    #[test]
    fn test_close_requested() {
        let mut host = HostState::new();
        assert_eq!(
            host.on_window_event(&WindowEvent::CloseRequested),
            vec![LifecycleEvent::CloseRequested]
        );
    }

    #[test]
    fn test_alt_enter_toggles_fullscreen() {
        let mut host = HostState::new();
        assert_eq!(host.on_enter_pressed(false), None);

        host.on_modifiers(true);
        assert_eq!(host.on_enter_pressed(false), Some(LifecycleEvent::ToggleFullscreen));
        assert_eq!(host.on_enter_pressed(true), None);

        host.on_modifiers(false);
        assert_eq!(host.on_enter_pressed(false), None);
    }

    #[test]
    fn test_fullscreen_restores_saved_placement() {
        let mut host = HostState::new();
        assert!(host.saved_state().is_none());

        assert_eq!(host.toggle_fullscreen(placement()), FullscreenChange::Enter);
        assert!(host.is_fullscreen());
        assert_eq!(host.saved_state(), Some(placement()));

        let fullscreen = WindowPlacement { x: 0, y: 0, width: 1920, height: 1080 };
        assert_eq!(host.toggle_fullscreen(fullscreen), FullscreenChange::Exit(Some(placement())));
        assert!(!host.is_fullscreen());
    }

    #[test]
    fn test_size_change_handlers() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut host = HostState::new();

        let sink = Rc::clone(&seen);
        host.add_size_change_handler(move |w, h| sink.borrow_mut().push((w, h)));

        host.on_resized(800, 600);
        host.on_resized(0, 0);
        host.on_resized(1024, 768);

        assert_eq!(*seen.borrow(), vec![(800, 600), (1024, 768)]);
    }
}
