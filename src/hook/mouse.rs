/*
============================================================================
マウスフック管理モジュール (mouse.rs)
============================================================================

【ファイル概要】
WH_MOUSE_LL フックの解釈処理。MSLLHOOKSTRUCT を MouseEvent に変換し、
登録されたハンドラーへ配信する。

【技術仕様】
- ボタン：左 / 右 / 中 / XBUTTON1 / XBUTTON2（mouseData の上位ワードで判別）
- ホイール：mouseData の上位ワードを符号付きで読む（WHEEL_DELTA = 120 単位）
- 移動：高頻度のため report_moves が有効な時だけ通知

============================================================================
*/

use std::{
    ops::{Deref, DerefMut},
    sync::{Arc, PoisonError, RwLock},
};

use crate::{
    api::{self, HookApi, HookKind},
    constants::*,
    error::{BoxError, HookError},
    hook::{HookContext, HookManager, Interpret, read_event},
    keys::Key,
};

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// MSLLHOOKSTRUCT
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct MsLlHookStruct {
    pub pt: Point,
    pub mouse_data: u32,
    pub flags: u32,
    pub time: u32,
    pub extra_info: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    Move,
    Down(Key),
    Up(Key),
    Wheel,
    HWheel,
}

#[derive(Debug, Clone)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub position: Point,
    /// ホイールの回転量（それ以外は 0）
    pub delta: i16,
    pub is_injected: bool,
    pub time: u32,
    pub handled: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MouseOptions {
    pub handling: bool,
    pub report_moves: bool,
}

impl MouseOptions {
    pub fn handling(mut self, on: bool) -> Self {
        self.handling = on;
        self
    }

    pub fn report_moves(mut self, on: bool) -> Self {
        self.report_moves = on;
        self
    }
}

type MouseHandler = Box<dyn Fn(&mut MouseEvent) -> Result<(), BoxError> + Send + Sync>;

pub struct MouseInterpreter {
    options: MouseOptions,
    handlers: RwLock<Vec<MouseHandler>>,
}

impl MouseInterpreter {
    pub fn new(options: MouseOptions) -> Self {
        Self {
            options,
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn options(&self) -> MouseOptions {
        self.options
    }

    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(&mut MouseEvent) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    fn classify(message: u32, data: &MsLlHookStruct) -> Option<MouseEventKind> {
        let high_word = (data.mouse_data >> 16) as u16;
        let kind = match message {
            WM_MOUSEMOVE => MouseEventKind::Move,
            WM_LBUTTONDOWN => MouseEventKind::Down(Key::LButton),
            WM_LBUTTONUP => MouseEventKind::Up(Key::LButton),
            WM_RBUTTONDOWN => MouseEventKind::Down(Key::RButton),
            WM_RBUTTONUP => MouseEventKind::Up(Key::RButton),
            WM_MBUTTONDOWN => MouseEventKind::Down(Key::MButton),
            WM_MBUTTONUP => MouseEventKind::Up(Key::MButton),
            WM_XBUTTONDOWN | WM_XBUTTONUP => {
                let button = match high_word {
                    XBUTTON1 => Key::XButton1,
                    XBUTTON2 => Key::XButton2,
                    _ => return None,
                };
                if message == WM_XBUTTONDOWN {
                    MouseEventKind::Down(button)
                } else {
                    MouseEventKind::Up(button)
                }
            }
            WM_MOUSEWHEEL => MouseEventKind::Wheel,
            WM_MOUSEHWHEEL => MouseEventKind::HWheel,
            _ => return None,
        };
        Some(kind)
    }
}

impl Interpret for MouseInterpreter {
    fn kind(&self) -> HookKind {
        HookKind::Mouse
    }

    fn interpret(
        &self,
        context: &HookContext<'_>,
        code: i32,
        wparam: usize,
        lparam: isize,
    ) -> Result<isize, BoxError> {
        if code < HC_ACTION {
            return Ok(context.call_next(code, wparam, lparam));
        }

        // SAFETY: WH_MOUSE_LL の lParam は MSLLHOOKSTRUCT を指す
        let data = unsafe { read_event::<MsLlHookStruct>(lparam) }.ok_or(HookError::NullEventData)?;
        let message = wparam as u32;

        let Some(kind) = Self::classify(message, &data) else {
            return Ok(context.call_next(code, wparam, lparam));
        };
        if kind == MouseEventKind::Move && !self.options.report_moves {
            return Ok(context.call_next(code, wparam, lparam));
        }

        let delta = match kind {
            MouseEventKind::Wheel | MouseEventKind::HWheel => (data.mouse_data >> 16) as u16 as i16,
            _ => 0,
        };
        let mut event = MouseEvent {
            kind,
            position: data.pt,
            delta,
            is_injected: data.flags & LLMHF_INJECTED != 0,
            time: data.time,
            handled: false,
        };

        for handler in self.handlers.read().unwrap_or_else(PoisonError::into_inner).iter() {
            handler(&mut event)?;
        }

        if self.options.handling && event.handled {
            return Ok(1);
        }
        Ok(context.call_next(code, wparam, lparam))
    }
}

/// 低レベルマウスフック
pub struct MouseHook {
    manager: HookManager,
    interpreter: Arc<MouseInterpreter>,
}

impl MouseHook {
    pub const NAME: &'static str = "LowLevelMouseHook";

    pub fn new(options: MouseOptions) -> Self {
        Self::with_api(options, api::default_api())
    }

    pub fn with_api(options: MouseOptions, api: Arc<dyn HookApi>) -> Self {
        let interpreter = Arc::new(MouseInterpreter::new(options));
        let manager = HookManager::with_api(Self::NAME, Arc::clone(&interpreter), api);
        Self {
            manager,
            interpreter,
        }
    }

    pub fn options(&self) -> MouseOptions {
        self.interpreter.options()
    }

    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(&mut MouseEvent) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.interpreter.on_event(handler);
    }
}

impl Deref for MouseHook {
    type Target = HookManager;

    fn deref(&self) -> &Self::Target {
        &self.manager
    }
}

impl DerefMut for MouseHook {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.manager
    }
}
