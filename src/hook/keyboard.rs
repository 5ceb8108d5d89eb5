/*
============================================================================
キーボードフック管理モジュール (keyboard.rs)
============================================================================

【ファイル概要】
WH_KEYBOARD_LL フックの解釈処理。KBDLLHOOKSTRUCT を KeyEvent に変換し、
登録されたハンドラー（KeyDown / KeyUp）へ配信する。

【オプション】
- handling：ハンドラーが handled を立てたらイベントを消費する（LRESULT(1)）
- extended_mode：押下中の修飾キーを KeyEvent.modifiers に含める
- left_right_granularity：LShiftKey / RShiftKey などを区別して通知する
- caps_lock：CapsLock の状態を modifiers と upper_case に反映する

【AI解析用：制御フロー】
interpret() → nCode < 0 → CallNextHookEx
           → KBDLLHOOKSTRUCT 読み出し → translate() → ハンドラー呼び出し
           → handled && handling → 1 返却（イベント消費）
           → それ以外 → CallNextHookEx

============================================================================
*/

use std::{
    ops::{Deref, DerefMut},
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU32, Ordering},
    },
};

use crate::{
    api::{self, HookApi, HookKind},
    constants::*,
    error::{BoxError, HookError},
    hook::{HookContext, HookManager, Interpret, read_event},
    keys::{Key, Modifiers},
};

/// KBDLLHOOKSTRUCT
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct KbdLlHookStruct {
    pub vk_code: u32,
    pub scan_code: u32,
    pub flags: u32,
    pub time: u32,
    pub extra_info: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    Down,
    Up,
}

/// ハンドラーへ渡すキーイベント
#[derive(Debug, Clone)]
pub struct KeyEvent {
    pub key: Key,
    pub vk_code: u32,
    pub scan_code: u32,
    pub direction: KeyDirection,
    pub is_extended: bool,
    pub is_injected: bool,
    /// WM_SYSKEYDOWN / WM_SYSKEYUP（Alt 併用）
    pub is_system: bool,
    /// LLKHF_ALTDOWN（Alt が押されている）
    pub is_alt_down: bool,
    pub modifiers: Modifiers,
    /// 文字キーが大文字として入力されるか（Shift と CapsLock の排他的論理和）
    pub upper_case: bool,
    pub time: u32,
    /// true にすると handling 有効時にイベントを消費する
    pub handled: bool,
}

/// キーボードフックの設定
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyboardOptions {
    pub handling: bool,
    pub extended_mode: bool,
    pub left_right_granularity: bool,
    pub caps_lock: bool,
}

impl KeyboardOptions {
    pub fn handling(mut self, on: bool) -> Self {
        self.handling = on;
        self
    }

    pub fn extended_mode(mut self, on: bool) -> Self {
        self.extended_mode = on;
        self
    }

    pub fn left_right_granularity(mut self, on: bool) -> Self {
        self.left_right_granularity = on;
        self
    }

    pub fn caps_lock(mut self, on: bool) -> Self {
        self.caps_lock = on;
        self
    }
}

// 押下状態を問い合わせる修飾キー（汎用キーは左右どちらかの押下を表すだけなので除く）
const SIDED_MODIFIERS: [Key; 8] = [
    Key::LShiftKey,
    Key::RShiftKey,
    Key::LControlKey,
    Key::RControlKey,
    Key::LMenu,
    Key::RMenu,
    Key::LWin,
    Key::RWin,
];

type KeyHandler = Box<dyn Fn(&mut KeyEvent) -> Result<(), BoxError> + Send + Sync>;

/// WH_KEYBOARD_LL の解釈処理
///
/// ハンドラーはコールバックスレッドで呼ばれる。ハンドラー内からハンドラーを
/// 追加するとデッドロックする。
pub struct KeyboardInterpreter {
    options: KeyboardOptions,
    held: AtomicU32,
    key_down: RwLock<Vec<KeyHandler>>,
    key_up: RwLock<Vec<KeyHandler>>,
}

impl KeyboardInterpreter {
    pub fn new(options: KeyboardOptions) -> Self {
        Self {
            options,
            held: AtomicU32::new(0),
            key_down: RwLock::new(Vec::new()),
            key_up: RwLock::new(Vec::new()),
        }
    }

    pub fn options(&self) -> KeyboardOptions {
        self.options
    }

    pub fn on_key_down<F>(&self, handler: F)
    where
        F: Fn(&mut KeyEvent) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.key_down
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    pub fn on_key_up<F>(&self, handler: F)
    where
        F: Fn(&mut KeyEvent) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.key_up
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// 現在押下中として追跡している修飾キー
    pub fn held_modifiers(&self) -> Modifiers {
        Modifiers::from_bits_truncate(self.held.load(Ordering::Acquire))
    }

    /// OS のキー状態から押下中の修飾キーを取り直す
    fn reseed_modifiers(&self, context: &HookContext<'_>) {
        let held = SIDED_MODIFIERS
            .iter()
            .filter(|key| context.key_pressed(key.vk()))
            .fold(Modifiers::empty(), |held, key| held | key.modifier());
        self.held.store(held.bits(), Ordering::Release);
    }

    fn track_modifiers(&self, key: Key, direction: KeyDirection) -> Modifiers {
        let flag = key.modifier();
        if flag.is_empty() {
            return self.held_modifiers();
        }
        let current = match direction {
            KeyDirection::Down => self.held.fetch_or(flag.bits(), Ordering::AcqRel) | flag.bits(),
            KeyDirection::Up => self.held.fetch_and(!flag.bits(), Ordering::AcqRel) & !flag.bits(),
        };
        Modifiers::from_bits_truncate(current)
    }

    fn translate(&self, context: &HookContext<'_>, message: u32, data: &KbdLlHookStruct) -> KeyEvent {
        let direction = match message {
            WM_KEYDOWN | WM_SYSKEYDOWN => KeyDirection::Down,
            WM_KEYUP | WM_SYSKEYUP => KeyDirection::Up,
            _ if data.flags & LLKHF_UP != 0 => KeyDirection::Up,
            _ => KeyDirection::Down,
        };

        let raw_key = Key::from_vk(data.vk_code).unwrap_or_default();
        let held = self.track_modifiers(raw_key, direction);

        let key = if self.options.left_right_granularity {
            raw_key
        } else {
            raw_key.generic()
        };

        let mut modifiers = if self.options.extended_mode {
            held
        } else {
            Modifiers::empty()
        };

        let caps_on = self.options.caps_lock && context.key_toggled(Key::CapsLock.vk());
        if caps_on {
            modifiers |= Modifiers::CAPS_LOCK;
        }

        KeyEvent {
            key,
            vk_code: data.vk_code,
            scan_code: data.scan_code,
            direction,
            is_extended: data.flags & LLKHF_EXTENDED != 0,
            is_injected: data.flags & LLKHF_INJECTED != 0,
            is_system: matches!(message, WM_SYSKEYDOWN | WM_SYSKEYUP),
            is_alt_down: data.flags & LLKHF_ALTDOWN != 0,
            modifiers,
            upper_case: raw_key.is_letter() && (caps_on ^ held.contains(Modifiers::SHIFT)),
            time: data.time,
            handled: false,
        }
    }
}

impl Interpret for KeyboardInterpreter {
    fn kind(&self) -> HookKind {
        HookKind::Keyboard
    }

    fn on_start(&self, context: &HookContext<'_>) {
        self.reseed_modifiers(context);
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

        // SAFETY: WH_KEYBOARD_LL の lParam は KBDLLHOOKSTRUCT を指す
        let data = unsafe { read_event::<KbdLlHookStruct>(lparam) }.ok_or(HookError::NullEventData)?;
        let mut event = self.translate(context, wparam as u32, &data);

        let handlers = match event.direction {
            KeyDirection::Down => &self.key_down,
            KeyDirection::Up => &self.key_up,
        };
        for handler in handlers.read().unwrap_or_else(PoisonError::into_inner).iter() {
            handler(&mut event)?;
        }

        if self.options.handling && event.handled {
            return Ok(1);
        }
        Ok(context.call_next(code, wparam, lparam))
    }
}

/// 低レベルキーボードフック
///
/// HookManager の操作（start / stop / subscribe）は Deref で利用できる。
pub struct KeyboardHook {
    manager: HookManager,
    interpreter: Arc<KeyboardInterpreter>,
}

impl KeyboardHook {
    pub const NAME: &'static str = "LowLevelKeyboardHook";

    pub fn new(options: KeyboardOptions) -> Self {
        Self::with_api(options, api::default_api())
    }

    pub fn with_api(options: KeyboardOptions, api: Arc<dyn HookApi>) -> Self {
        let interpreter = Arc::new(KeyboardInterpreter::new(options));
        let manager = HookManager::with_api(Self::NAME, Arc::clone(&interpreter), api);
        Self {
            manager,
            interpreter,
        }
    }

    pub fn options(&self) -> KeyboardOptions {
        self.interpreter.options()
    }

    pub fn on_key_down<F>(&self, handler: F)
    where
        F: Fn(&mut KeyEvent) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.interpreter.on_key_down(handler);
    }

    pub fn on_key_up<F>(&self, handler: F)
    where
        F: Fn(&mut KeyEvent) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.interpreter.on_key_up(handler);
    }
}

impl Deref for KeyboardHook {
    type Target = HookManager;

    fn deref(&self) -> &Self::Target {
        &self.manager
    }
}

impl DerefMut for KeyboardHook {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{NEXT_HOOK_RESULT, RecordingApi};
    use std::sync::Mutex;

    fn key(vk: Key, flags: u32) -> KbdLlHookStruct {
        KbdLlHookStruct {
            vk_code: vk.vk(),
            scan_code: 0x1E,
            flags,
            time: 1234,
            extra_info: 0,
        }
    }

    fn send(api: &RecordingApi, message: u32, data: &KbdLlHookStruct) -> Option<isize> {
        api.dispatch(HC_ACTION, message as usize, data as *const KbdLlHookStruct as isize)
    }

    fn recording_hook(options: KeyboardOptions) -> (Arc<RecordingApi>, KeyboardHook, Arc<Mutex<Vec<KeyEvent>>>) {
        let api = Arc::new(RecordingApi::default());
        let hook = KeyboardHook::with_api(options, api.clone());
        let events = Arc::new(Mutex::new(Vec::new()));
        let down = events.clone();
        hook.on_key_down(move |event| {
            down.lock().unwrap().push(event.clone());
            Ok(())
        });
        let up = events.clone();
        hook.on_key_up(move |event| {
            up.lock().unwrap().push(event.clone());
            Ok(())
        });
        (api, hook, events)
    }

    #[test]
    fn default_mode_passes_events_on() {
        let (api, mut hook, events) = recording_hook(KeyboardOptions::default());
        hook.start().unwrap();

        assert_eq!(send(&api, WM_KEYDOWN, &key(Key::A, 0)), Some(NEXT_HOOK_RESULT));
        assert_eq!(send(&api, WM_KEYUP, &key(Key::A, LLKHF_UP)), Some(NEXT_HOOK_RESULT));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].key, Key::A);
        assert_eq!(events[0].direction, KeyDirection::Down);
        assert_eq!(events[1].direction, KeyDirection::Up);
        assert_eq!(events[0].time, 1234);
        assert_eq!(hook.name(), KeyboardHook::NAME);
    }

    #[test]
    fn handled_events_are_suppressed_only_with_handling() {
        for (handling, expected) in [(true, 1), (false, NEXT_HOOK_RESULT)] {
            let api = Arc::new(RecordingApi::default());
            let mut hook = KeyboardHook::with_api(KeyboardOptions::default().handling(handling), api.clone());
            hook.on_key_down(|event| {
                event.handled = true;
                Ok(())
            });
            hook.start().unwrap();

            assert_eq!(send(&api, WM_KEYDOWN, &key(Key::Escape, 0)), Some(expected));
        }
    }

    #[test]
    fn negative_code_skips_handlers() {
        let (api, mut hook, events) = recording_hook(KeyboardOptions::default());
        hook.start().unwrap();

        let data = key(Key::A, 0);
        let result = api.dispatch(-1, WM_KEYDOWN as usize, &data as *const KbdLlHookStruct as isize);

        assert_eq!(result, Some(NEXT_HOOK_RESULT));
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn null_lparam_is_reported_as_exception() {
        let (api, mut hook, _events) = recording_hook(KeyboardOptions::default());
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = errors.clone();
        hook.subscribe(move |error| {
            errors_clone.lock().unwrap().push(error.to_string());
        });
        hook.start().unwrap();

        assert_eq!(api.dispatch(HC_ACTION, WM_KEYDOWN as usize, 0), Some(NEXT_HOOK_RESULT));
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("null"));
    }

    #[test]
    fn handler_error_does_not_stop_the_hook() {
        let api = Arc::new(RecordingApi::default());
        let mut hook = KeyboardHook::with_api(KeyboardOptions::default().handling(true), api.clone());
        hook.on_key_down(|event| {
            if event.key == Key::Q {
                return Err("q is not allowed".into());
            }
            event.handled = true;
            Ok(())
        });
        let failures = Arc::new(Mutex::new(0));
        let failures_clone = failures.clone();
        hook.subscribe(move |_| *failures_clone.lock().unwrap() += 1);
        hook.start().unwrap();

        assert_eq!(send(&api, WM_KEYDOWN, &key(Key::Q, 0)), Some(NEXT_HOOK_RESULT));
        assert_eq!(send(&api, WM_KEYDOWN, &key(Key::W, 0)), Some(1));
        assert_eq!(*failures.lock().unwrap(), 1);
        assert!(hook.is_started());
    }

    #[test]
    fn left_right_modifiers_collapse_by_default() {
        let (api, mut hook, events) = recording_hook(KeyboardOptions::default());
        hook.start().unwrap();

        send(&api, WM_KEYDOWN, &key(Key::RShiftKey, 0));

        assert_eq!(events.lock().unwrap()[0].key, Key::ShiftKey);
    }

    #[test]
    fn left_right_granularity_keeps_sides() {
        let (api, mut hook, events) =
            recording_hook(KeyboardOptions::default().left_right_granularity(true));
        hook.start().unwrap();

        send(&api, WM_KEYDOWN, &key(Key::RShiftKey, 0));
        send(&api, WM_SYSKEYDOWN, &key(Key::LMenu, LLKHF_ALTDOWN));

        let events = events.lock().unwrap();
        assert_eq!(events[0].key, Key::RShiftKey);
        assert_eq!(events[1].key, Key::LMenu);
        assert!(events[1].is_system);
    }

    #[test]
    fn extended_mode_reports_held_modifiers() {
        let (api, mut hook, events) = recording_hook(KeyboardOptions::default().extended_mode(true));
        hook.start().unwrap();

        send(&api, WM_KEYDOWN, &key(Key::LControlKey, 0));
        send(&api, WM_KEYDOWN, &key(Key::LShiftKey, 0));
        send(&api, WM_KEYDOWN, &key(Key::A, 0));
        send(&api, WM_KEYUP, &key(Key::LShiftKey, LLKHF_UP));
        send(&api, WM_KEYDOWN, &key(Key::B, 0));

        let events = events.lock().unwrap();
        assert_eq!(events[2].modifiers, Modifiers::CONTROL | Modifiers::SHIFT);
        assert_eq!(events[3].modifiers, Modifiers::CONTROL);
        assert_eq!(events[4].modifiers, Modifiers::CONTROL);
    }

    #[test]
    fn restart_forgets_modifiers_released_while_stopped() {
        let (api, mut hook, events) = recording_hook(KeyboardOptions::default().extended_mode(true));
        hook.start().unwrap();
        send(&api, WM_KEYDOWN, &key(Key::LControlKey, 0));

        // Ctrl の KeyUp は停止中に発生したため届かない
        hook.stop();
        hook.start().unwrap();
        send(&api, WM_KEYDOWN, &key(Key::A, 0));

        let events = events.lock().unwrap();
        assert_eq!(events[0].modifiers, Modifiers::CONTROL);
        assert!(events[1].modifiers.is_empty());
    }

    #[test]
    fn start_picks_up_modifiers_already_held() {
        let (api, mut hook, events) = recording_hook(KeyboardOptions::default().extended_mode(true));
        api.set_pressed(Key::RShiftKey.vk(), true);
        api.set_pressed(Key::LWin.vk(), true);
        hook.start().unwrap();

        send(&api, WM_KEYDOWN, &key(Key::S, 0));
        send(&api, WM_KEYUP, &key(Key::RShiftKey, LLKHF_UP));
        send(&api, WM_KEYDOWN, &key(Key::S, 0));

        let events = events.lock().unwrap();
        assert_eq!(events[0].modifiers, Modifiers::SHIFT | Modifiers::WIN);
        assert!(events[0].upper_case);
        assert_eq!(events[2].modifiers, Modifiers::WIN);
    }

    #[test]
    fn modifiers_are_empty_without_extended_mode() {
        let (api, mut hook, events) = recording_hook(KeyboardOptions::default());
        hook.start().unwrap();

        send(&api, WM_KEYDOWN, &key(Key::LControlKey, 0));
        send(&api, WM_KEYDOWN, &key(Key::C, 0));

        assert!(events.lock().unwrap()[1].modifiers.is_empty());
    }

    #[test]
    fn caps_lock_flips_letter_case() {
        let (api, mut hook, events) = recording_hook(KeyboardOptions::default().caps_lock(true));
        api.set_toggled(Key::CapsLock.vk(), true);
        hook.start().unwrap();

        send(&api, WM_KEYDOWN, &key(Key::A, 0));
        send(&api, WM_KEYDOWN, &key(Key::LShiftKey, 0));
        send(&api, WM_KEYDOWN, &key(Key::A, 0));
        send(&api, WM_KEYDOWN, &key(Key::D1, 0));

        let events = events.lock().unwrap();
        assert!(events[0].upper_case);
        assert!(events[0].modifiers.contains(Modifiers::CAPS_LOCK));
        assert!(!events[2].upper_case);
        assert!(!events[3].upper_case);
    }

    #[test]
    fn caps_lock_ignored_when_disabled() {
        let (api, mut hook, events) = recording_hook(KeyboardOptions::default());
        api.set_toggled(Key::CapsLock.vk(), true);
        hook.start().unwrap();

        send(&api, WM_KEYDOWN, &key(Key::A, 0));

        let events = events.lock().unwrap();
        assert!(!events[0].upper_case);
        assert!(!events[0].modifiers.contains(Modifiers::CAPS_LOCK));
    }

    #[test]
    fn flags_are_decoded() {
        let (api, mut hook, events) = recording_hook(KeyboardOptions::default());
        hook.start().unwrap();

        send(&api, WM_KEYDOWN, &key(Key::Right, LLKHF_EXTENDED | LLKHF_INJECTED));
        send(&api, WM_SYSKEYDOWN, &key(Key::F4, LLKHF_ALTDOWN));

        let events = events.lock().unwrap();
        assert!(events[0].is_extended);
        assert!(events[0].is_injected);
        assert!(!events[0].is_system);
        assert!(!events[0].is_alt_down);
        assert!(events[1].is_alt_down);
        assert!(events[1].is_system);
        assert!(!events[1].is_injected);
        assert_eq!(events[0].scan_code, 0x1E);
    }

    #[test]
    fn unknown_vk_is_reported_as_none() {
        let (api, mut hook, events) = recording_hook(KeyboardOptions::default());
        hook.start().unwrap();

        let data = KbdLlHookStruct {
            vk_code: 0xFF,
            ..Default::default()
        };
        send(&api, WM_KEYDOWN, &data);

        let events = events.lock().unwrap();
        assert_eq!(events[0].key, Key::None);
        assert_eq!(events[0].vk_code, 0xFF);
    }
}
