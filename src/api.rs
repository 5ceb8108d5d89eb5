/*
============================================================================
OS フック API 境界モジュール (api.rs)
============================================================================

【ファイル概要】
SetWindowsHookExW / UnhookWindowsHookEx / CallNextHookEx の3つのネイティブ呼び出しを
`HookApi` トレイトの背後に隠すモジュール。
HookManager はこのトレイト経由でしか OS に触れないため、テストでは
記録用のモック実装に差し替えて登録回数や失敗を検証できる。

【実装】
- Win32Api（Windows のみ）：windows クレート経由の本物の呼び出し
- UnsupportedApi（その他）：登録は常に ERROR_CALL_NOT_IMPLEMENTED で失敗

============================================================================
*/

use std::sync::Arc;

use crate::constants::{WH_KEYBOARD_LL, WH_MOUSE_LL};

#[cfg(windows)]
pub mod win32;

#[cfg(windows)]
pub use win32::Win32Api;

/// OS が呼び出すフックプロシージャのシグネチャ（nCode, wParam, lParam）
pub type HookProc = unsafe extern "system" fn(i32, usize, isize) -> isize;

/// 低レベルフックの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Keyboard,
    Mouse,
}

impl HookKind {
    /// SetWindowsHookExW に渡すフック ID
    pub fn id(self) -> i32 {
        match self {
            HookKind::Keyboard => WH_KEYBOARD_LL,
            HookKind::Mouse => WH_MOUSE_LL,
        }
    }
}

/// 登録済みフックの不透明なハンドル（HHOOK の値）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHook(pub isize);

/// OS のフック機能との境界
///
/// エラーは OS のエラーコード（GetLastError の値）で返す。
pub trait HookApi: Send + Sync {
    /// フックプロシージャを登録する
    fn register(&self, kind: HookKind, proc: HookProc) -> Result<RawHook, u32>;

    /// 登録済みフックを解除する
    fn unregister(&self, hook: RawHook) -> Result<(), u32>;

    /// フックチェーンの次のフックへイベントを渡す
    fn call_next(&self, code: i32, wparam: usize, lparam: isize) -> isize;

    /// トグルキー（CapsLock など）が ON かどうか
    fn key_toggled(&self, vk: u32) -> bool;

    /// キーが物理的に押下中かどうか
    fn key_pressed(&self, vk: u32) -> bool;
}

/// このプラットフォームの既定の API 実装を返す
pub fn default_api() -> Arc<dyn HookApi> {
    #[cfg(windows)]
    {
        Arc::new(Win32Api)
    }
    #[cfg(not(windows))]
    {
        Arc::new(UnsupportedApi)
    }
}

/// スロットが空の時（停止直後に届いたイベント）の委譲先
pub(crate) fn fallback_call_next(code: i32, wparam: usize, lparam: isize) -> isize {
    #[cfg(windows)]
    {
        win32::call_next(code, wparam, lparam)
    }
    #[cfg(not(windows))]
    {
        let _ = (code, wparam, lparam);
        0
    }
}

/// 低レベルフックを持たないプラットフォーム用の実装
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedApi;

impl HookApi for UnsupportedApi {
    fn register(&self, _kind: HookKind, _proc: HookProc) -> Result<RawHook, u32> {
        Err(crate::constants::ERROR_CALL_NOT_IMPLEMENTED)
    }

    fn unregister(&self, _hook: RawHook) -> Result<(), u32> {
        Err(crate::constants::ERROR_CALL_NOT_IMPLEMENTED)
    }

    fn call_next(&self, _code: i32, _wparam: usize, _lparam: isize) -> isize {
        0
    }

    fn key_toggled(&self, _vk: u32) -> bool {
        false
    }

    fn key_pressed(&self, _vk: u32) -> bool {
        false
    }
}
