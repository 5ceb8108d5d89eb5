/*
============================================================================
Win32 フック API 実装 (api/win32.rs)
============================================================================

【技術仕様】
- Windows API: SetWindowsHookExW, UnhookWindowsHookEx, CallNextHookEx,
  GetKeyState, GetAsyncKeyState
- モジュールハンドル: GetModuleHandleW(None)（実行ファイル自身）
- スレッドID: 0（全スレッド監視、低レベルフックでは必須）

【エラーハンドリング】
windows クレートは失敗を HRESULT で返すため、FACILITY_WIN32 の値は
元の Win32 エラーコード（GetLastError の値）に戻して返す。

============================================================================
*/

use std::ffi::c_void;

use windows::Win32::{
    Foundation::{GetLastError, LPARAM, LRESULT, WPARAM},
    System::LibraryLoader::GetModuleHandleW,
    UI::{
        Input::KeyboardAndMouse::{GetAsyncKeyState, GetKeyState},
        WindowsAndMessaging::{
            CallNextHookEx, HHOOK, HOOKPROC, SetWindowsHookExW, UnhookWindowsHookEx,
            WINDOWS_HOOK_ID,
        },
    },
};

use super::{HookApi, HookKind, HookProc, RawHook};

type NativeHookProc = unsafe extern "system" fn(i32, WPARAM, LPARAM) -> LRESULT;

/// windows クレートによる本番用実装
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Api;

impl HookApi for Win32Api {
    fn register(&self, kind: HookKind, proc: HookProc) -> Result<RawHook, u32> {
        let id = WINDOWS_HOOK_ID(kind.id());

        unsafe {
            // SAFETY: WPARAM / LPARAM / LRESULT は usize / isize の repr(transparent)
            let lpfn: HOOKPROC = Some(std::mem::transmute::<HookProc, NativeHookProc>(proc));
            let module = GetModuleHandleW(None).ok().map(|h| h.into());

            match SetWindowsHookExW(id, lpfn, module, 0) {
                Ok(hook) if !hook.is_invalid() => Ok(RawHook(hook.0 as isize)),
                Ok(_) => Err(GetLastError().0),
                Err(e) => Err(win32_code(&e)),
            }
        }
    }

    fn unregister(&self, hook: RawHook) -> Result<(), u32> {
        unsafe { UnhookWindowsHookEx(HHOOK(hook.0 as *mut c_void)).map_err(|e| win32_code(&e)) }
    }

    fn call_next(&self, code: i32, wparam: usize, lparam: isize) -> isize {
        call_next(code, wparam, lparam)
    }

    fn key_toggled(&self, vk: u32) -> bool {
        // 下位ビットがトグル状態
        unsafe { GetKeyState(vk as i32) & 1 != 0 }
    }

    fn key_pressed(&self, vk: u32) -> bool {
        // 最上位ビットが押下状態
        unsafe { GetAsyncKeyState(vk as i32) < 0 }
    }
}

/// 現在のフックハンドル無し（NULL）で次のフックへ委譲する
pub(crate) fn call_next(code: i32, wparam: usize, lparam: isize) -> isize {
    unsafe { CallNextHookEx(None, code, WPARAM(wparam), LPARAM(lparam)).0 }
}

/// HRESULT から Win32 エラーコードを取り出す
pub(crate) fn win32_code(error: &windows::core::Error) -> u32 {
    let hr = error.code().0 as u32;
    if hr & 0xFFFF_0000 == 0x8007_0000 {
        hr & 0xFFFF
    } else {
        hr
    }
}
