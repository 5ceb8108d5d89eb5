//! メッセージループ。
//!
//! 低レベルフックは登録したスレッドのメッセージループ上で呼び出されるため、
//! `HookManager::start()` を呼んだスレッドはこの `run()` を回し続ける必要がある。
//! 別スレッドからは `quit()` に登録スレッドの ID を渡して終了させる。

use crate::error::Result;

#[cfg(windows)]
mod platform {
    use windows::Win32::{
        Foundation::{GetLastError, LPARAM, WPARAM},
        System::Threading::GetCurrentThreadId,
        UI::WindowsAndMessaging::{
            DispatchMessageW, GetMessageW, MSG, PostThreadMessageW, TranslateMessage, WM_QUIT,
        },
    };

    use crate::{
        api::win32::win32_code,
        error::{HookError, Result},
    };

    pub fn run() -> Result<()> {
        unsafe {
            let mut msg = MSG::default();
            loop {
                // -1 はエラー、0 は WM_QUIT
                match GetMessageW(&mut msg, None, 0, 0).0 {
                    -1 => return Err(HookError::MessageLoop { code: GetLastError().0 }),
                    0 => break,
                    _ => {
                        let _ = TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn current_thread_id() -> u32 {
        unsafe { GetCurrentThreadId() }
    }

    pub fn quit(thread_id: u32) -> Result<()> {
        unsafe {
            PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0))
                .map_err(|e| HookError::MessageLoop { code: win32_code(&e) })
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use crate::{
        constants::ERROR_CALL_NOT_IMPLEMENTED,
        error::{HookError, Result},
    };

    pub fn run() -> Result<()> {
        Err(HookError::MessageLoop {
            code: ERROR_CALL_NOT_IMPLEMENTED,
        })
    }

    pub fn current_thread_id() -> u32 {
        0
    }

    pub fn quit(_thread_id: u32) -> Result<()> {
        Err(HookError::MessageLoop {
            code: ERROR_CALL_NOT_IMPLEMENTED,
        })
    }
}

/// WM_QUIT を受け取るまでメッセージを処理する
pub fn run() -> Result<()> {
    platform::run()
}

pub fn current_thread_id() -> u32 {
    platform::current_thread_id()
}

/// 指定スレッドのメッセージループを終了させる
pub fn quit(thread_id: u32) -> Result<()> {
    platform::quit(thread_id).inspect_err(|error| {
        tracing::warn!(thread_id, %error, "メッセージループの終了要求に失敗しました");
    })
}
