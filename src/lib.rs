/*
============================================================================
llhook - Windows 低レベル入力フックライブラリ (lib.rs)
============================================================================

【ライブラリ概要】
SetWindowsHookExW（WH_KEYBOARD_LL / WH_MOUSE_LL）によるシステム全体の
キーボード・マウス監視を、安全な Rust の API として提供する。

【モジュール構成】
                    lib.rs
                      |
     +--------+-------+--------+-------------+
     |        |       |        |             |
   hook.rs  api.rs  keys.rs  message_loop.rs  trampoline.rs
     |        |
     |        +-> api/win32.rs（Windows のみ）
     +-> hook/keyboard.rs
     +-> hook/mouse.rs

- hook.rs：HookManager（開始・停止・例外通知）と Interpret トレイト
- trampoline.rs：OS に渡すフックプロシージャとスロット管理
- api.rs：OS 呼び出しの境界（テストではモックに差し替え）
- listeners.rs：例外リスナー
- keys.rs：仮想キーコードと修飾キー
- message_loop.rs：フックを動かすためのメッセージループ
- constants.rs：Win32 定数
- error.rs：エラー型

【使用例】
```no_run
use llhook::{KeyboardHook, KeyboardOptions, message_loop};

let mut hook = KeyboardHook::new(KeyboardOptions::default());
hook.on_key_down(|event| {
    println!("{} down", event.key);
    Ok(())
});
hook.subscribe(|error| eprintln!("{error}"));
hook.start()?;
message_loop::run()?;
# Ok::<(), llhook::HookError>(())
```

============================================================================
*/

pub mod api;
pub mod constants;
pub mod error;
pub mod hook;
pub mod keys;
pub mod listeners;
pub mod message_loop;
mod trampoline;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{HookApi, HookKind, HookProc, RawHook, UnsupportedApi, default_api};
#[cfg(windows)]
pub use api::Win32Api;
pub use error::{BoxError, HookError, Result};
pub use hook::{
    FnInterpreter, HookContext, HookManager, Interpret,
    keyboard::{KeyDirection, KeyEvent, KeyboardHook, KeyboardInterpreter, KeyboardOptions},
    mouse::{MouseEvent, MouseEventKind, MouseHook, MouseInterpreter, MouseOptions, Point},
};
pub use keys::{Key, Modifiers};
pub use listeners::{ExceptionListener, Subscription};
pub use trampoline::SLOT_COUNT;
