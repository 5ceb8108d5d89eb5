//! フック処理で使うエラー型。
//!
//! 登録失敗（`Registration`）は `start()` の呼び出し元へ同期的に返す。
//! コールバック中のエラー（`Interpretation` / `HandlerPanicked`）は
//! OS 側へは決して伝播させず、例外リスナー経由でのみ通知する。

use thiserror::Error;

use crate::constants::ERROR_CALL_NOT_IMPLEMENTED;

/// 解釈処理やハンドラーが返す任意のエラー
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// llhook 全体の Result 型
pub type Result<T> = std::result::Result<T, HookError>;

#[derive(Error, Debug)]
pub enum HookError {
    /// SetWindowsHookExW が失敗した（GetLastError の値を保持）
    #[error("failed to register hook '{name}' (os error {code})")]
    Registration { name: String, code: u32 },

    /// トランポリン用のスロットが全て使用中
    #[error("no free trampoline slot for hook '{name}'")]
    SlotsExhausted { name: String },

    /// 解釈処理がエラーを返した
    #[error("hook '{name}' failed to interpret an event: {source}")]
    Interpretation {
        name: String,
        #[source]
        source: BoxError,
    },

    /// 解釈処理がパニックした
    #[error("hook '{name}' panicked while interpreting an event: {message}")]
    HandlerPanicked { name: String, message: String },

    /// lParam が NULL だった
    #[error("hook event data pointer is null")]
    NullEventData,

    /// GetMessageW / PostThreadMessageW が失敗した
    #[error("message loop failed (os error {code})")]
    MessageLoop { code: u32 },

    #[error("unknown key name: {0:?}")]
    UnknownKey(String),
}

impl HookError {
    /// OS のエラーコード（登録失敗時のみ）
    pub fn os_code(&self) -> Option<u32> {
        match self {
            HookError::Registration { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// このプラットフォームに低レベルフックがない
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            HookError::Registration { code, .. } | HookError::MessageLoop { code }
                if *code == ERROR_CALL_NOT_IMPLEMENTED
        )
    }
}
