/*
============================================================================
フック管理モジュール (hook.rs)
============================================================================

【ファイル概要】
OS のグローバル低レベル入力フックを登録・解除する HookManager と、
イベントの解釈処理を差し込むための Interpret トレイトを提供する。
キーボード／マウス固有の解釈はサブモジュールで実装する。

【主要機能】
1. フック開始 (HookManager::start) ：登録済みなら何もしない
2. フック停止 (HookManager::stop / Drop)：未登録なら何もしない
3. 例外通知 (subscribe / unsubscribe)：コールバック中のエラーはここでのみ観測できる
4. サブモジュールの公開 (keyboard, mouse)

【状態フロー図】
未登録 → start() → 登録中（ハンドル保持・スロット確保）
  ↑                      ↓
  └──── stop() / drop ───┘

【スレッド制約】
- start() を呼んだスレッドがメッセージループを回し続ける必要がある
- 解釈処理の中から start() / stop() を呼んではならない

============================================================================
*/

pub mod keyboard;
pub mod mouse;

use std::{fmt, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    api::{self, HookApi, HookKind, RawHook},
    error::{BoxError, HookError, Result},
    listeners::{Listeners, Subscription},
    trampoline::{self, Dispatch, SlotLease},
};

/*
============================================================================
解釈処理（拡張ポイント）
============================================================================
*/

/// フックの種類ごとのイベント解釈処理
///
/// `interpret` の戻り値はそのまま OS に返される。イベントを止めるなら非ゼロを、
/// 通すなら `context.call_next(...)` の結果を返す。
/// エラーやパニックは HookManager が捕捉し、例外リスナーへ通知したうえで
/// 次のフックへ委譲する。
pub trait Interpret: Send + Sync {
    /// 登録するフックの種類
    fn kind(&self) -> HookKind;

    /// OS への登録直前に呼ばれる（停止中に見逃したイベントの状態をここで捨てる）
    fn on_start(&self, _context: &HookContext<'_>) {}

    fn interpret(
        &self,
        context: &HookContext<'_>,
        code: i32,
        wparam: usize,
        lparam: isize,
    ) -> std::result::Result<isize, BoxError>;
}

impl<T: Interpret + ?Sized> Interpret for Arc<T> {
    fn kind(&self) -> HookKind {
        (**self).kind()
    }

    fn on_start(&self, context: &HookContext<'_>) {
        (**self).on_start(context)
    }

    fn interpret(
        &self,
        context: &HookContext<'_>,
        code: i32,
        wparam: usize,
        lparam: isize,
    ) -> std::result::Result<isize, BoxError> {
        (**self).interpret(context, code, wparam, lparam)
    }
}

/// 解釈処理に渡される OS 側の操作
pub struct HookContext<'a> {
    name: &'a str,
    api: &'a dyn HookApi,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(name: &'a str, api: &'a dyn HookApi) -> Self {
        Self { name, api }
    }

    /// 呼び出し元フックの名前
    pub fn name(&self) -> &str {
        self.name
    }

    /// イベントをフックチェーンの次へ渡す
    pub fn call_next(&self, code: i32, wparam: usize, lparam: isize) -> isize {
        self.api.call_next(code, wparam, lparam)
    }

    /// トグルキーが ON かどうか
    pub fn key_toggled(&self, vk: u32) -> bool {
        self.api.key_toggled(vk)
    }

    /// キーが現在押下中かどうか
    pub fn key_pressed(&self, vk: u32) -> bool {
        self.api.key_pressed(vk)
    }
}

/// クロージャを解釈処理として使うためのアダプタ
pub struct FnInterpreter<F> {
    kind: HookKind,
    f: F,
}

impl<F> FnInterpreter<F>
where
    F: Fn(&HookContext<'_>, i32, usize, isize) -> std::result::Result<isize, BoxError>
        + Send
        + Sync,
{
    pub fn new(kind: HookKind, f: F) -> Self {
        Self { kind, f }
    }
}

impl<F> Interpret for FnInterpreter<F>
where
    F: Fn(&HookContext<'_>, i32, usize, isize) -> std::result::Result<isize, BoxError>
        + Send
        + Sync,
{
    fn kind(&self) -> HookKind {
        self.kind
    }

    fn interpret(
        &self,
        context: &HookContext<'_>,
        code: i32,
        wparam: usize,
        lparam: isize,
    ) -> std::result::Result<isize, BoxError> {
        (self.f)(context, code, wparam, lparam)
    }
}

/// lParam が指すフック構造体を読み出す
///
/// # Safety
/// `lparam` は NULL か、`T` として読める領域を指していなければならない。
pub(crate) unsafe fn read_event<T: Copy>(lparam: isize) -> Option<T> {
    let ptr = lparam as *const T;
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { ptr.read_unaligned() })
    }
}

/*
============================================================================
HookManager
============================================================================
*/

/// 登録中のフック（ハンドルとトランポリンのスロットは常に対で存在する）
struct Registration {
    handle: RawHook,
    lease: SlotLease,
}

/// OS のグローバル低レベルフック1件を管理する
///
/// ハンドルは起動中にのみ存在し、`Drop` で確実に解除される。
pub struct HookManager {
    name: String,
    interpreter: Arc<dyn Interpret>,
    api: Arc<dyn HookApi>,
    listeners: Arc<Listeners>,
    registration: Option<Registration>,
    lease_slot: fn(Arc<Dispatch>) -> Option<SlotLease>,
}

impl HookManager {
    /// このプラットフォームの既定 API でフックを作成する
    pub fn new<I>(name: impl Into<String>, interpreter: I) -> Self
    where
        I: Interpret + 'static,
    {
        Self::with_api(name, interpreter, api::default_api())
    }

    pub fn with_api<I>(name: impl Into<String>, interpreter: I, api: Arc<dyn HookApi>) -> Self
    where
        I: Interpret + 'static,
    {
        Self {
            name: name.into(),
            interpreter: Arc::new(interpreter),
            api,
            listeners: Arc::new(Listeners::default()),
            registration: None,
            lease_slot: trampoline::lease,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> HookKind {
        self.interpreter.kind()
    }

    pub fn is_started(&self) -> bool {
        self.registration.is_some()
    }

    /// 例外リスナーを登録する
    ///
    /// リスナーはコールバックスレッド上で同期的に呼ばれる。
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&HookError) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.listeners.unsubscribe(subscription)
    }

    /// フックを開始する
    ///
    /// 既に開始済みなら何もしない。登録に失敗した場合は OS のエラーコードを
    /// 持つ `HookError::Registration` を返し、未登録のままとなる。再試行はしない。
    pub fn start(&mut self) -> Result<()> {
        if self.registration.is_some() {
            return Ok(());
        }

        info!(hook = %self.name, kind = ?self.kind(), "フックを開始します...");

        let dispatch = Arc::new(Dispatch {
            name: self.name.clone(),
            interpreter: Arc::clone(&self.interpreter),
            api: Arc::clone(&self.api),
            listeners: Arc::clone(&self.listeners),
        });
        let lease = (self.lease_slot)(dispatch).ok_or_else(|| HookError::SlotsExhausted {
            name: self.name.clone(),
        })?;

        self.interpreter
            .on_start(&HookContext::new(&self.name, self.api.as_ref()));

        match self.api.register(self.kind(), lease.proc()) {
            Ok(handle) => {
                debug!(hook = %self.name, handle = handle.0, slot = lease.index(), "フックを登録しました");
                self.registration = Some(Registration { handle, lease });
                Ok(())
            }
            Err(code) => {
                lease.release();
                Err(HookError::Registration {
                    name: self.name.clone(),
                    code,
                })
            }
        }
    }

    /// フックを停止する
    ///
    /// 未開始なら何もしない。解除の失敗はログに残すだけで呼び出し元には返さない。
    pub fn stop(&mut self) {
        let Some(registration) = self.registration.take() else {
            return;
        };

        info!(hook = %self.name, "フックを停止します...");

        match self.api.unregister(registration.handle) {
            Ok(()) => registration.lease.release(),
            Err(code) => {
                warn!(hook = %self.name, code, "フックの解除に失敗しました");
                registration.lease.leak();
            }
        }
    }
}

impl Drop for HookManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for HookManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookManager")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("started", &self.is_started())
            .field("handle", &self.registration.as_ref().map(|r| r.handle))
            .finish()
    }
}
