/*
============================================================================
トランポリン管理モジュール (trampoline.rs)
============================================================================

【ファイル概要】
OS に登録するフックプロシージャ（トランポリン）と、その呼び出し先を保持する
静的スロット領域を管理する。

低レベルフックのコールバックにはユーザーデータを渡す手段がないため、
スロット番号ごとに別の `extern "system" fn` を const ジェネリクスで生成し、
各関数が自分のスロットに格納された `Dispatch` へ処理を転送する。

【ライフサイクル】
HookManager::start() → lease()（スロット確保）→ SetWindowsHookExW
    ↓
OS コールバック → trampoline::<N>() → Dispatch::invoke()
    ↓
HookManager::stop() → UnhookWindowsHookEx 成功 → release()（スロット解放）
                    → 失敗 → leak()（OS が呼び続ける可能性があるため保持）

============================================================================
*/

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, PoisonError, RwLock},
};

use tracing::{debug, warn};

use crate::{
    api::{self, HookApi, HookProc},
    error::HookError,
    hook::{HookContext, Interpret},
    listeners::Listeners,
};

/// 同時に登録できるフックの最大数
///
/// スロットはプロセス全体で共有される。テストも並列に同じ領域を使うため、
/// 解除失敗で保持したスロットはテスト側で `release_named` により片付ける。
pub const SLOT_COUNT: usize = 64;

type Slot = RwLock<Option<Arc<Dispatch>>>;

static SLOTS: [Slot; SLOT_COUNT] = [const { RwLock::new(None) }; SLOT_COUNT];

macro_rules! trampolines {
    ($($slot:literal)*) => {
        [$(trampoline::<$slot> as HookProc),*]
    };
}

static TRAMPOLINES: [HookProc; SLOT_COUNT] = trampolines!(
    0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15
    16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
    32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47
    48 49 50 51 52 53 54 55 56 57 58 59 60 61 62 63
);

unsafe extern "system" fn trampoline<const SLOT: usize>(
    code: i32,
    wparam: usize,
    lparam: isize,
) -> isize {
    dispatch_slot(&SLOTS[SLOT], code, wparam, lparam)
}

fn dispatch_slot(slot: &Slot, code: i32, wparam: usize, lparam: isize) -> isize {
    // 読み取りロックは Arc の複製の間だけ保持する
    let dispatch = slot.read().unwrap_or_else(PoisonError::into_inner).clone();
    match dispatch {
        Some(dispatch) => dispatch.invoke(code, wparam, lparam),
        None => api::fallback_call_next(code, wparam, lparam),
    }
}

/// トランポリンから呼ばれる実処理
pub(crate) struct Dispatch {
    pub(crate) name: String,
    pub(crate) interpreter: Arc<dyn Interpret>,
    pub(crate) api: Arc<dyn HookApi>,
    pub(crate) listeners: Arc<Listeners>,
}

impl Dispatch {
    /// 解釈処理を実行し、失敗時は例外通知のうえ次のフックへ委譲する
    pub(crate) fn invoke(&self, code: i32, wparam: usize, lparam: isize) -> isize {
        let context = HookContext::new(&self.name, self.api.as_ref());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.interpreter.interpret(&context, code, wparam, lparam)
        }));

        let error = match outcome {
            Ok(Ok(result)) => return result,
            Ok(Err(source)) => HookError::Interpretation {
                name: self.name.clone(),
                source,
            },
            Err(payload) => HookError::HandlerPanicked {
                name: self.name.clone(),
                message: panic_message(payload.as_ref()),
            },
        };

        debug!(hook = %self.name, %error, "コールバック処理でエラーが発生しました");
        self.listeners.notify(&error);

        self.api.call_next(code, wparam, lparam)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 確保済みスロット
///
/// `release()` か `leak()` のどちらかで必ず手放す。
#[derive(Debug)]
#[must_use]
pub(crate) struct SlotLease {
    index: usize,
}

impl SlotLease {
    /// このスロットに対応するフックプロシージャ
    pub(crate) fn proc(&self) -> HookProc {
        TRAMPOLINES[self.index]
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    /// スロットを空にして再利用可能にする
    pub(crate) fn release(self) {
        *SLOTS[self.index]
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// スロットを確保したままにする（解除に失敗したフック用）
    pub(crate) fn leak(self) {
        warn!(slot = self.index, "トランポリンのスロットを解放せずに保持します");
    }
}

/// 指定した名前のフックが保持しているスロットを全て空にする
#[cfg(test)]
pub(crate) fn release_named(name: &str) {
    for slot in &SLOTS {
        let mut guard = slot.write().unwrap_or_else(PoisonError::into_inner);
        if guard.as_ref().is_some_and(|dispatch| dispatch.name == name) {
            *guard = None;
        }
    }
}

/// 空きスロットに Dispatch を格納する
pub(crate) fn lease(dispatch: Arc<Dispatch>) -> Option<SlotLease> {
    lease_in(&SLOTS, dispatch).map(|index| SlotLease { index })
}

fn lease_in(slots: &[Slot], dispatch: Arc<Dispatch>) -> Option<usize> {
    for (index, slot) in slots.iter().enumerate() {
        let mut guard = slot.write().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(dispatch);
            return Some(index);
        }
    }
    None
}
