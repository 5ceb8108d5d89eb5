//! 例外リスナー（exceptionOccurred 通知）の管理。
//!
//! コールバック中に発生したエラーはここに登録された全リスナーへ、
//! コールバックスレッド上で同期的に配信される。リスナー間の順序は保証しない。

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use tracing::error;

use crate::error::HookError;

/// 例外リスナー
pub type ExceptionListener = Arc<dyn Fn(&HookError) + Send + Sync>;

/// `subscribe` が返す登録 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    entries: RwLock<Vec<(Subscription, ExceptionListener)>>,
}

impl Listeners {
    pub(crate) fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&HookError) + Send + Sync + 'static,
    {
        let id = Subscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: Subscription) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 全リスナーへ通知する
    ///
    /// ロックを保持したままリスナーを呼ばないよう、先に一覧を複製する。
    /// リスナーのパニックはここで止め、OS 側へは巻き戻さない。
    pub(crate) fn notify(&self, error: &HookError) {
        let snapshot: Vec<ExceptionListener> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(error))).is_err() {
                error!(%error, "例外リスナーがパニックしました");
            }
        }
    }
}
