//! テスト用の HookApi 実装。
//!
//! 呼び出し回数を記録し、登録されたトランポリンを OS と同じように呼び出す。

use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError},
};

use crate::api::{HookApi, HookKind, HookProc, RawHook};

/// `call_next` が返す値
pub(crate) const NEXT_HOOK_RESULT: isize = 0x4E58;

#[derive(Default)]
pub(crate) struct RecordingApi {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    issued: isize,
    active: Vec<(RawHook, HookKind, HookProc)>,
    register_calls: usize,
    unregister_calls: usize,
    next_calls: usize,
    fail_register: Option<u32>,
    fail_unregister: Option<u32>,
    toggled: HashSet<u32>,
    pressed: HashSet<u32>,
}

impl RecordingApi {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 次の1回の登録を指定コードで失敗させる
    pub(crate) fn fail_register(&self, code: u32) {
        self.state().fail_register = Some(code);
    }

    /// 次の1回の解除を指定コードで失敗させる
    pub(crate) fn fail_unregister(&self, code: u32) {
        self.state().fail_unregister = Some(code);
    }

    pub(crate) fn set_toggled(&self, vk: u32, on: bool) {
        let mut state = self.state();
        if on {
            state.toggled.insert(vk);
        } else {
            state.toggled.remove(&vk);
        }
    }

    pub(crate) fn set_pressed(&self, vk: u32, on: bool) {
        let mut state = self.state();
        if on {
            state.pressed.insert(vk);
        } else {
            state.pressed.remove(&vk);
        }
    }

    pub(crate) fn register_calls(&self) -> usize {
        self.state().register_calls
    }

    pub(crate) fn unregister_calls(&self) -> usize {
        self.state().unregister_calls
    }

    pub(crate) fn next_calls(&self) -> usize {
        self.state().next_calls
    }

    pub(crate) fn active_count(&self) -> usize {
        self.state().active.len()
    }

    pub(crate) fn active_handles(&self) -> Vec<RawHook> {
        self.state().active.iter().map(|(hook, _, _)| *hook).collect()
    }

    pub(crate) fn active_kinds(&self) -> Vec<HookKind> {
        self.state().active.iter().map(|(_, kind, _)| *kind).collect()
    }

    /// 最後に登録されたフックへイベントを配信する（未登録なら None）
    ///
    /// トランポリンが call_next でこのモックに戻ってくるため、ロックは外してから呼ぶ。
    pub(crate) fn dispatch(&self, code: i32, wparam: usize, lparam: isize) -> Option<isize> {
        let proc = self.state().active.last().map(|(_, _, proc)| *proc)?;
        Some(unsafe { proc(code, wparam, lparam) })
    }
}

impl HookApi for RecordingApi {
    fn register(&self, kind: HookKind, proc: HookProc) -> Result<RawHook, u32> {
        let mut state = self.state();
        state.register_calls += 1;
        if let Some(code) = state.fail_register.take() {
            return Err(code);
        }
        state.issued += 1;
        let hook = RawHook(0x1000 + state.issued);
        state.active.push((hook, kind, proc));
        Ok(hook)
    }

    fn unregister(&self, hook: RawHook) -> Result<(), u32> {
        let mut state = self.state();
        state.unregister_calls += 1;
        if let Some(code) = state.fail_unregister.take() {
            return Err(code);
        }
        state.active.retain(|(active, _, _)| *active != hook);
        Ok(())
    }

    fn call_next(&self, _code: i32, _wparam: usize, _lparam: isize) -> isize {
        self.state().next_calls += 1;
        NEXT_HOOK_RESULT
    }

    fn key_toggled(&self, vk: u32) -> bool {
        self.state().toggled.contains(&vk)
    }

    fn key_pressed(&self, vk: u32) -> bool {
        self.state().pressed.contains(&vk)
    }
}
