/*
============================================================================
Win32 定数定義モジュール (constants.rs)
============================================================================

【ファイル概要】
低レベルフックで使用する Win32 の定数を一元管理するモジュール。
windows クレートは Windows ターゲットでしか使えないため、フックの解釈処理
（keyboard.rs / mouse.rs）とテストが全プラットフォームで同じ値を参照できるよう、
必要な値だけをここに定義する。

【定数カテゴリ】
1. フック種別：WH_KEYBOARD_LL / WH_MOUSE_LL
2. キーボードメッセージ：WM_KEYDOWN 〜 WM_SYSKEYUP
3. マウスメッセージ：WM_MOUSEMOVE 〜 WM_MOUSEHWHEEL
4. KBDLLHOOKSTRUCT / MSLLHOOKSTRUCT のフラグ
5. エラーコード

【メンテナンス指針】
- 値は WinUser.h / winerror.h と完全一致させること
- ここにない値を使う場合は追加してから参照する

============================================================================
*/

// ===== フック種別 =====
pub const WH_KEYBOARD_LL: i32 = 13;
pub const WH_MOUSE_LL: i32 = 14;

// ===== フックコード =====
// 0 以上のときだけメッセージを処理してよい
pub const HC_ACTION: i32 = 0;

// ===== キーボードメッセージ =====
pub const WM_KEYDOWN: u32 = 0x0100;
pub const WM_KEYUP: u32 = 0x0101;
pub const WM_SYSKEYDOWN: u32 = 0x0104;
pub const WM_SYSKEYUP: u32 = 0x0105;

// ===== マウスメッセージ =====
pub const WM_MOUSEMOVE: u32 = 0x0200;
pub const WM_LBUTTONDOWN: u32 = 0x0201;
pub const WM_LBUTTONUP: u32 = 0x0202;
pub const WM_RBUTTONDOWN: u32 = 0x0204;
pub const WM_RBUTTONUP: u32 = 0x0205;
pub const WM_MBUTTONDOWN: u32 = 0x0207;
pub const WM_MBUTTONUP: u32 = 0x0208;
pub const WM_MOUSEWHEEL: u32 = 0x020A;
pub const WM_XBUTTONDOWN: u32 = 0x020B;
pub const WM_XBUTTONUP: u32 = 0x020C;
pub const WM_MOUSEHWHEEL: u32 = 0x020E;

// XBUTTON 識別子（mouseData の上位ワード）
pub const XBUTTON1: u16 = 0x0001;
pub const XBUTTON2: u16 = 0x0002;

// ===== KBDLLHOOKSTRUCT.flags =====
pub const LLKHF_EXTENDED: u32 = 0x01;
pub const LLKHF_INJECTED: u32 = 0x10;
pub const LLKHF_ALTDOWN: u32 = 0x20;
pub const LLKHF_UP: u32 = 0x80;

// ===== MSLLHOOKSTRUCT.flags =====
pub const LLMHF_INJECTED: u32 = 0x01;

// ===== エラーコード =====
// このプラットフォームではフックが使えない場合に返す
pub const ERROR_CALL_NOT_IMPLEMENTED: u32 = 120;
