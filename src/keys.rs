/*
============================================================================
仮想キーコード定義モジュール (keys.rs)
============================================================================

【ファイル概要】
Windows の仮想キーコード（VK_*）を `Key` 列挙型として定義し、
キー名からの変換（設定文字列 → Key）と修飾キーの扱いを提供する。

【主要機能】
1. Key::from_vk：KBDLLHOOKSTRUCT.vkCode からの変換
2. Key::from_name / FromStr：大文字小文字を区別しない名前解析
3. Key::generic：左右の修飾キーを汎用キーへまとめる
4. Modifiers：Shift / Ctrl / Alt / Win / CapsLock のビットフラグ

============================================================================
*/

use std::{fmt, str::FromStr};

use bitflags::bitflags;

use crate::error::HookError;

bitflags! {
    /// 押下中の修飾キー
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const SHIFT = 1;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
        const WIN = 1 << 3;
        const CAPS_LOCK = 1 << 4;
    }
}

macro_rules! keys {
    ($($variant:ident = $vk:literal,)*) => {
        /// 仮想キーコード
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[repr(u32)]
        pub enum Key {
            #[default]
            None = 0,
            $($variant = $vk,)*
        }

        impl Key {
            /// 定義済みの全キー（None を除く）
            pub const ALL: &'static [Key] = &[$(Key::$variant,)*];

            pub fn from_vk(vk: u32) -> Option<Key> {
                match vk {
                    0 => Some(Key::None),
                    $($vk => Some(Key::$variant),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    Key::None => "None",
                    $(Key::$variant => stringify!($variant),)*
                }
            }
        }
    };
}

keys! {
    LButton = 0x01,
    RButton = 0x02,
    Cancel = 0x03,
    MButton = 0x04,
    XButton1 = 0x05,
    XButton2 = 0x06,
    Back = 0x08,
    Tab = 0x09,
    Clear = 0x0C,
    Return = 0x0D,
    ShiftKey = 0x10,
    ControlKey = 0x11,
    Menu = 0x12,
    Pause = 0x13,
    CapsLock = 0x14,
    Escape = 0x1B,
    Space = 0x20,
    PageUp = 0x21,
    PageDown = 0x22,
    End = 0x23,
    Home = 0x24,
    Left = 0x25,
    Up = 0x26,
    Right = 0x27,
    Down = 0x28,
    PrintScreen = 0x2C,
    Insert = 0x2D,
    Delete = 0x2E,
    D0 = 0x30,
    D1 = 0x31,
    D2 = 0x32,
    D3 = 0x33,
    D4 = 0x34,
    D5 = 0x35,
    D6 = 0x36,
    D7 = 0x37,
    D8 = 0x38,
    D9 = 0x39,
    A = 0x41,
    B = 0x42,
    C = 0x43,
    D = 0x44,
    E = 0x45,
    F = 0x46,
    G = 0x47,
    H = 0x48,
    I = 0x49,
    J = 0x4A,
    K = 0x4B,
    L = 0x4C,
    M = 0x4D,
    N = 0x4E,
    O = 0x4F,
    P = 0x50,
    Q = 0x51,
    R = 0x52,
    S = 0x53,
    T = 0x54,
    U = 0x55,
    V = 0x56,
    W = 0x57,
    X = 0x58,
    Y = 0x59,
    Z = 0x5A,
    LWin = 0x5B,
    RWin = 0x5C,
    Apps = 0x5D,
    Sleep = 0x5F,
    NumPad0 = 0x60,
    NumPad1 = 0x61,
    NumPad2 = 0x62,
    NumPad3 = 0x63,
    NumPad4 = 0x64,
    NumPad5 = 0x65,
    NumPad6 = 0x66,
    NumPad7 = 0x67,
    NumPad8 = 0x68,
    NumPad9 = 0x69,
    Multiply = 0x6A,
    Add = 0x6B,
    Separator = 0x6C,
    Subtract = 0x6D,
    Decimal = 0x6E,
    Divide = 0x6F,
    F1 = 0x70,
    F2 = 0x71,
    F3 = 0x72,
    F4 = 0x73,
    F5 = 0x74,
    F6 = 0x75,
    F7 = 0x76,
    F8 = 0x77,
    F9 = 0x78,
    F10 = 0x79,
    F11 = 0x7A,
    F12 = 0x7B,
    F13 = 0x7C,
    F14 = 0x7D,
    F15 = 0x7E,
    F16 = 0x7F,
    F17 = 0x80,
    F18 = 0x81,
    F19 = 0x82,
    F20 = 0x83,
    F21 = 0x84,
    F22 = 0x85,
    F23 = 0x86,
    F24 = 0x87,
    NumLock = 0x90,
    Scroll = 0x91,
    LShiftKey = 0xA0,
    RShiftKey = 0xA1,
    LControlKey = 0xA2,
    RControlKey = 0xA3,
    LMenu = 0xA4,
    RMenu = 0xA5,
    VolumeMute = 0xAD,
    VolumeDown = 0xAE,
    VolumeUp = 0xAF,
    MediaNextTrack = 0xB0,
    MediaPreviousTrack = 0xB1,
    MediaStop = 0xB2,
    MediaPlayPause = 0xB3,
    OemSemicolon = 0xBA,
    Oemplus = 0xBB,
    Oemcomma = 0xBC,
    OemMinus = 0xBD,
    OemPeriod = 0xBE,
    OemQuestion = 0xBF,
    Oemtilde = 0xC0,
    OemOpenBrackets = 0xDB,
    OemPipe = 0xDC,
    OemCloseBrackets = 0xDD,
    OemQuotes = 0xDE,
}

// 設定ファイルでよく使われる別名
const ALIASES: &[(&str, Key)] = &[
    ("ctrl", Key::ControlKey),
    ("control", Key::ControlKey),
    ("shift", Key::ShiftKey),
    ("alt", Key::Menu),
    ("win", Key::LWin),
    ("enter", Key::Return),
    ("esc", Key::Escape),
    ("backspace", Key::Back),
    ("del", Key::Delete),
    ("ins", Key::Insert),
    ("pgup", Key::PageUp),
    ("pgdn", Key::PageDown),
    ("capital", Key::CapsLock),
    ("scrolllock", Key::Scroll),
];

impl Key {
    pub fn vk(self) -> u32 {
        self as u32
    }

    /// 名前からキーを取得する（解析できなければ `Key::None`）
    pub fn from_name(text: &str) -> Key {
        text.parse().unwrap_or(Key::None)
    }

    pub fn is_letter(self) -> bool {
        (Key::A.vk()..=Key::Z.vk()).contains(&self.vk())
    }

    /// 左右の区別を取り除いた汎用キー
    pub fn generic(self) -> Key {
        match self {
            Key::LShiftKey | Key::RShiftKey => Key::ShiftKey,
            Key::LControlKey | Key::RControlKey => Key::ControlKey,
            Key::LMenu | Key::RMenu => Key::Menu,
            other => other,
        }
    }

    /// 修飾キーならそのフラグ（CapsLock はトグルなので含めない）
    pub fn modifier(self) -> Modifiers {
        match self.generic() {
            Key::ShiftKey => Modifiers::SHIFT,
            Key::ControlKey => Modifiers::CONTROL,
            Key::Menu => Modifiers::ALT,
            Key::LWin | Key::RWin => Modifiers::WIN,
            _ => Modifiers::empty(),
        }
    }
}

impl FromStr for Key {
    type Err = HookError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();

        if let Some(key) = std::iter::once(Key::None)
            .chain(Key::ALL.iter().copied())
            .find(|key| key.name().eq_ignore_ascii_case(trimmed))
        {
            return Ok(key);
        }

        if let Some((_, key)) = ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(trimmed))
        {
            return Ok(*key);
        }

        // 数値指定（"65" → A）
        if let Some(key) = trimmed.parse::<u32>().ok().and_then(Key::from_vk) {
            return Ok(key);
        }

        Err(HookError::UnknownKey(text.to_string()))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        f.write_str(&names.join("+"))
    }
}
