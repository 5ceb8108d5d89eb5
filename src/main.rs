/*
============================================================================
llhook-monitor - 低レベルフック動作確認ツール (main.rs)
============================================================================

【概要】
キーボードまたはマウスの低レベルフックを一定時間だけ登録し、
受け取ったイベントと例外をログに出力する。

【使用例】
  llhook-monitor                       キーボードを5秒監視
  llhook-monitor --handling            全キーを消費（他アプリに渡さない）
  llhook-monitor --extended --caps-lock
  llhook-monitor --mouse --seconds 10
  RUST_LOG=debug llhook-monitor        登録ハンドルなども表示

============================================================================
*/

use std::{thread, time::Duration};

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use llhook::{HookManager, KeyboardHook, KeyboardOptions, MouseHook, MouseOptions, message_loop};

/// 低レベル入力フックのイベントを表示する
#[derive(Debug, Parser)]
#[command(name = "llhook-monitor", version)]
struct Args {
    /// キーボードの代わりにマウスを監視する
    #[arg(long)]
    mouse: bool,

    /// イベントを消費して他のアプリケーションに渡さない
    #[arg(long)]
    handling: bool,

    /// 押下中の修飾キーを表示する
    #[arg(long)]
    extended: bool,

    /// 左右の修飾キーを区別する
    #[arg(long)]
    left_right: bool,

    /// CapsLock の状態を反映する
    #[arg(long)]
    caps_lock: bool,

    /// マウス移動も表示する
    #[arg(long)]
    moves: bool,

    /// 監視する秒数
    #[arg(long, default_value_t = 5)]
    seconds: u64,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!(?args, "llhook-monitor を開始します");

    if args.mouse {
        run_mouse(&args)
    } else {
        run_keyboard(&args)
    }
}

fn run_keyboard(args: &Args) -> Result<()> {
    let options = KeyboardOptions::default()
        .handling(args.handling)
        .extended_mode(args.extended)
        .left_right_granularity(args.left_right)
        .caps_lock(args.caps_lock);
    let mut hook = KeyboardHook::new(options);

    let handling = args.handling;
    hook.on_key_down(move |event| {
        info!(
            key = %event.key,
            modifiers = %event.modifiers,
            upper_case = event.upper_case,
            injected = event.is_injected,
            "KeyDown"
        );
        event.handled = handling;
        Ok(())
    });
    hook.on_key_up(move |event| {
        info!(key = %event.key, modifiers = %event.modifiers, "KeyUp");
        event.handled = handling;
        Ok(())
    });

    log_exceptions(&hook);
    hook.start().wrap_err("キーボードフックの開始に失敗しました")?;
    pump_for(args.seconds)?;
    hook.stop();
    Ok(())
}

fn run_mouse(args: &Args) -> Result<()> {
    let options = MouseOptions::default()
        .handling(args.handling)
        .report_moves(args.moves);
    let mut hook = MouseHook::new(options);

    let handling = args.handling;
    hook.on_event(move |event| {
        info!(
            kind = ?event.kind,
            x = event.position.x,
            y = event.position.y,
            delta = event.delta,
            "MouseEvent"
        );
        event.handled = handling;
        Ok(())
    });

    log_exceptions(&hook);
    hook.start().wrap_err("マウスフックの開始に失敗しました")?;
    pump_for(args.seconds)?;
    hook.stop();
    Ok(())
}

fn log_exceptions(hook: &HookManager) {
    hook.subscribe(|exception| {
        error!(%exception, "フック処理中に例外が発生しました");
    });
}

/// 指定秒数だけメッセージループを回す
fn pump_for(seconds: u64) -> Result<()> {
    let thread_id = message_loop::current_thread_id();
    thread::Builder::new()
        .name("llhook-timer".into())
        .spawn(move || {
            thread::sleep(Duration::from_secs(seconds));
            if message_loop::quit(thread_id).is_err() {
                warn!("タイマーからメッセージループを終了できませんでした");
            }
        })
        .wrap_err("タイマースレッドの起動に失敗しました")?;

    message_loop::run().wrap_err("メッセージループが異常終了しました")?;
    info!("監視を終了します");
    Ok(())
}
