use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

static JSON_MODE: AtomicBool = AtomicBool::new(false);

pub fn init(json: bool) {
    JSON_MODE.store(json, Ordering::Relaxed);
}

pub fn is_json() -> bool {
    JSON_MODE.load(Ordering::Relaxed)
}

pub fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let s = if is_json() {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{s}");
    Ok(())
}

/// Human-only status line (`ok`/`fail` badge plus message). Silent in JSON mode.
pub fn status(ok: bool, msg: &str) {
    if is_json() {
        return;
    }
    let mut out = stdout();
    let (color, badge) = if ok { (Color::Green, "ok  ") } else { (Color::Red, "fail") };
    let _ = out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = write!(out, "{badge}");
    let _ = out.reset();
    let _ = writeln!(out, " {msg}");
}

pub fn stdout() -> StandardStream {
    StandardStream::stdout(ColorChoice::Auto)
}
