use std::time::Duration;

use bookshelf_catalog::{THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};
use ratatui::layout::Rect;
use ratatui_image::picker::{Capability, Picker, ProtocolType, cap_parser::QueryStdioOptions};

fn env_has(key: &str) -> bool {
    std::env::var(key).ok().is_some_and(|v| !v.trim().is_empty())
}

fn env_contains(key: &str, needle: &str) -> bool {
    std::env::var(key).ok().is_some_and(|v| v.contains(needle))
}

fn in_tmux() -> bool {
    std::env::var_os("TMUX").is_some()
}

fn in_kitty_env() -> bool {
    env_has("KITTY_WINDOW_ID")
        || std::env::var("TERM")
            .ok()
            .is_some_and(|term| term.trim().starts_with("xterm-kitty"))
}

fn in_iterm_env() -> bool {
    env_has("ITERM_SESSION_ID")
        || env_contains("TERM_PROGRAM", "iTerm")
        || env_contains("LC_TERMINAL", "iTerm")
}

/// Querying the terminal costs a round trip; only do it when something hints
/// at a graphics-capable terminal (or tmux hides the outer one).
fn should_query_stdio() -> bool {
    in_kitty_env() || in_iterm_env() || in_tmux()
}

fn stdio_query_timeout() -> Duration {
    if in_kitty_env() || in_iterm_env() {
        Duration::from_millis(1500)
    } else if in_tmux() {
        Duration::from_millis(300)
    } else {
        Duration::ZERO
    }
}

fn allow_tmux_passthrough() {
    if !in_tmux() {
        return;
    }
    // Without passthrough tmux swallows kitty graphics; failure just means
    // covers fall back to half blocks.
    let _ = std::process::Command::new("tmux")
        .args(["set-option", "-g", "allow-passthrough", "on"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status();
}

fn kitty_supported(picker: &Picker) -> bool {
    if in_iterm_env() {
        return false;
    }
    env_has("KITTY_WINDOW_ID")
        || picker
            .capabilities()
            .iter()
            .any(|cap| matches!(cap, Capability::Kitty))
}

/// Picks the best image protocol the terminal offers, falling back to
/// half blocks. Must run after the terminal is in raw mode.
pub(crate) fn detect_picker() -> Picker {
    allow_tmux_passthrough();
    let mut picker = if should_query_stdio() {
        let mut options = QueryStdioOptions::default();
        options.timeout = stdio_query_timeout();
        options.text_sizing_protocol = false;
        Picker::from_query_stdio_with_options(options).unwrap_or_else(|_| Picker::halfblocks())
    } else {
        Picker::halfblocks()
    };
    picker.set_background_color(image::Rgba([255u8, 255u8, 255u8, 255u8]));
    if kitty_supported(&picker) {
        picker.set_protocol_type(ProtocolType::Kitty);
    }
    picker
}

pub(crate) fn protocol_label(picker: &Picker) -> &'static str {
    match picker.protocol_type() {
        ProtocolType::Halfblocks => "halfblocks",
        ProtocolType::Sixel => "sixel",
        ProtocolType::Kitty => "kitty",
        ProtocolType::Iterm2 => "iterm2",
    }
}

/// Cells covered by one 80x120 px thumbnail at the picker's font size.
pub(crate) fn thumbnail_area(picker: &Picker) -> Rect {
    let (font_w, font_h) = picker.font_size();
    let cols = THUMBNAIL_WIDTH.div_ceil(u32::from(font_w.max(1)));
    let rows = THUMBNAIL_HEIGHT.div_ceil(u32::from(font_h.max(1)));
    Rect::new(
        0,
        0,
        u16::try_from(cols).unwrap_or(u16::MAX),
        u16::try_from(rows).unwrap_or(u16::MAX),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn with_env_vars(vars: &[(&str, Option<&str>)], f: impl FnOnce()) {
        let _guard = env_lock().lock().unwrap();

        let prev = vars
            .iter()
            .map(|(key, _)| ((*key).to_string(), std::env::var_os(key)))
            .collect::<Vec<(String, Option<OsString>)>>();

        for (key, value) in vars {
            match value {
                Some(v) => unsafe { std::env::set_var(key, v) },
                None => unsafe { std::env::remove_var(key) },
            }
        }

        f();

        for (key, value) in prev {
            match value {
                Some(v) => unsafe { std::env::set_var(key, v) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }

    const CLEAN: [(&str, Option<&str>); 6] = [
        ("KITTY_WINDOW_ID", None),
        ("TERM", Some("xterm-256color")),
        ("TMUX", None),
        ("ITERM_SESSION_ID", None),
        ("TERM_PROGRAM", None),
        ("LC_TERMINAL", None),
    ];

    fn with_overrides(overrides: &[(&'static str, Option<&'static str>)], f: impl FnOnce()) {
        let mut vars = CLEAN.to_vec();
        for (key, value) in overrides {
            if let Some(slot) = vars.iter_mut().find(|(k, _)| k == key) {
                slot.1 = *value;
            }
        }
        with_env_vars(&vars, f);
    }

    #[test]
    fn plain_terminal_skips_query() {
        with_overrides(&[], || {
            assert!(!should_query_stdio());
            assert_eq!(stdio_query_timeout(), Duration::ZERO);
        });
    }

    #[test]
    fn kitty_term_triggers_query() {
        with_overrides(&[("TERM", Some("xterm-kitty"))], || {
            assert!(should_query_stdio());
            assert_eq!(stdio_query_timeout(), Duration::from_millis(1500));
        });
    }

    #[test]
    fn tmux_queries_quickly() {
        with_overrides(&[("TMUX", Some("1"))], || {
            assert!(should_query_stdio());
            assert_eq!(stdio_query_timeout(), Duration::from_millis(300));
        });
    }

    #[test]
    fn iterm_never_uses_kitty() {
        with_overrides(
            &[("KITTY_WINDOW_ID", Some("1")), ("ITERM_SESSION_ID", Some("s"))],
            || assert!(!kitty_supported(&Picker::halfblocks())),
        );
    }

    #[test]
    fn kitty_window_id_enables_kitty() {
        with_overrides(&[("KITTY_WINDOW_ID", Some("1"))], || {
            assert!(kitty_supported(&Picker::halfblocks()));
        });
    }

    #[test]
    fn thumbnail_area_matches_font_size() {
        let picker = Picker::halfblocks();
        let (font_w, font_h) = picker.font_size();
        let area = thumbnail_area(&picker);
        assert!(u32::from(area.width) * u32::from(font_w) >= THUMBNAIL_WIDTH);
        assert!(u32::from(area.height) * u32::from(font_h) >= THUMBNAIL_HEIGHT);
        assert_eq!(protocol_label(&picker), "halfblocks");
    }
}
