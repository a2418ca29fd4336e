//! Symbolic key name resolution
//!
//! Names are matched case-insensitively. A name is first looked up in the
//! alias table, then tried as a kernel key name (`KEY_` prefix optional),
//! so `"RightMeta"`, `"rightmeta"` and `"KEY_RIGHTMETA"` all resolve to
//! [`Key::KEY_RIGHTMETA`].

use std::str::FromStr;

use evdev::Key;

/// Friendly names that do not match a kernel key name after upper-casing.
const ALIASES: &[(&str, Key)] = &[
    // Modifiers
    ("CTRL", Key::KEY_LEFTCTRL),
    ("CONTROL", Key::KEY_LEFTCTRL),
    ("LCTRL", Key::KEY_LEFTCTRL),
    ("RCTRL", Key::KEY_RIGHTCTRL),
    ("SHIFT", Key::KEY_LEFTSHIFT),
    ("LSHIFT", Key::KEY_LEFTSHIFT),
    ("RSHIFT", Key::KEY_RIGHTSHIFT),
    ("ALT", Key::KEY_LEFTALT),
    ("LALT", Key::KEY_LEFTALT),
    ("RALT", Key::KEY_RIGHTALT),
    ("ALTGR", Key::KEY_RIGHTALT),
    ("SUPER", Key::KEY_LEFTMETA),
    ("META", Key::KEY_LEFTMETA),
    ("WIN", Key::KEY_LEFTMETA),
    ("LMETA", Key::KEY_LEFTMETA),
    ("RMETA", Key::KEY_RIGHTMETA),
    // Special keys
    ("CAPS", Key::KEY_CAPSLOCK),
    ("CAPS_LOCK", Key::KEY_CAPSLOCK),
    ("ESCAPE", Key::KEY_ESC),
    ("RETURN", Key::KEY_ENTER),
    ("NUM_LOCK", Key::KEY_NUMLOCK),
    // Symbols
    ("-", Key::KEY_MINUS),
    ("=", Key::KEY_EQUAL),
    ("EQUALS", Key::KEY_EQUAL),
    ("[", Key::KEY_LEFTBRACE),
    ("LBRACE", Key::KEY_LEFTBRACE),
    ("]", Key::KEY_RIGHTBRACE),
    ("RBRACE", Key::KEY_RIGHTBRACE),
    (";", Key::KEY_SEMICOLON),
    ("'", Key::KEY_APOSTROPHE),
    ("`", Key::KEY_GRAVE),
    ("\\", Key::KEY_BACKSLASH),
    (",", Key::KEY_COMMA),
    (".", Key::KEY_DOT),
    ("PERIOD", Key::KEY_DOT),
    ("/", Key::KEY_SLASH),
    // Navigation
    ("UPARROW", Key::KEY_UP),
    ("DOWNARROW", Key::KEY_DOWN),
    ("LEFTARROW", Key::KEY_LEFT),
    ("RIGHTARROW", Key::KEY_RIGHT),
    ("PGUP", Key::KEY_PAGEUP),
    ("PGDN", Key::KEY_PAGEDOWN),
    ("PGDOWN", Key::KEY_PAGEDOWN),
    ("INS", Key::KEY_INSERT),
    ("DEL", Key::KEY_DELETE),
    // Numpad
    ("NUMPAD0", Key::KEY_KP0),
    ("NUMPAD1", Key::KEY_KP1),
    ("NUMPAD2", Key::KEY_KP2),
    ("NUMPAD3", Key::KEY_KP3),
    ("NUMPAD4", Key::KEY_KP4),
    ("NUMPAD5", Key::KEY_KP5),
    ("NUMPAD6", Key::KEY_KP6),
    ("NUMPAD7", Key::KEY_KP7),
    ("NUMPAD8", Key::KEY_KP8),
    ("NUMPAD9", Key::KEY_KP9),
    ("KPDECIMAL", Key::KEY_KPDOT),
    ("KPADD", Key::KEY_KPPLUS),
    ("KPSUBTRACT", Key::KEY_KPMINUS),
    ("KPMULTIPLY", Key::KEY_KPASTERISK),
    ("KPDIVIDE", Key::KEY_KPSLASH),
    // Media
    ("XF86BACK", Key::KEY_BACK),
    ("XF86FORWARD", Key::KEY_FORWARD),
];

/// Resolve a symbolic key name to an evdev key.
///
/// Returns `None` if the name matches neither an alias nor a kernel key name.
pub fn resolve_key(name: &str) -> Option<Key> {
    let upper = name.trim().to_uppercase();
    if upper.is_empty() {
        return None;
    }

    let bare = upper.strip_prefix("KEY_").unwrap_or(&upper);

    if let Some((_, key)) = ALIASES.iter().find(|(alias, _)| *alias == bare) {
        return Some(*key);
    }

    Key::from_str(&format!("KEY_{}", bare)).ok()
}
