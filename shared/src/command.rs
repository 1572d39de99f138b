//! Input decoding, kept apart from the controller so it can be exercised
//! without real devices.

#[derive(Debug, Clone, PartialEq)]
pub enum KeyCommand {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    ZoomIn,
    ZoomOut,
    Reset,
    ToggleBorders,
    ToggleCompass,
    FocusSearch,
    ExitSearch,
    JumpTo(String),
}

/// Decoded user input, one variant per controller entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Pointer or single-finger drag, in screen pixels.
    Drag { dx: f64, dy: f64 },
    /// Wheel delta in CSS pixels, anchored at a screen point.
    Wheel { delta_y: f64, x: f64, y: f64 },
    /// Two-finger pinch: distance ratio since the last event and its midpoint.
    Pinch { scale: f64, x: f64, y: f64 },
    Key(KeyCommand),
    SearchSubmit(String),
    Resize { width: f64, height: f64 },
}

/// Map a `KeyboardEvent.key` value to a command.
///
/// While search is active every key except `Escape` belongs to the text field.
/// Digits `1`..`9` jump to the matching entry of `bookmarks`.
pub fn decode_key(key: &str, search_active: bool, bookmarks: &[String]) -> Option<KeyCommand> {
    if key == "Escape" {
        return Some(KeyCommand::ExitSearch);
    }
    if search_active {
        return None;
    }

    let cmd = match key {
        "ArrowUp" => KeyCommand::MoveUp,
        "ArrowDown" => KeyCommand::MoveDown,
        "ArrowLeft" => KeyCommand::MoveLeft,
        "ArrowRight" => KeyCommand::MoveRight,
        "+" | "=" => KeyCommand::ZoomIn,
        "-" | "_" => KeyCommand::ZoomOut,
        "0" => KeyCommand::Reset,
        "/" => KeyCommand::FocusSearch,
        "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9" => {
            let index = key.parse::<usize>().ok()?.checked_sub(1)?;
            return bookmarks.get(index).cloned().map(KeyCommand::JumpTo);
        }
        other => match other.to_ascii_lowercase().as_str() {
            "w" => KeyCommand::MoveUp,
            "s" => KeyCommand::MoveDown,
            "a" => KeyCommand::MoveLeft,
            "d" => KeyCommand::MoveRight,
            "r" => KeyCommand::Reset,
            "b" => KeyCommand::ToggleBorders,
            "c" => KeyCommand::ToggleCompass,
            "f" => KeyCommand::FocusSearch,
            _ => return None,
        },
    };
    Some(cmd)
}
