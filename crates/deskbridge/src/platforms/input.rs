use crate::platforms::InputInjector;
use crate::{AutomationError, MouseButton};
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Input injection through enigo. All event synthesis goes through one
/// `Enigo` handle behind a mutex; the lock is never held across an await.
pub struct EnigoInput {
    enigo: Mutex<Enigo>,
}

impl EnigoInput {
    pub fn new() -> Result<Self, AutomationError> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| {
            AutomationError::ExternalFailure(format!("Failed to open input connection: {e}"))
        })?;
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }

    fn with_enigo<T>(
        &self,
        f: impl FnOnce(&mut Enigo) -> Result<T, enigo::InputError>,
    ) -> Result<T, AutomationError> {
        let mut enigo = self
            .enigo
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut enigo).map_err(|e| AutomationError::ExternalFailure(format!("Input failed: {e}")))
    }
}

fn to_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

/// Resolve a key name from the wire protocol to an enigo key. Names are
/// matched lowercased; single characters map to their unicode key.
pub fn parse_key(name: &str) -> Result<Key, AutomationError> {
    let normalized = name.trim().to_lowercase();
    let key = match normalized.as_str() {
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "esc" | "escape" => Key::Escape,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "page_up" => Key::PageUp,
        "pagedown" | "page_down" => Key::PageDown,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "cmd" | "command" | "win" | "super" | "meta" => Key::Meta,
        "ctrl" | "control" => Key::Control,
        "alt" | "option" => Key::Alt,
        "shift" => Key::Shift,
        "capslock" => Key::CapsLock,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => {
                    return Err(AutomationError::InvalidInput(format!(
                        "Unknown key: {name}"
                    )))
                }
            }
        }
    };
    Ok(key)
}

/// Interpolation step length for animated pointer moves.
const MOVE_STEP: Duration = Duration::from_millis(16);

#[async_trait::async_trait]
impl InputInjector for EnigoInput {
    async fn move_to(&self, x: i32, y: i32, duration: Duration) -> Result<(), AutomationError> {
        if duration.is_zero() {
            return self.with_enigo(|e| e.move_mouse(x, y, Coordinate::Abs));
        }

        let (sx, sy) = self.with_enigo(|e| e.location())?;
        let steps = (duration.as_millis() / MOVE_STEP.as_millis()).clamp(1, 60) as i32;
        for i in 1..=steps {
            let t = f64::from(i) / f64::from(steps);
            let nx = sx + ((x - sx) as f64 * t).round() as i32;
            let ny = sy + ((y - sy) as f64 * t).round() as i32;
            self.with_enigo(|e| e.move_mouse(nx, ny, Coordinate::Abs))?;
            tokio::time::sleep(duration / steps as u32).await;
        }
        Ok(())
    }

    async fn click(
        &self,
        x: i32,
        y: i32,
        button: MouseButton,
        clicks: u32,
    ) -> Result<(), AutomationError> {
        debug!(x, y, button = button.as_str(), clicks, "click");
        self.with_enigo(|e| e.move_mouse(x, y, Coordinate::Abs))?;
        for _ in 0..clicks.max(1) {
            self.with_enigo(|e| e.button(to_button(button), Direction::Click))?;
        }
        Ok(())
    }

    async fn drag(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration: Duration,
        button: MouseButton,
    ) -> Result<(), AutomationError> {
        self.move_to(from.0, from.1, Duration::from_millis(200)).await?;
        tokio::time::sleep(Duration::from_millis(100)).await;

        self.with_enigo(|e| e.button(to_button(button), Direction::Press))?;
        let result = self.move_to(to.0, to.1, duration).await;
        // Release even when the move failed midway, or the button stays stuck.
        let release = self.with_enigo(|e| e.button(to_button(button), Direction::Release));
        result.and(release)
    }

    async fn scroll(&self, amount: i32, at: Option<(i32, i32)>) -> Result<(), AutomationError> {
        if let Some((x, y)) = at {
            self.with_enigo(|e| e.move_mouse(x, y, Coordinate::Abs))?;
        }
        // Protocol direction: negative scrolls down. Enigo's vertical axis is
        // inverted relative to that.
        self.with_enigo(|e| e.scroll(-amount, Axis::Vertical))
    }

    async fn press(&self, key: &str) -> Result<(), AutomationError> {
        let key = parse_key(key)?;
        self.with_enigo(|e| e.key(key, Direction::Click))
    }

    async fn hotkey(&self, keys: &[String]) -> Result<(), AutomationError> {
        let parsed = keys
            .iter()
            .map(|k| parse_key(k))
            .collect::<Result<Vec<_>, _>>()?;

        for key in &parsed {
            self.with_enigo(|e| e.key(*key, Direction::Press))?;
        }
        for key in parsed.iter().rev() {
            self.with_enigo(|e| e.key(*key, Direction::Release))?;
        }
        Ok(())
    }

    async fn write(&self, text: &str, interval: Duration) -> Result<(), AutomationError> {
        for ch in text.chars() {
            match ch {
                '\n' => self.with_enigo(|e| e.key(Key::Return, Direction::Click))?,
                '\t' => self.with_enigo(|e| e.key(Key::Tab, Direction::Click))?,
                _ => self.with_enigo(|e| e.key(Key::Unicode(ch), Direction::Click))?,
            }
            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }
        Ok(())
    }

    async fn position(&self) -> Result<(i32, i32), AutomationError> {
        self.with_enigo(|e| e.location())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_resolve() {
        assert!(matches!(parse_key("enter"), Ok(Key::Return)));
        assert!(matches!(parse_key("ESC"), Ok(Key::Escape)));
        assert!(matches!(parse_key(" f5 "), Ok(Key::F5)));
        assert!(matches!(parse_key("cmd"), Ok(Key::Meta)));
    }

    #[test]
    fn single_characters_become_unicode_keys() {
        assert!(matches!(parse_key("a"), Ok(Key::Unicode('a'))));
        assert!(matches!(parse_key("V"), Ok(Key::Unicode('v'))));
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(
            parse_key("bogus"),
            Err(AutomationError::InvalidInput(_))
        ));
    }
}
