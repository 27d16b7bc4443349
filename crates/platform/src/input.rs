//! Keyboard input translation.

use winit::keyboard::{KeyCode, PhysicalKey};

/// Keys the application reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Closes the application.
    Escape,
    /// Any other physical key.
    Other(KeyCode),
    /// A key winit could not identify.
    Unidentified,
}

impl From<PhysicalKey> for Key {
    fn from(key: PhysicalKey) -> Self {
        match key {
            PhysicalKey::Code(KeyCode::Escape) => Key::Escape,
            PhysicalKey::Code(code) => Key::Other(code),
            PhysicalKey::Unidentified(_) => Key::Unidentified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::NativeKeyCode;

    #[test]
    fn test_escape_maps_to_escape() {
        assert_eq!(Key::from(PhysicalKey::Code(KeyCode::Escape)), Key::Escape);
    }

    #[test]
    fn test_other_keys_keep_code() {
        assert_eq!(
            Key::from(PhysicalKey::Code(KeyCode::KeyW)),
            Key::Other(KeyCode::KeyW)
        );
        assert_eq!(
            Key::from(PhysicalKey::Unidentified(NativeKeyCode::Unidentified)),
            Key::Unidentified
        );
    }
}
