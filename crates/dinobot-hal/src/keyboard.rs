//! Live keyboard input through `enigo`.

use dinobot_types::DinoError;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tracing::debug;

use crate::actuator::JumpActuator;

/// [`JumpActuator`] that clicks a key (space by default) on the focused
/// window.
pub struct KeyboardActuator {
    id: String,
    key: Key,
    enigo: Enigo,
}

impl KeyboardActuator {
    /// Connect to the platform input backend, jumping with the space bar.
    ///
    /// # Errors
    ///
    /// Returns [`DinoError::Actuation`] when no input connection can be
    /// established (e.g. missing accessibility permission).
    pub fn new() -> Result<Self, DinoError> {
        Self::with_key(Key::Space, "keyboard:space")
    }

    /// Connect to the platform input backend, jumping with `key`.
    ///
    /// # Errors
    ///
    /// See [`KeyboardActuator::new`].
    pub fn with_key(key: Key, id: impl Into<String>) -> Result<Self, DinoError> {
        let id = id.into();
        let enigo = Enigo::new(&Settings::default()).map_err(|e| DinoError::Actuation {
            actuator: id.clone(),
            details: format!("input backend unavailable: {e}"),
        })?;
        Ok(Self { id, key, enigo })
    }
}

impl JumpActuator for KeyboardActuator {
    fn id(&self) -> &str {
        &self.id
    }

    fn jump(&mut self) -> Result<(), DinoError> {
        debug!(actuator = %self.id, "pressing jump key");
        self.enigo
            .key(self.key, Direction::Click)
            .map_err(|e| DinoError::Actuation {
                actuator: self.id.clone(),
                details: e.to_string(),
            })
    }
}
