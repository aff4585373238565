//! Generic `JumpActuator` trait for the single discrete game input.

use dinobot_types::DinoError;

/// A device that can emit one discrete "jump" input.
///
/// The control loop only cares that the input was dispatched; nothing is
/// read back.
pub trait JumpActuator {
    /// Stable identifier for this actuator, e.g. `"keyboard:space"`.
    fn id(&self) -> &str;

    /// Emit one jump.
    ///
    /// # Errors
    ///
    /// Returns [`DinoError::Actuation`] if the input could not be dispatched.
    fn jump(&mut self) -> Result<(), DinoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingActuator {
        jumps: u32,
    }

    impl JumpActuator for CountingActuator {
        fn id(&self) -> &str {
            "counting"
        }

        fn jump(&mut self) -> Result<(), DinoError> {
            self.jumps += 1;
            Ok(())
        }
    }

    #[test]
    fn trait_object_dispatches_jump() {
        let mut act = CountingActuator { jumps: 0 };
        {
            let dyn_act: &mut dyn JumpActuator = &mut act;
            assert_eq!(dyn_act.id(), "counting");
            dyn_act.jump().unwrap();
            dyn_act.jump().unwrap();
        }
        assert_eq!(act.jumps, 2);
    }
}
