//! Button edge detection over raw pedal reports
//!
//! Each report carries one state byte per button at fixed offsets. The
//! poller keeps its own idea of which buttons are down and, on every read,
//! reports the first button whose byte disagrees with it, flipping that
//! button's state.
//!
//! A byte agrees only if it is exactly `1` for a pressed button or `0` for
//! a released one. Any other value disagrees with both states, so the
//! button toggles on every read that carries it.
//!
//! Only one transition is reported per read. If two buttons change within
//! the same report, the later one (in LEFT, MIDDLE, RIGHT order) goes
//! unnoticed until its byte changes again.

use std::time::Duration;

use pedal_mapper_config::Button;

use crate::device::{DeviceError, ReportSource, REPORT_SIZE};

/// Report offsets of the LEFT, MIDDLE and RIGHT state bytes
pub const BUTTON_OFFSETS: [usize; 3] = [4, 5, 6];

/// A single detected button transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: Button,
    pub pressed: bool,
}

/// Which buttons are currently considered pressed.
///
/// This is the parity of transitions seen since startup. If a read is ever
/// missed it can drift from the physical state of the pedal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pressed: [bool; 3],
}

impl ButtonState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed[button.index()]
    }

    /// Buttons currently considered pressed, in report order
    pub fn pressed_buttons(&self) -> impl Iterator<Item = Button> + '_ {
        Button::ALL.into_iter().filter(|b| self.is_pressed(*b))
    }

    /// Compare `report` against the current state and toggle the first
    /// mismatching button.
    ///
    /// `report` must cover every offset in [`BUTTON_OFFSETS`].
    pub fn detect(&mut self, report: &[u8]) -> Option<ButtonEvent> {
        let button = Button::ALL
            .into_iter()
            .find(|b| report[BUTTON_OFFSETS[b.index()]] != u8::from(self.is_pressed(*b)))?;

        let slot = &mut self.pressed[button.index()];
        *slot = !*slot;

        Some(ButtonEvent {
            button,
            pressed: *slot,
        })
    }
}

/// Reads reports from a [`ReportSource`] and turns them into button events.
pub struct Poller<S> {
    source: S,
    state: ButtonState,
    timeout: Duration,
}

impl<S: ReportSource> Poller<S> {
    /// Create a poller with every button released.
    ///
    /// `timeout` bounds how long a single [`poll`](Self::poll) blocks.
    pub fn new(source: S, timeout: Duration) -> Self {
        Self {
            source,
            state: ButtonState::new(),
            timeout,
        }
    }

    pub fn state(&self) -> &ButtonState {
        &self.state
    }

    /// Perform one bounded read and return the transition it reveals, if any.
    ///
    /// A read that times out yields `Ok(None)`.
    pub fn poll(&mut self) -> Result<Option<ButtonEvent>, DeviceError> {
        let mut buf = [0u8; REPORT_SIZE];
        let n = self.source.read_report(&mut buf, self.timeout)?;

        if n == 0 {
            tracing::trace!("No report within {:?}", self.timeout);
            return Ok(None);
        }

        let needed = BUTTON_OFFSETS[2] + 1;
        if n < needed {
            tracing::warn!("Ignoring short report ({} of {} bytes)", n, needed);
            return Ok(None);
        }

        let event = self.state.detect(&buf[..n]);
        if let Some(event) = event {
            tracing::debug!(
                "{} {}",
                event.button,
                if event.pressed { "pressed" } else { "released" }
            );
        }
        Ok(event)
    }
}
