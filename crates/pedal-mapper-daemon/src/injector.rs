//! Virtual keyboard injection via uinput
//!
//! [`KeyInjector`] turns button transitions into ordered key events on a
//! [`KeySink`]. [`VirtualKeyboard`] is the uinput-backed sink used in
//! production.

use std::io;

use evdev::uinput::VirtualDeviceBuilder;
use evdev::{AttributeSet, EventType, InputEvent, Key};
use pedal_mapper_config::{Button, ButtonMapping};
use thiserror::Error;

/// Name the virtual keyboard registers with the kernel
pub const VIRTUAL_DEVICE_NAME: &str = "Pedal Mapper Virtual Input";

/// Errors raised by the virtual keyboard
#[derive(Debug, Error)]
pub enum InjectError {
    #[error("Failed to create virtual keyboard (is /dev/uinput writable?): {source}")]
    VirtualDeviceCreationFailed {
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {key:?} to virtual keyboard: {source}")]
    EmissionFailure {
        key: Key,
        #[source]
        source: io::Error,
    },
}

/// Destination for synthesized key events.
pub trait KeySink {
    /// Queue a single key transition.
    fn emit(&mut self, key: Key, pressed: bool) -> io::Result<()>;

    /// Deliver everything queued since the last sync as one report.
    fn sync(&mut self) -> io::Result<()>;
}

/// A uinput keyboard limited to the keys the mapping uses
pub struct VirtualKeyboard {
    device: evdev::uinput::VirtualDevice,
    pending: Vec<InputEvent>,
}

impl VirtualKeyboard {
    /// Create a virtual keyboard that can emit exactly `keys`
    pub fn new(name: &str, keys: &AttributeSet<Key>) -> Result<Self, InjectError> {
        let device = VirtualDeviceBuilder::new()
            .and_then(|builder| builder.name(name).with_keys(keys))
            .and_then(|builder| builder.build())
            .map_err(|source| InjectError::VirtualDeviceCreationFailed { source })?;

        tracing::info!("Created virtual keyboard '{}'", name);
        Ok(Self {
            device,
            pending: Vec::new(),
        })
    }
}

impl KeySink for VirtualKeyboard {
    fn emit(&mut self, key: Key, pressed: bool) -> io::Result<()> {
        self.pending
            .push(InputEvent::new(EventType::KEY, key.code(), i32::from(pressed)));
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        // evdev terminates each emitted batch with SYN_REPORT
        let result = self.device.emit(&self.pending);
        self.pending.clear();
        result
    }
}

/// Plays a button's combos on a [`KeySink`].
pub struct KeyInjector<K> {
    sink: K,
    mapping: ButtonMapping,
}

impl<K: KeySink> KeyInjector<K> {
    pub fn new(sink: K, mapping: ButtonMapping) -> Self {
        Self { sink, mapping }
    }

    /// Emit the key events for `button` changing to `pressed`.
    ///
    /// Combos are played in order. On press, each combo's mods go down before
    /// its keys; on release, its keys come up before its mods. Every single
    /// key event is followed by a sync. The first failed write aborts the
    /// sequence without releasing anything already pressed.
    pub fn handle_key(&mut self, button: Button, pressed: bool) -> Result<(), InjectError> {
        let Self { sink, mapping } = self;

        for combo in mapping.combos(button) {
            if pressed {
                for key in combo.mods().iter().chain(combo.keys()) {
                    write_key(sink, *key, true)?;
                }
            } else {
                for key in combo.keys().iter().chain(combo.mods()) {
                    write_key(sink, *key, false)?;
                }
            }
        }

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn sink(&self) -> &K {
        &self.sink
    }
}

fn write_key<K: KeySink>(sink: &mut K, key: Key, pressed: bool) -> Result<(), InjectError> {
    tracing::debug!("{:?} {}", key, if pressed { "down" } else { "up" });
    sink.emit(key, pressed)
        .and_then(|()| sink.sync())
        .map_err(|source| InjectError::EmissionFailure { key, source })
}
