//! The poll → inject loop

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use evdev::{AttributeSet, Key};
use pedal_mapper_config::MapperSettings;

use crate::device::{self, DeviceError, PedalDevice, ReportSource};
use crate::injector::{InjectError, KeyInjector, KeySink, VirtualKeyboard, VIRTUAL_DEVICE_NAME};
use crate::poller::{ButtonEvent, Poller};

/// Cooperative stop signal for [`PedalMapper::run`].
///
/// Cloning shares the flag, so one clone can be handed to a signal handler
/// and another to the loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    cancelled: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Owns the pedal poller and the key injector and wires one into the other.
pub struct PedalMapper<S, K> {
    poller: Poller<S>,
    injector: KeyInjector<K>,
}

impl PedalMapper<PedalDevice, VirtualKeyboard> {
    /// Open the hidraw pedal and a uinput keyboard for `settings`.
    pub fn open(settings: MapperSettings) -> Result<Self> {
        let polling_rate = settings.polling_rate;

        Self::open_with(
            settings,
            || {
                let pedal = device::open_pedal()?;
                tracing::info!("Polling {} every {:?}", pedal.path().display(), polling_rate);
                Ok(pedal)
            },
            |keys| VirtualKeyboard::new(VIRTUAL_DEVICE_NAME, keys),
        )
    }
}

impl<S: ReportSource, K: KeySink> PedalMapper<S, K> {
    pub fn new(poller: Poller<S>, injector: KeyInjector<K>) -> Self {
        Self { poller, injector }
    }

    /// Open the report source, then build the key sink from the keys the
    /// mapping can emit.
    ///
    /// If the sink cannot be built the source is closed before the error is
    /// returned.
    pub fn open_with<OS, MK>(settings: MapperSettings, open_source: OS, make_sink: MK) -> Result<Self>
    where
        OS: FnOnce() -> Result<S, DeviceError>,
        MK: FnOnce(&AttributeSet<Key>) -> Result<K, InjectError>,
    {
        let source = open_source()?;

        if settings.mapping.is_empty() {
            tracing::warn!("No keys are mapped to any button; the pedal will do nothing");
        }

        let sink = match make_sink(&settings.mapping.capabilities()) {
            Ok(sink) => sink,
            Err(e) => {
                drop(source);
                return Err(e.into());
            }
        };

        Ok(Self::new(
            Poller::new(source, settings.polling_rate),
            KeyInjector::new(sink, settings.mapping),
        ))
    }

    /// Poll once and inject the resulting transition, if any.
    pub fn step(&mut self) -> Result<Option<ButtonEvent>> {
        let event = self.poller.poll().context("Pedal read failed")?;

        if let Some(ButtonEvent { button, pressed }) = event {
            self.injector
                .handle_key(button, pressed)
                .with_context(|| format!("Failed to inject keys for {}", button))?;
        }

        Ok(event)
    }

    /// Run until `shutdown` is cancelled or an error occurs.
    ///
    /// Cancellation is noticed between polls, so within one polling
    /// interval. On cancellation every button still held has its release
    /// sequence played. On error nothing is released.
    pub fn run(&mut self, shutdown: &ShutdownToken) -> Result<()> {
        tracing::info!("Listening for pedal events");

        while !shutdown.is_cancelled() {
            self.step()?;
        }

        self.release_held()
    }

    /// Play the release sequence of every button currently considered
    /// pressed. Button state itself is left untouched.
    fn release_held(&mut self) -> Result<()> {
        let held: Vec<_> = self.poller.state().pressed_buttons().collect();

        for button in held {
            tracing::info!("Releasing keys held by {}", button);
            self.injector
                .handle_key(button, false)
                .with_context(|| format!("Failed to release keys for {}", button))?;
        }

        Ok(())
    }
}

impl<S, K> PedalMapper<S, K>
where
    S: ReportSource + Send + 'static,
    K: KeySink + Send + 'static,
{
    /// Run the loop on a blocking thread until it fails or `stop` resolves.
    ///
    /// The loop is cancelled and joined whenever `stop` resolves, even with
    /// an error, so no poll thread outlives this call. A `stop` error is
    /// returned after the loop has finished.
    pub async fn run_until<F>(mut self, stop: F) -> Result<()>
    where
        F: Future<Output = io::Result<&'static str>>,
    {
        let shutdown = ShutdownToken::new();
        let worker_shutdown = shutdown.clone();
        let mut worker = tokio::task::spawn_blocking(move || self.run(&worker_shutdown));

        let stopped = tokio::select! {
            result = &mut worker => {
                // The loop only ends on its own when it fails
                return result.context("Poll loop panicked")?;
            }
            stopped = stop => stopped,
        };

        shutdown.cancel();
        match &stopped {
            Ok(name) => tracing::info!("Received {}, shutting down...", name),
            Err(e) => tracing::error!("Stopping poll loop: {}", e),
        }

        worker.await.context("Poll loop panicked")??;
        stopped.context("Failed to install signal handlers")?;
        Ok(())
    }
}
