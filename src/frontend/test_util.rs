use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    shared::{FrequencyRange, Identifier},
    signal::SpectrumSlice,
};

use super::{FrontendResult, ListenerTuning, RadioFrontend};

/// Frontend returning flat spectra at a configurable level per listener.
pub(crate) struct FakeFrontend {
    default_level: f32,
    levels: Mutex<HashMap<Identifier, f32>>,
    fail_start: bool,
    panicking: Option<(Identifier, usize)>,
    panicking_calls: AtomicUsize,
    center_hz: AtomicU64,
    stopped: AtomicBool,
}

impl FakeFrontend {
    pub fn new(default_level: f32) -> Self {
        Self {
            default_level,
            levels: Mutex::new(HashMap::new()),
            fail_start: false,
            panicking: None,
            panicking_calls: AtomicUsize::new(0),
            center_hz: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::new(-110.0)
        }
    }

    pub fn with_panicking_listener(self, listener: &str) -> Self {
        self.with_listener_panicking_after(listener, 0)
    }

    /// `listener` gets `good_slices` spectrum slices, then every further call panics.
    pub fn with_listener_panicking_after(mut self, listener: &str, good_slices: usize) -> Self {
        self.panicking = Some((Identifier::new(listener).unwrap(), good_slices));
        self
    }

    pub fn set_level(&self, listener: &str, level: f32) {
        self.levels
            .lock()
            .unwrap()
            .insert(Identifier::new(listener).unwrap(), level);
    }

    pub fn center_hz(&self) -> u64 {
        self.center_hz.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn flat(level: f32, bins: usize) -> SpectrumSlice {
        SpectrumSlice::new(
            Utc::now(),
            FrequencyRange::new(145_000_000, 145_012_500).unwrap(),
            vec![level; bins],
        )
    }
}

#[async_trait]
impl RadioFrontend for FakeFrontend {
    async fn start(&self, _listeners: &[ListenerTuning]) -> FrontendResult<()> {
        if self.fail_start {
            return Err("no device attached".into());
        }
        Ok(())
    }

    async fn stop(&self) -> FrontendResult<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn set_center_frequency(&self, hz: u64) -> FrontendResult<()> {
        self.center_hz.store(hz, Ordering::SeqCst);
        Ok(())
    }

    async fn listener_spectrum(&self, listener: &Identifier) -> FrontendResult<SpectrumSlice> {
        if let Some((panicking, good_slices)) = &self.panicking
            && panicking == listener
            && self.panicking_calls.fetch_add(1, Ordering::SeqCst) >= *good_slices
        {
            panic!("channel {listener} lost");
        }

        let level = self
            .levels
            .lock()
            .unwrap()
            .get(listener)
            .copied()
            .unwrap_or(self.default_level);

        Ok(Self::flat(level, 100))
    }

    async fn source_spectrum(&self) -> FrontendResult<SpectrumSlice> {
        Ok(Self::flat(self.default_level, 1024))
    }
}
