//! Per-band chain parameters
//!
//! Bypass/mute/solo for one band's chain, as seen by automation and
//! persistence. Every setter notifies an observer injected at construction,
//! even when the value did not change; interpreting the values is up to the
//! control layer (see [`ChainParamsState::apply_to`]).

use serde::{Deserialize, Serialize};

use crate::engine::{CommandError, CrossoverHandle};

/// Snapshot of a band's chain parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainParamsState {
    pub bypass: bool,
    pub mute: bool,
    pub solo: bool,
}

impl ChainParamsState {
    /// Forward this snapshot to the crossover for `band`
    ///
    /// Mute and solo map one-to-one; a bypassed chain makes the band inactive
    /// so its filtered signal passes without the chain. The three flags travel
    /// in one command: either all of them apply in the same block or, on
    /// `QueueFull`, none do.
    pub fn apply_to(&self, band: usize, handle: &mut CrossoverHandle) -> Result<(), CommandError> {
        handle.set_flags(band, !self.bypass, self.mute, self.solo)
    }
}

/// Receives chain parameter updates
pub trait ChainParamsObserver: Send {
    /// Called after any field is set
    fn params_changed(&mut self, state: ChainParamsState);
}

impl<F> ChainParamsObserver for F
where
    F: FnMut(ChainParamsState) + Send,
{
    fn params_changed(&mut self, state: ChainParamsState) {
        self(state)
    }
}

/// Bypass/mute/solo holder with an update hook
pub struct ChainParameters {
    state: ChainParamsState,
    observer: Box<dyn ChainParamsObserver>,
}

impl ChainParameters {
    /// Create with all flags cleared
    pub fn new(observer: impl ChainParamsObserver + 'static) -> Self {
        Self::with_state(ChainParamsState::default(), observer)
    }

    /// Create from a restored snapshot (does not notify)
    pub fn with_state(state: ChainParamsState, observer: impl ChainParamsObserver + 'static) -> Self {
        Self {
            state,
            observer: Box::new(observer),
        }
    }

    pub fn state(&self) -> ChainParamsState {
        self.state
    }

    pub fn bypass(&self) -> bool {
        self.state.bypass
    }

    pub fn mute(&self) -> bool {
        self.state.mute
    }

    pub fn solo(&self) -> bool {
        self.state.solo
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.state.bypass = bypass;
        self.notify();
    }

    pub fn set_mute(&mut self, mute: bool) {
        self.state.mute = mute;
        self.notify();
    }

    pub fn set_solo(&mut self, solo: bool) {
        self.state.solo = solo;
        self.notify();
    }

    fn notify(&mut self) {
        self.observer.params_changed(self.state);
    }
}

impl std::fmt::Debug for ChainParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainParameters")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
