//! Dispatcher types and the per-mapping dispatcher bitmask.
//!
//! # Design Decisions
//! - Bit values follow the order ERROR, FORWARD, INCLUDE, REQUEST, ASYNC
//! - A mapping that never names a dispatcher applies to REQUEST only

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the current request arrived at this processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DispatcherType {
    /// Initial request from the transport.
    Request,
    /// Internal forward to another servlet.
    Forward,
    /// Internal include of another servlet's output.
    Include,
    /// Resumption of a suspended request.
    Async,
    /// Error page dispatch.
    Error,
}

impl DispatcherType {
    pub const ALL: [DispatcherType; 5] = [
        DispatcherType::Request,
        DispatcherType::Forward,
        DispatcherType::Include,
        DispatcherType::Async,
        DispatcherType::Error,
    ];

    fn bit(self) -> u8 {
        match self {
            DispatcherType::Error => DispatcherMask::ERROR.0,
            DispatcherType::Forward => DispatcherMask::FORWARD.0,
            DispatcherType::Include => DispatcherMask::INCLUDE.0,
            DispatcherType::Request => DispatcherMask::REQUEST.0,
            DispatcherType::Async => DispatcherMask::ASYNC.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DispatcherType::Request => "REQUEST",
            DispatcherType::Forward => "FORWARD",
            DispatcherType::Include => "INCLUDE",
            DispatcherType::Async => "ASYNC",
            DispatcherType::Error => "ERROR",
        }
    }
}

impl fmt::Display for DispatcherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a dispatcher name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dispatcher type: {0}")]
pub struct UnknownDispatcher(pub String);

impl FromStr for DispatcherType {
    type Err = UnknownDispatcher;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DispatcherType::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownDispatcher(s.to_string()))
    }
}

/// Set of dispatcher types a filter mapping applies to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DispatcherMask(u8);

impl DispatcherMask {
    pub const NONE: DispatcherMask = DispatcherMask(0);
    pub const ERROR: DispatcherMask = DispatcherMask(1);
    pub const FORWARD: DispatcherMask = DispatcherMask(2);
    pub const INCLUDE: DispatcherMask = DispatcherMask(4);
    pub const REQUEST: DispatcherMask = DispatcherMask(8);
    pub const ASYNC: DispatcherMask = DispatcherMask(16);

    /// Build a mask from a list of dispatcher types.
    ///
    /// An empty list yields `REQUEST`, the default applied to mappings that
    /// do not name any dispatcher.
    pub fn from_types<I>(types: I) -> Self
    where
        I: IntoIterator<Item = DispatcherType>,
    {
        let mask = types
            .into_iter()
            .fold(DispatcherMask::NONE, |acc, d| acc.with(d));
        if mask.is_empty() {
            DispatcherMask::REQUEST
        } else {
            mask
        }
    }

    pub fn with(self, dispatcher: DispatcherType) -> Self {
        DispatcherMask(self.0 | dispatcher.bit())
    }

    pub fn contains(self, dispatcher: DispatcherType) -> bool {
        self.0 & dispatcher.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl fmt::Debug for DispatcherMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(DispatcherType::ALL.into_iter().filter(|d| self.contains(*d)))
            .finish()
    }
}
