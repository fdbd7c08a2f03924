//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod buffer;
pub mod debug;
pub mod error;
pub mod exec;
pub mod invariant;
pub mod pending;
pub mod replayer;
pub mod simulation;
pub mod sync;
pub mod violation;
pub mod worker;

pub use buffer::OpenFlowBuffer;
pub use error::Error;
pub use invariant::InvariantRegistry;
pub use replayer::{Replayer, ReplayerConfig};
pub use simulation::Simulation;
pub use violation::ViolationTracker;
