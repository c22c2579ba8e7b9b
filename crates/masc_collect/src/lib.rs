//! masc_collect - Diagnostic collection from MySQL servers
//!
//! This crate provides:
//! - [`ClientRunner`]: one command through the external client, with timeout
//! - [`ParallelCollector`]: the full command set against one target
//! - [`CollectionJob`]: a sequence of targets, reported to a job store
//!
//! # Failure model
//!
//! A failed command is a [`CommandResult`] with `success == false`, never an
//! `Err`. It still produces a transcript block, so the raw transcript always
//! shows what happened. Only infrastructure problems (the job store) surface
//! as [`CollectError`].

use thiserror::Error;

pub mod collector;
pub mod job;
pub mod runner;
pub mod transcript;

#[cfg(test)]
mod testing;

pub use collector::{Collection, ParallelCollector};
pub use job::{CollectionJob, HostOutcome, JobSummary};
pub use masc_parse::{CommandKind, DIAGNOSTIC_COMMANDS, DiagnosticCommand};
pub use runner::{ClientRunner, CommandResult, CommandRunner};
pub use transcript::{CommandTiming, TimingReport};

/// Collection errors
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Host {0} not found")]
    HostNotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] masc_store::StoreError),
}
