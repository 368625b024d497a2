//! Change-control template sync
//!
//! Mirrors the template and action-bundle collections of the local store onto another
//! server, backing up both sides first.

pub mod auth;
pub mod backup;
pub mod records;
pub mod runner;

pub use runner::TemplateSync;

use crate::config::SyncSettings;
use crate::context::ExecutionContext;
use anyhow::Result;

/// Entry point for the template sync action
pub async fn run(ctx: &dyn ExecutionContext, settings: SyncSettings) -> Result<()> {
    TemplateSync::new(settings).run(ctx).await
}
