//! Folder backup pipeline for gds.
//!
//! Turns a configured local folder into a tar archive on Google Drive in
//! four stages:
//!
//! 1. [`stage`] - copy the source tree into a staging directory next to the
//!    app config.
//! 2. [`stage::prune_marker_dirs`] - drop dependency directories from the
//!    staged copy.
//! 3. [`archive`] - pack the staged tree into a single tar file, reporting
//!    byte progress.
//! 4. [`upload`] - push the archive to Drive through a resumable session,
//!    creating the remote file on first run and updating it afterwards.
//!
//! [`engine::SyncPipeline`] wires the stages together and is the entry
//! point the CLI drives.

pub mod archive;
pub mod engine;
pub mod stage;
pub mod upload;
