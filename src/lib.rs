//! Generation core for `git-cx`: drafts Conventional Commits messages from a
//! staged diff through a pluggable text-generation backend.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod exec;
pub mod parsers;
pub mod pipeline;
pub mod prompt;

pub use config::Settings;
pub use dispatch::registry::{BackendKind, create_provider};
pub use dispatch::{DetailProvider, GenerateRequest, Provider};
pub use error::CxError;
pub use parsers::Detail;
pub use pipeline::{CommitPipeline, GenerationEvent, Selection, StagedChanges};
