//! REST API explorer and sequence runner.
//!
//! This crate executes user-authored sequences of REST calls against an
//! Asana-style API (`{data: ...}` on success, `{errors: [{message}]}` on
//! failure), feeding values produced by earlier steps into later ones.
//!
//! # Architecture
//!
//! - **models**: endpoints, steps, requests, responses and results
//! - **variables**: expression parsing, resolution against prior results,
//!   inline `{{expr}}` substitution and runtime/stable reference rewriting
//! - **builder**: turns a step plus resolver state into a concrete request
//! - **executor**: runs one step or the whole sequence, including iteration
//!   over arrays produced by earlier steps
//! - **session**: the owned, ordered step list and its results
//! - **transform**: flattening and field mapping of the final result
//! - **export**: the JSON sequence file format
//! - **catalog**, **storage**, **config**, **auth**: collaborators and settings
//!
//! # Variable expressions
//!
//! An expression names a step and walks into its result:
//!
//! ```text
//! step0.data[0].gid
//! 1f0c6d2e-....data[2].memberships[0].project.name
//! ```
//!
//! The head is either a runtime step id or a positional `step<N>` reference.
//! Expressions appear as variable mapping values, as iteration sources, and
//! inline in parameter literals and bodies as `{{step0.data[0].gid}}`.
//!
//! # Usage
//!
//! ```no_run
//! use rest_sequencer::catalog::EndpointCatalog;
//! use rest_sequencer::executor::{ExecutionConfig, SequenceExecutor};
//! use rest_sequencer::models::{EndpointDescriptor, HttpMethod};
//! use rest_sequencer::session::{Session, SessionHandle};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = SessionHandle::new(Session::new(EndpointCatalog::default()));
//! {
//!     let mut s = session.lock();
//!     s.set_token("1/1234567890:abcdef");
//!     s.add_step(EndpointDescriptor::new(HttpMethod::GET, "/workspaces"));
//!     let projects = s.add_step(EndpointDescriptor::new(
//!         HttpMethod::GET,
//!         "/workspaces/{workspace_gid}/projects",
//!     ));
//!     s.step_mut(&projects)
//!         .unwrap()
//!         .map_variable("workspace_gid", "step0.data[0].gid");
//! }
//!
//! let executor = SequenceExecutor::with_reqwest(session.clone(), ExecutionConfig::default())?;
//! for result in executor.run_all().await? {
//!     println!("{:?}", result.http_status());
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod builder;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod export;
pub mod models;
pub mod session;
pub mod storage;
pub mod transform;
pub mod variables;

pub use error::StepError;
pub use executor::SequenceExecutor;
pub use session::{Session, SessionHandle};
