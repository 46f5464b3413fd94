//! ZP Records - project records backend for a district council
//!
//! Tracks infrastructure projects and their progress, plus the scholarship
//! and humanitarian aid beneficiary registers. Each progress submission is
//! appended to an immutable log and mirrored into the project's snapshot in
//! a single transaction.
//!
//! ## Architecture
//!
//! - **progress**: pure percentage calculator (status tables + fund blend)
//! - **db**: SQLite repositories for projects, the progress log and the beneficiary registers
//! - **services**: business logic, event emission, HTTP response helpers
//! - **http**: hyper JSON API under `/api`
//! - **auth**: HS256 bearer tokens; writes require the admin role
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/zp-records/
//! ├── records.db      # SQLite (WAL)
//! └── config.toml     # Configuration
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod progress;
pub mod services;

pub use auth::{JwtValidator, Principal};
pub use config::Config;
pub use db::RecordsDb;
pub use error::RecordsError;
pub use http::HttpServer;
pub use progress::ImplementationMethod;
pub use services::Services;
