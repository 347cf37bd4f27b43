//! # Core Application Logic
//!
//! Browsing logic: what is listed, what is loaded, what is selected.
//! It knows nothing about ratatui or about Redis.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • NavigationState      │
//!                    │  • Action (events)      │
//!                    │  • update() (reducer)   │
//!                    │  • task (async fetches) │
//!                    └───────────┬─────────────┘
//!                                │
//!            ┌───────────────────┴───────────────────┐
//!            ▼                                       ▼
//!     ┌────────────┐                          ┌────────────┐
//!     │    TUI     │                          │   store    │
//!     │  Adapter   │                          │ DataSource │
//!     │ (ratatui)  │                          │  (redis)   │
//!     └────────────┘                          └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`state`]: `NavigationState`, everything the renderer reads
//! - [`action`]: the `Action` enum and the `update()` reducer
//! - [`lister`]: key pages over `SCAN`
//! - [`loader`]: value pages and the `ValueView` variants
//! - [`task`]: runs fetch requests against a `DataSource`
//! - [`config`]: config file, environment and CLI resolution

pub mod action;
pub mod config;
pub mod lister;
pub mod loader;
pub mod state;
pub mod task;
