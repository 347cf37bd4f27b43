//! # TUI Components
//!
//! All UI components for the terminal interface.
//!
//! ## Component Architecture
//!
//! ### Stateless Components (Props-Based Rendering)
//!
//! Display components that receive all data as struct fields:
//! - `TitleBar`: source label, key count, pattern, spinner
//! - `StatusLine`: error or key hints
//!
//! ### Borrowed-State Components
//!
//! Created each frame with props plus a `&mut` to presentation state that
//! lives in `TuiState` (selection, scroll offset):
//! - `KeyList`: the LIST screen
//! - `ValuePane`: the DETAIL screen, one sub-view per value type
//!
//! ### Event-Driven Components
//!
//! - `FilterBox`: pattern prompt, emits `FilterEvent`s
//!
//! ## Module Structure
//!
//! ```text
//! components/
//! ├── mod.rs           (this file)
//! ├── title_bar.rs     (top line)
//! ├── key_list.rs      (key page)
//! ├── value_pane.rs    (value sub-views)
//! ├── status_line.rs   (bottom line)
//! └── filter_box.rs    (pattern prompt)
//! ```

pub mod filter_box;
pub mod key_list;
pub mod status_line;
pub mod title_bar;
pub mod value_pane;

pub use filter_box::{FilterBox, FilterEvent};
pub use key_list::KeyList;
pub use status_line::StatusLine;
pub use title_bar::TitleBar;
pub use value_pane::{ValuePane, ValuePaneState};
