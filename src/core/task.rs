//! # Tasks
//!
//! Runs the I/O described by an [`Effect`](crate::core::action::Effect) and
//! turns the outcome back into an [`Action`]. The TUI spawns one task per
//! request; tests await them inline.

use log::{debug, warn};

use crate::core::action::{Action, Request};
use crate::core::lister::fetch_page;
use crate::core::loader::load;
use crate::store::DataSource;

pub async fn perform(source: &dyn DataSource, request: Request) -> Action {
    match request {
        Request::Keys(request) => {
            debug!(
                "Scanning {:?} from cursor {} (limit {})",
                request.pattern, request.cursor, request.limit
            );
            let result = fetch_page(source, &request).await;
            if let Err(e) = &result {
                warn!("Key scan failed: {}", e);
            }
            Action::KeysLoaded { request, result }
        }
        Request::KeyCount => Action::KeyCountLoaded(source.key_count().await),
        Request::Slice(request) => {
            debug!(
                "Loading {} ({}) at offset {} cursor {}",
                request.key, request.kind, request.start.offset, request.start.cursor
            );
            let result = load(source, &request).await;
            if let Err(e) = &result {
                warn!("Loading {} failed: {}", request.key, e);
            }
            Action::SliceLoaded { request, result }
        }
        Request::Probe(request) => {
            let result = source.get_type(&request.key).await;
            Action::TypeProbed { request, result }
        }
    }
}
