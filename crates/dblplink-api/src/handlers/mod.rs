//! Handler modules for dblplink-api.

pub mod linking;

pub use linking::{get_candidates, get_final_result, get_spans, link_entities};
