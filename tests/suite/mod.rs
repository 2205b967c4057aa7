//! Integration test modules.

mod cost_rollup;
mod end_to_end;
mod snapshot;
mod staleness;
