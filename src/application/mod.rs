//! Application layer - release selection and purge planning.
//!
//! This layer derives what to purge from the gathered system state. The CLI
//! layer in `commands` drives it and performs the side effects.

mod plan;
mod purge;
mod selection;

pub use plan::{PurgePlan, build_plan, kept_pattern};
pub use purge::PurgeAction;
pub use selection::{
    Markers, Selection, SystemReleases, apply_choice, checklist, keep_latest, releases_to_keep,
    select,
};
