//! Auto-refresh: eligibility selection and the periodic driver.

mod driver;
mod selection;

pub use driver::{AutoRefreshDriver, AutoRefreshRun, MIN_LOOP_SECONDS};
pub use selection::{claim_auto_refresh_batch, eligible_actors, SelectionPolicy};
