//! Bundle of ports implementing a single council.

use std::sync::Arc;

use crate::model::CouncilMeta;
use crate::ports::{AddressPort, SchedulePort};

/// Collection of ports implementing a provider for a single council.
#[derive(Clone)]
pub struct CouncilPlugin {
    /// Static metadata describing the council.
    pub meta: CouncilMeta,
    /// Implementation for resolving addresses.
    pub address_port: Arc<dyn AddressPort>,
    /// Implementation for fetching schedules.
    pub schedule_port: Arc<dyn SchedulePort>,
}
