//! K3s driver factory implementation.

use crate::driver::{
    DriverOptions, factory::DriverFactory, k3s::K3s, k3s::constants,
    registry::DriverRegistration,
};
use airgap_driver_shared::errors::DriverResult;

pub struct K3sFactory;

impl DriverFactory for K3sFactory {
    type Driver = K3s;

    fn create(options: DriverOptions) -> DriverResult<Self::Driver> {
        K3s::new(options)
    }
}

// Auto-register this factory with the global registry at compile time
inventory::submit! {
    DriverRegistration {
        name: constants::NAME,
        factory: |options| {
            Ok(Box::new(K3sFactory::create(options)?))
        }
    }
}
