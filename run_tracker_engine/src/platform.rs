use std::time::Duration;

use chrono::{DateTime, Utc};

/// The device location provider. Requests are fire-and-forget, fixes come
/// back through [`crate::TrackingEngine::on_fix`].
pub trait LocationSource: Send {
    fn request_updates(&mut self, interval: Duration);

    fn stop_updates(&mut self);
}

/// Whether any satellite or network location provider is enabled. Must be cheap.
pub trait ProviderStatus: Send {
    fn is_any_provider_enabled(&self) -> bool;
}

pub trait LocationPermissions: Send {
    fn fine_location_granted(&self) -> bool;

    fn coarse_location_granted(&self) -> bool;

    fn any_location_granted(&self) -> bool {
        self.fine_location_granted() || self.coarse_location_granted()
    }
}

pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Static answers for hosts without a permission model or provider toggles.
#[derive(Debug, Clone, Copy)]
pub struct FixedPlatformStatus {
    pub providers_enabled: bool,
    pub permission_granted: bool,
}

impl ProviderStatus for FixedPlatformStatus {
    fn is_any_provider_enabled(&self) -> bool {
        self.providers_enabled
    }
}

impl LocationPermissions for FixedPlatformStatus {
    fn fine_location_granted(&self) -> bool {
        self.permission_granted
    }

    fn coarse_location_granted(&self) -> bool {
        self.permission_granted
    }
}

/// Everything the engine needs from the host device.
pub struct Platform {
    pub location_source: Box<dyn LocationSource>,
    pub provider_status: Box<dyn ProviderStatus>,
    pub permissions: Box<dyn LocationPermissions>,
    pub clock: Box<dyn Clock>,
}

impl Platform {
    pub fn new(location_source: Box<dyn LocationSource>, provider_status: Box<dyn ProviderStatus>, permissions: Box<dyn LocationPermissions>) -> Self {
        Self {
            location_source,
            provider_status,
            permissions,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
