use crate::platform::{LocationPermissions, ProviderStatus};

/// Answers whether location fixes can currently be expected.
pub struct GpsAvailabilityMonitor {
    provider_status: Box<dyn ProviderStatus>,
    permissions: Box<dyn LocationPermissions>,
}

impl GpsAvailabilityMonitor {
    pub fn new(provider_status: Box<dyn ProviderStatus>, permissions: Box<dyn LocationPermissions>) -> Self {
        Self {
            provider_status,
            permissions,
        }
    }

    pub fn is_available(&self) -> bool {
        self.provider_status.is_any_provider_enabled()
    }

    pub fn has_location_permission(&self) -> bool {
        self.permissions.any_location_granted()
    }
}

#[cfg(test)]
mod tests {
    use crate::platform::FixedPlatformStatus;

    use super::*;

    #[test]
    fn reports_collaborators() {
        let status = FixedPlatformStatus { providers_enabled: true, permission_granted: false };
        let monitor = GpsAvailabilityMonitor::new(Box::new(status), Box::new(status));

        assert!(monitor.is_available());
        assert!(!monitor.has_location_permission());
    }
}
