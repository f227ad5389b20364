//! Analytics domain errors

use thiserror::Error;

use core_kernel::{PortError, TenantId};

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The portfolio could not be read
    #[error("Failed to read portfolio for tenant {tenant_id}: {source}")]
    Storage {
        tenant_id: TenantId,
        #[source]
        source: PortError,
    },

    #[error("Query is required")]
    EmptyQuery,

    /// The completion collaborator failed
    #[error("Completion service failed: {0}")]
    Completion(#[source] PortError),
}

impl AnalyticsError {
    /// Returns true if repeating the request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            AnalyticsError::Storage { source, .. } | AnalyticsError::Completion(source) => source.is_transient(),
            AnalyticsError::EmptyQuery => false,
        }
    }
}
