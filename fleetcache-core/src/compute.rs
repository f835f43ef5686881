//! Compute provider client interface.

use async_trait::async_trait;

use crate::{AgentScope, FleetCacheResult, InstanceDescription, ServerGroupDescription};

/// Read access to the compute provider.
///
/// Implementations stamp `last_read_time` on every server group they return;
/// the value must be monotonic per server group.
#[async_trait]
pub trait ComputeClient: Send + Sync {
    /// Every server group visible in `scope`.
    async fn list_server_groups(
        &self,
        scope: &AgentScope,
    ) -> FleetCacheResult<Vec<ServerGroupDescription>>;

    /// A single server group, or `None` when it no longer exists.
    async fn get_server_group(
        &self,
        resource_group: &str,
        name: &str,
    ) -> FleetCacheResult<Option<ServerGroupDescription>>;

    async fn list_instances(
        &self,
        resource_group: &str,
        server_group: &str,
    ) -> FleetCacheResult<Vec<InstanceDescription>>;
}
