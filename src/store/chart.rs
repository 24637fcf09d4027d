//! Helm chart storage
//!
//! Packaged charts are kept as opaque `.tgz` blobs in the service scope under
//! `helm/{chart}.tgz`. Packing and unpacking archives is left to the caller.

use super::client::{Resource, ResourceClient};
use super::error::Result;
use super::path::Scope;

/// Resource URI of a packaged chart
pub fn chart_uri(chart_name: &str) -> String {
    format!("helm/{}.tgz", chart_name)
}

/// Store a packaged chart for a service, returning the new version
pub async fn store_chart(
    client: &ResourceClient,
    project: &str,
    stage: &str,
    service: &str,
    chart_name: &str,
    chart: &[u8],
) -> Result<String> {
    let scope = Scope::service(project, stage, service);
    let resource = Resource::new(&chart_uri(chart_name), chart);
    tracing::debug!("storing chart {} ({} bytes) for {}", chart_name, chart.len(), scope);
    client.create_resources(&scope, &[resource]).await
}

/// Read a packaged chart of a service
pub async fn get_chart(
    client: &ResourceClient,
    project: &str,
    stage: &str,
    service: &str,
    chart_name: &str,
) -> Result<Vec<u8>> {
    let scope = Scope::service(project, stage, service);
    let resource = client.get_resource(&scope, &chart_uri(chart_name)).await?;
    Ok(resource.content)
}
