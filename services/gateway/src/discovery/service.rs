/// A discovered upstream service (spec §3 "Service"), grounded on the
/// source's `servicediscovery.Service`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Service {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub address: String,
    pub resource: String,
    #[serde(default)]
    pub secured: bool,
    #[serde(default, rename = "oidcAudience")]
    pub oidc_audience: String,
    #[serde(default)]
    pub version: String,
}
