//! Read-only lookups the gateway consumes: staked applications and per-chain settings.

pub mod apps;
pub mod chains;

pub use apps::{Application, AppsRegistry, StaticAppsRegistry};
pub use chains::{ChainConfiguration, ChainConfigurationRegistry, ChainConfigurations};
