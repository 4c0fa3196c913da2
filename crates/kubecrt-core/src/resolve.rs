//! Per-chart parameter resolution

use std::path::Path;

use crate::config::{ChartEntry, ChartsConfiguration};
use crate::values::Values;

/// Effective parameters for one render call
///
/// Borrowed from the configuration and dropped once the call returns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedParameters<'a> {
    pub name: &'a str,
    pub namespace: &'a str,

    /// The entry's own values; there are no global values to merge with
    pub values: &'a Values,

    /// Shared partial templates, identical for every chart
    pub partial_templates: Option<&'a Path>,
}

/// Resolve the parameters of `entry`: a non-empty entry override wins over
/// the global setting
pub fn resolve<'a>(
    config: &'a ChartsConfiguration,
    entry: &'a ChartEntry,
) -> ResolvedParameters<'a> {
    ResolvedParameters {
        name: pick(entry.name.as_deref(), &config.name),
        namespace: pick(entry.namespace.as_deref(), &config.namespace),
        values: &entry.values,
        partial_templates: config.partial_templates_path.as_deref(),
    }
}

fn pick<'a>(entry: Option<&'a str>, global: &'a str) -> &'a str {
    entry.filter(|v| !v.is_empty()).unwrap_or(global)
}
