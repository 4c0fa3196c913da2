//! Chart version constraints
//!
//! Constraints are semver requirements, plus the `~>` operator used by charts
//! configurations. It pins the last component given, tilde style:
//! `~> 1.2.3` allows `>=1.2.3, <1.3.0`, `~> 1.2` allows `>=1.2.0, <1.3.0`
//! and `~> 1` allows `>=1.0.0, <2.0.0`.

use semver::VersionReq;

/// Parse a version constraint into a semver requirement
pub fn parse_constraint(constraint: &str) -> Result<VersionReq, semver::Error> {
    let translated: Vec<String> = constraint
        .split(',')
        .map(|part| translate_pessimistic(part.trim()))
        .collect();

    VersionReq::parse(&translated.join(", "))
}

fn translate_pessimistic(part: &str) -> String {
    let Some(rest) = part.strip_prefix("~>") else {
        return part.to_string();
    };
    let rest = rest.trim();

    let numbers: Option<Vec<u64>> = rest.split('.').map(|n| n.parse().ok()).collect();
    let translated = match numbers.as_deref() {
        Some([major]) => major
            .checked_add(1)
            .map(|next| format!(">={major}.0.0, <{next}.0.0")),
        Some([major, minor]) => minor
            .checked_add(1)
            .map(|next| format!(">={major}.{minor}.0, <{major}.{next}.0")),
        Some([major, minor, patch]) => minor
            .checked_add(1)
            .map(|next| format!(">={major}.{minor}.{patch}, <{major}.{next}.0")),
        // Pre-release or otherwise unusual forms: let semver's tilde decide.
        _ => Some(format!("~{rest}")),
    };

    // An unbounded component is left as-is so that parsing rejects it.
    translated.unwrap_or_else(|| part.to_string())
}
