//! Version handling
//!
//! Platform, plugin and package versions arrive in loosely formatted strings
//! (`10.5.0`, `v2.1`, `1.4.2.1289`, `3.0.0+build.7`). [`parse_lenient`] maps
//! them onto `semver::Version` so they can be ordered.

use semver::{Version, VersionReq};

use super::errors::DomainError;

/// Parse a loosely formatted version string.
///
/// Missing minor/patch components are zero-filled, a leading `v` is ignored,
/// and anything past the third numeric component is dropped.
pub fn parse_lenient(input: &str) -> Result<Version, DomainError> {
    let trimmed = input.trim().trim_start_matches(['v', 'V']);
    if let Ok(version) = Version::parse(trimmed) {
        return Ok(version);
    }

    let core = trimmed
        .split(|c: char| c == '+' || c == '-' || c.is_whitespace())
        .next()
        .unwrap_or_default();
    let mut numbers = [0u64; 3];
    let mut seen = 0;
    for (slot, part) in numbers.iter_mut().zip(core.split('.')) {
        let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
        if digits.is_empty() {
            break;
        }
        *slot = digits
            .parse()
            .map_err(|_| DomainError::InvalidVersion(input.to_string()))?;
        seen += 1;
    }
    if seen == 0 {
        return Err(DomainError::InvalidVersion(input.to_string()));
    }
    Ok(Version::new(numbers[0], numbers[1], numbers[2]))
}

/// Whether `candidate` is strictly newer than `installed`.
///
/// Unparseable versions never count as newer.
#[must_use]
pub fn is_newer(candidate: &str, installed: &str) -> bool {
    match (parse_lenient(candidate), parse_lenient(installed)) {
        (Ok(c), Ok(i)) => c > i,
        _ => false,
    }
}

/// Outcome of comparing the source and destination platform versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCompatibility {
    /// Same version on both sides
    Supported,
    /// Older source migrating to a newer destination; proceed only after confirmation
    NeedsConfirmation,
}

/// Compare platform versions before a run.
///
/// Differing versions are refused unless `allow_unsupported` is set, and even
/// then a source newer than its destination is refused.
pub fn check_platform_versions(
    source: &str,
    destination: &str,
    allow_unsupported: bool,
) -> Result<PlatformCompatibility, DomainError> {
    let src = parse_lenient(source)?;
    let dest = parse_lenient(destination)?;
    let refuse = |reason: &str| DomainError::UnsupportedVersion {
        source_version: source.to_string(),
        destination_version: destination.to_string(),
        reason: reason.to_string(),
    };

    if src == dest {
        Ok(PlatformCompatibility::Supported)
    } else if !allow_unsupported {
        Err(refuse("versions differ and unsupported migrations are not allowed"))
    } else if src > dest {
        Err(refuse("source is newer than destination"))
    } else {
        Ok(PlatformCompatibility::NeedsConfirmation)
    }
}

/// Whether a plugin declaring `requirement` can run on `platform`.
///
/// A missing or empty requirement is treated as compatible; an unparseable one
/// is not.
#[must_use]
pub fn plugin_supports(requirement: Option<&str>, platform: &str) -> bool {
    let Some(requirement) = requirement.map(str::trim).filter(|r| !r.is_empty()) else {
        return true;
    };
    match (VersionReq::parse(requirement), parse_lenient(platform)) {
        (Ok(req), Ok(version)) => req.matches(&version),
        _ => false,
    }
}

/// Known destination-version caveats: `(version, option, message)`
pub const PLATFORM_CAVEATS: &[(&str, &str, &str)] = &[(
    "10.5.0",
    "update_default_reports",
    "On 10.5.0 destinations 'Default' reports cannot be updated reliably; updates will be attempted without guarantee",
)];

/// Caveats that apply to `destination` given the enabled option names
pub fn platform_caveats<'a>(
    destination: &str,
    enabled_options: &'a [&'a str],
) -> impl Iterator<Item = &'static str> + 'a {
    let version = parse_lenient(destination).ok();
    PLATFORM_CAVEATS
        .iter()
        .filter(move |(v, option, _)| {
            version.as_ref() == parse_lenient(v).ok().as_ref() && enabled_options.contains(option)
        })
        .map(|(_, _, message)| *message)
}
