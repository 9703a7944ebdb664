//! Container-to-extension matching rules.
//!
//! The running check resolves an extension name against the live container
//! inventory in three tiers, each an exact comparison:
//!
//! 1. the `io.rancher-desktop.fleet.name` label;
//! 2. the image basename (registry path and tag stripped);
//! 3. the container name, segment-bounded: compose decorates extension
//!    containers as `desktop-extension-<image>-<service>-<index>`, so the
//!    extension's segments must terminate the name once the trailing index
//!    and service segments are stripped. A plain substring test would let
//!    `fleet-gitops` claim a match against a `fleet-gitops-extension`
//!    container, which is exactly the false positive this avoids.

use fgo_model::ContainerInfo;

const FLEET_NAME_LABEL: &str = "io.rancher-desktop.fleet.name";

/// Strip registry path and tag: `ghcr.io/acme/fleet-gitops:1.0` -> `fleet-gitops`.
pub fn image_basename(image: &str) -> &str {
    let name = image.rsplit('/').next().unwrap_or(image);
    name.split(':').next().unwrap_or(name)
}

/// Whether this container belongs to the named extension.
pub fn container_matches(container: &ContainerInfo, extension: &str) -> bool {
    if container.labels.get(FLEET_NAME_LABEL).map(String::as_str) == Some(extension) {
        return true;
    }

    let wanted = image_basename(extension);
    if image_basename(&container.image) == wanted {
        return true;
    }

    name_matches(&container.name, wanted)
}

/// Find our own container by exact ID or 12-character short-ID prefix
/// (the in-container hostname is the short ID).
pub fn find_own_container<'a>(
    containers: &'a [ContainerInfo],
    hostname: &str,
) -> Option<&'a ContainerInfo> {
    // byte-indexed prefix; fall back to the whole hostname when byte 12 is
    // not a char boundary (hostnames are overridable, so not always hex)
    let short = hostname.get(..12).unwrap_or(hostname);
    containers
        .iter()
        .find(|c| c.id == hostname || c.id.starts_with(short))
}

fn segments(s: &str) -> Vec<&str> {
    s.split(['-', '_']).filter(|p| !p.is_empty()).collect()
}

fn ends_with(haystack: &[&str], needle: &[&str]) -> bool {
    haystack.len() >= needle.len() && haystack[haystack.len() - needle.len()..] == *needle
}

fn name_matches(container_name: &str, extension: &str) -> bool {
    let container_name = container_name.to_ascii_lowercase();
    let extension = extension.to_ascii_lowercase();
    let wanted = segments(&extension);
    if wanted.is_empty() {
        return false;
    }

    let mut segs = segments(&container_name);
    // compose index suffix ("...-backend-1")
    if segs
        .last()
        .is_some_and(|s| s.chars().all(|c| c.is_ascii_digit()))
    {
        segs.pop();
    }
    if ends_with(&segs, &wanted) {
        return true;
    }
    // compose service suffix ("...-backend")
    segs.pop();
    ends_with(&segs, &wanted)
}
