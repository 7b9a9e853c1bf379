//! CIDR overlap validation
//!
//! Runs before any remote mutation so that peering never installs routes
//! that could not be used.

use crate::{PeeringError, Result};
use ipnetwork::IpNetwork;

pub fn parse_cidr(cidr: &str) -> Result<IpNetwork> {
    cidr.parse::<IpNetwork>().map_err(|e| PeeringError::InvalidCidr {
        cidr: cidr.to_string(),
        reason: e.to_string(),
    })
}

/// First and last address covered by a network, widened to `u128`
fn address_range(network: &IpNetwork) -> (u128, u128) {
    let (addr, bits) = match network {
        IpNetwork::V4(net) => (u128::from(u32::from(net.ip())), 32u32),
        IpNetwork::V6(net) => (u128::from(net.ip()), 128u32),
    };
    let host_bits = bits - u32::from(network.prefix());
    let host_mask = if host_bits >= 128 {
        u128::MAX
    } else {
        (1u128 << host_bits) - 1
    };
    let first = addr & !host_mask;
    (first, first | host_mask)
}

/// Whether two networks share at least one address
pub fn overlaps(a: &IpNetwork, b: &IpNetwork) -> bool {
    if a.is_ipv4() != b.is_ipv4() {
        return false;
    }
    let (a_first, a_last) = address_range(a);
    let (b_first, b_last) = address_range(b);
    a_first.max(b_first) <= a_last.min(b_last)
}

/// Fail when the source and target blocks intersect
pub fn validate_no_overlap(source_cidr: &str, target_cidr: &str) -> Result<()> {
    let source = parse_cidr(source_cidr)?;
    let target = parse_cidr(target_cidr)?;

    if overlaps(&source, &target) {
        return Err(PeeringError::CidrOverlap {
            source_cidr: source_cidr.to_string(),
            target_cidr: target_cidr.to_string(),
        });
    }

    Ok(())
}
