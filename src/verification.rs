//! Hop and AS_PATH verification against ASPA data.
//!
//! A hop is a (customer, provider) adjacency; its result is tri-state. Path
//! verification collapses prepends and then measures how far an up-ramp
//! (customer to provider hops starting at the origin) and a down-ramp
//! (starting at the neighbour) reach. A path is valid if the two ramps
//! together cover it, counting only attested hops; it is invalid if they
//! cannot cover it even when unattested hops are given the benefit of the
//! doubt.

/// Outcome of checking a single (customer, provider) hop.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HopResult {
    /// No record for the customer; the hop is unconstrained.
    NoAttestation,
    /// A record exists but does not list the provider.
    NotProviderPlus,
    /// A record exists and lists the provider.
    ProviderPlus,
}

/// Direction the route was received from, relative to the verifying AS.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsPathDirection {
    /// Received from a customer or peer.
    Upstream,
    /// Received from a provider.
    Downstream,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AspaVerificationResult {
    Valid,
    Unknown,
    Invalid,
}

/// Removes consecutive repeats of an ASN (prepending).
pub fn collapse_as_path(path: &[u32]) -> Vec<u32> {
    let mut out = path.to_vec();
    out.dedup();
    out
}

/// Verifies `path`, given in AS_PATH order (neighbour first, origin last),
/// with `hop(customer, provider)` answering single hops.
pub(crate) fn verify_as_path<F>(path: &[u32], direction: AsPathDirection, hop: F) -> AspaVerificationResult
where
    F: Fn(u32, u32) -> HopResult,
{
    let mut p = collapse_as_path(path);
    p.reverse();
    let n = p.len();

    match direction {
        AsPathDirection::Upstream if n <= 1 => return AspaVerificationResult::Valid,
        AsPathDirection::Downstream if n <= 2 => return AspaVerificationResult::Valid,
        _ => {}
    }

    let attested = |r: HopResult| r == HopResult::ProviderPlus;
    let possible = |r: HopResult| r != HopResult::NotProviderPlus;

    let up = |accept: &dyn Fn(HopResult) -> bool| {
        1 + p
            .windows(2)
            .take_while(|w| accept(hop(w[0], w[1])))
            .count()
    };
    let down = |accept: &dyn Fn(HopResult) -> bool| {
        1 + p
            .windows(2)
            .rev()
            .take_while(|w| accept(hop(w[1], w[0])))
            .count()
    };

    let (max_ramp, min_ramp) = match direction {
        AsPathDirection::Upstream => (up(&possible), up(&attested)),
        AsPathDirection::Downstream => (
            up(&possible) + down(&possible),
            up(&attested) + down(&attested),
        ),
    };

    if max_ramp < n {
        AspaVerificationResult::Invalid
    } else if min_ramp < n {
        AspaVerificationResult::Unknown
    } else {
        AspaVerificationResult::Valid
    }
}
