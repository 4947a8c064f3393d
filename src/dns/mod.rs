//! DNS resolution feeding the verification pipeline.
//!
//! Two operations: MX lookup sorted by preference ([`lookup_mx`]) and the
//! DMARC TXT probe at `_dmarc.<domain>` ([`lookup_dmarc`]). MX failures are
//! fatal to a verification; DMARC failures never are.

mod dmarc;
mod error;
mod mx;

pub use dmarc::{DmarcRecord, LookupTxt, lookup_dmarc};
pub use error::DnsError;
pub use mx::{LookupMx, MxRecord, lookup_mx};

use trust_dns_resolver::Resolver;

/// Both lookup capabilities behind one shareable object. Built once at
/// process start and threaded into the verifier.
pub trait DnsLookup: LookupMx + LookupTxt + Send + Sync {}

impl<T: LookupMx + LookupTxt + Send + Sync> DnsLookup for T {}

/// Build a resolver from the system configuration (`/etc/resolv.conf`).
pub fn system_resolver() -> Result<Resolver, DnsError> {
    Resolver::from_system_conf().map_err(DnsError::resolver_init)
}
