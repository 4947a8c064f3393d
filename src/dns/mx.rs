use trust_dns_resolver::{
    Resolver,
    error::{ResolveError, ResolveErrorKind},
    proto::op::ResponseCode,
};

use super::DnsError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MxRecord {
    pub preference: u16,
    pub exchange: String,
}

impl MxRecord {
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

/// Lookup MX records for an ASCII domain, ascending by preference.
///
/// The head of the returned list is the primary exchange. An empty answer
/// (the domain resolves but publishes no MX) is the distinguished
/// [`DnsError::NoMxRecords`]; NXDOMAIN, SERVFAIL and timeouts surface as
/// [`DnsError::Lookup`] without retry.
pub fn lookup_mx<R: LookupMx + ?Sized>(
    resolver: &R,
    ascii_domain: &str,
) -> Result<Vec<MxRecord>, DnsError> {
    if ascii_domain.is_empty() {
        return Err(DnsError::EmptyDomain);
    }
    let mut records = match resolver.lookup_mx(ascii_domain) {
        Ok(records) => records,
        Err(err) => match err.kind() {
            ResolveErrorKind::NoRecordsFound { response_code, .. }
                if *response_code == ResponseCode::NoError =>
            {
                Vec::new()
            }
            _ => return Err(DnsError::lookup(err)),
        },
    };

    records.sort();
    records.dedup();

    if records.is_empty() {
        return Err(DnsError::NoMxRecords);
    }
    Ok(records)
}

pub(crate) fn normalize_exchange(exchange: String) -> String {
    exchange.trim_end_matches('.').to_ascii_lowercase()
}

pub trait LookupMx {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError>;
}

impl LookupMx for Resolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        let lookup = Resolver::mx_lookup(self, domain)?;
        let mut records = Vec::new();
        for mx in lookup.iter() {
            let exchange = normalize_exchange(mx.exchange().to_utf8());
            records.push(MxRecord::new(mx.preference(), exchange));
        }
        Ok(records)
    }
}
