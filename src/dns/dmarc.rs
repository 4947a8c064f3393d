use serde::Serialize;
use trust_dns_resolver::{
    Resolver,
    error::{ResolveError, ResolveErrorKind},
};

/// Parsed `v=DMARC1` record for a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DmarcRecord {
    /// The `p=` tag; `"none"` when the tag is missing.
    pub policy: String,
    /// The `sp=` tag, when present.
    pub subdomain_policy: Option<String>,
    /// The `pct=` tag; 100 when missing or unparseable.
    pub percentage: u8,
    /// The `rf=` tag, when present.
    pub report_format: Option<String>,
}

/// Query TXT records at `_dmarc.<domain>` and parse the first DMARC record.
///
/// Lookup failures and absent records both yield `None`; a domain without
/// DMARC is unremarkable and must not fail the verification.
pub fn lookup_dmarc<R: LookupTxt + ?Sized>(resolver: &R, ascii_domain: &str) -> Option<DmarcRecord> {
    let name = format!("_dmarc.{ascii_domain}");
    let records = match resolver.lookup_txt(&name) {
        Ok(records) => records,
        Err(err) => {
            tracing::debug!(domain = ascii_domain, error = %err, "DMARC lookup failed");
            return None;
        }
    };
    records.iter().find_map(|record| parse_record(record))
}

fn parse_record(record: &str) -> Option<DmarcRecord> {
    let trimmed = record.trim();
    if !trimmed.starts_with("v=DMARC1") {
        return None;
    }

    let mut parsed = DmarcRecord {
        policy: "none".to_string(),
        subdomain_policy: None,
        percentage: 100,
        report_format: None,
    };
    for tag in trimmed.split(';') {
        let tag = tag.trim();
        if let Some(value) = tag.strip_prefix("p=") {
            parsed.policy = value.trim().to_string();
        } else if let Some(value) = tag.strip_prefix("sp=") {
            parsed.subdomain_policy = Some(value.trim().to_string());
        } else if let Some(value) = tag.strip_prefix("pct=") {
            parsed.percentage = value.trim().parse().unwrap_or(100);
        } else if let Some(value) = tag.strip_prefix("rf=") {
            parsed.report_format = Some(value.trim().to_string());
        }
    }
    Some(parsed)
}

pub trait LookupTxt {
    /// Return the TXT records at `name`, each with its character-string
    /// segments joined without separator.
    fn lookup_txt(&self, name: &str) -> Result<Vec<String>, ResolveError>;
}

impl LookupTxt for Resolver {
    fn lookup_txt(&self, name: &str) -> Result<Vec<String>, ResolveError> {
        let lookup = match Resolver::txt_lookup(self, name) {
            Ok(lookup) => lookup,
            Err(err) => {
                if matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. }) {
                    return Ok(Vec::new());
                }
                return Err(err);
            }
        };
        let mut records = Vec::new();
        for txt in lookup.iter() {
            let mut record = String::new();
            for piece in txt.txt_data().iter() {
                record.push_str(&String::from_utf8_lossy(piece.as_ref()));
            }
            records.push(record);
        }
        Ok(records)
    }
}
