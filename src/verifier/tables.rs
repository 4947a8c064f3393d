//! Static domain tables, compiled into the binary.
//!
//! These are configuration data, not code: entries are enumerated here and
//! nowhere else. Lookups are case-insensitive (callers pass lowercased
//! ASCII domains; the helpers lowercase defensively anyway).

use phf::phf_set;

/// Throwaway-address providers. Membership is a hard reject.
static DISPOSABLE_DOMAINS: phf::Set<&'static str> = phf_set! {
    "10minutemail.com",
    "20minutemail.com",
    "33mail.com",
    "dispostable.com",
    "fakeinbox.com",
    "getnada.com",
    "guerrillamail.com",
    "guerrillamail.net",
    "maildrop.cc",
    "mailinator.com",
    "mailnesia.com",
    "mintemail.com",
    "mohmal.com",
    "mytemp.email",
    "sharklasers.com",
    "spamgourmet.com",
    "temp-mail.io",
    "temp-mail.org",
    "tempail.com",
    "tempmail.dev",
    "tempmailo.com",
    "throwawaymail.com",
    "trashmail.com",
    "yopmail.com",
};

/// Enterprise domains for which a catch-all configuration is considered
/// deliberate rather than suspicious.
static CORPORATE_DOMAINS: phf::Set<&'static str> = phf_set! {
    "accenture.com",
    "adobe.com",
    "amazon.com",
    "apple.com",
    "cisco.com",
    "dell.com",
    "goldmansachs.com",
    "google.com",
    "hp.com",
    "ibm.com",
    "intel.com",
    "jpmorgan.com",
    "meta.com",
    "microsoft.com",
    "morganstanley.com",
    "nvidia.com",
    "oracle.com",
    "salesforce.com",
    "sap.com",
    "vmware.com",
};

/// Consumer webmail providers.
static FREE_EMAIL_PROVIDERS: phf::Set<&'static str> = phf_set! {
    "aol.com",
    "fastmail.com",
    "gmail.com",
    "gmx.com",
    "gmx.net",
    "hotmail.com",
    "icloud.com",
    "live.com",
    "mail.com",
    "mail.ru",
    "msn.com",
    "outlook.com",
    "proton.me",
    "protonmail.com",
    "yahoo.com",
    "yandex.com",
    "zoho.com",
};

pub fn is_disposable_domain(domain: &str) -> bool {
    DISPOSABLE_DOMAINS.contains(domain.to_ascii_lowercase().as_str())
}

/// Corporate heuristic: the allow-list plus academic and government TLDs.
pub fn is_corporate_domain(domain: &str) -> bool {
    let domain = domain.to_ascii_lowercase();
    CORPORATE_DOMAINS.contains(domain.as_str())
        || domain.ends_with(".edu")
        || domain.ends_with(".gov")
}

pub fn is_free_email_provider(domain: &str) -> bool {
    FREE_EMAIL_PROVIDERS.contains(domain.to_ascii_lowercase().as_str())
}
