use super::EmailText;
use lazy_static::lazy_static;
use regex::Regex;

pub const MAX_SUSPICIOUS_LINKS: u8 = 5;

lazy_static! {
    static ref URL_REGEX: Regex =
        Regex::new(r"(?i)https?://(?:[a-z0-9$-_@.&+!*\\(),]|%[0-9a-f]{2})+")
            .expect("URL pattern is valid");
    static ref IP_URL_REGEX: Regex =
        Regex::new(r"(?i)https?://\d+\.\d+\.\d+\.\d+").expect("IP URL pattern is valid");
}

const URL_SHORTENERS: &[&str] = &[
    "bit.ly",
    "tinyurl",
    "goo.gl",
    "ow.ly",
    "is.gd",
    "buff.ly",
    "adf.ly",
    "shorte.st",
    "bc.vc",
    "t.co",
    "lnkd.in",
    "db.tt",
    "qr.ae",
    "cur.lv",
    "bitly.com",
];

const SUSPICIOUS_TLDS: &[&str] = &[
    ".ru", ".cn", ".tk", ".ml", ".ga", ".cf", ".xyz", ".top", ".club", ".online", ".site",
    ".work", ".date",
];

/// Brand domains whose exact links are trusted.
pub const LEGITIMATE_DOMAINS: &[&str] = &[
    "amazon.com",
    "netflix.com",
    "linkedin.com",
    "paypal.com",
    "chase.com",
    "wellsfargo.com",
    "usps.com",
    "fedex.com",
    "microsoft.com",
    "apple.com",
    "google.com",
];

/// URL-like substrings, in order of appearance.
pub fn extract_urls(text: &str) -> Vec<&str> {
    URL_REGEX.find_iter(text).map(|m| m.as_str()).collect()
}

pub fn is_ip_url(url: &str) -> bool {
    IP_URL_REGEX.is_match(url)
}

pub fn is_shortener(url: &str) -> bool {
    let url_lower = url.to_lowercase();
    URL_SHORTENERS
        .iter()
        .any(|shortener| url_lower.contains(shortener))
}

pub fn suspicious_links(text: &EmailText) -> u8 {
    let count = extract_urls(text.raw())
        .into_iter()
        .filter(|url| is_ip_url(url) || is_shortener(url))
        .count();
    count.min(MAX_SUSPICIOUS_LINKS as usize) as u8
}

pub fn ip_address_url(text: &EmailText) -> u8 {
    is_ip_url(text.raw()) as u8
}

pub fn url_shortener(text: &EmailText) -> u8 {
    text.contains_any(URL_SHORTENERS) as u8
}

/// A suspicious TLD only counts when the text also carries a link.
pub fn suspicious_tld(text: &EmailText) -> u8 {
    (text.contains_any(SUSPICIOUS_TLDS) && text.lower().contains("http")) as u8
}

/// True when the text links to a known brand domain as
/// `http(s)://[www.]domain`. Diagnostic only: not part of the feature vector.
pub fn has_legitimate_domain_link(text: &EmailText) -> bool {
    let lower = text.lower();
    LEGITIMATE_DOMAINS.iter().any(|domain| {
        ["https://www.", "http://www.", "https://", "http://"]
            .iter()
            .any(|scheme| lower.contains(&format!("{}{}", scheme, domain)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(detector: fn(&EmailText) -> u8, text: &str) -> u8 {
        detector(&EmailText::new(text))
    }

    #[test]
    fn test_extract_urls() {
        let urls = extract_urls("Go to https://example.com/a?b=1 or HTTP://10.0.0.1/login now");
        assert_eq!(urls.len(), 2);
        assert!(urls[0].starts_with("https://example.com/a?b=1"));
        assert!(urls[1].starts_with("HTTP://10.0.0.1/login"));
        assert!(extract_urls("no links here").is_empty());
    }

    #[test]
    fn test_ip_address_url() {
        assert_eq!(detect(ip_address_url, "login at http://192.168.1.20/x"), 1);
        assert_eq!(detect(ip_address_url, "login at https://10.0.0.1"), 1);
        assert_eq!(detect(ip_address_url, "server 192.168.1.20 is down"), 0);
        assert_eq!(detect(ip_address_url, "http://example.com"), 0);
    }

    #[test]
    fn test_url_shortener() {
        assert_eq!(detect(url_shortener, "see BIT.LY/abc"), 1);
        assert_eq!(detect(url_shortener, "https://tinyurl.com/xyz"), 1);
        assert_eq!(detect(url_shortener, "https://example.org"), 0);
    }

    #[test]
    fn test_suspicious_links_counts_ip_and_shortener_urls() {
        let text = "http://bit.ly/a http://example.org http://1.2.3.4/b";
        assert_eq!(detect(suspicious_links, text), 2);
        assert_eq!(detect(suspicious_links, "http://example.org"), 0);
    }

    #[test]
    fn test_suspicious_links_capped() {
        let text = (1..=10)
            .map(|i| format!("http://10.0.0.{}/login", i))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(extract_urls(&text).len(), 10);
        assert_eq!(detect(suspicious_links, &text), MAX_SUSPICIOUS_LINKS);
    }

    #[test]
    fn test_suspicious_tld_requires_link() {
        assert_eq!(detect(suspicious_tld, "visit prizes.xyz today"), 0);
        assert_eq!(detect(suspicious_tld, "visit http://prizes.xyz today"), 1);
        assert_eq!(detect(suspicious_tld, "visit http://example.com"), 0);
    }

    #[test]
    fn test_legitimate_domain_link() {
        assert!(has_legitimate_domain_link(&EmailText::new(
            "Sign in at https://www.paypal.com/signin"
        )));
        assert!(has_legitimate_domain_link(&EmailText::new(
            "Track at http://usps.com/track"
        )));
        assert!(!has_legitimate_domain_link(&EmailText::new(
            "Sign in at http://paypal-account-check.tk"
        )));
        assert!(!has_legitimate_domain_link(&EmailText::new(
            "paypal.com mentioned without a link"
        )));
    }
}
