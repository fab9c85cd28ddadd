//! Filter rule parsing and matching.
//!
//! # Rule Syntax (one per line)
//! - `example.com`  → exact host
//! - `93.184.216.34` → exact IPv4 address
//! - `10.0.0.0/8`   → CIDR subnet
//! - blank lines and `#` comments are ignored
//!
//! # Design Decisions
//! - Malformed lines are skipped, never fatal
//! - Host comparison is ASCII case-insensitive
//! - Mask arithmetic is total over prefix 0..=32

use std::fmt;
use std::net::Ipv4Addr;

use thiserror::Error;

/// A single blocklist entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRule {
    ExactHost(String),
    ExactIp(Ipv4Addr),
    Subnet { network: Ipv4Addr, prefix: u8 },
}

/// Why a rule line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    #[error("invalid subnet address {0:?}")]
    BadAddress(String),
    #[error("invalid prefix length {0:?}")]
    BadPrefix(String),
    #[error("invalid host {0:?}")]
    BadHost(String),
}

impl FilterRule {
    /// Parse one rule line. Comments and blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, RuleParseError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        if let Some((addr, prefix)) = line.split_once('/') {
            let network: Ipv4Addr = addr
                .trim()
                .parse()
                .map_err(|_| RuleParseError::BadAddress(addr.to_string()))?;
            let prefix: u8 = prefix
                .trim()
                .parse()
                .ok()
                .filter(|p| *p <= 32)
                .ok_or_else(|| RuleParseError::BadPrefix(prefix.to_string()))?;
            return Ok(Some(FilterRule::Subnet { network, prefix }));
        }

        if let Ok(ip) = line.parse::<Ipv4Addr>() {
            return Ok(Some(FilterRule::ExactIp(ip)));
        }

        if line.contains(char::is_whitespace) {
            return Err(RuleParseError::BadHost(line.to_string()));
        }
        Ok(Some(FilterRule::ExactHost(line.to_string())))
    }

    /// Whether this rule matches the candidate host text or its resolved address.
    pub fn matches(&self, host: &str, addr: Ipv4Addr) -> bool {
        match self {
            FilterRule::ExactHost(h) => h.eq_ignore_ascii_case(host),
            FilterRule::ExactIp(ip) => *ip == addr,
            FilterRule::Subnet { network, prefix } => {
                let mask = mask(*prefix);
                u32::from(addr) & mask == u32::from(*network) & mask
            }
        }
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterRule::ExactHost(h) => write!(f, "{h}"),
            FilterRule::ExactIp(ip) => write!(f, "{ip}"),
            FilterRule::Subnet { network, prefix } => write!(f, "{network}/{prefix}"),
        }
    }
}

/// Network mask for a prefix length; prefix 0 masks everything out.
fn mask(prefix: u8) -> u32 {
    u32::MAX.checked_shl(32 - u32::from(prefix.min(32))).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kinds() {
        assert_eq!(
            FilterRule::parse("example.com").unwrap(),
            Some(FilterRule::ExactHost("example.com".into()))
        );
        assert_eq!(
            FilterRule::parse(" 1.2.3.4\r\n").unwrap(),
            Some(FilterRule::ExactIp(Ipv4Addr::new(1, 2, 3, 4)))
        );
        assert_eq!(
            FilterRule::parse("10.0.0.0/8").unwrap(),
            Some(FilterRule::Subnet { network: Ipv4Addr::new(10, 0, 0, 0), prefix: 8 })
        );
        assert_eq!(FilterRule::parse("").unwrap(), None);
        assert_eq!(FilterRule::parse("# comment").unwrap(), None);
    }

    #[test]
    fn malformed_subnets_rejected() {
        assert!(matches!(FilterRule::parse("10.0.0.0/x"), Err(RuleParseError::BadPrefix(_))));
        assert!(matches!(FilterRule::parse("10.0.0.0/33"), Err(RuleParseError::BadPrefix(_))));
        assert!(matches!(FilterRule::parse("10.0.0.0/"), Err(RuleParseError::BadPrefix(_))));
        assert!(matches!(FilterRule::parse("host/8"), Err(RuleParseError::BadAddress(_))));
        assert!(matches!(FilterRule::parse("two words"), Err(RuleParseError::BadHost(_))));
        assert_eq!(
            FilterRule::parse("10.0.0.0/33").unwrap_err().to_string(),
            "invalid prefix length \"33\""
        );
    }

    #[test]
    fn subnet_matching() {
        let rule = FilterRule::parse("10.0.0.0/8").unwrap().unwrap();
        assert!(rule.matches("x", Ipv4Addr::new(10, 1, 2, 3)));
        assert!(!rule.matches("x", Ipv4Addr::new(11, 1, 2, 3)));

        let rule = FilterRule::parse("192.168.1.77/24").unwrap().unwrap();
        assert!(rule.matches("x", Ipv4Addr::new(192, 168, 1, 1)));
        assert!(!rule.matches("x", Ipv4Addr::new(192, 168, 2, 1)));
    }

    #[test]
    fn prefix_edges() {
        let all = FilterRule::parse("0.0.0.0/0").unwrap().unwrap();
        assert!(all.matches("x", Ipv4Addr::new(203, 0, 113, 9)));

        let one = FilterRule::parse("203.0.113.9/32").unwrap().unwrap();
        assert!(one.matches("x", Ipv4Addr::new(203, 0, 113, 9)));
        assert!(!one.matches("x", Ipv4Addr::new(203, 0, 113, 8)));

        assert_eq!(mask(0), 0);
        assert_eq!(mask(1), 0x8000_0000);
        assert_eq!(mask(32), u32::MAX);
    }

    #[test]
    fn host_match_ignores_case() {
        let rule = FilterRule::ExactHost("Example.COM".into());
        assert!(rule.matches("example.com", Ipv4Addr::LOCALHOST));
        assert!(!rule.matches("www.example.com", Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn display_round_trips_syntax() {
        for line in ["example.com", "1.2.3.4", "10.0.0.0/8"] {
            assert_eq!(FilterRule::parse(line).unwrap().unwrap().to_string(), line);
        }
    }
}
