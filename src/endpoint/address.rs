//! Endpoint identity.

use std::fmt;
use std::str::FromStr;

use url::Url;

/// Locator identifying a receive endpoint, e.g. `tcp://127.0.0.1:5672/orders`.
///
/// The scheme and layout belong to the transport; the endpoint only compares
/// and prints it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputAddress(Url);

impl InputAddress {
    /// Parse an address from its string form.
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        Url::parse(input).map(Self)
    }

    /// Scheme of the address (`tcp`, `loopback`, ...).
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<Url> for InputAddress {
    fn from(url: Url) -> Self {
        Self(url)
    }
}

impl FromStr for InputAddress {
    type Err = url::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for InputAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays() {
        let addr: InputAddress = "tcp://127.0.0.1:5672/orders".parse().unwrap();
        assert_eq!(addr.scheme(), "tcp");
        assert_eq!(addr.to_string(), "tcp://127.0.0.1:5672/orders");
    }

    #[test]
    fn equal_addresses_compare_equal() {
        let a = InputAddress::parse("loopback://localhost/queue").unwrap();
        let b = InputAddress::parse("loopback://localhost/queue").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_relative_address() {
        assert!(InputAddress::parse("orders").is_err());
    }
}
