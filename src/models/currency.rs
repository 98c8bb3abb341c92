use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Currencies accounts can be opened in. Codes are upper case everywhere,
/// both when parsed and when stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    CAD,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::USD, Currency::EUR, Currency::CAD];

    /// ISO 4217 alphabetic code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::CAD => "CAD",
        }
    }

    /// Checks whether `code` names a supported currency. Case sensitive, as stored.
    pub fn is_supported(code: &str) -> bool {
        Currency::ALL.iter().any(|c| c.code() == code)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CurrencyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.code() == s)
            .ok_or_else(|| CurrencyParseError(s.to_string()))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown currency code: {0}")]
pub struct CurrencyParseError(String);
