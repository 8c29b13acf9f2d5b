//! Strongly-typed identifiers for trades, netting sets and counterparties.
//!
//! Each identifier is a newtype over `String` so that a trade id can never be
//! passed where a netting set id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[inline]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id! {
    /// Unique identifier for a trade.
    ///
    /// # Examples
    ///
    /// ```
    /// use exposure_core::TradeId;
    ///
    /// let id = TradeId::new("SWAP_EUR_10Y");
    /// assert_eq!(id.as_str(), "SWAP_EUR_10Y");
    /// ```
    TradeId
}

string_id! {
    /// Unique identifier for a netting set.
    NettingSetId
}

string_id! {
    /// Unique identifier for a counterparty.
    CounterpartyId
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_trade_id_conversions() {
        let a = TradeId::from("T1");
        let b = TradeId::from("T1".to_string());
        assert_eq!(a, b);
        assert_eq!(format!("{}", a), "T1");
    }

    #[test]
    fn test_ids_hash() {
        let mut set = HashSet::new();
        set.insert(NettingSetId::new("NS1"));
        set.insert(NettingSetId::new("NS2"));
        set.insert(NettingSetId::new("NS1"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_ids_order() {
        let mut ids = vec![CounterpartyId::new("B"), CounterpartyId::new("A")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "A");
    }
}
