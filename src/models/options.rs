//! Enumerated field values accepted by the API.
//!
//! Parsing an unknown value fails immediately with
//! [`ClientError::InvalidOption`] listing the accepted values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ClientError;

macro_rules! api_option {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal, default = $default:ident {
            $($variant:ident => $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $value)] $variant,)+
        }

        impl $name {
            /// Accepted wire values
            pub const ALLOWED: &'static [&'static str] = &[$($value),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl FromStr for $name {
            type Err = ClientError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    _ => Err(ClientError::invalid_option($field, Self::ALLOWED.iter().copied())),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

api_option! {
    /// Severity of a container or artifact
    Severity, "severity", default = Low {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

api_option! {
    /// Traffic Light Protocol sensitivity
    Sensitivity, "sensitivity", default = Green {
        White => "white",
        Green => "green",
        Amber => "amber",
        Red => "red",
    }
}

api_option! {
    ContainerStatus, "status", default = New {
        New => "new",
        Open => "open",
        Resolved => "resolved",
    }
}

api_option! {
    /// Event containers vs. cases
    ContainerType, "container_type", default = Default {
        Default => "default",
        Case => "case",
    }
}

api_option! {
    /// Lockheed Martin kill chain phase
    KillChain, "kill_chain", default = Reconnaissance {
        Reconnaissance => "Reconnaissance",
        Weaponization => "Weaponization",
        Delivery => "Delivery",
        Exploitation => "Exploitation",
        Installation => "Installation",
        CommandAndControl => "Command & Control",
        ActionsOnObjectives => "Actions on Objectives",
    }
}

api_option! {
    SortOrder, "order", default = Asc {
        Asc => "asc",
        Desc => "desc",
    }
}
