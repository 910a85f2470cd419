//! Catalog category.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Merchandise category. `Limited` drops sort ahead of everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogCategory {
    Hoodie,
    Cap,
    Sticker,
    Limited,
}

impl CatalogCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hoodie => "hoodie",
            Self::Cap => "cap",
            Self::Sticker => "sticker",
            Self::Limited => "limited",
        }
    }
}

impl fmt::Display for CatalogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CatalogCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hoodie" => Ok(Self::Hoodie),
            "cap" => Ok(Self::Cap),
            "sticker" => Ok(Self::Sticker),
            "limited" => Ok(Self::Limited),
            _ => Err(format!("invalid catalog category: {s}")),
        }
    }
}
