//! Extension negotiation (`Sec-WebSocket-Extensions`).
//!
//! The engine only agrees on *which* extension is active and lets it claim
//! RSV bits. Payload transforms such as compression are the application's
//! business.
//!
//! ```
//! use wsdraft::extensions::{Extension, ExtensionOffer, RsvBits};
//!
//! let known = [Extension::new("permessage-deflate", RsvBits::RSV1)];
//! let offers = ExtensionOffer::parse_header("x-foo, permessage-deflate; client_max_window_bits").unwrap();
//! let picked = Extension::select(&known, &offers).unwrap();
//! assert_eq!(picked.1.to_string(), "permessage-deflate; client_max_window_bits");
//! ```

use std::fmt;

use crate::error::{Error, Result};

/// A single extension parameter (`name` or `name=value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionParam {
    pub name: String,
    /// `None` for flag parameters.
    pub value: Option<String>,
}

impl ExtensionParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// Parse `param=value` or `param`, stripping quotes from the value.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.split_once('=') {
            Some((name, value)) => Self::new(name.trim(), value.trim().trim_matches('"')),
            None => Self::flag(s),
        }
    }
}

impl fmt::Display for ExtensionParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}={}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// One entry of a `Sec-WebSocket-Extensions` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionOffer {
    pub name: String,
    pub params: Vec<ExtensionParam>,
}

impl ExtensionOffer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Parse `extension-name; param1=value1; param2`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExtension`] if the name is empty.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split(';');
        let name = parts.next().unwrap_or_default().trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidExtension("Empty extension name".into()));
        }
        let params = parts
            .filter(|p| !p.trim().is_empty())
            .map(ExtensionParam::parse)
            .collect();
        Ok(Self { name, params })
    }

    /// Parse a comma separated header value. Empty entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExtension`] if any entry has an empty name.
    pub fn parse_header(header: &str) -> Result<Vec<Self>> {
        header
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| Self::parse(s.trim()))
            .collect()
    }

    pub fn get_param(&self, name: &str) -> Option<&ExtensionParam> {
        self.params.iter().find(|p| p.name == name)
    }
}

impl fmt::Display for ExtensionOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for param in &self.params {
            write!(f, "; {}", param)?;
        }
        Ok(())
    }
}

/// RSV bits an extension uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RsvBits {
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
}

impl RsvBits {
    pub const NONE: Self = Self {
        rsv1: false,
        rsv2: false,
        rsv3: false,
    };

    /// RSV1 only (permessage-deflate).
    pub const RSV1: Self = Self {
        rsv1: true,
        rsv2: false,
        rsv3: false,
    };
}

/// An extension this endpoint is willing to negotiate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub name: String,
    pub rsv: RsvBits,
}

impl Extension {
    pub fn new(name: impl Into<String>, rsv: RsvBits) -> Self {
        Self {
            name: name.into(),
            rsv,
        }
    }

    /// Server side: the first known extension the client offered, with the
    /// offer that matched it.
    pub fn select<'a>(
        known: &'a [Extension],
        offers: &[ExtensionOffer],
    ) -> Option<(&'a Extension, ExtensionOffer)> {
        known.iter().find_map(|ext| {
            offers
                .iter()
                .find(|offer| offer.name.eq_ignore_ascii_case(&ext.name))
                .map(|offer| (ext, offer.clone()))
        })
    }

    /// Client side: resolve the extensions a server agreed to.
    ///
    /// Returns `None` if the server named an extension that was never offered.
    pub fn resolve<'a>(known: &'a [Extension], accepted: &[ExtensionOffer]) -> Option<Vec<&'a Extension>> {
        accepted
            .iter()
            .map(|offer| known.iter().find(|ext| ext.name.eq_ignore_ascii_case(&offer.name)))
            .collect()
    }

    /// Union of the RSV bits claimed by `extensions`.
    pub fn claimed_rsv<'a>(extensions: impl IntoIterator<Item = &'a Extension>) -> RsvBits {
        extensions.into_iter().fold(RsvBits::NONE, |acc, ext| RsvBits {
            rsv1: acc.rsv1 || ext.rsv.rsv1,
            rsv2: acc.rsv2 || ext.rsv.rsv2,
            rsv3: acc.rsv3 || ext.rsv.rsv3,
        })
    }
}
