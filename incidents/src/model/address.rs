//! Street addresses on the event grid.
//!
//! The city is laid out as concentric streets crossed by radial streets named
//! after clock positions, so most addresses are "Rod Garett" addresses such as
//! `8:45@Carny`. Anything else is carried as free text.

use std::fmt;

/// Named concentric streets and plazas.
///
/// Variants are declared in ascending numeric order so the derived ordering
/// matches the wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum ConcentricStreet {
    Esplanade = 0,
    A = 1,
    B = 2,
    C = 3,
    D = 4,
    E = 5,
    F = 6,
    G = 7,
    H = 8,
    I = 9,
    J = 10,
    K = 11,
    L = 12,
    M = 13,
    N = 14,
    Plaza300 = 300,
    PublicPlaza300 = 305,
    Plaza430 = 430,
    CenterCampInner = 600,
    CenterCampService = 601,
    CenterCampOuter = 602,
    PublicPlaza600 = 605,
    Plaza730 = 730,
    Plaza900 = 900,
    PublicPlaza900 = 905,
}

impl ConcentricStreet {
    /// Every street, in order.
    pub const ALL: [ConcentricStreet; 25] = [
        Self::Esplanade,
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::H,
        Self::I,
        Self::J,
        Self::K,
        Self::L,
        Self::M,
        Self::N,
        Self::Plaza300,
        Self::PublicPlaza300,
        Self::Plaza430,
        Self::CenterCampInner,
        Self::CenterCampService,
        Self::CenterCampOuter,
        Self::PublicPlaza600,
        Self::Plaza730,
        Self::Plaza900,
        Self::PublicPlaza900,
    ];

    /// Look up a street by its wire value.
    pub fn from_value(value: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.value() == value)
    }

    /// The wire value of this street.
    pub fn value(self) -> i64 {
        self as u16 as i64
    }

    /// Human-readable street name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Esplanade => "Esplanade",
            Self::A => "Arcade",
            Self::B => "Ballyhoo",
            Self::C => "Carny",
            Self::D => "Donniker",
            Self::E => "Ersatz",
            Self::F => "Freak Show",
            Self::G => "Geek",
            Self::H => "Hanky Panky",
            Self::I => "Illusion",
            Self::J => "Jolly",
            Self::K => "Kook",
            Self::L => "Laffing Sal",
            Self::M => "M",
            Self::N => "N",
            Self::Plaza300 => "3:00 Plaza",
            Self::PublicPlaza300 => "3:00 Public Plaza",
            Self::Plaza430 => "4:30 Plaza",
            Self::CenterCampInner => "Center Camp Plaza",
            Self::CenterCampService => "Route 66",
            Self::CenterCampOuter => "Rod's Road",
            Self::PublicPlaza600 => "6:00 Public Plaza",
            Self::Plaza730 => "7:30 Plaza",
            Self::Plaza900 => "9:00 Plaza",
            Self::PublicPlaza900 => "9:00 Public Plaza",
        }
    }
}

impl fmt::Display for ConcentricStreet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A location's address.
///
/// Ordering is field-by-field with absent values first; a text-only address
/// sorts before any Rod Garett address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Address {
    /// Free-text description only.
    TextOnly { description: Option<String> },

    /// Grid address: `radial_hour:radial_minute @ concentric`.
    RodGarett {
        concentric: Option<ConcentricStreet>,
        radial_hour: Option<u8>,
        radial_minute: Option<u8>,
        description: Option<String>,
    },
}

impl Address {
    /// A text-only address.
    pub fn text(description: impl Into<String>) -> Self {
        Self::TextOnly {
            description: Some(description.into()),
        }
    }

    /// A grid address with every component present.
    pub fn rod_garett(
        concentric: ConcentricStreet,
        radial_hour: u8,
        radial_minute: u8,
        description: Option<String>,
    ) -> Self {
        Self::RodGarett {
            concentric: Some(concentric),
            radial_hour: Some(radial_hour),
            radial_minute: Some(radial_minute),
            description,
        }
    }

    /// The free-text description, whichever variant this is.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::TextOnly { description } | Self::RodGarett { description, .. } => {
                description.as_deref()
            }
        }
    }

    /// True when every field is absent.
    pub fn is_nillish(&self) -> bool {
        match self {
            Self::TextOnly { description } => description.is_none(),
            Self::RodGarett {
                concentric,
                radial_hour,
                radial_minute,
                description,
            } => {
                concentric.is_none()
                    && radial_hour.is_none()
                    && radial_minute.is_none()
                    && description.is_none()
            }
        }
    }
}

/// True when the address is absent or nillish.
pub fn address_is_nillish(address: Option<&Address>) -> bool {
    address.map_or(true, Address::is_nillish)
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextOnly { description } => f.write_str(description.as_deref().unwrap_or("")),
            Self::RodGarett {
                concentric,
                radial_hour,
                radial_minute,
                description,
            } => {
                let hour = radial_hour.map_or_else(|| "-".to_string(), |h| h.to_string());
                let minute = radial_minute.map_or_else(|| "-".to_string(), |m| m.to_string());
                let street = concentric.map_or("-", ConcentricStreet::name);

                write!(f, "{}:{}@{}", hour, minute, street)?;
                if let Some(d) = description {
                    write!(f, ", {}", d)?;
                }
                Ok(())
            }
        }
    }
}
