use serde::{Deserialize, Serialize};

use crate::fitting::PageGeometry;

/// A paper size, with its dimensions given in portrait orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageFormat {
    /// 297 x 420 mm
    A3,
    /// 210 x 297 mm
    #[default]
    A4,
    /// 148 x 210 mm
    A5,
    /// US Letter (8.5 x 11 inches)
    Letter,
    /// US Legal (8.5 x 14 inches)
    Legal,
    /// Any other size, in millimeters.
    Custom { width: f64, height: f64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl PageFormat {
    /// Portrait dimensions in millimeters (width, height).
    pub fn dimensions_mm(&self) -> (f64, f64) {
        match *self {
            PageFormat::A3 => (297.0, 420.0),
            PageFormat::A4 => (210.0, 297.0),
            PageFormat::A5 => (148.0, 210.0),
            PageFormat::Letter => (215.9, 279.4),
            PageFormat::Legal => (215.9, 355.6),
            PageFormat::Custom { width, height } => (width, height),
        }
    }

    /// The page geometry for the given orientation. Landscape swaps the two axes.
    pub fn geometry(&self, orientation: Orientation) -> PageGeometry {
        let (width, height) = self.dimensions_mm();
        match orientation {
            Orientation::Portrait => PageGeometry::new(width, height),
            Orientation::Landscape => PageGeometry::new(height, width),
        }
    }
}

impl std::str::FromStr for PageFormat {
    type Err = String;

    /// Accepts the named formats case-insensitively, or `<width>x<height>` in millimeters.
    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string.trim().to_ascii_lowercase().as_str() {
            "a3" => Ok(PageFormat::A3),
            "a4" => Ok(PageFormat::A4),
            "a5" => Ok(PageFormat::A5),
            "letter" => Ok(PageFormat::Letter),
            "legal" => Ok(PageFormat::Legal),
            other => {
                let (width, height) = other
                    .split_once('x')
                    .ok_or(format!("Unknown page format {:?}", string))?;
                let parse = |value: &str| {
                    value
                        .trim()
                        .parse::<f64>()
                        .map_err(|error| format!("Invalid page dimension {:?}: {}", value, error))
                };
                Ok(PageFormat::Custom {
                    width: parse(width)?,
                    height: parse(height)?,
                })
            }
        }
    }
}

impl std::str::FromStr for Orientation {
    type Err = String;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string.trim().to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            _ => Err(format!("Unknown orientation {:?}", string)),
        }
    }
}
