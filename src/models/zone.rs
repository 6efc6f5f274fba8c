use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// A cacao-growing zone the dashboard can be pointed at.
///
/// `key` is the stable identifier used for cache lookups; `name` is the
/// human label shown in the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub key: String,
    pub name: String,
    pub coordinates: Coordinates,
    pub variety: Option<String>,
}

impl Zone {
    pub fn new(key: impl Into<String>, name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            coordinates,
            variety: None,
        }
    }

    pub fn with_variety(mut self, variety: impl Into<String>) -> Self {
        self.variety = Some(variety.into());
        self
    }

    pub fn display_name(&self) -> String {
        match &self.variety {
            Some(v) => format!("{} ({})", self.name, v),
            None => self.name.clone(),
        }
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_includes_variety() {
        let zone = Zone::new(
            "jipijapa,manabi",
            "Manabí - Jipijapa",
            Coordinates::new(-1.3486, -80.5786),
        )
        .with_variety("Arriba Nacional");
        assert_eq!(zone.display_name(), "Manabí - Jipijapa (Arriba Nacional)");

        let bare = Zone::new("x", "Somewhere", Coordinates::new(0.0, 0.0));
        assert_eq!(bare.display_name(), "Somewhere");
    }
}
