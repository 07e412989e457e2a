use std::collections::BTreeMap;

use once_cell::sync::Lazy;

pub const FITNESS: &str = "Fitness";

static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(|| {
    Catalog::new()
        .with_facility("Höngg", 45598)
        .with_facility("Irchel", 45577)
        .with_sport(FITNESS, 122920)
});

/// Maps human-readable facility and sport names to the portal's numeric ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    facilities: BTreeMap<String, u32>,
    sports: BTreeMap<String, u32>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facility(mut self, name: impl Into<String>, id: u32) -> Self {
        self.facilities.insert(name.into(), id);
        self
    }

    pub fn with_sport(mut self, name: impl Into<String>, id: u32) -> Self {
        self.sports.insert(name.into(), id);
        self
    }

    pub fn facility_id(&self, name: &str) -> Option<u32> {
        self.facilities.get(name).copied()
    }

    pub fn sport_id(&self, name: &str) -> Option<u32> {
        self.sports.get(name).copied()
    }

    pub fn facility_names(&self) -> impl Iterator<Item = &str> {
        self.facilities.keys().map(String::as_str)
    }
}

/// The facilities and sports of the live portal.
pub fn default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_ids() {
        let catalog = default_catalog();
        assert_eq!(catalog.facility_id("Höngg"), Some(45598));
        assert_eq!(catalog.facility_id("Irchel"), Some(45577));
        assert_eq!(catalog.sport_id(FITNESS), Some(122920));
        assert_eq!(catalog.facility_id("Polyterrasse"), None);
    }

    #[test]
    fn test_facility_names_sorted() {
        let names: Vec<_> = default_catalog().facility_names().collect();
        assert_eq!(names, vec!["Höngg", "Irchel"]);
    }
}
