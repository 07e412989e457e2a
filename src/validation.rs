use chrono::NaiveDateTime;

use crate::facilities::Catalog;

pub const SLOT_FORMAT: &str = "%Y.%m.%d-%H:%M";

/// Parses a requested slot in `YYYY.MM.DD-HH:MM` local time.
pub fn parse_slot(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value.trim(), SLOT_FORMAT)
        .map_err(|_| format!("slot must look like YYYY.MM.DD-HH:MM, got {value:?}"))
}

pub fn validate_facility(catalog: &Catalog, name: &str) -> Result<u32, String> {
    catalog.facility_id(name).ok_or_else(|| {
        let known = catalog.facility_names().collect::<Vec<_>>().join(", ");
        format!("Facility {name} is not one of: {known}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facilities::default_catalog;

    #[test]
    fn test_parse_slot() {
        let slot = parse_slot("2021.05.03-09:00").unwrap();
        assert_eq!(slot.to_string(), "2021-05-03 09:00:00");
        assert!(parse_slot("2021-05-03 09:00").is_err());
        assert!(parse_slot("2021.13.03-09:00").is_err());
        assert!(parse_slot("").is_err());
    }

    #[test]
    fn test_validate_facility() {
        assert_eq!(validate_facility(default_catalog(), "Irchel"), Ok(45577));
        let err = validate_facility(default_catalog(), "Fluntern").unwrap_err();
        assert!(err.contains("Fluntern"));
        assert!(err.contains("Höngg, Irchel"));
    }
}
