use std::sync::Arc;

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::facilities::{Catalog, FITNESS};
use crate::models::{EnrollmentTarget, SearchResponse, SessionEntry};
use crate::timezone::LocalZone;
use crate::validation::{SLOT_FORMAT, validate_facility};

const SEARCH_PATH: &str = "asvz_api/event_search";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Could not find any slots at {0}")]
    NotFound(String),
    #[error("No more free slots at {0}")]
    SlotFull(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid search URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Finds the session to enroll in through the public event search endpoint.
#[derive(Clone)]
pub struct SlotFinder {
    client: reqwest::Client,
    base_url: Arc<Url>,
    catalog: Arc<Catalog>,
    zone: LocalZone,
}

impl SlotFinder {
    pub fn new(base_url: Url, catalog: Catalog, zone: LocalZone) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Arc::new(base_url),
            catalog: Arc::new(catalog),
            zone,
        }
    }

    pub fn search_url(&self, facility_id: u32, sport_id: u32) -> Result<Url, LookupError> {
        let mut url = self.base_url.join(SEARCH_PATH)?;
        url.query_pairs_mut()
            .append_pair("f[0]", &format!("facility:{facility_id}"))
            .append_pair("f[1]", &format!("sport:{sport_id}"))
            .append_pair("availability", "1")
            .append_pair("_format", "json");
        Ok(url)
    }

    async fn fetch_entries(&self, url: &Url) -> Result<Vec<SessionEntry>, LookupError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await?
            .error_for_status()?;
        let body: SearchResponse = response.json().await?;
        Ok(body.results)
    }

    /// Resolves `facility` and an optional local `slot` to exactly one session.
    pub async fn find_slot(
        &self,
        facility: &str,
        slot: Option<NaiveDateTime>,
    ) -> Result<EnrollmentTarget, LookupError> {
        let facility_id =
            validate_facility(&self.catalog, facility).map_err(LookupError::InvalidArgument)?;
        let sport_id = self.catalog.sport_id(FITNESS).ok_or_else(|| {
            LookupError::InvalidArgument(format!("Sport {FITNESS} missing from catalog"))
        })?;

        let url = self.search_url(facility_id, sport_id)?;
        debug!(%url, "querying event search");
        let entries = self.fetch_entries(&url).await?;
        debug!(count = entries.len(), "event search returned sessions");

        if slot.is_none() {
            info!("No timeslot provided, enrolling for the next possible slot");
        }
        let entry = select_entry(&entries, slot, &self.zone)?;
        info!(
            url = %entry.url,
            places_free = entry.places_free,
            opens_at = %self.zone.to_local(entry.oe_from_date),
            "selected session"
        );

        Ok(EnrollmentTarget {
            facility: facility.to_string(),
            requested_slot: slot,
            entry,
        })
    }
}

/// Picks the first entry, or the first whose local start equals `slot`.
///
/// Without a slot this relies on the API returning sessions in chronological
/// order, which is not checked.
pub fn select_entry(
    entries: &[SessionEntry],
    slot: Option<NaiveDateTime>,
    zone: &LocalZone,
) -> Result<SessionEntry, LookupError> {
    let (entry, label) = match slot {
        None => {
            let first = entries
                .first()
                .ok_or_else(|| LookupError::NotFound("any time".into()))?;
            let label = zone.to_local(first.from_date).format(SLOT_FORMAT).to_string();
            (first, label)
        }
        Some(wanted) => {
            let label = wanted.format(SLOT_FORMAT).to_string();
            let found = entries
                .iter()
                .find(|entry| zone.to_local(entry.from_date) == wanted)
                .ok_or_else(|| LookupError::NotFound(label.clone()))?;
            (found, label)
        }
    };

    if entry.places_free == 0 {
        return Err(LookupError::SlotFull(label));
    }
    Ok(entry.clone())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::facilities::default_catalog;
    use crate::validation::parse_slot;

    fn entry(from: &str, open: &str, url: &str, places_free: u32) -> SessionEntry {
        SessionEntry {
            from_date: from.parse::<DateTime<Utc>>().unwrap(),
            oe_from_date: open.parse::<DateTime<Utc>>().unwrap(),
            url: url.to_string(),
            places_free,
        }
    }

    fn fixture() -> Vec<SessionEntry> {
        vec![
            entry("2021-05-03T06:00:00Z", "2021-05-02T06:00:00Z", "https://x/1", 4),
            entry("2021-05-03T07:00:00Z", "2021-05-02T07:00:00Z", "https://x/2", 1),
        ]
    }

    fn zurich() -> LocalZone {
        LocalZone::parse("Europe/Zurich").unwrap()
    }

    #[test]
    fn test_select_first_without_slot() {
        let selected = select_entry(&fixture(), None, &zurich()).unwrap();
        assert_eq!(selected, fixture()[0]);
    }

    #[test]
    fn test_select_matching_slot() {
        let slot = parse_slot("2021.05.03-09:00").unwrap();
        let selected = select_entry(&fixture(), Some(slot), &zurich()).unwrap();
        assert_eq!(selected.url, "https://x/2");
        assert_eq!(
            zurich().to_local(selected.oe_from_date).to_string(),
            "2021-05-02 09:00:00"
        );
    }

    #[test]
    fn test_select_missing_slot() {
        let slot = parse_slot("2021.05.03-10:00").unwrap();
        let err = select_entry(&fixture(), Some(slot), &zurich()).unwrap_err();
        assert!(matches!(err, LookupError::NotFound(ref s) if s == "2021.05.03-10:00"));
    }

    #[test]
    fn test_select_full_slot() {
        let mut entries = fixture();
        entries[1].places_free = 0;
        let slot = parse_slot("2021.05.03-09:00").unwrap();
        let err = select_entry(&entries, Some(slot), &zurich()).unwrap_err();
        assert!(matches!(err, LookupError::SlotFull(_)));

        entries[0].places_free = 0;
        let err = select_entry(&entries, None, &zurich()).unwrap_err();
        assert!(matches!(err, LookupError::SlotFull(_)));
    }

    #[test]
    fn test_select_empty_results() {
        let err = select_entry(&[], None, &zurich()).unwrap_err();
        assert!(matches!(err, LookupError::NotFound(_)));
    }

    #[test]
    fn test_search_url_params() {
        let finder = SlotFinder::new(
            Url::parse("https://asvz.ch").unwrap(),
            default_catalog().clone(),
            zurich(),
        );
        let url = finder.search_url(45598, 122920).unwrap();
        assert_eq!(url.path(), "/asvz_api/event_search");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("f[0]".to_string(), "facility:45598".to_string()),
                ("f[1]".to_string(), "sport:122920".to_string()),
                ("availability".to_string(), "1".to_string()),
                ("_format".to_string(), "json".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_facility_fails_before_request() {
        // Nothing listens on the discard port; an attempted request would be an Http error.
        let finder = SlotFinder::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            default_catalog().clone(),
            zurich(),
        );
        let err = finder.find_slot("Fluntern", None).await.unwrap_err();
        assert!(matches!(err, LookupError::InvalidArgument(_)));
    }
}
