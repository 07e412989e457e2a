use chrono::NaiveDateTime;
use clap::{ArgAction, Parser};

use crate::validation::parse_slot;

#[derive(Parser, Debug, Clone)]
#[command(name = "asvz-sniper")]
#[command(about = "ASVZ Enrollment Sniper")]
#[command(version)]
pub struct Cli {
    /// ASVZ facility to enroll at ("Höngg" or "Irchel")
    #[arg(long)]
    pub facility: String,

    /// Local datetime of the desired slot as "YYYY.MM.DD-HH:MM"; defaults to the next slot
    #[arg(long, value_parser = parse_slot)]
    pub slot: Option<NaiveDateTime>,

    /// Increase verbosity (-v debug for this tool, -vv debug everywhere)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Look up the session and stop before opening a browser
    #[arg(long)]
    pub dry_run: bool,

    /// Start clicking this many milliseconds before registration opens
    #[arg(long, value_name = "MS")]
    pub lead_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_facility_and_slot() {
        let cli = Cli::try_parse_from([
            "asvz-sniper",
            "--facility",
            "Höngg",
            "--slot",
            "2021.05.03-09:00",
        ])
        .unwrap();
        assert_eq!(cli.facility, "Höngg");
        assert_eq!(cli.slot.unwrap().to_string(), "2021-05-03 09:00:00");
        assert!(!cli.dry_run);
        assert_eq!(cli.lead_ms, None);
    }

    #[test]
    fn test_facility_required() {
        assert!(Cli::try_parse_from(["asvz-sniper"]).is_err());
    }

    #[test]
    fn test_malformed_slot_rejected() {
        let result = Cli::try_parse_from([
            "asvz-sniper",
            "--facility",
            "Irchel",
            "--slot",
            "03.05.2021 09:00",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::try_parse_from([
            "asvz-sniper",
            "--facility",
            "Irchel",
            "-vv",
            "--lead-ms",
            "1500",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.lead_ms, Some(1500));
    }
}
