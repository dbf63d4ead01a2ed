//! Severity classification for reconstructed log lines.

use crate::types::Severity;

/// Returns the severity of an alert-worthy line, or `None` if the line should
/// be discarded.
///
/// Markers are matched as case-sensitive substrings. When several markers
/// appear, the leftmost occurrence decides the tag.
#[must_use]
pub fn classify(line: &str) -> Option<Severity> {
    Severity::ALL
        .iter()
        .filter_map(|severity| line.find(severity.marker()).map(|pos| (pos, *severity)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, severity)| severity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_alert_levels_are_discarded() {
        assert_eq!(classify("INFO: ok"), None);
        assert_eq!(classify("WARNING: low disk"), None);
        assert_eq!(classify("DEBUG: cache warmed"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn each_marker_maps_to_its_severity() {
        assert_eq!(classify("ERROR: x"), Some(Severity::Error));
        assert_eq!(classify("CRITICAL: y"), Some(Severity::Critical));
        assert_eq!(classify("FAILURE: z"), Some(Severity::Failure));
    }

    #[test]
    fn generated_log_format_is_recognized() {
        assert_eq!(
            classify("2024-01-15 14:30:00 - ERROR - Database connection failed."),
            Some(Severity::Error)
        );
        assert_eq!(
            classify("2024-01-15 14:30:02 - CRITICAL - System overheating! Immediate attention required."),
            Some(Severity::Critical)
        );
        assert_eq!(
            classify("2024-01-15 14:30:04 - INFO - User logged in successfully."),
            None
        );
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(classify("error: lowercase is not a marker"), None);
        assert_eq!(classify("Critical condition"), None);
        assert_eq!(classify("Application crashed due to unknown error."), None);
    }

    #[test]
    fn leftmost_marker_wins() {
        assert_eq!(
            classify("FAILURE while handling ERROR"),
            Some(Severity::Failure)
        );
        assert_eq!(
            classify("ERROR escalated to CRITICAL"),
            Some(Severity::Error)
        );
        assert_eq!(
            classify("node CRITICAL after FAILURE"),
            Some(Severity::Critical)
        );
    }

    #[test]
    fn marker_can_appear_inside_a_word() {
        assert_eq!(classify("SYSERRORS=3"), Some(Severity::Error));
    }
}
