use chrono::{DateTime, Utc};

/// Short relative age shown under the username in the viewer header.
pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - created_at).num_minutes().max(0);
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{days}d")
    } else if hours > 0 {
        format!("{hours}h")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        "just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn picks_largest_unit() {
        let now = Utc::now();
        assert_eq!(time_ago(now, now), "just now");
        assert_eq!(time_ago(now - Duration::seconds(59), now), "just now");
        assert_eq!(time_ago(now - Duration::minutes(12), now), "12m");
        assert_eq!(time_ago(now - Duration::minutes(125), now), "2h");
        assert_eq!(time_ago(now - Duration::hours(49), now), "2d");
    }

    #[test]
    fn future_timestamps_read_as_now() {
        let now = Utc::now();
        assert_eq!(time_ago(now + Duration::hours(3), now), "just now");
    }
}
