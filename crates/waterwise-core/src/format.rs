//! Human-readable renderings of water amounts and times.

use crate::time::MS_PER_DAY;

/// Dashboard amount, switching from milliliters to liters at 1 L.
pub fn format_water(liters: f64) -> String {
    if liters < 0.001 {
        format!("{:.2} ml", liters * 1000.0)
    } else if liters < 1.0 {
        format!("{:.0} ml", liters * 1000.0)
    } else if liters < 10.0 {
        format!("{:.2} L", liters)
    } else {
        format!("{:.1} L", liters)
    }
}

/// Text shown next to a single message.
pub fn format_badge(liters: f64) -> String {
    let amount = if liters < 0.001 {
        format!("{:.2}ml", liters * 1000.0)
    } else if liters < 1.0 {
        format!("{:.1}ml", liters * 1000.0)
    } else {
        format!("{:.2}L", liters)
    };
    format!("{} water", amount)
}

/// Everyday equivalent for a total.
pub fn comparison_text(liters: f64) -> String {
    if liters < 0.5 {
        "Less than a water bottle".to_string()
    } else if liters < 2.0 {
        format!("About {} water bottles", (liters / 0.5).round())
    } else if liters < 10.0 {
        format!("About {:.1} gallons", liters / 3.78)
    } else if liters < 50.0 {
        format!("About {} toilet flushes", (liters / 10.0).round())
    } else if liters < 200.0 {
        format!("About {} bathtubs", (liters / 50.0).round())
    } else {
        format!("About {:.1} filled bathtubs", liters / 378.5)
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let elapsed = (now_ms - timestamp_ms).max(0);
    let minutes = elapsed / 60_000;
    let hours = minutes / 60;
    let days = elapsed / MS_PER_DAY;

    if minutes < 1 {
        "Just now".to_string()
    } else if hours < 1 {
        format!("{}m ago", minutes)
    } else if days < 1 {
        format!("{}h ago", hours)
    } else {
        format!("{}d ago", days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_water_thresholds() {
        assert_eq!(format_water(0.0), "0.00 ml");
        assert_eq!(format_water(0.0005), "0.50 ml");
        assert_eq!(format_water(0.042), "42 ml");
        assert_eq!(format_water(2.5), "2.50 L");
        assert_eq!(format_water(12.34), "12.3 L");
    }

    #[test]
    fn test_format_badge() {
        assert_eq!(format_badge(0.00015), "0.15ml water");
        assert_eq!(format_badge(0.03), "30.0ml water");
        assert_eq!(format_badge(1.5), "1.50L water");
    }

    #[test]
    fn test_comparison_text() {
        assert_eq!(comparison_text(0.1), "Less than a water bottle");
        assert_eq!(comparison_text(1.0), "About 2 water bottles");
        assert_eq!(comparison_text(3.78), "About 1.0 gallons");
        assert_eq!(comparison_text(30.0), "About 3 toilet flushes");
        assert_eq!(comparison_text(100.0), "About 2 bathtubs");
        assert_eq!(comparison_text(757.0), "About 2.0 filled bathtubs");
    }

    #[test]
    fn test_relative_time() {
        let now = 10 * MS_PER_DAY;
        assert_eq!(format_relative_time(now - 30_000, now), "Just now");
        assert_eq!(format_relative_time(now - 5 * 60_000, now), "5m ago");
        assert_eq!(format_relative_time(now - 3 * 3_600_000, now), "3h ago");
        assert_eq!(format_relative_time(now - 2 * MS_PER_DAY, now), "2d ago");
        // Clock skew never produces negative ages
        assert_eq!(format_relative_time(now + 60_000, now), "Just now");
    }
}
