//! Plain-text rendering of weather snapshots and view states.

use chrono::{DateTime, Local};
use skycast_core::{
    CanonicalWeather, ErrorAction, LocationView, Origin, Place, SavedLocation, WeatherUiState,
};
use std::fmt::Write;

/// How many hourly points fit on the summary line.
const HOURLY_PREVIEW: usize = 8;

pub fn origin_label(origin: Origin) -> String {
    match origin {
        Origin::FreshCache => "cached".to_string(),
        Origin::Provider(id) => format!("live from {id}"),
        Origin::StaleCache => "offline, showing last known data".to_string(),
    }
}

fn updated_at(epoch_ms: i64) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn place_name(weather: &CanonicalWeather) -> String {
    let loc = &weather.location;
    match (loc.city_name.is_empty(), loc.country.is_empty()) {
        (true, _) => weather.coordinates().to_string(),
        (false, true) => loc.city_name.clone(),
        (false, false) => format!("{}, {}", loc.city_name, loc.country),
    }
}

pub fn render_weather(weather: &CanonicalWeather, origin: Origin) -> String {
    let cur = &weather.current;
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "{}  ({})", place_name(weather), weather.coordinates());
    let _ = writeln!(
        out,
        "{} {}°C  {}   H:{}° L:{}°",
        cur.icon, cur.temperature, cur.condition_text, cur.high_temp, cur.low_temp
    );
    let _ = write!(
        out,
        "Feels like {}°C · Humidity {}% · Wind {:.0} km/h",
        cur.feels_like, cur.humidity, cur.wind_speed_kmh
    );
    if let Some(uv) = cur.uv_index {
        let _ = write!(out, " · UV {uv}");
    }
    if let Some(vis) = cur.visibility_km {
        let _ = write!(out, " · Visibility {vis:.1} km");
    }
    if let Some(p) = cur.pressure {
        let _ = write!(out, " · {p:.0} hPa");
    }
    out.push('\n');
    let _ = writeln!(out, "{}", cur.description);

    if !weather.hourly.is_empty() {
        let hours: Vec<String> = weather
            .hourly
            .iter()
            .take(HOURLY_PREVIEW)
            .map(|h| format!("{} {}° {}", h.time_label, h.temperature, h.icon))
            .collect();
        let _ = writeln!(out, "\nHourly: {}", hours.join(" | "));
    }

    if !weather.daily.is_empty() {
        let _ = writeln!(out, "\nDaily:");
        for day in &weather.daily {
            let _ = writeln!(
                out,
                "  {:<7} {} {:>3}° / {:>3}°  {}",
                day.day_name, day.icon, day.high_temp, day.low_temp, day.condition_text
            );
        }
    }

    let _ = write!(
        out,
        "\nSource: {} ({}), updated {}",
        weather.provider,
        origin_label(origin),
        updated_at(weather.last_updated_epoch_ms)
    );
    out
}

pub fn render_error_hint(action: ErrorAction) -> Option<&'static str> {
    match action {
        ErrorAction::Retry => Some("Try again in a moment."),
        ErrorAction::GrantPermission => Some(
            "Enable location access: set `allow_location = true` and a position under [device] in the config file.",
        ),
        ErrorAction::None => None,
    }
}

pub fn render_view(view: &LocationView) -> String {
    let name = view.location.display_name();
    match &view.state {
        WeatherUiState::Loading => format!("{name}: loading..."),
        WeatherUiState::Success { weather, origin } => format!(
            "{name}: {} {}°C {} (H:{}° L:{}°) [{}]",
            weather.current.icon,
            weather.current.temperature,
            weather.current.condition_text,
            weather.current.high_temp,
            weather.current.low_temp,
            origin_label(*origin)
        ),
        WeatherUiState::Error { error, action } => match render_error_hint(*action) {
            Some(hint) => format!("{name}: {error}. {hint}"),
            None => format!("{name}: {error}"),
        },
    }
}

pub fn render_saved(location: &SavedLocation) -> String {
    let marker = if location.is_current_location { " (current)" } else { "" };
    format!(
        "[{}] {}{}  ({})",
        location.id,
        location.display_name(),
        marker,
        location.coordinates()
    )
}

pub fn render_place(place: &Place) -> String {
    if place.country.is_empty() {
        format!("{}  ({:.4}, {:.4})", place.city_name, place.latitude, place.longitude)
    } else {
        format!(
            "{}, {}  ({:.4}, {:.4})",
            place.city_name, place.country, place.latitude, place.longitude
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycast_core::{
        CurrentConditions, DailyForecast, LocationInfo, ProviderId, WeatherCategory,
    };

    fn weather() -> CanonicalWeather {
        CanonicalWeather {
            location: LocationInfo {
                latitude: 37.3382,
                longitude: -121.8863,
                city_name: "San Jose".into(),
                country: "US".into(),
                is_current_location: false,
            },
            current: CurrentConditions {
                temperature: 18,
                condition_text: "Clear sky".into(),
                condition_code: 0,
                high_temp: 21,
                low_temp: 9,
                feels_like: 17,
                humidity: 40,
                wind_speed_kmh: 3.2,
                icon: "☀️".into(),
                category: WeatherCategory::Sunny,
                description: "Sunny conditions this afternoon.".into(),
                visibility_km: None,
                uv_index: Some(5),
                pressure: None,
            },
            hourly: vec![],
            daily: vec![DailyForecast {
                date: "2024-01-15".into(),
                day_name: "Today".into(),
                high_temp: 21,
                low_temp: 9,
                condition_code: 0,
                icon: "☀️".into(),
                condition_text: "Clear sky".into(),
                humidity: None,
                wind_speed_kmh: None,
            }],
            last_updated_epoch_ms: 1_705_327_200_000,
            provider: ProviderId::OpenMeteo,
        }
    }

    #[test]
    fn renders_headline_and_source() {
        let text = render_weather(&weather(), Origin::Provider(ProviderId::OpenMeteo));

        assert!(text.starts_with("San Jose, US"));
        assert!(text.contains("18°C  Clear sky"));
        assert!(text.contains("UV 5"));
        assert!(text.contains("Today"));
        assert!(text.contains("live from openmeteo"));
        assert!(!text.contains("Hourly"));
    }

    #[test]
    fn stale_data_is_flagged() {
        let text = render_weather(&weather(), Origin::StaleCache);
        assert!(text.contains("offline"));
    }

    #[test]
    fn permission_errors_get_a_hint() {
        assert!(render_error_hint(ErrorAction::GrantPermission).unwrap().contains("[device]"));
        assert!(render_error_hint(ErrorAction::None).is_none());
    }
}
