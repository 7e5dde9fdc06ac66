//! Vendor condition codes to `(text, icon, category)` and free-text summaries.
//!
//! All three lookups are total: any `i32`, including negative or absurdly large values,
//! yields a [`ConditionInfo`]. Unknown codes map to [`UNKNOWN`].

use crate::model::WeatherCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionInfo {
    pub text: &'static str,
    pub icon: &'static str,
    pub category: WeatherCategory,
}

const fn info(text: &'static str, icon: &'static str, category: WeatherCategory) -> ConditionInfo {
    ConditionInfo { text, icon, category }
}

pub const UNKNOWN: ConditionInfo = info("Unknown", "❓", WeatherCategory::Cloudy);

use WeatherCategory::{Cloudy, Foggy, Rainy, Snow, Stormy, Sunny};

/// WMO weather interpretation codes, as reported by Open-Meteo.
pub fn open_meteo(code: i32) -> ConditionInfo {
    match code {
        0 => info("Clear sky", "☀️", Sunny),
        1 => info("Mainly clear", "🌤️", Sunny),
        2 => info("Partly cloudy", "⛅", Cloudy),
        3 => info("Overcast", "☁️", Cloudy),
        45 | 48 => info("Fog", "🌫️", Foggy),
        51 | 53 | 55 => info("Drizzle", "🌦️", Rainy),
        56 | 57 => info("Freezing drizzle", "🌧️", Rainy),
        61 => info("Light rain", "🌧️", Rainy),
        63 => info("Rain", "🌧️", Rainy),
        65 => info("Heavy rain", "🌧️", Rainy),
        66 | 67 => info("Freezing rain", "🌧️", Rainy),
        71 => info("Light snow", "🌨️", Snow),
        73 => info("Snow", "❄️", Snow),
        75 => info("Heavy snow", "❄️", Snow),
        77 => info("Snow grains", "🌨️", Snow),
        80..=82 => info("Rain showers", "🌦️", Rainy),
        85 | 86 => info("Snow showers", "🌨️", Snow),
        95 => info("Thunderstorm", "⛈️", Stormy),
        96 | 99 => info("Thunderstorm with hail", "⛈️", Stormy),
        _ => UNKNOWN,
    }
}

/// WeatherAPI.com condition codes (1000..=1282).
pub fn weather_api(code: i32) -> ConditionInfo {
    match code {
        1000 => info("Sunny", "☀️", Sunny),
        1003 => info("Partly cloudy", "⛅", Cloudy),
        1006 => info("Cloudy", "☁️", Cloudy),
        1009 => info("Overcast", "☁️", Cloudy),
        1030 => info("Mist", "🌫️", Foggy),
        1063 => info("Patchy rain possible", "🌦️", Rainy),
        1066 => info("Patchy snow possible", "🌨️", Snow),
        1069 => info("Patchy sleet possible", "🌨️", Snow),
        1072 => info("Patchy freezing drizzle", "🌧️", Rainy),
        1087 => info("Thundery outbreaks possible", "⛈️", Stormy),
        1114 => info("Blowing snow", "🌨️", Snow),
        1117 => info("Blizzard", "❄️", Snow),
        1135 => info("Fog", "🌫️", Foggy),
        1147 => info("Freezing fog", "🌫️", Foggy),
        1150 | 1153 => info("Light drizzle", "🌦️", Rainy),
        1168 | 1171 => info("Freezing drizzle", "🌧️", Rainy),
        1180 | 1183 => info("Light rain", "🌦️", Rainy),
        1186 | 1189 => info("Moderate rain", "🌧️", Rainy),
        1192 | 1195 => info("Heavy rain", "🌧️", Rainy),
        1198 | 1201 => info("Freezing rain", "🌧️", Rainy),
        1204 | 1207 => info("Sleet", "🌨️", Snow),
        1210 | 1213 => info("Light snow", "🌨️", Snow),
        1216 | 1219 => info("Moderate snow", "❄️", Snow),
        1222 | 1225 => info("Heavy snow", "❄️", Snow),
        1237 => info("Ice pellets", "🌨️", Snow),
        1240 => info("Light rain shower", "🌦️", Rainy),
        1243 | 1246 => info("Heavy rain shower", "🌧️", Rainy),
        1249 | 1252 => info("Sleet showers", "🌨️", Snow),
        1255 | 1258 => info("Snow showers", "🌨️", Snow),
        1261 | 1264 => info("Ice pellet showers", "🌨️", Snow),
        1273 | 1276 => info("Thunderstorm with rain", "⛈️", Stormy),
        1279 | 1282 => info("Thunderstorm with snow", "⛈️", Stormy),
        _ => UNKNOWN,
    }
}

/// OpenWeatherMap condition ids, grouped by hundreds.
pub fn open_weather(code: i32) -> ConditionInfo {
    match code {
        200..=232 => info("Thunderstorm", "⛈️", Stormy),
        300..=321 => info("Drizzle", "🌦️", Rainy),
        500 | 501 => info("Rain", "🌧️", Rainy),
        502..=504 => info("Heavy rain", "🌧️", Rainy),
        511 => info("Freezing rain", "🌧️", Rainy),
        520..=531 => info("Rain showers", "🌦️", Rainy),
        600..=622 => info("Snow", "❄️", Snow),
        701 => info("Mist", "🌫️", Foggy),
        711 | 721 => info("Haze", "🌫️", Foggy),
        731 | 751 | 761 | 762 => info("Dust", "🌫️", Foggy),
        741 => info("Fog", "🌫️", Foggy),
        771 | 781 => info("Squalls", "🌪️", Stormy),
        800 => info("Clear sky", "☀️", Sunny),
        801 => info("Few clouds", "🌤️", Sunny),
        802 => info("Scattered clouds", "⛅", Cloudy),
        803 | 804 => info("Overcast", "☁️", Cloudy),
        _ => UNKNOWN,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    fn phrase(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "this morning",
            TimeOfDay::Afternoon => "this afternoon",
            TimeOfDay::Evening => "this evening",
            TimeOfDay::Night => "tonight",
        }
    }
}

pub fn wind_adjective(wind_speed_kmh: f64) -> &'static str {
    if wind_speed_kmh < 5.0 {
        "Light"
    } else if wind_speed_kmh < 15.0 {
        "Moderate"
    } else if wind_speed_kmh < 25.0 {
        "Strong"
    } else {
        "Very strong"
    }
}

/// One or two sentences summarizing the conditions.
pub fn describe(
    category: WeatherCategory,
    temperature: i32,
    wind_speed_kmh: f64,
    time_of_day: TimeOfDay,
) -> String {
    let when = time_of_day.phrase();
    let headline = match category {
        Sunny => format!("Sunny conditions {when} with temperatures around {temperature}°C."),
        Cloudy => format!("Cloudy skies {when}, around {temperature}°C."),
        Rainy => format!("Rain expected {when} with temperatures near {temperature}°C."),
        Snow => format!("Snowfall {when}, temperatures around {temperature}°C."),
        Stormy => format!("Thunderstorms possible {when}, around {temperature}°C."),
        Foggy => format!("Foggy conditions {when} with reduced visibility, around {temperature}°C."),
    };

    format!(
        "{headline} {} winds at {wind_speed_kmh:.0} km/h.",
        wind_adjective(wind_speed_kmh)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WeatherCategory::{Cloudy, Foggy, Snow, Stormy, Sunny};

    #[test]
    fn clear_sky_is_sunny() {
        let c = open_meteo(0);
        assert_eq!(c.category, Sunny);
        assert_eq!(c.icon, "☀️");
    }

    #[test]
    fn tables_are_total() {
        for code in [i32::MIN, -1, 4, 100, 999, 1001, 5000, i32::MAX] {
            assert_eq!(open_meteo(code), UNKNOWN);
            assert_eq!(weather_api(code), UNKNOWN);
        }
        for code in [i32::MIN, -800, 0, 199, 805, 900, i32::MAX] {
            assert_eq!(open_weather(code), UNKNOWN);
        }
        assert_eq!(UNKNOWN.category, Cloudy);
        assert_eq!(UNKNOWN.text, "Unknown");
    }

    #[test]
    fn vendor_tables_agree_on_categories() {
        assert_eq!(weather_api(1000).category, Sunny);
        assert_eq!(weather_api(1135).category, Foggy);
        assert_eq!(weather_api(1276).category, Stormy);
        assert_eq!(open_weather(211).category, Stormy);
        assert_eq!(open_weather(601).category, Snow);
        assert_eq!(open_weather(741).category, Foggy);
        assert_eq!(open_weather(800).category, Sunny);
    }

    #[test]
    fn wind_bands() {
        assert_eq!(wind_adjective(0.0), "Light");
        assert_eq!(wind_adjective(4.9), "Light");
        assert_eq!(wind_adjective(5.0), "Moderate");
        assert_eq!(wind_adjective(14.9), "Moderate");
        assert_eq!(wind_adjective(15.0), "Strong");
        assert_eq!(wind_adjective(25.0), "Very strong");
    }

    #[test]
    fn description_uses_category_template_and_wind_band() {
        let text = describe(Sunny, 22, 3.0, TimeOfDay::Afternoon);
        assert!(text.contains("Sunny conditions this afternoon"));
        assert!(text.contains("Light winds"));

        let text = describe(Stormy, 18, 40.0, TimeOfDay::Night);
        assert!(text.starts_with("Thunderstorms possible tonight"));
        assert!(text.contains("Very strong winds at 40 km/h"));
    }

    #[test]
    fn description_is_deterministic() {
        let a = describe(Foggy, 4, 12.5, TimeOfDay::Morning);
        let b = describe(Foggy, 4, 12.5, TimeOfDay::Morning);
        assert_eq!(a, b);
    }

    #[test]
    fn hour_buckets() {
        assert_eq!(TimeOfDay::from_hour(0), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(13), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(20), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Night);
    }
}
