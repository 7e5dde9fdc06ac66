//! HTTP-level tests for the provider clients, the fallback chain and geocoding, run against
//! a local mock server.

use std::{sync::Arc, time::Duration};

use skycast_core::{
    ApiError, CacheStore, Coordinates, DeviceConfig, GeocodingLocationService, LocationError,
    LocationService, MemoryCacheStore, NetworkError, Origin, ProviderId, WeatherCategory,
    WeatherError, WeatherService, WeatherSource,
    provider::{
        openmeteo::OpenMeteoProvider, openweather::OpenWeatherProvider,
        weatherapi::WeatherApiProvider,
    },
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

const BERLIN: Coordinates = Coordinates { latitude: 52.52, longitude: 13.405 };

fn open_meteo_body() -> serde_json::Value {
    let times: Vec<String> = (0..48)
        .map(|h| format!("2024-01-{:02}T{:02}:00", 15 + h / 24, h % 24))
        .collect();
    serde_json::json!({
        "latitude": 52.52,
        "longitude": 13.405,
        "utc_offset_seconds": 3600,
        "timezone": "Europe/Berlin",
        "current": {
            "time": "2024-01-15T12:00",
            "temperature_2m": 5.9,
            "relative_humidity_2m": 75,
            "apparent_temperature": 2.0,
            "weather_code": 3,
            "wind_speed_10m": 12.5,
            "surface_pressure": 1013.25
        },
        "hourly": {
            "time": times,
            "temperature_2m": vec![4.0; 48],
            "weather_code": vec![3; 48],
            "relative_humidity_2m": vec![70; 48],
            "wind_speed_10m": vec![10.0; 48]
        },
        "daily": {
            "time": ["2024-01-15", "2024-01-16", "2024-01-17"],
            "weather_code": [3, 61, 2],
            "temperature_2m_max": [8.0, 6.0, 10.0],
            "temperature_2m_min": [2.0, 1.0, 3.0],
            "wind_speed_10m_max": [15.0, 20.0, 12.0]
        }
    })
}

fn weather_api_body() -> serde_json::Value {
    serde_json::json!({
        "location": {
            "name": "Berlin",
            "country": "Germany",
            "localtime_epoch": 1_705_316_400,
            "localtime": "2024-01-15 12:00"
        },
        "current": {
            "temp_c": -3.4,
            "feelslike_c": -7.0,
            "humidity": 80,
            "wind_kph": 14.0,
            "pressure_mb": 1020.0,
            "vis_km": 8.0,
            "uv": 1.0,
            "condition": { "text": "Light snow", "code": 1213 }
        },
        "forecast": {
            "forecastday": [{
                "date": "2024-01-15",
                "day": {
                    "maxtemp_c": -1.0,
                    "mintemp_c": -6.0,
                    "avghumidity": 85,
                    "maxwind_kph": 20.0,
                    "condition": { "text": "Light snow", "code": 1213 }
                },
                "hour": [{
                    "time_epoch": 1_705_316_400,
                    "time": "2024-01-15 12:00",
                    "temp_c": -3.4,
                    "humidity": 80,
                    "wind_kph": 14.0,
                    "condition": { "text": "Light snow", "code": 1213 }
                }]
            }]
        }
    })
}

fn open_meteo(server: &MockServer) -> OpenMeteoProvider {
    OpenMeteoProvider::new(Duration::from_secs(5))
        .expect("client should build")
        .with_base_url(server.uri())
}

async fn mount_open_meteo(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(response)
        .mount(server)
        .await;
}

// ============================================================================
// Provider clients
// ============================================================================

#[tokio::test]
async fn open_meteo_sends_metric_query_and_normalizes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("latitude", "52.52"))
        .and(query_param("longitude", "13.405"))
        .and(query_param("forecast_days", "10"))
        .and(query_param("timezone", "auto"))
        .and(query_param("wind_speed_unit", "kmh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(open_meteo_body()))
        .expect(1)
        .mount(&server)
        .await;

    let weather = open_meteo(&server).get_weather(BERLIN).await.expect("should succeed");

    assert_eq!(weather.provider, ProviderId::OpenMeteo);
    assert_eq!(weather.current.temperature, 5);
    assert_eq!(weather.current.category, WeatherCategory::Cloudy);
    assert_eq!(weather.current.high_temp, 8);
    assert_eq!(weather.daily.len(), 3);
    assert_eq!(weather.daily[0].day_name, "Today");
    assert!(!weather.hourly.is_empty() && weather.hourly.len() <= 24);
    assert_eq!(weather.hourly[0].time_label, "Now");
}

#[tokio::test]
async fn status_codes_map_into_taxonomy() {
    let cases = [
        (429, WeatherError::Api(ApiError::RateLimited)),
        (500, WeatherError::Network(NetworkError::ServerError(500))),
        (401, WeatherError::Api(ApiError::InvalidApiKey)),
        (404, WeatherError::Api(ApiError::LocationNotFound)),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        mount_open_meteo(&server, ResponseTemplate::new(status)).await;

        let err = open_meteo(&server).get_weather(BERLIN).await.unwrap_err();
        assert_eq!(err, expected, "status {status}");
    }
}

#[tokio::test]
async fn malformed_json_is_an_invalid_response() {
    let server = MockServer::start().await;
    mount_open_meteo(&server, ResponseTemplate::new(200).set_body_string("{not json")).await;

    let err = open_meteo(&server).get_weather(BERLIN).await.unwrap_err();
    assert!(matches!(err, WeatherError::Api(ApiError::InvalidResponse(_))));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    mount_open_meteo(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(open_meteo_body())
            .set_delay(Duration::from_millis(500)),
    )
    .await;

    let provider = OpenMeteoProvider::new(Duration::from_millis(100))
        .unwrap()
        .with_base_url(server.uri());
    let err = provider.get_weather(BERLIN).await.unwrap_err();

    assert_eq!(err, WeatherError::Network(NetworkError::Timeout));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn weather_api_sends_key_and_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast.json"))
        .and(query_param("key", "WA_KEY"))
        .and(query_param("q", "52.52,13.405"))
        .and(query_param("days", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_api_body()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = WeatherApiProvider::new("WA_KEY".into(), Duration::from_secs(5))
        .unwrap()
        .with_base_url(server.uri());
    let weather = provider.get_weather(BERLIN).await.expect("should succeed");

    assert_eq!(weather.location.city_name, "Berlin");
    assert_eq!(weather.current.temperature, -3);
    assert_eq!(weather.current.category, WeatherCategory::Snow);
}

#[tokio::test]
async fn open_weather_calls_both_endpoints_in_metric() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("appid", "OW_KEY"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "Berlin",
            "dt": 1_705_316_400,
            "timezone": 3600,
            "main": {
                "temp": 1.6, "feels_like": -1.0, "temp_min": 0.0, "temp_max": 3.0,
                "pressure": 1015, "humidity": 70
            },
            "weather": [{ "id": 701, "main": "Mist" }],
            "wind": { "speed": 10.0 },
            "sys": { "country": "DE" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("appid", "OW_KEY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "city": { "name": "Berlin", "country": "DE", "timezone": 3600 },
            "list": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenWeatherProvider::new("OW_KEY".into(), Duration::from_secs(5))
        .unwrap()
        .with_base_url(server.uri());
    let weather = provider.get_weather(BERLIN).await.expect("should succeed");

    assert_eq!(weather.current.wind_speed_kmh, 36.0);
    assert_eq!(weather.current.category, WeatherCategory::Foggy);
    assert_eq!(weather.location.country, "DE");
}

// ============================================================================
// Fallback chain
// ============================================================================

#[tokio::test]
async fn service_falls_back_past_a_failing_provider() {
    let om_server = MockServer::start().await;
    mount_open_meteo(&om_server, ResponseTemplate::new(503)).await;

    let wa_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_api_body()))
        .expect(1)
        .mount(&wa_server)
        .await;

    let ow_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&ow_server)
        .await;

    let sources: Vec<Arc<dyn WeatherSource>> = vec![
        Arc::new(open_meteo(&om_server)),
        Arc::new(
            WeatherApiProvider::new("WA_KEY".into(), Duration::from_secs(5))
                .unwrap()
                .with_base_url(wa_server.uri()),
        ),
        Arc::new(
            OpenWeatherProvider::new("OW_KEY".into(), Duration::from_secs(5))
                .unwrap()
                .with_base_url(ow_server.uri()),
        ),
    ];
    let cache = Arc::new(MemoryCacheStore::new());
    let service = WeatherService::new(sources, cache.clone());

    let retrieved = service.retrieve(BERLIN, false).await.expect("should succeed");

    assert_eq!(retrieved.origin, Origin::Provider(ProviderId::WeatherApi));
    assert_eq!(cache.get(&BERLIN.cache_key()).await.unwrap(), Some(retrieved.weather.clone()));

    // second call is served from cache
    let again = service.retrieve(BERLIN, false).await.unwrap();
    assert_eq!(again.origin, Origin::FreshCache);
}

#[tokio::test]
async fn unkeyed_providers_are_never_called() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sources: Vec<Arc<dyn WeatherSource>> = vec![
        Arc::new(
            WeatherApiProvider::new(String::new(), Duration::from_secs(5))
                .unwrap()
                .with_base_url(server.uri()),
        ),
        Arc::new(
            OpenWeatherProvider::new("  ".into(), Duration::from_secs(5))
                .unwrap()
                .with_base_url(server.uri()),
        ),
    ];
    let service = WeatherService::new(sources, Arc::new(MemoryCacheStore::new()));

    let err = service.get_weather(BERLIN, false).await.unwrap_err();
    assert_eq!(err, WeatherError::Api(ApiError::AllProvidersFailed));
}

// ============================================================================
// Geocoding
// ============================================================================

fn geocoder(server: &MockServer) -> GeocodingLocationService {
    GeocodingLocationService::new(DeviceConfig::default())
        .unwrap()
        .with_base_urls(server.uri(), server.uri())
}

#[tokio::test]
async fn search_returns_at_most_ten_places() {
    let server = MockServer::start().await;
    let results: Vec<_> = (0..12)
        .map(|i| {
            serde_json::json!({
                "name": format!("Springfield {i}"),
                "latitude": 39.0 + f64::from(i),
                "longitude": -89.0,
                "country": "United States"
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("name", "Springfield"))
        .and(query_param("count", "10"))
        .and(query_param("language", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": results
        })))
        .expect(1)
        .mount(&server)
        .await;

    let places = geocoder(&server).search_by_name("Springfield").await.unwrap();

    assert_eq!(places.len(), 10);
    assert_eq!(places[0].city_name, "Springfield 0");
    assert_eq!(places[0].country, "United States");
}

#[tokio::test]
async fn search_without_matches_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "generationtime_ms": 0.5
        })))
        .mount(&server)
        .await;

    let places = geocoder(&server).search_by_name("Xyzzyville").await.unwrap();
    assert!(places.is_empty());
}

#[tokio::test]
async fn reverse_geocode_names_the_place() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("lat", "52.52"))
        .and(query_param("lon", "13.405"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "display_name": "Berlin, Deutschland",
            "address": { "city": "Berlin", "state": "Berlin", "country": "Deutschland" }
        })))
        .mount(&server)
        .await;

    let place = geocoder(&server).reverse_geocode(BERLIN).await.unwrap();

    assert_eq!(place.city_name, "Berlin");
    assert_eq!(place.country, "Deutschland");
    assert_eq!(place.latitude, 52.52);
}

#[tokio::test]
async fn reverse_geocode_failure_is_a_location_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = geocoder(&server).reverse_geocode(BERLIN).await.unwrap_err();
    assert!(matches!(err, WeatherError::Location(LocationError::GeocodingFailed(_))));
}
