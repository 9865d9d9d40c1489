/// Representative provider payloads for tests.
///
/// Shapes follow what the live APIs return; values are fixed so that
/// assertions can be exact.

use serde_json::{Value, json};

/// Full OpenWeather current-weather response for "RandomCity".
///
/// `dt` 1741599999 is 2025-03-10T09:46:39Z.
pub fn openweather_random_city() -> Value {
    json!({
        "coord": {"lon": 10.1234, "lat": 46.7890},
        "weather": [
            {"id": 801, "main": "Clear", "description": "clear sky", "icon": "01d"}
        ],
        "base": "stations",
        "main": {
            "temp": 12.3,
            "feels_like": 10.5,
            "temp_min": 11.0,
            "temp_max": 13.5,
            "pressure": 1012,
            "humidity": 80,
            "sea_level": 1012,
            "grnd_level": 1000
        },
        "visibility": 9000,
        "wind": {"speed": 3.5, "deg": 180},
        "clouds": {"all": 10},
        "dt": 1741599999,
        "sys": {
            "type": 2,
            "id": 20400,
            "country": "IT",
            "sunrise": 1741588000,
            "sunset": 1741630000
        },
        "timezone": 3600,
        "id": 6694000,
        "name": "RandomCity",
        "cod": 200
    })
}

/// OpenWeather response with only the required fields and a string id.
pub fn openweather_minimal() -> Value {
    json!({
        "main": {"temp": 15.1, "feels_like": 14.1, "humidity": 93, "pressure": 1015},
        "dt": 1627311600,
        "name": "Milan - Test Locality",
        "id": "test_station_id"
    })
}

/// One Netatmo `body` element with a single temperature/humidity module.
pub fn netatmo_milan_station() -> Value {
    json!({
        "_id": "70:ee:50:71:30:ae",
        "place": {
            "location": [9.22794373449619, 45.4832984744368],
            "timezone": "Europe/Rome",
            "country": "IT",
            "altitude": 122,
            "city": "Milan",
            "street": "Test Locality"
        },
        "mark": 10,
        "measures": {
            "02:00:00:6b:97:be": {
                "res": {"1741362399": [18.3, 47]},
                "type": ["temperature", "humidity"]
            }
        },
        "modules": ["02:00:00:6b:97:be"],
        "module_types": {"02:00:00:6b:97:be": "NAModule1"}
    })
}

/// `getpublicdata` response with three stations, the second of which has
/// a result row keyed by something that is not an epoch.
pub fn netatmo_three_stations_one_malformed() -> Value {
    json!({
        "body": [
            netatmo_milan_station(),
            {
                "_id": "70:ee:50:00:00:bb",
                "place": {"location": [9.19, 45.46], "city": "Milan", "street": "Via Broken"},
                "measures": {
                    "02:00:00:00:00:bb": {
                        "res": {"yesterday": [17.0, 50]},
                        "type": ["temperature", "humidity"]
                    }
                }
            },
            {
                "_id": "70:ee:50:00:00:cc",
                "place": {"location": [9.18, 45.47], "city": "Milan", "street": "Corso Como"},
                "measures": {
                    "02:00:00:00:00:cc": {
                        "res": {"1741362410": [16.9, 52]},
                        "type": ["temperature", "humidity"]
                    },
                    "70:ee:50:00:00:cc": {
                        "res": {"1741362405": [1011.4]},
                        "type": ["pressure"]
                    }
                }
            }
        ],
        "status": "ok",
        "time_exec": 0.02,
        "time_server": 1741362450
    })
}
