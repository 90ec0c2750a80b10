//! Open-Meteo historical archive provider.
//!
//! Fetches daily mean/min/max temperature, precipitation sum and maximum
//! 10 m wind speed for a fixed coordinate. Handles retries with exponential
//! backoff and maps the archive's JSON arrays onto observations.

use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

use super::frame::parse_date;
use super::provider::{DataError, DataSource, FetchResult, ObservationProvider};
use crate::domain::Observation;

const DAILY_VARIABLES: &str =
    "temperature_2m_mean,temperature_2m_min,temperature_2m_max,precipitation_sum,wind_speed_10m_max";

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: Option<DailySeries>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailySeries {
    time: Vec<String>,
    temperature_2m_mean: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    temperature_2m_max: Vec<Option<f64>>,
    precipitation_sum: Vec<Option<f64>>,
    wind_speed_10m_max: Vec<Option<f64>>,
}

/// Location and endpoint for the archive API.
#[derive(Debug, Clone)]
pub struct OpenMeteoSettings {
    pub latitude: f64,
    pub longitude: f64,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OpenMeteoSettings {
    fn default() -> Self {
        Self {
            latitude: 12.9716,
            longitude: 77.5946,
            base_url: "https://archive-api.open-meteo.com/v1/archive".into(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct OpenMeteoProvider {
    client: reqwest::blocking::Client,
    settings: OpenMeteoSettings,
    max_retries: u32,
    base_delay: Duration,
}

impl OpenMeteoProvider {
    pub fn new(settings: OpenMeteoSettings) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("weatherops/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("http client: {e}")))?;

        Ok(Self {
            client,
            settings,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    fn archive_url(&self, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}?latitude={}&longitude={}&start_date={start}&end_date={end}\
             &daily={DAILY_VARIABLES}&timezone=auto",
            self.settings.base_url, self.settings.latitude, self.settings.longitude
        )
    }

    fn parse_response(resp: ArchiveResponse) -> Result<Vec<Observation>, DataError> {
        let daily = resp.daily.ok_or_else(|| {
            DataError::ResponseFormatChanged(
                resp.reason.unwrap_or_else(|| "response has no daily block".into()),
            )
        })?;

        let n = daily.time.len();
        let lengths = [
            daily.temperature_2m_mean.len(),
            daily.temperature_2m_min.len(),
            daily.temperature_2m_max.len(),
            daily.precipitation_sum.len(),
            daily.wind_speed_10m_max.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            return Err(DataError::ResponseFormatChanged(format!(
                "daily arrays have mismatched lengths: time={n}, values={lengths:?}"
            )));
        }

        let mut observations = Vec::with_capacity(n);
        for (i, raw) in daily.time.iter().enumerate() {
            let timestamp = parse_date(raw).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid date: {raw}"))
            })?;
            let mut obs = Observation::empty(timestamp);
            obs.avg_temp = daily.temperature_2m_mean[i];
            obs.min_temp = daily.temperature_2m_min[i];
            obs.max_temp = daily.temperature_2m_max[i];
            obs.precipitation = daily.precipitation_sum[i];
            obs.wind_speed = daily.wind_speed_10m_max[i];
            observations.push(obs);
        }
        Ok(observations)
    }

    fn fetch_with_retry(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Observation>, DataError> {
        let url = self.archive_url(start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            let response = match self.client.get(&url).send() {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 {
                last_error = Some(DataError::RateLimited);
                continue;
            }
            if status.is_server_error() {
                last_error = Some(DataError::NetworkUnreachable(format!("HTTP {status}")));
                continue;
            }

            if status.is_client_error() {
                let text = response.text().unwrap_or_default();
                return Err(DataError::Rejected(rejection_reason(status, &text)));
            }
            let body: ArchiveResponse = response
                .json()
                .map_err(|e| DataError::ResponseFormatChanged(format!("JSON parse: {e}")))?;
            return Self::parse_response(body);
        }

        Err(last_error.unwrap_or_else(|| DataError::NetworkUnreachable("max retries exceeded".into())))
    }
}

impl ObservationProvider for OpenMeteoProvider {
    fn name(&self) -> &str {
        "open-meteo"
    }

    fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<FetchResult, DataError> {
        if start > end {
            return Err(DataError::Validation(format!(
                "start date {start} is after end date {end}"
            )));
        }
        let observations = self.fetch_with_retry(start, end)?;
        tracing::info!(provider = self.name(), rows = observations.len(), %start, %end, "fetched observations");
        Ok(FetchResult {
            observations,
            source: DataSource::OpenMeteo,
        })
    }
}

/// Why a 4xx was returned: the JSON `reason`, else the raw body, else the status.
fn rejection_reason(status: reqwest::StatusCode, body: &str) -> String {
    if let Some(reason) = serde_json::from_str::<ArchiveResponse>(body)
        .ok()
        .and_then(|r| r.reason)
    {
        return reason;
    }
    let text = body.trim();
    if text.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_response_maps_daily_arrays() {
        let json = r#"{
            "latitude": 12.97,
            "daily": {
                "time": ["2024-01-01", "2024-01-02"],
                "temperature_2m_mean": [21.3, null],
                "temperature_2m_min": [16.0, 15.5],
                "temperature_2m_max": [27.1, 26.4],
                "precipitation_sum": [0.0, 3.2],
                "wind_speed_10m_max": [11.2, 9.8]
            }
        }"#;
        let resp: ArchiveResponse = serde_json::from_str(json).unwrap();

        let obs = OpenMeteoProvider::parse_response(resp).unwrap();

        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].avg_temp, Some(21.3));
        assert_eq!(obs[1].avg_temp, None);
        assert_eq!(obs[1].precipitation, Some(3.2));
        assert_eq!(obs[1].timestamp, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn parse_response_rejects_ragged_arrays() {
        let json = r#"{
            "daily": {
                "time": ["2024-01-01", "2024-01-02"],
                "temperature_2m_mean": [21.3],
                "temperature_2m_min": [16.0, 15.5],
                "temperature_2m_max": [27.1, 26.4],
                "precipitation_sum": [0.0, 3.2],
                "wind_speed_10m_max": [11.2, 9.8]
            }
        }"#;
        let resp: ArchiveResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            OpenMeteoProvider::parse_response(resp),
            Err(DataError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn error_body_reason_is_surfaced() {
        let resp: ArchiveResponse =
            serde_json::from_str(r#"{"error": true, "reason": "Parameter 'start_date' is out of range"}"#)
                .unwrap();
        let err = OpenMeteoProvider::parse_response(resp).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn client_error_with_plain_text_body_is_rejected() {
        let status = reqwest::StatusCode::FORBIDDEN;
        assert_eq!(
            rejection_reason(status, "<html>Forbidden</html>"),
            "HTTP 403 Forbidden: <html>Forbidden</html>"
        );
        assert_eq!(rejection_reason(status, "  "), "HTTP 403 Forbidden");
        assert_eq!(
            rejection_reason(
                reqwest::StatusCode::BAD_REQUEST,
                r#"{"error": true, "reason": "Cannot initialize WeatherVariable"}"#
            ),
            "Cannot initialize WeatherVariable"
        );
    }

    #[test]
    fn archive_url_contains_location_and_range() {
        let provider = OpenMeteoProvider::new(OpenMeteoSettings::default()).unwrap();
        let url = provider.archive_url(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        assert!(url.contains("latitude=12.9716"));
        assert!(url.contains("start_date=2024-01-01&end_date=2024-01-31"));
        assert!(url.contains("wind_speed_10m_max"));
    }
}
