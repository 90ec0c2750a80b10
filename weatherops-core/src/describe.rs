//! Human-readable weather categories from (temperature, precipitation, wind).
//!
//! Bands are checked in order and the first match wins:
//!
//! | condition            | category   |
//! |----------------------|------------|
//! | precipitation > 10   | Heavy Rain |
//! | precipitation > 2    | Light Rain |
//! | wind speed > 25      | Windy      |
//! | temperature >= 35    | Very Hot   |
//! | temperature >= 30    | Hot        |
//! | temperature >= 24    | Pleasant   |
//! | temperature >= 18    | Cool       |
//! | temperature >= 10    | Cold       |
//! | otherwise            | Freezing   |

use serde::{Deserialize, Serialize};
use std::fmt;

pub const HEAVY_RAIN_MM: f64 = 10.0;
pub const LIGHT_RAIN_MM: f64 = 2.0;
pub const WINDY_SPEED: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherDescription {
    HeavyRain,
    LightRain,
    Windy,
    VeryHot,
    Hot,
    Pleasant,
    Cool,
    Cold,
    Freezing,
}

impl WeatherDescription {
    pub fn classify(temperature: f64, precipitation: f64, wind_speed: f64) -> Self {
        if precipitation > HEAVY_RAIN_MM {
            Self::HeavyRain
        } else if precipitation > LIGHT_RAIN_MM {
            Self::LightRain
        } else if wind_speed > WINDY_SPEED {
            Self::Windy
        } else if temperature >= 35.0 {
            Self::VeryHot
        } else if temperature >= 30.0 {
            Self::Hot
        } else if temperature >= 24.0 {
            Self::Pleasant
        } else if temperature >= 18.0 {
            Self::Cool
        } else if temperature >= 10.0 {
            Self::Cold
        } else {
            Self::Freezing
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::HeavyRain => "Heavy Rain",
            Self::LightRain => "Light Rain",
            Self::Windy => "Windy",
            Self::VeryHot => "Very Hot",
            Self::Hot => "Hot",
            Self::Pleasant => "Pleasant",
            Self::Cool => "Cool",
            Self::Cold => "Cold",
            Self::Freezing => "Freezing",
        }
    }

    /// Emoji shown next to the label in terminal output.
    pub fn icon(&self) -> &'static str {
        match self {
            Self::HeavyRain => "🌧️",
            Self::LightRain => "🌦️",
            Self::Windy => "💨",
            Self::VeryHot => "🔥",
            Self::Hot => "☀️",
            Self::Pleasant => "🌤️",
            Self::Cool => "🌫️",
            Self::Cold => "❄️",
            Self::Freezing => "🧊",
        }
    }
}

impl fmt::Display for WeatherDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use WeatherDescription::*;

    #[test]
    fn precipitation_outranks_everything() {
        assert_eq!(WeatherDescription::classify(40.0, 10.5, 30.0), HeavyRain);
        assert_eq!(WeatherDescription::classify(40.0, 10.0, 30.0), LightRain);
        assert_eq!(WeatherDescription::classify(40.0, 2.0, 30.0), Windy);
    }

    #[test]
    fn wind_outranks_temperature() {
        assert_eq!(WeatherDescription::classify(5.0, 0.0, 25.1), Windy);
        assert_eq!(WeatherDescription::classify(5.0, 0.0, 25.0), Freezing);
    }

    #[test]
    fn temperature_bands_are_inclusive_lower_bounds() {
        let cases = [
            (35.0, VeryHot),
            (34.9, Hot),
            (30.0, Hot),
            (24.0, Pleasant),
            (18.0, Cool),
            (10.0, Cold),
            (9.99, Freezing),
            (-5.0, Freezing),
        ];
        for (temp, expected) in cases {
            assert_eq!(WeatherDescription::classify(temp, 0.0, 0.0), expected, "temp {temp}");
        }
    }

    #[test]
    fn display_uses_label() {
        assert_eq!(VeryHot.to_string(), "Very Hot");
        assert_eq!(HeavyRain.label(), "Heavy Rain");
    }
}
