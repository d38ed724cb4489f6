//! Human-friendly output formatting for forecast data.

use solcast_data::{ForecastRecord, ForecastSummary};

/// Human label for an upstream weather-condition code.
pub fn condition_label(weather_id: i32) -> &'static str {
    match weather_id {
        200..=299 => "Thunderstorm",
        300..=399 => "Drizzle",
        500..=599 => "Rain",
        600..=699 => "Snow",
        700..=799 => "Fog",
        800 => "Clear",
        801..=899 => "Clouds",
        _ => "Unknown",
    }
}

pub fn print_forecast_list(rows: &[ForecastSummary]) {
    if rows.is_empty() {
        println!("No forecast data stored.");
        return;
    }

    println!("{:<12} {:<14} {:>7} {:>7}", "Date", "Conditions", "High", "Low");
    for row in rows {
        println!(
            "{:<12} {:<14} {:>6.1}° {:>6.1}°",
            row.date,
            condition_label(row.weather_id),
            row.temp_max,
            row.temp_min,
        );
    }
}

pub fn print_forecast_detail(record: &ForecastRecord) {
    println!("Forecast for {}", record.date);
    println!("  Conditions: {} ({})", condition_label(record.weather_id), record.weather_id);
    println!("  High:       {:.1}°", record.temp_max);
    println!("  Low:        {:.1}°", record.temp_min);
    println!("  Humidity:   {}%", record.humidity);
    println!("  Pressure:   {:.1} hPa", record.pressure);
    println!("  Wind:       {:.1} m/s at {:.0}°", record.wind_speed, record.wind_direction);
}
