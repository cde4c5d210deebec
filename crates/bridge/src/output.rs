//! Terminal output for forwarded samples

use colored::Colorize;
use meter_lib::PredictResponse;

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// One-line summary of a predictor answer, without colour
pub fn format_response(response: &PredictResponse) -> String {
    let prediction = match response.prediction {
        Some(kwh) => format!("{kwh:.2} kWh ({})", response.prediction_source.as_str()),
        None => "none".to_string(),
    };
    if response.anomaly {
        format!("prediction {prediction}, ANOMALY ({})", response.reason)
    } else {
        format!("prediction {prediction}")
    }
}

/// Print the predictor's answer for a posted sample
pub fn print_response(timestamp: &str, response: &PredictResponse) {
    let summary = format_response(response);
    if response.anomaly {
        print_warning(&format!("{timestamp}: {summary}"));
    } else {
        print_success(&format!("{timestamp}: {summary}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_lib::PredictionProvenance;

    #[test]
    fn test_format_normal_response() {
        let response = PredictResponse {
            prediction: Some(11.5234),
            anomaly: false,
            reason: String::new(),
            prediction_source: PredictionProvenance::MovingAvg,
        };
        assert_eq!(format_response(&response), "prediction 11.52 kWh (moving_avg)");
    }

    #[test]
    fn test_format_anomaly_without_prediction() {
        let response = PredictResponse {
            prediction: None,
            anomaly: true,
            reason: "isolation_forest".to_string(),
            prediction_source: PredictionProvenance::None,
        };
        assert_eq!(
            format_response(&response),
            "prediction none, ANOMALY (isolation_forest)"
        );
    }
}
