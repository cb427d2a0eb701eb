//! Static per-model token prices used for the cost breakdown.

/// USD per 1 000 tokens: (model prefix, input price, output price).
const PRICES: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.000_15, 0.000_6),
    ("gpt-4o", 0.002_5, 0.01),
    ("gpt-4-turbo", 0.01, 0.03),
    ("gpt-3.5-turbo", 0.000_5, 0.001_5),
    ("gemini-1.5-pro", 0.001_25, 0.005),
    ("gemini-1.5-flash", 0.000_075, 0.000_3),
    ("gemini-2.0-flash", 0.000_1, 0.000_4),
    ("sonar-pro", 0.003, 0.015),
    ("sonar", 0.001, 0.001),
    ("text-embedding-3-small", 0.000_02, 0.0),
    ("text-embedding-3-large", 0.000_13, 0.0),
];

/// Looks up the price pair for a model, matching the longest known prefix.
pub fn price_for(model: &str) -> Option<(f64, f64)> {
    let model = model.trim().to_ascii_lowercase();
    PRICES
        .iter()
        .filter(|(prefix, _, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _, _)| prefix.len())
        .map(|(_, input, output)| (*input, *output))
}

/// Cost in USD of a call. Unknown models are free.
pub fn cost_for(model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
    match price_for(model) {
        Some((input, output)) => {
            input_tokens as f64 / 1000.0 * input + output_tokens as f64 / 1000.0 * output
        }
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        assert_eq!(price_for("gpt-4o-mini-2024-07-18"), Some((0.000_15, 0.000_6)));
        assert_eq!(price_for("gpt-4o-2024-08-06"), Some((0.002_5, 0.01)));
        assert_eq!(price_for("sonar-pro"), Some((0.003, 0.015)));
    }

    #[test]
    fn cost_arithmetic() {
        let cost = cost_for("gpt-4o", 2000, 1000);
        assert!((cost - 0.015).abs() < 1e-12);
        assert_eq!(cost_for("mystery-model", 10_000, 10_000), 0.0);
    }
}
