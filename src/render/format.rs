use serde::{Deserialize, Serialize};

/// How prices are printed on posters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceFormat {
    pub symbol: String,
    pub thousands_separator: String,
    pub decimal_separator: String,
    pub decimals: u8,
}

impl Default for PriceFormat {
    fn default() -> Self {
        Self {
            symbol: "$".to_string(),
            thousands_separator: ".".to_string(),
            decimal_separator: ",".to_string(),
            decimals: 2,
        }
    }
}

impl PriceFormat {
    /// Formats `value` as e.g. `$ 12.345,60`.
    pub fn format(&self, value: f64) -> String {
        let amount = self.format_amount(value);
        if self.symbol.is_empty() {
            amount
        } else {
            format!("{} {}", self.symbol, amount)
        }
    }

    /// Number only, without the currency symbol.
    pub fn format_amount(&self, value: f64) -> String {
        let negative = value < 0.0;
        let factor = 10f64.powi(self.decimals as i32);
        let scaled = (value.abs() * factor).round() as u64;
        let factor = factor as u64;
        let integer = (scaled / factor).to_string();
        let fraction = scaled % factor;

        let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
        for (i, digit) in integer.chars().enumerate() {
            if i > 0 && (integer.len() - i) % 3 == 0 {
                grouped.push_str(&self.thousands_separator);
            }
            grouped.push(digit);
        }

        let mut out = String::new();
        if negative && scaled > 0 {
            out.push('-');
        }
        out.push_str(&grouped);
        if self.decimals > 0 {
            out.push_str(&self.decimal_separator);
            out.push_str(&format!("{:0width$}", fraction, width = self.decimals as usize));
        }
        out
    }
}
