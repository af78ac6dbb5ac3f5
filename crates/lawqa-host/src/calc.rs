//! Value helpers offered to synthesized code next to the registry lookups:
//! amount parsing, sums, ranking and unit conversion.

use serde_json::Value;

/// Units accepted by [`convert_amount_unit`], with their value in yuan.
const AMOUNT_UNITS: [(&str, f64); 3] = [("亿元", 1e8), ("万元", 1e4), ("元", 1.0)];

/// `2.3亿` → 230000000, `3520.5万` → 35205000. Thousands separators are
/// ignored; empty and `-` read as zero.
pub fn convert_to_float(amount: &str) -> Result<f64, String> {
    let amount = amount.trim().replace(',', "");
    if amount.is_empty() || amount == "-" {
        return Ok(0.0);
    }
    let (digits, exponent) = if let Some(d) = amount.strip_suffix('亿') {
        (d, 8)
    } else if let Some(d) = amount.strip_suffix('万') {
        (d, 4)
    } else {
        (amount.as_str(), 0)
    };
    scaled(digits, exponent).ok_or_else(|| format!("无法解析金额 {amount}"))
}

/// `digits × 10^exponent`, rounded once so `2.3亿` lands on 230000000.
fn scaled(digits: &str, exponent: i32) -> Option<f64> {
    let digits = digits.trim();
    if digits.is_empty() || digits.contains(['e', 'E']) {
        return None;
    }
    format!("{digits}e{exponent}").parse().ok()
}

/// A number followed by any run of 千/万/亿 multipliers: `5千万` → 5e7.
fn scaled_amount(text: &str) -> Option<f64> {
    let text = text.trim().replace(',', "");
    let split = text
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-'))
        .map_or(text.len(), |(i, _)| i);
    let (digits, units) = text.split_at(split);
    let mut exponent = 0;
    for unit in units.chars() {
        exponent += match unit {
            '千' => 3,
            '万' => 4,
            '亿' => 8,
            _ => return None,
        };
    }
    scaled(digits, exponent)
}

/// Sum of numbers, or of amount strings with 千/万/亿 multipliers.
pub fn sum_amounts(numbers: &[f64], amounts: &[String]) -> Result<f64, String> {
    let mut total: f64 = numbers.iter().sum();
    for a in amounts {
        total += scaled_amount(a).ok_or_else(|| format!("nums 无法解析 {a}"))?;
    }
    Ok(total)
}

/// `keys` ordered by `values`; ties keep their input order. Extra keys or
/// values beyond the shorter list are dropped.
pub fn rank(keys: &[String], values: &[f64], descending: bool) -> Vec<String> {
    let mut pairs: Vec<(&String, f64)> = keys.iter().zip(values.iter().copied()).collect();
    if descending {
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
    } else {
        pairs.sort_by(|a, b| a.1.total_cmp(&b.1));
    }
    pairs.into_iter().map(|(k, _)| k.clone()).collect()
}

/// Convert between 亿元, 万元 and 元. With `decimals` the result is text
/// rounded to that many places.
pub fn convert_amount_unit(amount: f64, from: &str, to: &str, decimals: Option<usize>) -> Result<Value, String> {
    let scale = |unit: &str| {
        AMOUNT_UNITS
            .iter()
            .find(|(u, _)| *u == unit)
            .map(|(_, s)| *s)
            .ok_or_else(|| format!("{unit} 不是有效单位，请使用 亿元、万元 或 元"))
    };
    let result = amount * scale(from)? / scale(to)?;
    Ok(match decimals {
        Some(places) => Value::String(format!("{result:.places$}")),
        None => number(result),
    })
}

/// Whole numbers as integers, everything else as floats.
pub fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}
