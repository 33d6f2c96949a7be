// src/tools/calculator.rs
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::envelope::{Confidence, EnvelopeMetadata, ResultEnvelope};
use crate::error::ToolError;
use crate::models::{to_payload, Calculation};
use crate::providers::as_number;
use crate::query::OperationKind;
use crate::tool::{Tool, ToolContext};

const OPERATIONS: [&str; 5] = ["pe_ratio", "percent_change", "cagr", "dividend_yield", "market_cap"];

/// Derived metrics computed from caller-supplied inputs; no provider I/O.
pub struct CalculateMetricTool;

/// Input names and result unit for one operation.
fn formula(operation: &str) -> Option<(&'static [&'static str], &'static str)> {
    let shape: (&'static [&'static str], &'static str) = match operation {
        "pe_ratio" => (&["price", "eps"], "ratio"),
        "percent_change" => (&["previous", "current"], "percent"),
        "cagr" => (&["start_value", "end_value", "years"], "percent"),
        "dividend_yield" => (&["annual_dividend", "price"], "percent"),
        "market_cap" => (&["price", "shares_outstanding"], "currency"),
        _ => return None,
    };
    Some(shape)
}

fn non_zero(inputs: &BTreeMap<String, f64>, name: &str) -> Result<f64, ToolError> {
    let value = inputs[name];
    if value == 0.0 {
        return Err(ToolError::invalid(name, "must not be zero"));
    }
    Ok(value)
}

fn positive(inputs: &BTreeMap<String, f64>, name: &str) -> Result<f64, ToolError> {
    let value = inputs[name];
    if value <= 0.0 {
        return Err(ToolError::invalid(name, "must be greater than zero"));
    }
    Ok(value)
}

pub fn calculate(operation: &str, values: &Value) -> Result<Calculation, ToolError> {
    let (names, unit) = formula(operation).ok_or_else(|| {
        ToolError::invalid(
            "operation",
            format!("'{}' is not one of {}", operation, OPERATIONS.join(", ")),
        )
    })?;

    let mut inputs = BTreeMap::new();
    for name in names {
        let value = values
            .get(*name)
            .ok_or_else(|| ToolError::MissingParameter(format!("values.{}", name)))?;
        let number = as_number(value)
            .ok_or_else(|| ToolError::invalid(format!("values.{}", name), "must be a number"))?;
        inputs.insert(name.to_string(), number);
    }

    let result = match operation {
        "pe_ratio" => inputs["price"] / non_zero(&inputs, "eps")?,
        "percent_change" => (inputs["current"] - inputs["previous"]) / non_zero(&inputs, "previous")?.abs() * 100.0,
        "cagr" => {
            let start = positive(&inputs, "start_value")?;
            let end = positive(&inputs, "end_value")?;
            let years = positive(&inputs, "years")?;
            ((end / start).powf(1.0 / years) - 1.0) * 100.0
        }
        "dividend_yield" => inputs["annual_dividend"] / positive(&inputs, "price")? * 100.0,
        _ => inputs["price"] * inputs["shares_outstanding"],
    };
    if !result.is_finite() {
        return Err(ToolError::invalid("values", "inputs produce a non-finite result"));
    }

    Ok(Calculation {
        operation: operation.to_string(),
        result,
        unit: unit.to_string(),
        inputs,
    })
}

#[async_trait]
impl Tool for CalculateMetricTool {
    fn name(&self) -> &str {
        "calculate_metric"
    }

    fn display_name(&self) -> &str {
        "Financial Calculator"
    }

    fn description(&self) -> &str {
        "Compute P/E, percent change, CAGR, dividend yield or market cap from supplied values"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": OPERATIONS
                },
                "values": {
                    "type": "object",
                    "description": "pe_ratio: price, eps; percent_change: previous, current; cagr: start_value, end_value, years; dividend_yield: annual_dividend, price; market_cap: price, shares_outstanding"
                }
            },
            "required": ["operation", "values"]
        })
    }

    fn kind(&self) -> OperationKind {
        OperationKind::Calculation
    }

    fn required_fields(&self) -> &[&'static str] {
        &["operation", "values"]
    }

    async fn run(&self, params: &Value, _ctx: &ToolContext) -> Result<ResultEnvelope, ToolError> {
        let operation = params
            .get("operation")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_lowercase())
            .ok_or_else(|| ToolError::invalid("operation", "must be a string"))?;
        let values = params
            .get("values")
            .filter(|v| v.is_object())
            .ok_or_else(|| ToolError::invalid("values", "must be an object"))?;

        let calculation = calculate(&operation, values)?;
        let metadata = EnvelopeMetadata::new("calculation", self.kind().data_type()).with_confidence(Confidence::High);
        Ok(ResultEnvelope::reliable(self.display_name(), to_payload(&calculation)?, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pe_ratio_divides_price_by_eps() {
        let calc = calculate("pe_ratio", &json!({"price": 150.0, "eps": "6"})).unwrap();
        assert_eq!(calc.result, 25.0);
        assert_eq!(calc.unit, "ratio");
    }

    #[test]
    fn cagr_over_two_years() {
        let calc = calculate("cagr", &json!({"start_value": 100, "end_value": 121, "years": 2})).unwrap();
        assert!((calc.result - 10.0).abs() < 1e-9);
    }

    #[test]
    fn percent_change_handles_declines() {
        let calc = calculate("percent_change", &json!({"previous": 200, "current": 150})).unwrap();
        assert_eq!(calc.result, -25.0);
    }

    #[test]
    fn zero_divisors_and_unknown_operations_are_validation_errors() {
        let err = calculate("pe_ratio", &json!({"price": 10, "eps": 0})).unwrap_err();
        assert_eq!(err.kind().as_str(), "validation");
        let err = calculate("ev_to_ebitda", &json!({})).unwrap_err();
        assert_eq!(err.kind().as_str(), "validation");
        let err = calculate("market_cap", &json!({"price": 10})).unwrap_err();
        assert_eq!(err, ToolError::MissingParameter("values.shares_outstanding".into()));
    }
}
