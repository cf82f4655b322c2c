use serde_json::{json, Value};

use super::number_value;
use crate::descriptor::{FunctionDescriptor, ParamKind, ParamSpec};
use crate::error::FunctionError;

const DOMAIN: &str = "arithmetic";

pub fn functions() -> Vec<FunctionDescriptor> {
    vec![
        binary("add", "Add two numbers", |a, b| number_value(a + b)),
        binary("subtract", "Subtract b from a", |a, b| number_value(a - b)),
        binary("multiply", "Multiply two numbers", |a, b| number_value(a * b)),
        binary("divide", "Divide a by b", |a, b| {
            if b == 0.0 {
                return Err(FunctionError::execution("division by zero"));
            }
            number_value(a / b)
        }),
        FunctionDescriptor::builder("power", DOMAIN)
            .category("powers_roots")
            .description("Raise base to exponent")
            .param("base", ParamKind::Number)
            .param("exponent", ParamKind::Number)
            .handler(|args, _| number_value(args.number("base")?.powf(args.number("exponent")?)))
            .build(),
        FunctionDescriptor::builder("sqrt", DOMAIN)
            .category("powers_roots")
            .description("Square root of a non-negative number")
            .param("x", ParamKind::Number)
            .handler(|args, _| {
                let x = args.number("x")?;
                if x < 0.0 {
                    return Err(FunctionError::invalid_argument(
                        "x",
                        "square root of a negative number",
                    ));
                }
                number_value(x.sqrt())
            })
            .build(),
        FunctionDescriptor::builder("abs_value", DOMAIN)
            .category("basic_operations")
            .description("Absolute value")
            .param("x", ParamKind::Number)
            .handler(|args, _| number_value(args.number("x")?.abs()))
            .build(),
        FunctionDescriptor::builder("round_number", DOMAIN)
            .category("rounding")
            .description("Round to a number of decimal places")
            .param("x", ParamKind::Number)
            .arg(
                ParamSpec::required("decimals", ParamKind::Integer)
                    .with_default(json!(0))
                    .describe("Decimal places to keep (0-15)"),
            )
            .handler(|args, _| {
                let decimals = args.integer("decimals")?;
                if !(0..=15).contains(&decimals) {
                    return Err(FunctionError::invalid_argument("decimals", "must be between 0 and 15"));
                }
                let factor = 10f64.powi(decimals as i32);
                number_value((args.number("x")? * factor).round() / factor)
            })
            .build(),
    ]
}

fn binary<F>(name: &str, description: &str, op: F) -> FunctionDescriptor
where
    F: Fn(f64, f64) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
    FunctionDescriptor::builder(name, DOMAIN)
        .category("basic_operations")
        .description(description)
        .param("a", ParamKind::Number)
        .param("b", ParamKind::Number)
        .handler(move |args, _| op(args.number("a")?, args.number("b")?))
        .build()
}
