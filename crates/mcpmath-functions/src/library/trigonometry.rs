use serde_json::json;

use super::number_value;
use crate::descriptor::{Arguments, FunctionDescriptor, ParamKind, ParamSpec};
use crate::error::FunctionError;

const DOMAIN: &str = "trigonometry";

pub fn functions() -> Vec<FunctionDescriptor> {
    vec![
        unary("sin", "Sine of an angle", f64::sin),
        unary("cos", "Cosine of an angle", f64::cos),
        FunctionDescriptor::builder("tan", DOMAIN)
            .category("basic_functions")
            .description("Tangent of an angle")
            .param("angle", ParamKind::Number)
            .arg(unit_param())
            .handler(|args, _| {
                let radians = angle_in_radians(args)?;
                if radians.cos().abs() < 1e-12 {
                    return Err(FunctionError::execution("tangent is undefined at this angle"));
                }
                number_value(radians.tan())
            })
            .build(),
        FunctionDescriptor::builder("degrees_to_radians", DOMAIN)
            .category("conversion")
            .description("Convert degrees to radians")
            .param("degrees", ParamKind::Number)
            .handler(|args, _| number_value(args.number("degrees")?.to_radians()))
            .build(),
        FunctionDescriptor::builder("radians_to_degrees", DOMAIN)
            .category("conversion")
            .description("Convert radians to degrees")
            .param("radians", ParamKind::Number)
            .handler(|args, _| number_value(args.number("radians")?.to_degrees()))
            .build(),
    ]
}

fn unit_param() -> ParamSpec {
    ParamSpec::required("unit", ParamKind::String)
        .with_default(json!("radians"))
        .describe("Angle unit: 'radians' or 'degrees'")
}

fn angle_in_radians(args: &Arguments) -> Result<f64, FunctionError> {
    let angle = args.number("angle")?;
    match args.string("unit")? {
        "radians" | "rad" => Ok(angle),
        "degrees" | "deg" => Ok(angle.to_radians()),
        other => Err(FunctionError::invalid_argument(
            "unit",
            format!("expected 'radians' or 'degrees', got '{}'", other),
        )),
    }
}

fn unary(name: &str, description: &str, op: fn(f64) -> f64) -> FunctionDescriptor {
    FunctionDescriptor::builder(name, DOMAIN)
        .category("basic_functions")
        .description(description)
        .param("angle", ParamKind::Number)
        .arg(unit_param())
        .handler(move |args, _| {
            // Snap values within rounding noise of zero so sin(pi) reads 0
            let value = op(angle_in_radians(args)?);
            number_value(if value.abs() < 1e-15 { 0.0 } else { value })
        })
        .build()
}
