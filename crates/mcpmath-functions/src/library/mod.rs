//! Built-in function domains.
//!
//! | Domain          | Categories                                  |
//! |-----------------|---------------------------------------------|
//! | `arithmetic`    | `basic_operations`, `powers_roots`, `rounding` |
//! | `number_theory` | `primes`, `divisibility`, `sequences`       |
//! | `trigonometry`  | `basic_functions`, `conversion`             |

use serde_json::Value;

use crate::descriptor::FunctionDescriptor;
use crate::error::FunctionError;

pub mod arithmetic;
pub mod number_theory;
pub mod trigonometry;

/// Every built-in function, domain by domain.
pub fn all() -> Vec<FunctionDescriptor> {
    let mut functions = arithmetic::functions();
    functions.extend(number_theory::functions());
    functions.extend(trigonometry::functions());
    functions
}

/// Encodes a float result; integral values within the exactly representable
/// range come back as JSON integers.
pub(crate) fn number_value(value: f64) -> Result<Value, FunctionError> {
    if !value.is_finite() {
        return Err(FunctionError::execution(format!(
            "result is not a finite number ({})",
            value
        )));
    }
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        return Ok(Value::from(value as i64));
    }
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| FunctionError::execution("result is not representable"))
}
