use serde_json::{json, Value};

use crate::context::InvocationContext;
use crate::descriptor::{FunctionDescriptor, ParamKind};
use crate::error::FunctionError;

const DOMAIN: &str = "number_theory";

/// Largest limit `count_primes` will sieve.
pub const MAX_SIEVE_LIMIT: i64 = 50_000_000;

/// Trial-division steps between cancellation checks.
const CHECK_EVERY: u64 = 1 << 16;

pub fn functions() -> Vec<FunctionDescriptor> {
    vec![
        FunctionDescriptor::builder("is_prime", DOMAIN)
            .category("primes")
            .description("Check whether n is prime")
            .param("n", ParamKind::Integer)
            .handler(|args, ctx| Ok(json!(is_prime(args.integer("n")?, ctx)?)))
            .build(),
        FunctionDescriptor::builder("next_prime", DOMAIN)
            .category("primes")
            .description("Smallest prime greater than n")
            .param("n", ParamKind::Integer)
            .handler(|args, ctx| {
                let mut candidate = args.integer("n")?.max(1);
                loop {
                    candidate = candidate
                        .checked_add(1)
                        .ok_or_else(|| FunctionError::execution("no prime below i64::MAX found"))?;
                    if is_prime(candidate, ctx)? {
                        return Ok(json!(candidate));
                    }
                }
            })
            .build(),
        FunctionDescriptor::builder("prime_factors", DOMAIN)
            .category("primes")
            .description("Prime factorisation of n (with multiplicity)")
            .param("n", ParamKind::Integer)
            .expensive()
            .handler(|args, ctx| {
                let n = args.integer("n")?;
                if n < 2 {
                    return Err(FunctionError::invalid_argument("n", "must be at least 2"));
                }
                Ok(json!(prime_factors(n as u64, ctx)?))
            })
            .build(),
        FunctionDescriptor::builder("count_primes", DOMAIN)
            .category("primes")
            .description("Number of primes less than or equal to limit")
            .param("limit", ParamKind::Integer)
            .expensive()
            .reports_progress()
            .handler(|args, ctx| {
                let limit = args.integer("limit")?;
                if !(0..=MAX_SIEVE_LIMIT).contains(&limit) {
                    return Err(FunctionError::invalid_argument(
                        "limit",
                        format!("must be between 0 and {}", MAX_SIEVE_LIMIT),
                    ));
                }
                Ok(json!(count_primes(limit as usize, ctx)?))
            })
            .build(),
        binary("gcd", "divisibility", "Greatest common divisor", |a, b| {
            Ok(json!(gcd(a.unsigned_abs(), b.unsigned_abs())))
        }),
        binary("lcm", "divisibility", "Least common multiple", |a, b| {
            let (a, b) = (a.unsigned_abs(), b.unsigned_abs());
            if a == 0 || b == 0 {
                return Ok(json!(0));
            }
            (a / gcd(a, b))
                .checked_mul(b)
                .map(|v| json!(v))
                .ok_or_else(|| FunctionError::execution("lcm overflows 64 bits"))
        }),
        FunctionDescriptor::builder("fibonacci", DOMAIN)
            .category("sequences")
            .description("n-th Fibonacci number (F(0) = 0)")
            .param("n", ParamKind::Integer)
            .handler(|args, _| {
                let n = args.integer("n")?;
                if !(0..=92).contains(&n) {
                    return Err(FunctionError::invalid_argument("n", "must be between 0 and 92"));
                }
                let (mut a, mut b) = (0u64, 1u64);
                for _ in 0..n {
                    let next = a + b;
                    a = b;
                    b = next;
                }
                Ok(json!(a))
            })
            .build(),
        FunctionDescriptor::builder("factorial", DOMAIN)
            .category("sequences")
            .description("n! for 0 <= n <= 20")
            .param("n", ParamKind::Integer)
            .handler(|args, _| {
                let n = args.integer("n")?;
                if !(0..=20).contains(&n) {
                    return Err(FunctionError::invalid_argument("n", "must be between 0 and 20"));
                }
                Ok(json!((1..=n).product::<i64>()))
            })
            .build(),
    ]
}

fn binary<F>(name: &str, category: &str, description: &str, op: F) -> FunctionDescriptor
where
    F: Fn(i64, i64) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
    FunctionDescriptor::builder(name, DOMAIN)
        .category(category)
        .description(description)
        .param("a", ParamKind::Integer)
        .param("b", ParamKind::Integer)
        .handler(move |args, _| op(args.integer("a")?, args.integer("b")?))
        .build()
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Trial division by 6k +/- 1.
pub fn is_prime(n: i64, ctx: &InvocationContext) -> Result<bool, FunctionError> {
    if n < 2 {
        return Ok(false);
    }
    let n = n as u64;
    if n < 4 {
        return Ok(true);
    }
    if n % 2 == 0 || n % 3 == 0 {
        return Ok(false);
    }
    let mut i: u64 = 5;
    let mut steps: u64 = 0;
    while i.saturating_mul(i) <= n {
        if n % i == 0 || n % (i + 2) == 0 {
            return Ok(false);
        }
        i += 6;
        steps += 1;
        if steps % CHECK_EVERY == 0 {
            ctx.checkpoint()?;
        }
    }
    Ok(true)
}

fn prime_factors(mut n: u64, ctx: &InvocationContext) -> Result<Vec<u64>, FunctionError> {
    let mut factors = Vec::new();
    let mut divisor: u64 = 2;
    let mut steps: u64 = 0;
    while divisor.saturating_mul(divisor) <= n {
        while n % divisor == 0 {
            factors.push(divisor);
            n /= divisor;
        }
        divisor += if divisor == 2 { 1 } else { 2 };
        steps += 1;
        if steps % CHECK_EVERY == 0 {
            ctx.checkpoint()?;
        }
    }
    if n > 1 {
        factors.push(n);
    }
    Ok(factors)
}

/// Sieve of Eratosthenes, reporting progress as the sieving prime advances.
fn count_primes(limit: usize, ctx: &InvocationContext) -> Result<usize, FunctionError> {
    if limit < 2 {
        return Ok(0);
    }
    let mut composite = vec![false; limit + 1];
    let root = (limit as f64).sqrt() as usize;
    let report = ctx.wants_progress();
    let mut p = 2;
    while p * p <= limit {
        if !composite[p] {
            let mut multiple = p * p;
            while multiple <= limit {
                composite[multiple] = true;
                multiple += p;
            }
            ctx.checkpoint()?;
            if report {
                ctx.report_progress(p as f64, Some(root as f64), Some(format!("sieved by {}", p)));
            }
        }
        p += 1;
    }
    Ok(composite[2..].iter().filter(|c| !**c).count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Catalog;
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc;

    fn call(name: &str, args: Value) -> Result<Value, FunctionError> {
        let catalog = Catalog::from_descriptors(functions()).unwrap();
        let f = catalog.get(name).unwrap();
        let bound = f.bind(args.as_object().unwrap()).unwrap();
        f.invoke(&bound, &InvocationContext::new())
    }

    #[test]
    fn test_is_prime() {
        assert_eq!(call("is_prime", json!({"n": 97})).unwrap(), json!(true));
        assert_eq!(call("is_prime", json!({"n": 98})).unwrap(), json!(false));
        assert_eq!(call("is_prime", json!({"n": 1})).unwrap(), json!(false));
        assert_eq!(call("is_prime", json!({"n": 2})).unwrap(), json!(true));
        assert_eq!(call("is_prime", json!({"n": -7})).unwrap(), json!(false));
        assert_eq!(call("is_prime", json!({"n": 1_000_000_007})).unwrap(), json!(true));
    }

    #[test]
    fn test_next_prime() {
        assert_eq!(call("next_prime", json!({"n": 13})).unwrap(), json!(17));
        assert_eq!(call("next_prime", json!({"n": -5})).unwrap(), json!(2));
    }

    #[test]
    fn test_prime_factors() {
        assert_eq!(call("prime_factors", json!({"n": 360})).unwrap(), json!([2, 2, 2, 3, 3, 5]));
        assert_eq!(call("prime_factors", json!({"n": 97})).unwrap(), json!([97]));
        assert!(call("prime_factors", json!({"n": 1})).is_err());
    }

    #[test]
    fn test_gcd_lcm() {
        assert_eq!(call("gcd", json!({"a": 12, "b": 18})).unwrap(), json!(6));
        assert_eq!(call("gcd", json!({"a": -12, "b": 0})).unwrap(), json!(12));
        assert_eq!(call("lcm", json!({"a": 4, "b": 6})).unwrap(), json!(12));
        assert_eq!(call("lcm", json!({"a": 0, "b": 6})).unwrap(), json!(0));
    }

    #[test]
    fn test_sequences() {
        assert_eq!(call("fibonacci", json!({"n": 10})).unwrap(), json!(55));
        assert_eq!(call("fibonacci", json!({"n": 92})).unwrap(), json!(7540113804746346429i64));
        assert!(call("fibonacci", json!({"n": 93})).is_err());
        assert_eq!(call("factorial", json!({"n": 5})).unwrap(), json!(120));
        assert_eq!(call("factorial", json!({"n": 0})).unwrap(), json!(1));
    }

    #[test]
    fn test_count_primes() {
        assert_eq!(call("count_primes", json!({"limit": 100})).unwrap(), json!(25));
        assert_eq!(call("count_primes", json!({"limit": 1})).unwrap(), json!(0));
        assert!(call("count_primes", json!({"limit": MAX_SIEVE_LIMIT + 1})).is_err());
    }

    #[test]
    fn test_count_primes_reports_progress() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = InvocationContext::new().with_progress(tx);
        assert_eq!(count_primes(100, &ctx).unwrap(), 25);

        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update.progress);
        }
        // One update per sieving prime up to sqrt(100)
        assert_eq!(updates, vec![2.0, 3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_expired_deadline_stops_sieve() {
        let ctx = InvocationContext::new().with_deadline(Instant::now() - Duration::from_secs(1));
        assert_eq!(count_primes(1_000, &ctx), Err(FunctionError::Cancelled));
    }
}
