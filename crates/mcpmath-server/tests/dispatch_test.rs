//! Dispatch Integration Tests
//!
//! Exercises the dispatcher against synthetic catalogs (sleeping,
//! cooperative and progress-reporting functions) and the standard library.

use mcpmath_common::{CallErrorKind, CallRequest};
use mcpmath_functions::{Catalog, FunctionDescriptor, ParamKind, ParamSpec, ProgressUpdate};
use mcpmath_server::{
    CacheKey, CacheStrategy, CatalogFilter, ConcurrencyLimiter, Dispatcher, ExecutionLimits,
    ExposedCatalog, ResultCache, ServerConfig,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Fixtures
// ============================================================================

/// Sleeps in small steps, checking for cancellation between them.
fn cooperative_sleep() -> FunctionDescriptor {
    FunctionDescriptor::builder("slow", "test")
        .arg(ParamSpec::optional("ms", ParamKind::Integer).with_default(json!(1000)))
        .handler(|args, ctx| {
            let total = args.integer("ms")?;
            let mut slept = 0;
            while slept < total {
                ctx.checkpoint()?;
                std::thread::sleep(Duration::from_millis(5));
                slept += 5;
            }
            Ok(json!(slept))
        })
        .build()
}

/// Sleeps without ever looking at its context.
fn stubborn_sleep() -> FunctionDescriptor {
    FunctionDescriptor::builder("stubborn", "test")
        .handler(|_, _| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(json!("done"))
        })
        .build()
}

fn ordered_pair() -> FunctionDescriptor {
    FunctionDescriptor::builder("pair", "test")
        .param("first", ParamKind::Integer)
        .param("second", ParamKind::Integer)
        .handler(|args, _| Ok(json!([args.integer("first")?, args.integer("second")?])))
        .build()
}

fn counting() -> FunctionDescriptor {
    FunctionDescriptor::builder("counting", "test")
        .reports_progress()
        .handler(|_, ctx| {
            for step in 1..=3 {
                ctx.report_progress(step as f64, Some(3.0), None);
            }
            Ok(json!(3))
        })
        .build()
}

fn test_catalog() -> ExposedCatalog {
    let catalog = Catalog::from_descriptors([
        cooperative_sleep(),
        stubborn_sleep(),
        ordered_pair(),
        counting(),
    ])
    .unwrap();
    ExposedCatalog::unfiltered(&catalog)
}

fn dispatcher(max_concurrent: usize, timeout: Duration, strategy: CacheStrategy) -> Dispatcher {
    Dispatcher::new(
        ConcurrencyLimiter::new(max_concurrent),
        Arc::new(ResultCache::new(strategy, 16, 4)),
        ExecutionLimits::new().with_computation_timeout(timeout),
    )
}

// ============================================================================
// Timeouts and concurrency
// ============================================================================

#[tokio::test]
async fn test_timeout_releases_slot_immediately() {
    let dispatcher = dispatcher(1, Duration::from_millis(10), CacheStrategy::Off);
    let catalog = test_catalog();

    let result = dispatcher.dispatch(CallRequest::new("slow"), &catalog, None).await;
    assert_eq!(result.kind(), Some(CallErrorKind::Timeout));
    assert_eq!(dispatcher.limiter().in_flight(), 0);
}

#[tokio::test]
async fn test_timeout_with_uncooperative_function() {
    let dispatcher = dispatcher(1, Duration::from_millis(20), CacheStrategy::Off);
    let catalog = test_catalog();

    let result = dispatcher.dispatch(CallRequest::new("stubborn"), &catalog, None).await;
    assert_eq!(result.kind(), Some(CallErrorKind::Timeout));
    // The thread may still be sleeping, the slot is already back
    assert_eq!(dispatcher.limiter().available(), 1);
}

#[tokio::test]
async fn test_requested_timeout_is_clamped() {
    let dispatcher = dispatcher(1, Duration::from_millis(30), CacheStrategy::Off);
    let catalog = test_catalog();

    let request = CallRequest::new("slow").with_timeout(Duration::from_secs(60));
    let result = dispatcher.dispatch(request, &catalog, None).await;
    assert_eq!(result.kind(), Some(CallErrorKind::Timeout));

    let short = CallRequest::new("slow")
        .with_argument("ms", json!(5))
        .with_timeout(Duration::from_millis(25));
    assert!(dispatcher.dispatch(short, &catalog, None).await.is_success());
}

#[tokio::test]
async fn test_one_waiter_over_the_ceiling() {
    let max = 2;
    let dispatcher = Arc::new(dispatcher(max, Duration::from_secs(5), CacheStrategy::Off));
    let catalog = Arc::new(test_catalog());

    let mut handles = Vec::new();
    for i in 0..=max {
        let dispatcher = dispatcher.clone();
        let catalog = catalog.clone();
        handles.push(tokio::spawn(async move {
            let request = CallRequest::new("slow")
                .with_id(json!(i))
                .with_argument("ms", json!(150));
            dispatcher.dispatch(request, &catalog, None).await
        }));
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(dispatcher.limiter().in_flight(), max);

    for handle in handles {
        assert!(handle.await.unwrap().is_success());
    }
    assert_eq!(dispatcher.limiter().in_flight(), 0);
}

#[tokio::test]
async fn test_waiter_times_out_without_starting() {
    let dispatcher = Arc::new(dispatcher(1, Duration::from_secs(2), CacheStrategy::Off));
    let catalog = Arc::new(test_catalog());

    let busy = {
        let dispatcher = dispatcher.clone();
        let catalog = catalog.clone();
        tokio::spawn(async move {
            let request = CallRequest::new("slow").with_argument("ms", json!(150));
            dispatcher.dispatch(request, &catalog, None).await
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(dispatcher.limiter().in_flight(), 1);

    let waiter = CallRequest::new("slow")
        .with_argument("ms", json!(50))
        .with_timeout(Duration::from_millis(20));
    let result = dispatcher.dispatch(waiter, &catalog, None).await;
    assert_eq!(result.kind(), Some(CallErrorKind::Timeout));

    assert!(busy.await.unwrap().is_success());
}

#[tokio::test]
async fn test_unknown_function_leaves_slots_alone() {
    let dispatcher = dispatcher(3, Duration::from_secs(1), CacheStrategy::Smart);
    let before = dispatcher.limiter().available();

    let result = dispatcher
        .dispatch(CallRequest::new("missing").with_id(json!("x")), &test_catalog(), None)
        .await;
    assert_eq!(result.kind(), Some(CallErrorKind::UnknownFunction));
    assert_eq!(result.id(), &json!("x"));
    assert_eq!(dispatcher.limiter().available(), before);
    assert_eq!(dispatcher.cache().stats().misses, 0);
}

// ============================================================================
// Cache
// ============================================================================

#[tokio::test]
async fn test_argument_order_does_not_matter_for_cache() {
    let dispatcher = dispatcher(2, Duration::from_secs(1), CacheStrategy::Smart);
    let catalog = test_catalog();

    let first: serde_json::Map<_, _> = serde_json::from_str(r#"{"first": 1, "second": 2}"#).unwrap();
    let reversed: serde_json::Map<_, _> = serde_json::from_str(r#"{"second": 2, "first": 1}"#).unwrap();

    let miss = dispatcher
        .dispatch(CallRequest::new("pair").with_arguments(first), &catalog, None)
        .await;
    assert!(!miss.cache_hit());

    let hit = dispatcher
        .dispatch(CallRequest::new("pair").with_arguments(reversed), &catalog, None)
        .await;
    assert!(hit.cache_hit());
    assert_eq!(hit.value(), Some(&json!([1, 2])));
}

#[tokio::test]
async fn test_off_never_hits() {
    let dispatcher = dispatcher(2, Duration::from_secs(1), CacheStrategy::Off);
    let catalog = test_catalog();

    for _ in 0..3 {
        let request = CallRequest::new("pair")
            .with_argument("first", json!(1))
            .with_argument("second", json!(2));
        assert!(!dispatcher.dispatch(request, &catalog, None).await.cache_hit());
    }
}

#[tokio::test]
async fn test_fixed_cache_of_one_with_is_prime() {
    let mut config = ServerConfig::default();
    config.function_whitelist = vec!["is_prime".into()];
    config.cache_strategy = CacheStrategy::Fixed;
    config.cache_size = 1;

    let catalog = CatalogFilter::from_config(&config).apply(&Catalog::standard().unwrap());
    let dispatcher = Dispatcher::from_config(&config);
    let call = |n: i64| CallRequest::new("is_prime").with_argument("n", json!(n));

    let first = dispatcher.dispatch(call(97), &catalog, None).await;
    assert_eq!(first.value(), Some(&json!(true)));
    assert!(!first.cache_hit());

    let second = dispatcher.dispatch(call(97), &catalog, None).await;
    assert!(second.cache_hit());

    let third = dispatcher.dispatch(call(98), &catalog, None).await;
    assert_eq!(third.value(), Some(&json!(false)));

    let cache = dispatcher.cache();
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&CacheKey::new("is_prime", r#"[["n",98]]"#)));
    assert!(!cache.contains(&CacheKey::new("is_prime", r#"[["n",97]]"#)));
}

#[tokio::test]
async fn test_timeouts_are_not_cached() {
    let dispatcher = dispatcher(1, Duration::from_millis(10), CacheStrategy::Fixed);
    let catalog = test_catalog();

    dispatcher.dispatch(CallRequest::new("slow"), &catalog, None).await;
    assert!(dispatcher.cache().is_empty());
}

// ============================================================================
// Progress
// ============================================================================

#[tokio::test]
async fn test_progress_is_forwarded() {
    let dispatcher = dispatcher(1, Duration::from_secs(1), CacheStrategy::Off);
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressUpdate>();

    let result = dispatcher
        .dispatch(CallRequest::new("counting"), &test_catalog(), Some(tx))
        .await;
    assert!(result.is_success());

    let mut seen = Vec::new();
    while let Ok(update) = rx.try_recv() {
        seen.push(update.progress);
    }
    assert_eq!(seen, [1.0, 2.0, 3.0]);
}

// ============================================================================
// Filtering
// ============================================================================

#[test]
fn test_domain_whitelist_property() {
    let full = Catalog::standard().unwrap();
    for domain in full.domains() {
        let mut config = ServerConfig::default();
        config.domain_whitelist = vec![domain.to_string()];
        // Ignored while the whitelist is set
        config.domain_blacklist = vec![domain.to_string()];

        let exposed = CatalogFilter::from_config(&config).apply(&full);
        assert!(!exposed.is_empty());
        assert!(exposed.iter().all(|f| f.domain() == domain));
        assert_eq!(
            exposed.len(),
            full.iter().filter(|f| f.domain() == domain).count()
        );
    }
}

#[test]
fn test_blacklist_only_property() {
    let full = Catalog::standard().unwrap();
    let mut config = ServerConfig::default();
    config.domain_blacklist = vec!["trigonometry".into()];
    config.function_blacklist = vec!["gcd".into(), "add".into()];

    let exposed = CatalogFilter::from_config(&config).apply(&full);
    let expected: Vec<&str> = full
        .iter()
        .filter(|f| f.domain() != "trigonometry" && f.name() != "gcd" && f.name() != "add")
        .map(|f| f.name())
        .collect();
    let actual: Vec<&str> = exposed.iter().map(|f| f.name()).collect();
    assert_eq!(actual, expected);
}
