use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;

use domaincache::cache::{
    CacheKey, CacheOperation, CacheOrchestrator, CacheRegion, CallContext, Declaration,
    EvictConfig, EvictOutcome, GraphRegistry, InMemoryStore, Interceptor, KeyError, StoreConfig,
};
use domaincache::domain::types::{EntityType, Value};
use serde_json::json;

const REGIONS: [&str; 4] = ["Invoice", "LineItem", "Customer", "Order"];

fn entity(name: &str) -> EntityType {
    EntityType::new(name)
}

fn invoice(id: u64) -> Value {
    Value::entity("Invoice", json!({ "id": id }))
}

fn setup(store: InMemoryStore) -> (CacheOrchestrator, Arc<InMemoryStore>) {
    let registry = GraphRegistry::from_declarations([
        Declaration::new("Invoice", "billing", ["LineItem", "Customer"]),
        Declaration::new("Order", "orders", ["Invoice"]),
    ])
    .expect("registry builds");
    let store = Arc::new(store);
    let orchestrator = CacheOrchestrator::with_template_keys(Arc::new(registry), store.clone());
    (orchestrator, store)
}

fn fill(store: &InMemoryStore) {
    for name in REGIONS {
        let region = store.lru_region(&entity(name)).expect("region");
        region.put(CacheKey::new("invoice:42"), Value::scalar(name));
        region.put(CacheKey::new("other"), Value::scalar(name));
    }
}

fn populated(store: &InMemoryStore) -> HashSet<&'static str> {
    REGIONS
        .into_iter()
        .filter(|name| {
            store
                .lru_region(&entity(name))
                .is_some_and(|region| !region.is_empty())
        })
        .collect()
}

#[test]
fn named_atomic_eviction_touches_one_key() {
    let (orchestrator, store) = setup(InMemoryStore::default());
    fill(&store);

    let call = CallContext::returning("saveInvoice", "Invoice").with_arg(Value::scalar(42));
    let config = EvictConfig::in_domain("billing")
        .of_type("Invoice")
        .atomic()
        .with_key("invoice:{arg0}");

    let outcome = orchestrator
        .handle_evict(&call, &config, &invoice(42))
        .expect("evicts");
    assert_eq!(
        outcome,
        EvictOutcome::KeyEvicted {
            region: entity("Invoice"),
            key: CacheKey::new("invoice:42"),
        }
    );

    let invoices = store.lru_region(&entity("Invoice")).expect("region");
    assert!(!invoices.contains(&CacheKey::new("invoice:42")));
    assert!(invoices.contains(&CacheKey::new("other")));

    let line_items = store.lru_region(&entity("LineItem")).expect("region");
    assert!(line_items.contains(&CacheKey::new("invoice:42")));
}

#[test]
fn cascade_clears_whole_dependency_closure() {
    let (orchestrator, store) = setup(InMemoryStore::default());
    fill(&store);

    let call = CallContext::returning("saveInvoice", "Invoice");
    let outcome = orchestrator
        .handle_evict(&call, &EvictConfig::in_domain("billing"), &invoice(1))
        .expect("evicts");

    assert_eq!(
        outcome,
        EvictOutcome::Cascaded {
            regions: vec![entity("Invoice"), entity("LineItem"), entity("Customer")],
            evicted_key: None,
        }
    );
    assert_eq!(populated(&store), HashSet::from(["Order"]));
}

#[test]
fn cascade_is_scoped_to_the_configured_domain() {
    let (orchestrator, store) = setup(InMemoryStore::default());
    fill(&store);

    // In `orders`, Invoice is only a dependant with no edges of its own.
    let call = CallContext::returning("saveInvoice", "Invoice");
    let outcome = orchestrator
        .handle_evict(&call, &EvictConfig::in_domain("orders"), &invoice(1))
        .expect("evicts");

    assert_eq!(
        outcome,
        EvictOutcome::Cascaded {
            regions: vec![entity("Invoice")],
            evicted_key: None,
        }
    );
    assert_eq!(
        populated(&store),
        HashSet::from(["LineItem", "Customer", "Order"])
    );
}

#[test]
fn atomic_without_key_clears_only_own_region() {
    let (orchestrator, store) = setup(InMemoryStore::default());
    fill(&store);

    let call = CallContext::returning("saveInvoice", "Invoice");
    let outcome = orchestrator
        .handle_evict(&call, &EvictConfig::in_domain("billing").atomic(), &invoice(1))
        .expect("evicts");

    assert_eq!(
        outcome,
        EvictOutcome::RegionCleared {
            region: entity("Invoice")
        }
    );
    assert_eq!(
        populated(&store),
        HashSet::from(["LineItem", "Customer", "Order"])
    );
}

#[test]
fn cascade_skips_types_without_regions() {
    let (orchestrator, store) =
        setup(InMemoryStore::new(StoreConfig::fixed(["Invoice", "Customer"])));

    let customers = store.lru_region(&entity("Customer")).expect("region");
    customers.put(CacheKey::new("c"), Value::scalar(1));

    let call = CallContext::returning("saveInvoice", "Invoice");
    let outcome = orchestrator
        .handle_evict(&call, &EvictConfig::in_domain("billing"), &invoice(1))
        .expect("evicts");

    assert_eq!(
        outcome,
        EvictOutcome::Cascaded {
            regions: vec![entity("Invoice"), entity("Customer")],
            evicted_key: None,
        }
    );
    assert!(customers.is_empty());
}

#[test]
fn type_is_inferred_from_arguments_when_result_is_empty() {
    let (orchestrator, store) = setup(InMemoryStore::default());
    fill(&store);

    let call = CallContext::returning("deleteOrder", "Order")
        .with_arg(Value::scalar(7))
        .with_arg(Value::entity("Order", json!({ "id": 7 })));
    let outcome = orchestrator
        .handle_evict(&call, &EvictConfig::in_domain("orders"), &Value::Null)
        .expect("evicts");

    assert_eq!(
        outcome,
        EvictOutcome::Cascaded {
            regions: vec![entity("Order"), entity("Invoice")],
            evicted_key: None,
        }
    );
}

#[test]
fn unknown_domain_evicts_nothing() {
    let (orchestrator, store) = setup(InMemoryStore::default());
    fill(&store);

    let call = CallContext::returning("saveInvoice", "Invoice");
    let outcome = orchestrator
        .handle_evict(&call, &EvictConfig::in_domain("nonexistent"), &invoice(1))
        .expect("evicts");

    assert_eq!(outcome, EvictOutcome::Skipped);
    assert_eq!(populated(&store).len(), REGIONS.len());
}

#[test]
fn failing_key_expression_propagates() {
    let (orchestrator, _) = setup(InMemoryStore::default());
    let call = CallContext::returning("saveInvoice", "Invoice");
    let config = EvictConfig::in_domain("billing").with_key("invoice:{arg0");

    let error = orchestrator
        .handle_evict(&call, &config, &invoice(1))
        .expect_err("malformed key");
    assert!(matches!(error, KeyError::Malformed { .. }));
}

#[test]
fn interceptor_write_evicts_after_success() {
    let (orchestrator, store) = setup(InMemoryStore::default());
    fill(&store);
    let interceptor = Interceptor::new(Arc::new(orchestrator));

    let call = CallContext::returning("saveInvoice", "Invoice").with_arg(Value::scalar(42));
    let operation = CacheOperation::Evict(
        EvictConfig::in_domain("billing")
            .atomic()
            .with_key("invoice:{arg0}"),
    );

    let value = interceptor
        .invoke(&call, &operation, || Ok::<_, Infallible>(invoice(42)))
        .expect("write succeeds");
    assert_eq!(value, invoice(42));

    let invoices = store.lru_region(&entity("Invoice")).expect("region");
    assert!(!invoices.contains(&CacheKey::new("invoice:42")));
    assert_eq!(invoices.len(), 1);
}
