use backoffice_criteria::Criteria;
use backoffice_data::transport::mock::MockTransport;
use backoffice_data::{AssociationKind, DataError, Method, RepositoryFactory, Transport};
use backoffice_model::{Association, DefinitionRegistry, Entity, EntityCollection, EntityDefinition, EntityHook, Property};
use backoffice_types::{ApiContext, EntityId};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

fn registry() -> DefinitionRegistry {
    let mut registry = DefinitionRegistry::new();
    registry
        .register(
            EntityDefinition::new("product")
                .with("name", Property::string().translatable())
                .with("stock", Property::int().with_default(0))
                .with("active", Property::bool().with_default(true))
                .with("manufacturerId", Property::uuid())
                .with("manufacturer", Property::many_to_one("product_manufacturer", "manufacturerId"))
                .with("tags", Property::many_to_many("tag", "product_tag"))
                .with("media", Property::one_to_many("product_media", "productId")),
        )
        .register(EntityDefinition::new("product_manufacturer").with("name", Property::string()))
        .register(EntityDefinition::new("tag").with("name", Property::string()))
        .register(EntityDefinition::new("product_media").with("position", Property::int()));
    registry
}

fn setup() -> (Arc<MockTransport>, RepositoryFactory) {
    let transport = Arc::new(MockTransport::new());
    let factory = RepositoryFactory::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::new(registry()),
    );
    (transport, factory)
}

fn ctx() -> ApiContext {
    ApiContext::default()
}

async fn loaded_product(transport: &MockTransport, factory: &RepositoryFactory) -> Entity {
    transport.respond(
        Method::Post,
        "/search/product",
        200,
        json!({
            "total": 1,
            "data": [{
                "id": "p1",
                "name": "Shirt",
                "stock": 3,
                "createdAt": "2024-01-01T00:00:00+00:00",
                "tags": [{"id": "t1", "name": "VIP"}, {"id": "t2", "name": "Sale"}],
                "media": [{"id": "m1", "position": 0}]
            }]
        }),
    );
    factory.create("product").get("p1", &ctx(), None).await.unwrap()
}

// ── Search ───────────────────────────────────────────────────────

#[tokio::test]
async fn search_preserves_order_and_total() {
    let (transport, factory) = setup();
    transport.respond(
        Method::Post,
        "/search/product",
        200,
        json!({"data": [{"id": "A", "name": "a"}, {"id": "B", "name": "b"}], "total": 2}),
    );

    let result = factory
        .create("product")
        .search(&Criteria::new(), &ctx())
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.ids(), vec!["A", "B"]);
    assert_eq!(result.total(), 2);
    assert_eq!(result.entity_name(), "product");
    assert_eq!(result.source(), "/product");
}

#[tokio::test]
async fn search_sends_criteria_body_and_context() {
    let (transport, factory) = setup();
    transport.respond(Method::Post, "/search/product", 200, json!({"data": [], "total": 0}));

    let mut criteria = Criteria::new();
    criteria.add_filter(Criteria::equals("name", "foo"));
    let context = ctx().with_token("secret");
    factory.create("product").search(&criteria, &context).await.unwrap();

    let requests = transport.requests_to(Method::Post, "/search/product");
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].body,
        Some(json!({"page": 1, "limit": 25, "filter": [{"type": "equals", "field": "name", "value": "foo"}]}))
    );
    assert_eq!(requests[0].context, context);
}

#[tokio::test]
async fn search_uses_kebab_case_routes() {
    let (transport, factory) = setup();
    transport.respond(Method::Post, "/search/product-manufacturer", 200, json!({"data": []}));

    let result = factory
        .create("product_manufacturer")
        .search(&Criteria::new(), &ctx())
        .await
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(result.total(), 0);
}

#[tokio::test]
async fn search_hydrates_plain_associations() {
    let (transport, factory) = setup();
    let product = loaded_product(&transport, &factory).await;

    assert_eq!(product.get_str("/name"), Some("Shirt"));
    assert!(product.get("tags").is_none());
    assert!(!product.has_changes());

    let tags = product.to_many("tags").unwrap();
    assert_eq!(tags.ids(), vec!["t1", "t2"]);
    assert_eq!(tags.entity_name(), "tag");
    assert_eq!(tags.source(), "/product/p1/tags");
}

#[tokio::test]
async fn search_hydrates_json_api_with_included() {
    let (transport, factory) = setup();
    transport.respond(
        Method::Post,
        "/search/product",
        200,
        json!({
            "data": [{
                "id": "p1",
                "type": "product",
                "attributes": {"name": "Shirt", "manufacturerId": "m1", "translated": {"name": "Hemd"}},
                "relationships": {
                    "manufacturer": {"data": {"type": "product_manufacturer", "id": "m1"}},
                    "tags": {"data": [{"type": "tag", "id": "t1"}]},
                    "media": {"data": []}
                }
            }],
            "included": [
                {"id": "m1", "type": "product_manufacturer", "attributes": {"name": "Acme"}},
                {"id": "t1", "type": "tag", "attributes": {"name": "VIP"},
                 "relationships": {"products": {"data": [{"type": "product", "id": "p1"}]}}}
            ],
            "meta": {"total": 12},
            "aggregations": {"count-id": {"count": 12}}
        }),
    );

    let mut criteria = Criteria::new();
    criteria.add_association("manufacturer").add_association("tags");
    let result = factory.create("product").search(&criteria, &ctx()).await.unwrap();

    assert_eq!(result.total(), 12);
    assert_eq!(result.aggregation("count-id"), Some(&json!({"count": 12})));

    let product = &result[0];
    assert_eq!(product.translated_value("name"), Some(&json!("Hemd")));
    assert_eq!(product.to_one("manufacturer").and_then(|m| m.get_str("/name")), Some("Acme"));
    let tags = product.to_many("tags").unwrap();
    assert_eq!(tags.ids(), vec!["t1"]);
    // The back-reference to p1 is not followed again.
    assert!(tags[0].to_many("products").unwrap().is_empty());
    assert!(product.to_many("media").unwrap().is_empty());
}

#[tokio::test]
async fn null_total_falls_back_to_meta_total() {
    let (transport, factory) = setup();
    transport.respond(
        Method::Post,
        "/search/product",
        200,
        json!({"data": [{"id": "A"}], "total": null, "meta": {"total": 9}}),
    );

    let result = factory
        .create("product")
        .search(&Criteria::new(), &ctx())
        .await
        .unwrap();
    assert_eq!(result.total(), 9);
}

#[tokio::test]
async fn search_without_data_is_a_serialization_error() {
    let (transport, factory) = setup();
    transport.respond(Method::Post, "/search/product", 200, json!({"total": 3}));

    let err = factory
        .create("product")
        .search(&Criteria::new(), &ctx())
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Serialization(_)));
}

#[tokio::test]
async fn search_error_status_maps_to_api_error() {
    let (transport, factory) = setup();
    transport.respond(
        Method::Post,
        "/search/product",
        500,
        json!({"errors": [{"status": "500", "code": "FRAMEWORK__SQL", "detail": "boom"}]}),
    );

    let err = factory
        .create("product")
        .search(&Criteria::new(), &ctx())
        .await
        .unwrap_err();
    match err {
        DataError::Api { status, detail, code } => {
            assert_eq!(status, 500);
            assert_eq!(detail, "boom");
            assert_eq!(code.as_deref(), Some("FRAMEWORK__SQL"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn network_failure_is_not_retried() {
    let (transport, factory) = setup();
    transport.fail(Method::Post, "/search/product", "connection refused");

    let err = factory
        .create("product")
        .search(&Criteria::new(), &ctx())
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Network(_)));
    assert!(err.is_retryable());
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn search_ids_returns_total_and_ids() {
    let (transport, factory) = setup();
    transport.respond(Method::Post, "/search-ids/product", 200, json!({"total": 40, "data": ["a", "b"]}));

    let result = factory
        .create("product")
        .search_ids(&Criteria::new(), &ctx())
        .await
        .unwrap();
    assert_eq!(result.total, 40);
    assert_eq!(result.ids, vec!["a".to_string(), "b".to_string()]);
}

// ── Get ──────────────────────────────────────────────────────────

#[tokio::test]
async fn get_restricts_search_to_id() {
    let (transport, factory) = setup();
    let product = loaded_product(&transport, &factory).await;
    assert_eq!(product.id(), "p1");

    let body = transport.requests()[0].body.clone().unwrap();
    assert_eq!(body["ids"], json!(["p1"]));
    assert_eq!(body["limit"], json!(1));
    assert_eq!(body["page"], json!(1));
}

#[tokio::test]
async fn get_keeps_associations_of_given_criteria() {
    let (transport, factory) = setup();
    transport.respond(Method::Post, "/search/product", 200, json!({"data": [{"id": "p1"}], "total": 1}));

    let mut criteria = Criteria::new();
    criteria.add_association("tags");
    factory.create("product").get("p1", &ctx(), Some(&criteria)).await.unwrap();

    let body = transport.requests()[0].body.clone().unwrap();
    assert_eq!(body["associations"], json!({"tags": {}}));
}

#[tokio::test]
async fn get_drops_filters_and_term_of_given_criteria() {
    let (transport, factory) = setup();
    transport.respond(Method::Post, "/search/product", 200, json!({"data": [{"id": "p1"}], "total": 1}));

    let mut criteria = Criteria::new();
    criteria
        .add_filter(Criteria::equals("active", true))
        .set_term("shirt")
        .add_association("manufacturer");
    let product = factory.create("product").get("p1", &ctx(), Some(&criteria)).await.unwrap();
    assert_eq!(product.id(), "p1");

    let body = transport.requests()[0].body.clone().unwrap();
    assert!(body.get("filter").is_none());
    assert!(body.get("term").is_none());
    assert_eq!(body["ids"], json!(["p1"]));
    assert_eq!(body["associations"], json!({"manufacturer": {}}));
}

#[tokio::test]
async fn get_missing_entity_is_not_found() {
    let (transport, factory) = setup();
    transport.respond(Method::Post, "/search/product", 200, json!({"data": [], "total": 0}));

    let err = factory.create("product").get("nope", &ctx(), None).await.unwrap_err();
    match err {
        DataError::NotFound { entity, id } => {
            assert_eq!(entity, "product");
            assert_eq!(id, "nope");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ── Create ───────────────────────────────────────────────────────

#[test]
fn create_generates_unique_ids_and_defaults() {
    let (transport, factory) = setup();
    let repository = factory.create("product");

    let ids: HashSet<String> = (0..50).map(|_| repository.create(None).id().to_string()).collect();
    assert_eq!(ids.len(), 50);
    assert!(ids.iter().all(|id| EntityId::is_valid(id)));

    let product = repository.create(None);
    assert!(product.is_new());
    assert_eq!(product.get("stock"), Some(&json!(0)));
    assert_eq!(product.get("active"), Some(&json!(true)));
    assert!(product.get("createdAt").is_none());
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn create_with_given_id() {
    let (_, factory) = setup();
    let tag = factory.create("tag").create(Some("t9"));
    assert_eq!(tag.id(), "t9");
    assert_eq!(tag.entity_name(), "tag");
}

#[test]
fn create_without_definition_is_empty() {
    let (_, factory) = setup();
    let entity = factory.create("unknown_entity").create(None);
    assert!(entity.fields().is_empty());
}

// ── Save ─────────────────────────────────────────────────────────

#[tokio::test]
async fn save_new_entity_posts_full_payload() {
    let (transport, factory) = setup();
    transport.respond(Method::Post, "/product", 204, Value::Null);
    let repository = factory.create("product");

    let mut product = repository.create(Some("p9"));
    product.set("name", "Shirt");
    repository.save(&mut product, &ctx()).await.unwrap();

    let requests = transport.requests_to(Method::Post, "/product");
    assert_eq!(
        requests[0].body,
        Some(json!({"id": "p9", "name": "Shirt", "stock": 0, "active": true}))
    );
    assert!(!product.is_new());
    assert!(!product.has_changes());
}

#[tokio::test]
async fn save_existing_entity_patches_changed_fields_only() {
    let (transport, factory) = setup();
    let mut product = loaded_product(&transport, &factory).await;
    transport.respond(Method::Patch, "/product/p1", 204, Value::Null);

    product.set("stock", 10).set("createdAt", "2030-01-01");
    factory.create("product").save(&mut product, &ctx()).await.unwrap();

    let requests = transport.requests_to(Method::Patch, "/product/p1");
    assert_eq!(requests[0].body, Some(json!({"id": "p1", "stock": 10})));
    assert!(!product.has_changes());
}

#[tokio::test]
async fn save_without_changes_sends_nothing() {
    let (transport, factory) = setup();
    let mut product = loaded_product(&transport, &factory).await;
    let before = transport.request_count();

    factory.create("product").save(&mut product, &ctx()).await.unwrap();
    assert_eq!(transport.request_count(), before);
}

#[tokio::test]
async fn save_failure_keeps_local_values() {
    let (transport, factory) = setup();
    let mut product = loaded_product(&transport, &factory).await;
    transport.respond(
        Method::Patch,
        "/product/p1",
        500,
        json!({"errors": [{"status": "500", "detail": "Internal error"}]}),
    );

    product.set("name", "Blouse");
    let err = factory.create("product").save(&mut product, &ctx()).await.unwrap_err();

    assert!(matches!(err, DataError::Api { status: 500, .. }));
    assert_eq!(err.status(), Some(500));
    assert_eq!(product.get_str("/name"), Some("Blouse"));
    assert!(product.has_changes());
}

#[tokio::test]
async fn save_validation_errors_carry_field_pointers() {
    let (transport, factory) = setup();
    transport.respond(
        Method::Post,
        "/product",
        400,
        json!({"errors": [
            {"status": "400", "code": "c1051bb4-d103-4f74-8988-acbcafc7fdc3", "detail": "This value should not be blank.", "source": {"pointer": "/0/name"}},
            {"status": "400", "detail": "Too long.", "source": {"pointer": "/0/productNumber"}}
        ]}),
    );
    let repository = factory.create("product");
    let mut product = repository.create(None);

    let err = repository.save(&mut product, &ctx()).await.unwrap_err();
    let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field()).collect();
    assert_eq!(fields, vec!["name", "productNumber"]);
    assert_eq!(err.status(), Some(400));
    assert_eq!(
        err.field_errors()[0].code.as_deref(),
        Some("c1051bb4-d103-4f74-8988-acbcafc7fdc3")
    );
    assert!(product.is_new());
}

struct RequireName;

impl EntityHook for RequireName {
    fn validate(&self, entity: &Entity) -> Result<(), String> {
        match entity.get_str("/name") {
            Some(name) if !name.trim().is_empty() => Ok(()),
            _ => Err("name must not be empty".into()),
        }
    }

    fn on_after_load(&self, entity: &mut Entity) {
        let label = format!("#{}", entity.id());
        entity.set("label", label);
        entity.commit();
    }
}

#[tokio::test]
async fn hook_rejects_save_before_sending() {
    let (transport, factory) = setup();
    let factory = factory.with_hook("tag", Arc::new(RequireName));
    let repository = factory.create("tag");
    let mut tag = repository.create(None);
    tag.set("name", " ");

    let err = repository.save(&mut tag, &ctx()).await.unwrap_err();
    assert!(matches!(err, DataError::Hook(_)));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn hook_post_processes_loaded_entities() {
    let (transport, factory) = setup();
    let factory = factory.with_hook("tag", Arc::new(RequireName));
    transport.respond(Method::Post, "/search/tag", 200, json!({"data": [{"id": "t1", "name": "VIP"}]}));

    let tags = factory.create("tag").search(&Criteria::new(), &ctx()).await.unwrap();
    assert_eq!(tags[0].get_str("/label"), Some("#t1"));
    assert!(!tags[0].has_changes());

    // Other entity types are unaffected.
    transport.respond(Method::Post, "/search/product", 200, json!({"data": [{"id": "p1"}]}));
    let products = factory.create("product").search(&Criteria::new(), &ctx()).await.unwrap();
    assert!(products[0].get("label").is_none());
}

// ── Associations ─────────────────────────────────────────────────

#[tokio::test]
async fn remove_one_to_many_clears_foreign_key() {
    let (transport, factory) = setup();
    let mut product = loaded_product(&transport, &factory).await;
    transport.respond(Method::Patch, "/product/p1", 204, Value::Null);
    let repository = factory.create("product");

    repository
        .remove_association(&mut product, "manufacturerId", AssociationKind::OneToMany, "m1")
        .unwrap();
    assert_eq!(
        repository.changeset(&product).payload,
        json!({"id": "p1", "manufacturerId": null}).as_object().unwrap().clone()
    );
    repository.save(&mut product, &ctx()).await.unwrap();
    assert_eq!(transport.requests_to(Method::Patch, "/product/p1").len(), 1);
}

#[tokio::test]
async fn remove_many_to_many_deletes_mapping_on_save() {
    let (transport, factory) = setup();
    let mut product = loaded_product(&transport, &factory).await;
    transport.respond(Method::Delete, "/product/p1/tags/t1", 204, Value::Null);
    let repository = factory.create("product");

    repository
        .remove_association(&mut product, "tags", AssociationKind::ManyToMany, "t1")
        .unwrap();
    assert_eq!(product.to_many("tags").unwrap().ids(), vec!["t2"]);
    assert!(repository.has_changes(&product));

    repository.save(&mut product, &ctx()).await.unwrap();
    assert!(transport.requests_to(Method::Patch, "/product/p1").is_empty());
    assert_eq!(transport.requests_to(Method::Delete, "/product/p1/tags/t1").len(), 1);
    assert!(!repository.has_changes(&product));
}

#[tokio::test]
async fn failed_removal_resumes_on_next_save() {
    let (transport, factory) = setup();
    let mut product = loaded_product(&transport, &factory).await;
    transport.respond(Method::Patch, "/product/p1", 204, Value::Null);
    transport
        .respond(Method::Delete, "/product/p1/tags/t1", 204, Value::Null)
        .respond(Method::Delete, "/product/p1/tags/t1", 404, json!({"errors": [{"detail": "gone"}]}));
    transport
        .respond(Method::Delete, "/product/p1/tags/t2", 500, json!({"errors": [{"detail": "boom"}]}))
        .respond(Method::Delete, "/product/p1/tags/t2", 204, Value::Null);
    let repository = factory.create("product");

    product.set("name", "Blouse");
    repository.remove_association(&mut product, "tags", AssociationKind::ManyToMany, "t1").unwrap();
    repository.remove_association(&mut product, "tags", AssociationKind::ManyToMany, "t2").unwrap();

    let err = repository.save(&mut product, &ctx()).await.unwrap_err();
    assert!(matches!(err, DataError::Api { status: 500, .. }));
    assert!(product.changed_fields().is_empty());
    assert_eq!(product.pending_removals()["tags"], vec!["t2"]);
    assert!(repository.has_changes(&product));

    repository.save(&mut product, &ctx()).await.unwrap();
    assert_eq!(transport.requests_to(Method::Patch, "/product/p1").len(), 1);
    assert_eq!(transport.requests_to(Method::Delete, "/product/p1/tags/t1").len(), 1);
    assert_eq!(transport.requests_to(Method::Delete, "/product/p1/tags/t2").len(), 2);
    assert!(!repository.has_changes(&product));
}

#[tokio::test]
async fn failed_create_is_not_posted_twice_after_removal_failure() {
    let (transport, factory) = setup();
    transport.respond(Method::Post, "/product", 204, Value::Null);
    transport
        .respond(Method::Delete, "/product/n1/tags/t1", 503, json!({"errors": [{"detail": "busy"}]}))
        .respond(Method::Delete, "/product/n1/tags/t1", 204, Value::Null);
    let repository = factory.create("product");

    let mut product = repository.create(Some("n1"));
    let tag = Entity::hydrated("tag", "t1", Map::new(), Map::new());
    let tags = EntityCollection::new("/tag", "tag", ctx(), Criteria::new()).with_results(vec![tag], 1, Map::new());
    product.set_association("tags", Association::ToMany(tags));
    product.remove_from_association("tags", "t1");

    assert!(repository.save(&mut product, &ctx()).await.is_err());
    assert!(!product.is_new());

    repository.save(&mut product, &ctx()).await.unwrap();
    assert_eq!(transport.requests_to(Method::Post, "/product").len(), 1);
    assert_eq!(transport.requests_to(Method::Delete, "/product/n1/tags/t1").len(), 2);
}

#[tokio::test]
async fn discard_puts_removed_tags_back() {
    let (transport, factory) = setup();
    let mut product = loaded_product(&transport, &factory).await;
    let repository = factory.create("product");

    repository.remove_association(&mut product, "tags", AssociationKind::ManyToMany, "t1").unwrap();
    repository.discard(&mut product);

    assert_eq!(product.to_many("tags").unwrap().ids(), vec!["t1", "t2"]);
    assert!(product.pending_removals().is_empty());
    assert!(!repository.has_changes(&product));
}

#[tokio::test]
async fn remove_one_to_many_child_deletes_child_entity() {
    let (transport, factory) = setup();
    let mut product = loaded_product(&transport, &factory).await;
    transport.respond(Method::Delete, "/product-media/m1", 204, Value::Null);

    assert!(product.remove_from_association("media", "m1"));
    let repository = factory.create("product");
    let deletions = repository.changeset(&product).deletions;
    assert_eq!(deletions.len(), 1);
    assert_eq!(deletions[0].route, "/product-media/m1");
    assert_eq!(deletions[0].owner_id, "p1");
    assert_eq!(deletions[0].association, "media");
    repository.save(&mut product, &ctx()).await.unwrap();
    assert_eq!(transport.requests_to(Method::Delete, "/product-media/m1").len(), 1);
}

#[tokio::test]
async fn remove_missing_many_to_many_entry_is_invalid() {
    let (transport, factory) = setup();
    let mut product = loaded_product(&transport, &factory).await;

    let err = factory
        .create("product")
        .remove_association(&mut product, "tags", AssociationKind::ManyToMany, "unknown")
        .unwrap_err();
    assert!(matches!(err, DataError::InvalidArgument(_)));
}

#[tokio::test]
async fn nested_changes_are_sent_with_the_owner() {
    let (transport, factory) = setup();
    let mut product = loaded_product(&transport, &factory).await;
    transport.respond(Method::Patch, "/product/p1", 204, Value::Null);

    product
        .to_many_mut("tags")
        .and_then(|tags| tags.get_mut("t2"))
        .unwrap()
        .set("name", "Clearance");
    factory.create("product").save(&mut product, &ctx()).await.unwrap();

    let requests = transport.requests_to(Method::Patch, "/product/p1");
    assert_eq!(
        requests[0].body,
        Some(json!({"id": "p1", "tags": [{"id": "t2", "name": "Clearance"}]}))
    );
}

#[tokio::test]
async fn discard_restores_loaded_values() {
    let (transport, factory) = setup();
    let mut product = loaded_product(&transport, &factory).await;
    let repository = factory.create("product");

    product.set("name", "Other");
    assert!(repository.has_changes(&product));
    repository.discard(&mut product);
    assert_eq!(product.get_str("/name"), Some("Shirt"));
    assert!(!repository.has_changes(&product));
}

// ── Delete ───────────────────────────────────────────────────────

#[tokio::test]
async fn delete_sends_delete_request() {
    let (transport, factory) = setup();
    transport.respond(Method::Delete, "/product/p1", 204, Value::Null);

    factory.create("product").delete("p1", &ctx()).await.unwrap();
    assert_eq!(transport.requests_to(Method::Delete, "/product/p1").len(), 1);
}

#[tokio::test]
async fn delete_unknown_id_is_not_found() {
    let (_, factory) = setup();
    let err = factory.create("product").delete("p404", &ctx()).await.unwrap_err();
    assert!(matches!(err, DataError::NotFound { .. }));
    assert_eq!(err.status(), Some(404));
}
