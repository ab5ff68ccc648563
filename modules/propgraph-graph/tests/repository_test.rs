//! Repository behaviour over a scripted backend: validation before I/O,
//! row mapping, endpoint policy and lifecycle.

mod harness;

use propgraph_graph::{
    BackendError, GraphError, NodeMatcher, NodeSpec, PropertyMap, PropertyValue,
    RelationshipSpec, RelationshipWrite, ResultValue,
};

use harness::{count_row, node, node_row, repository, value_row, ScriptedBackend};

fn alice() -> NodeMatcher {
    NodeMatcher::new("user", "name", "Alice")
}

fn shawshank() -> NodeMatcher {
    NodeMatcher::new("movie", "title", "The Shawshank Redemption")
}

fn rating(score: i64) -> PropertyMap {
    PropertyMap::new().with("rating", score).with("timestamp", 1234567890_i64)
}

#[tokio::test]
async fn validation_failures_never_reach_the_client() {
    let (repo, calls) = repository(ScriptedBackend::new());

    let err = repo.create_node(&NodeSpec::new("").with("name", "x")).await.unwrap_err();
    assert!(matches!(err, GraphError::InvalidLabel(_)));

    let err = repo
        .create_relationship(&alice(), "", &rating(4), &shawshank())
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidRelationshipType(_)));

    let err = repo
        .create_node(&NodeSpec::new("movie").with("score", f64::NAN))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidValue { .. }));

    let err = repo.find_node_by_property("user name", "name", "Alice").await.unwrap_err();
    assert!(matches!(err, GraphError::InvalidLabel(_)));

    let err = repo
        .find_relationship_property(&alice(), "rated by", &shawshank(), "rating")
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidRelationshipType(_)));

    assert_eq!(calls.total(), 0);
}

#[tokio::test]
async fn created_node_is_found_by_property() {
    let stored = node(7, "user", PropertyMap::new().with("name", "Alice").with("userId", "2"));
    let backend = ScriptedBackend::new()
        .write(Ok(vec![node_row("n", stored.clone())]))
        .read(Ok(vec![node_row("n", stored.clone())]));
    let (repo, calls) = repository(backend);

    let created = repo
        .create_node(&NodeSpec::new("user").with("name", "Alice").with("userId", "2"))
        .await
        .unwrap();
    assert_eq!(created, stored);

    let found = repo.find_node_by_property("user", "name", "Alice").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("name"), Some(&PropertyValue::from("Alice")));

    let lookup = calls.last_statement().unwrap();
    assert_eq!(lookup.params.get("match_name"), Some(&PropertyValue::from("Alice")));
    assert!(!lookup.cypher.contains("Alice"));
}

#[tokio::test]
async fn create_node_rides_out_a_transient_outage() {
    let stored = node(1, "movie", PropertyMap::new().with("title", "The Godfather"));
    let backend = ScriptedBackend::new()
        .write(Err(BackendError::unavailable("leader switch")))
        .write(Ok(vec![node_row("n", stored)]));
    let (repo, calls) = repository(backend);

    let created = repo
        .create_node(&NodeSpec::new("movie").with("title", "The Godfather"))
        .await
        .unwrap();

    assert_eq!(created.id, 1);
    assert_eq!(calls.writes(), 2);
}

#[tokio::test]
async fn lower_layer_errors_propagate_unchanged() {
    let backend = ScriptedBackend::new().write(Err(BackendError::rejected("syntax error")));
    let (repo, _calls) = repository(backend);

    let err = repo
        .create_node(&NodeSpec::new("user").with("name", "Alice"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GraphError::QueryExecution { operation: "create_node", ref subject, .. } if subject == "user"
    ));
}

#[tokio::test]
async fn relationship_between_single_matches_is_merged() {
    let backend = ScriptedBackend::new().write(Ok(vec![count_row(1, 1)]));
    let (repo, calls) = repository(backend);

    let write = repo
        .create_relationship(&alice(), "rated", &rating(4), &shawshank())
        .await
        .unwrap();

    assert_eq!(
        write,
        RelationshipWrite {
            source_matches: 1,
            target_matches: 1
        }
    );
    let statement = calls.last_statement().unwrap();
    assert!(statement.cypher.contains("MERGE (a)-[r:`rated`]->(b)"));
    assert_eq!(statement.params.get("rel_rating"), Some(&PropertyValue::from(4)));
}

#[tokio::test]
async fn relationship_spec_uses_the_same_path() {
    let backend = ScriptedBackend::new().write(Ok(vec![count_row(1, 1)]));
    let (repo, calls) = repository(backend);
    let spec = RelationshipSpec::new(alice(), "rated", shawshank()).with("rating", 4);

    repo.create_relationship_spec(&spec).await.unwrap();

    assert_eq!(calls.last_statement().unwrap().operation, "create_relationship");
}

#[tokio::test]
async fn missing_endpoint_is_node_not_found() {
    let backend = ScriptedBackend::new().write(Ok(vec![count_row(0, 1)]));
    let (repo, _calls) = repository(backend);

    let err = repo
        .create_relationship(&alice(), "rated", &rating(4), &shawshank())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GraphError::NodeNotFound { ref label, ref property } if label == "user" && property == "name"
    ));
}

#[tokio::test]
async fn ambiguous_endpoint_is_rejected() {
    let backend = ScriptedBackend::new().write(Ok(vec![count_row(1, 2)]));
    let (repo, _calls) = repository(backend);

    let err = repo
        .create_relationship(&alice(), "rated", &rating(4), &shawshank())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GraphError::AmbiguousMatch { ref label, count: 2, .. } if label == "movie"
    ));
}

#[tokio::test]
async fn rating_is_read_as_a_number() {
    let backend = ScriptedBackend::new()
        .read(Ok(vec![value_row(ResultValue::Property(PropertyValue::from(4)))]))
        .read(Ok(vec![value_row(ResultValue::Property(PropertyValue::from(3.5)))]))
        .read(Ok(Vec::new()))
        .read(Ok(vec![value_row(ResultValue::Null)]));
    let (repo, _calls) = repository(backend);

    assert_eq!(repo.find_relationship_rating(&alice(), &shawshank()).await.unwrap(), Some(4.0));
    assert_eq!(repo.find_relationship_rating(&alice(), &shawshank()).await.unwrap(), Some(3.5));
    assert_eq!(repo.find_relationship_rating(&alice(), &shawshank()).await.unwrap(), None);
    assert_eq!(repo.find_relationship_rating(&alice(), &shawshank()).await.unwrap(), None);
}

#[tokio::test]
async fn non_numeric_rating_is_a_decode_error() {
    let backend = ScriptedBackend::new()
        .read(Ok(vec![value_row(ResultValue::Property(PropertyValue::from("four")))]));
    let (repo, _calls) = repository(backend);

    let err = repo.find_relationship_rating(&alice(), &shawshank()).await.unwrap_err();
    assert!(matches!(err, GraphError::Decode(ref msg) if msg.contains("string")));
}

#[tokio::test]
async fn several_relationships_make_the_property_ambiguous() {
    let row = || value_row(ResultValue::Property(PropertyValue::from(5)));
    let backend = ScriptedBackend::new().read(Ok(vec![row(), row()]));
    let (repo, _calls) = repository(backend);

    let err = repo
        .find_relationship_property(&alice(), "rated", &shawshank(), "rating")
        .await
        .unwrap_err();

    assert!(matches!(err, GraphError::AmbiguousMatch { count: 2, .. }));
}

#[tokio::test]
async fn field_lookup_skips_nulls() {
    let backend = ScriptedBackend::new().read(Ok(vec![
        value_row(ResultValue::Property(PropertyValue::from("Alice"))),
        value_row(ResultValue::Null),
    ]));
    let (repo, _calls) = repository(backend);

    let names = repo
        .find_field_by_property("user", "userId", "2", "name")
        .await
        .unwrap();

    assert_eq!(names, vec![PropertyValue::from("Alice")]);
}

#[tokio::test]
async fn linked_pair_returns_both_nodes() {
    let ann = node(1, "Person", PropertyMap::new().with("name", "Ann"));
    let ben = node(2, "Person", PropertyMap::new().with("name", "Ben"));
    let row = node_row("a", ann.clone()).with("b", ResultValue::Node(ben.clone()));
    let (repo, _calls) = repository(ScriptedBackend::new().write(Ok(vec![row])));

    let (first, second) = repo
        .create_linked_pair(
            &NodeSpec::new("Person").with("name", "Ann"),
            "KNOWS",
            &NodeSpec::new("Person").with("name", "Ben"),
        )
        .await
        .unwrap();

    assert_eq!((first, second), (ann, ben));
}

#[tokio::test]
async fn missing_result_row_is_a_decode_error() {
    let (repo, _calls) = repository(ScriptedBackend::new().write(Ok(Vec::new())));

    let err = repo
        .create_node(&NodeSpec::new("user").with("name", "Alice"))
        .await
        .unwrap_err();

    assert!(matches!(err, GraphError::Decode(_)));
}

#[tokio::test]
async fn every_operation_fails_after_close() {
    let (repo, calls) = repository(ScriptedBackend::new());
    repo.close().await;
    repo.close().await;

    let spec = NodeSpec::new("user").with("name", "Alice");
    assert!(matches!(repo.create_node(&spec).await, Err(GraphError::ClientClosed)));
    assert!(matches!(
        repo.create_relationship(&alice(), "rated", &rating(4), &shawshank()).await,
        Err(GraphError::ClientClosed)
    ));
    assert!(matches!(
        repo.find_node_by_property("user", "name", "Alice").await,
        Err(GraphError::ClientClosed)
    ));
    assert!(matches!(
        repo.find_relationship_rating(&alice(), &shawshank()).await,
        Err(GraphError::ClientClosed)
    ));
    assert!(matches!(
        repo.find_relationship_property(&alice(), "rated", &shawshank(), "rating").await,
        Err(GraphError::ClientClosed)
    ));
    assert_eq!(calls.total(), 0);
    assert_eq!(calls.closes(), 1);
}
