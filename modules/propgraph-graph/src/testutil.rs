//! Disposable Neo4j instances for integration tests (Docker required).

use std::time::Duration;

use testcontainers::{
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

use propgraph_common::Config;

use crate::{GraphClient, GraphRepository};

const NEO4J_IMAGE: &str = "neo4j";
const NEO4J_TAG: &str = "5.25.1";
const BOLT_PORT: u16 = 7687;
const NEO4J_PASSWORD: &str = "propgraph-test";

/// Start a community Neo4j container and describe how to reach it.
///
/// Retries back off in tens of milliseconds so fault paths stay quick.
pub async fn neo4j_config() -> (ContainerAsync<GenericImage>, Config) {
    let container = GenericImage::new(NEO4J_IMAGE, NEO4J_TAG)
        .with_exposed_port(ContainerPort::Tcp(BOLT_PORT))
        .with_wait_for(WaitFor::message_on_stdout("Started."))
        .with_env_var("NEO4J_AUTH", format!("neo4j/{NEO4J_PASSWORD}"))
        .start()
        .await
        .expect("Neo4j container should start");

    let port = container
        .get_host_port_ipv4(BOLT_PORT)
        .await
        .expect("Neo4j bolt port should be mapped");

    let mut config = Config::new(&format!("bolt://127.0.0.1:{port}"), "neo4j", NEO4J_PASSWORD);
    config.retry_base = Duration::from_millis(50);
    (container, config)
}

/// A repository connected to a fresh, empty Neo4j container.
///
/// Hold on to the returned container: dropping it stops Neo4j.
pub async fn neo4j_container() -> (ContainerAsync<GenericImage>, GraphRepository) {
    let (container, config) = neo4j_config().await;
    let client = GraphClient::connect(&config)
        .await
        .expect("repository should connect to the test container");
    (container, GraphRepository::new(client))
}
