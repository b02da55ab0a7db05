use tokio::time;

use crate::{
    frontend::test_util::FakeFrontend,
    shared::FrequencyRange,
    signal::{SignalStatus, SignalThreshold},
    source::ListenerConfig,
    store::{ListenerNode, StateQuery, StateTree, StateView},
};

use super::*;

fn id(s: &str) -> Identifier {
    Identifier::new(s).unwrap()
}

fn source(name: &str) -> SourceConfig {
    let listener = ListenerConfig::new(
        id("l0"),
        145_100_000,
        12_500,
        SignalThreshold::try_from(-70.0).unwrap(),
    );

    SourceConfig::new(
        id(name),
        FrequencyRange::new(144_000_000, 146_000_000).unwrap(),
        145_000_000,
    )
    .unwrap()
    .with_classify_interval(5)
    .with_stop_timeout(2)
    .with_listener(listener)
    .unwrap()
}

fn listener_query(probe: &str, source: &str) -> StateQuery {
    StateQuery::Listener {
        site: id("s1"),
        probe: id(probe),
        source: id(source),
        listener: id("l0"),
    }
}

async fn wait_for(reader: &dyn StateReader, cond: impl Fn(&StateTree) -> bool) {
    time::timeout(time::Duration::from_secs(3), async {
        while !cond(&reader.snapshot()) {
            time::sleep(time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("state tree reaches the expected state");
}

fn listener(tree: &StateTree, probe: &str, source: &str) -> Option<ListenerNode> {
    match tree.query(&listener_query(probe, source)) {
        Ok(StateView::Listener(node)) => Some(node),
        _ => None,
    }
}

#[tokio::test]
async fn test_present_signal_reaches_the_state_tree() {
    let config = SiteConfig::new(id("s1"))
        .with_probe(ProbeConfig::new(id("p1")).with_source(source("r0")).unwrap())
        .unwrap();

    let provider = |_: &Identifier, _: &SourceConfig| -> Arc<dyn RadioFrontend> {
        Arc::new(FakeFrontend::new(-65.0))
    };

    let controller = SiteEngine::new(config, StoreConfig::default(), provider)
        .start()
        .unwrap();
    let reader = controller.reader();

    wait_for(reader.as_ref(), |tree| {
        listener(tree, "p1", "r0")
            .is_some_and(|l| l.signal_state().current().status() == SignalStatus::Present)
    })
    .await;

    let node = listener(&reader.snapshot(), "p1", "r0").unwrap();
    assert_eq!(node.signal_state().current().level(), -65.0);
    assert_eq!(node.system_state().current().status(), SystemStatus::Run);

    assert_eq!(
        controller.source_statuses(),
        vec![SourceStatusEntry {
            probe: id("p1"),
            source: id("r0"),
            status: SystemStatus::Run,
        }]
    );

    controller.shutdown().await.unwrap();
    assert!(matches!(
        controller.shutdown().await,
        Err(SiteError::AlreadyShutdown)
    ));
    assert!(controller.source_statuses().is_empty());

    // Everything the source emitted while stopping was applied before the store stopped
    let tree = reader.snapshot();
    let source = &tree.sites()[&id("s1")].probes()[&id("p1")].radio_sources()[&id("r0")];
    assert_eq!(source.system_state().current().status(), SystemStatus::Stop);
    assert_eq!(source.system_state().previous().status(), SystemStatus::Shutdown);

    let node = listener(&tree, "p1", "r0").unwrap();
    assert_eq!(node.signal_state().current().status(), SignalStatus::Shutdown);
    assert_eq!(node.signal_state().previous().status(), SignalStatus::Present);
    assert_eq!(node.signal_state().previous().level(), -65.0);
    assert_eq!(node.system_state().current().status(), SystemStatus::Stop);
}

#[tokio::test]
async fn test_failed_source_does_not_affect_other_probes() {
    let config = SiteConfig::new(id("s1"))
        .with_probe(ProbeConfig::new(id("p1")).with_source(source("r0")).unwrap())
        .unwrap()
        .with_probe(
            ProbeConfig::new(id("p2"))
                .with_source(source("dead"))
                .unwrap(),
        )
        .unwrap();

    let provider = |_: &Identifier, source: &SourceConfig| -> Arc<dyn RadioFrontend> {
        if source.id().as_str() == "dead" {
            Arc::new(FakeFrontend::failing_start())
        } else {
            Arc::new(FakeFrontend::new(-90.0))
        }
    };

    let controller = SiteEngine::new(config, StoreConfig::default(), provider)
        .start()
        .unwrap();
    let reader = controller.reader();

    wait_for(reader.as_ref(), |tree| {
        let dead_inop = listener(tree, "p2", "dead")
            .is_some_and(|l| l.signal_state().current().status() == SignalStatus::Inop);

        let alive_absent = listener(tree, "p1", "r0")
            .is_some_and(|l| l.signal_state().current().status() == SignalStatus::Absent);

        dead_inop && alive_absent
    })
    .await;

    let dead = listener(&reader.snapshot(), "p2", "dead").unwrap();
    assert_eq!(dead.system_state().current().status(), SystemStatus::Failed);

    let statuses = controller.source_statuses();
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[1].status, SystemStatus::Failed);

    controller.shutdown().await.unwrap();

    let tree = reader.snapshot();
    let dead = &tree.sites()[&id("s1")].probes()[&id("p2")].radio_sources()[&id("dead")];
    assert_eq!(dead.system_state().current().status(), SystemStatus::Failed);
}
