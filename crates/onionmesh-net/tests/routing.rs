//! End-to-end routing tests over an in-process network.
//!
//! Topology throughout is a line: A - B - C - D.

use std::sync::Arc;

use onionmesh_core::{
    DerivedKeyDirectory, Error, KeyDirectory, NodeId, Route, StaticKeyDirectory,
};
use onionmesh_net::{Inbox, Network, NetworkError, Node, NodeError, NodeState};
use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

/// Build the A - B - C - D line; D delivers into the returned inbox.
fn line_network(ids: [&str; 4], directory: Arc<dyn KeyDirectory>) -> (Network, Arc<Inbox>) {
    let network = Network::new();
    let inbox = Arc::new(Inbox::new());

    for (i, id) in ids.iter().enumerate() {
        let mut node = Node::provisioned(*id, Arc::clone(&directory)).unwrap();
        if i == ids.len() - 1 {
            node = node.with_deliver(inbox.clone());
        }
        network.add_node(node).unwrap();
    }
    for pair in ids.windows(2) {
        network
            .connect_nodes(&NodeId::from(pair[0]), &NodeId::from(pair[1]))
            .unwrap();
    }

    (network, inbox)
}

fn derived() -> Arc<dyn KeyDirectory> {
    Arc::new(DerivedKeyDirectory::new([42u8; 32]))
}

#[test]
fn hello_from_a_reaches_d() {
    let (network, inbox) = line_network(["A", "B", "C", "D"], derived());
    let route = Route::from_ids(["B", "C", "D"]).unwrap();

    network
        .dispatch_send(&NodeId::from("A"), &route, b"Hello from A!")
        .unwrap();

    assert_eq!(inbox.take(), vec![b"Hello from A!".to_vec()]);

    for id in ["B", "C"] {
        let stats = network.node(&NodeId::from(id)).unwrap().stats();
        assert_eq!(stats.layers_processed, 1);
        assert_eq!(stats.layers_forwarded, 1);
        assert_eq!(stats.messages_delivered, 0);
    }
    let d = network.node(&NodeId::from("D")).unwrap();
    assert_eq!(d.stats().messages_delivered, 1);
    assert_eq!(d.state(), NodeState::Idle);
}

#[test]
fn static_directory_end_to_end() {
    let directory = Arc::new(StaticKeyDirectory::new());
    let network = Network::new();
    let inbox = Arc::new(Inbox::new());

    for id in ["A", "B", "C", "D"] {
        let key = directory.provision_random(NodeId::from(id));
        let mut node = Node::new(id, key, directory.clone());
        if id == "D" {
            node = node.with_deliver(inbox.clone());
        }
        network.add_node(node).unwrap();
    }
    network.connect_nodes(&"A".into(), &"B".into()).unwrap();
    network.connect_nodes(&"B".into(), &"C".into()).unwrap();
    network.connect_nodes(&"C".into(), &"D".into()).unwrap();

    let route = Route::from_ids(["B", "C", "D"]).unwrap();
    network
        .dispatch_send(&"A".into(), &route, b"Hello from A!")
        .unwrap();
    assert_eq!(inbox.take(), vec![b"Hello from A!".to_vec()]);

    // Connections are undirected: D can reach A back through C and B
    let back = Route::from_ids(["C", "B", "A"]).unwrap();
    network.dispatch_send(&"D".into(), &back, b"reply").unwrap();
    let a = network.node(&"A".into()).unwrap();
    assert_eq!(a.stats().messages_delivered, 1);
}

#[test]
fn single_hop_route() {
    let (network, inbox) = line_network(["A", "B", "C", "D"], derived());
    let route = Route::from_ids(["D"]).unwrap();

    network.dispatch_send(&"C".into(), &route, b"direct").unwrap();
    assert_eq!(inbox.take(), vec![b"direct".to_vec()]);
}

#[test]
fn unconnected_hop_fails_with_unknown_neighbor() {
    let (network, inbox) = line_network(["A", "B", "C", "D"], derived());
    let route = Route::from_ids(["B", "X"]).unwrap();

    let err = network
        .dispatch_send(&NodeId::from("A"), &route, b"msg")
        .unwrap_err();

    assert!(matches!(
        err,
        NetworkError::Node(NodeError::UnknownNeighbor(id)) if id.as_str() == "X"
    ));
    assert!(inbox.is_empty());
    let b = network.node(&NodeId::from("B")).unwrap();
    assert_eq!(b.stats().packets_dropped, 1);
}

#[test]
fn unprovisioned_hop_fails_with_unknown_key() {
    let directory = Arc::new(StaticKeyDirectory::new());
    let network = Network::new();
    for id in ["A", "B"] {
        let key = directory.provision_random(NodeId::from(id));
        network.add_node(Node::new(id, key, directory.clone())).unwrap();
    }
    network.connect_nodes(&"A".into(), &"B".into()).unwrap();

    let route = Route::from_ids(["B", "X"]).unwrap();
    let err = network.dispatch_send(&"A".into(), &route, b"msg").unwrap_err();

    assert!(matches!(
        err,
        NetworkError::Node(NodeError::Onion(Error::UnknownKey(id))) if id.as_str() == "X"
    ));
    assert_eq!(network.node(&"B".into()).unwrap().stats().layers_processed, 0);
}

#[test]
fn mismatched_hop_key_is_auth_failure() {
    // C holds a key that differs from the one senders resolve for it
    let directory = derived();
    let network = Network::new();
    let inbox = Arc::new(Inbox::new());

    for id in ["A", "B", "D"] {
        let mut node = Node::provisioned(id, Arc::clone(&directory)).unwrap();
        if id == "D" {
            node = node.with_deliver(inbox.clone());
        }
        network.add_node(node).unwrap();
    }
    network
        .add_node(Node::new(
            "C",
            onionmesh_core::RouteKey::generate(),
            Arc::clone(&directory),
        ))
        .unwrap();
    for (a, b) in [("A", "B"), ("B", "C"), ("C", "D")] {
        network.connect_nodes(&a.into(), &b.into()).unwrap();
    }

    let route = Route::from_ids(["B", "C", "D"]).unwrap();
    let err = network.dispatch_send(&"A".into(), &route, b"msg").unwrap_err();

    assert!(matches!(
        err,
        NetworkError::Node(NodeError::Onion(Error::AuthFailure))
    ));
    assert!(inbox.is_empty());
}

/// Shared in-memory log sink
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn hops_log_only_their_successor() {
    let ids = ["origin-alpha", "relay-bravo", "relay-charlie", "exit-delta"];
    let (network, inbox) = line_network(ids, derived());
    let route = Route::from_ids(["relay-bravo", "relay-charlie", "exit-delta"]).unwrap();

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        network
            .dispatch_send(&NodeId::from("origin-alpha"), &route, b"Hello from A!")
            .unwrap();
    });
    assert_eq!(inbox.len(), 1);

    let lines = logs.lines();
    let hop_lines = |node: &str| -> Vec<String> {
        let marker = format!("hop{{node={}}}", node);
        lines.iter().filter(|l| l.contains(&marker)).cloned().collect()
    };

    let bravo = hop_lines("relay-bravo");
    assert!(!bravo.is_empty());
    assert!(bravo.iter().any(|l| l.contains("next=relay-charlie")));
    for line in &bravo {
        assert!(!line.contains("origin-alpha"), "{}", line);
        assert!(!line.contains("exit-delta"), "{}", line);
    }

    let charlie = hop_lines("relay-charlie");
    assert!(charlie.iter().any(|l| l.contains("next=exit-delta")));
    for line in &charlie {
        assert!(!line.contains("origin-alpha"), "{}", line);
        assert!(!line.contains("relay-bravo"), "{}", line);
    }

    let delta = hop_lines("exit-delta");
    assert!(!delta.is_empty());
    for line in &delta {
        assert!(!line.contains("origin-alpha"), "{}", line);
        assert!(!line.contains("relay-"), "{}", line);
    }

    // The message itself never reaches the logs
    assert!(lines.iter().all(|l| !l.contains("Hello from A!")));
}
