//! End-to-end onion routing over an in-memory network
//!
//! A sender routes a message through a static circuit of relays to a
//! destination. Every node is a full `OnionHost` sharing one directory.
//!
//! Run with: cargo test --test integration_onion_e2e

use echalotte_core::directory::MemoryDirectory;
use echalotte_core::privacy::{Circuit, OnionError, OnionMessage};
use echalotte_core::testing::{Delivery, LoopbackHub, StaticCircuitProvider};
use echalotte_core::{
    encode_message, EchalotteConfig, HostError, Inbound, OnionHost, PROTOCOL_ID,
};
use futures::channel::mpsc::UnboundedReceiver;
use futures::StreamExt;
use libp2p::identity::Keypair;
use libp2p::PeerId;
use std::sync::Arc;
use std::time::Duration;

struct Node {
    host: OnionHost,
    inbox: UnboundedReceiver<Delivery>,
}

impl Node {
    fn peer_id(&self) -> PeerId {
        self.host.local_peer_id()
    }

    async fn next_delivery(&mut self) -> Delivery {
        tokio::time::timeout(Duration::from_secs(1), self.inbox.next())
            .await
            .expect("timed out waiting for delivery")
            .expect("inbox closed")
    }
}

struct Network {
    sender: Node,
    relays: Vec<Node>,
    destination: Node,
}

async fn join(
    hub: &LoopbackHub,
    directory: &Arc<MemoryDirectory>,
    keypair: Keypair,
    circuit: &Circuit,
) -> Node {
    let (network, inbox) = hub.join(keypair);
    let host = OnionHost::connect(
        network,
        directory.clone(),
        Arc::new(StaticCircuitProvider::new(circuit.clone())),
        EchalotteConfig::default(),
    )
    .await
    .expect("host should connect");

    Node { host, inbox }
}

async fn setup(relay_count: usize) -> Network {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();

    let hub = LoopbackHub::new();
    let directory = Arc::new(MemoryDirectory::for_public_keys());

    let relay_keys: Vec<Keypair> = (0..relay_count).map(|_| Keypair::generate_ed25519()).collect();
    let circuit = Circuit::new(relay_keys.iter().map(|k| k.public().to_peer_id()).collect());

    let mut relays = Vec::new();
    for keypair in relay_keys {
        relays.push(join(&hub, &directory, keypair, &circuit).await);
    }
    let sender = join(&hub, &directory, Keypair::generate_ed25519(), &circuit).await;
    let destination = join(&hub, &directory, Keypair::generate_ed25519(), &circuit).await;

    Network {
        sender,
        relays,
        destination,
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[tokio::test]
async fn test_message_traverses_circuit() {
    let mut net = setup(3).await;
    let destination = net.destination.peer_id();
    let content = b"Hello through three relays".to_vec();

    let circuit = net
        .sender
        .host
        .send_message(&destination, content.clone())
        .await
        .unwrap();
    assert_eq!(circuit.len(), 3);

    let mut expected_next: Vec<PeerId> = net.relays.iter().skip(1).map(Node::peer_id).collect();
    expected_next.push(destination);

    for (relay, next_hop) in net.relays.iter_mut().zip(expected_next) {
        let delivery = relay.next_delivery().await;
        assert_eq!(delivery.protocol, PROTOCOL_ID);
        assert!(!contains(&delivery.payload, &content));

        let outcome = relay.host.handle_message(&delivery.payload).await.unwrap();
        assert_eq!(outcome, Inbound::Forwarded { next_hop });
    }

    let delivery = net.destination.next_delivery().await;
    let outcome = net
        .destination
        .host
        .handle_message(&delivery.payload)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Inbound::Delivered {
            from: net.sender.peer_id(),
            content,
        }
    );
}

#[tokio::test]
async fn test_first_relay_only_sees_next_relay() {
    let mut net = setup(2).await;
    let destination = net.destination.peer_id();

    net.sender
        .host
        .send_message(&destination, b"secret".to_vec())
        .await
        .unwrap();

    let delivery = net.relays[0].next_delivery().await;
    assert_eq!(delivery.from, net.sender.peer_id());
    assert!(!contains(&delivery.payload, &destination.to_bytes()));
    assert!(!contains(&delivery.payload, &net.relays[1].peer_id().to_bytes()));

    let outcome = net.relays[0]
        .host
        .handle_message(&delivery.payload)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Inbound::Forwarded {
            next_hop: net.relays[1].peer_id()
        }
    );

    // The forwarded layer reveals the destination only to the last relay.
    let delivery = net.relays[1].next_delivery().await;
    assert_eq!(delivery.from, net.relays[0].peer_id());
    assert!(!contains(&delivery.payload, &net.sender.peer_id().to_bytes()));
}

#[tokio::test]
async fn test_layer_rejected_by_wrong_relay() {
    let mut net = setup(2).await;
    let destination = net.destination.peer_id();

    net.sender
        .host
        .send_message(&destination, b"misrouted".to_vec())
        .await
        .unwrap();

    let delivery = net.relays[0].next_delivery().await;
    let result = net.relays[1].host.handle_message(&delivery.payload).await;
    assert!(matches!(
        result,
        Err(HostError::Onion(OnionError::InvalidRecipient))
    ));
}

#[tokio::test]
async fn test_tampered_layer_is_rejected() {
    let mut net = setup(1).await;
    let destination = net.destination.peer_id();

    net.sender
        .host
        .send_message(&destination, b"do not touch".to_vec())
        .await
        .unwrap();

    let mut payload = net.relays[0].next_delivery().await.payload;
    let last = payload.len() - 1;
    payload[last] ^= 0x01;

    let result = net.relays[0].host.handle_message(&payload).await;
    assert!(matches!(
        result,
        Err(HostError::Onion(OnionError::CouldNotDecrypt(_)))
    ));
}

#[tokio::test]
async fn test_forged_sender_is_rejected() {
    let net = setup(1).await;
    let destination = net.destination.peer_id();

    // Mallory claims to be the sender but signs with her own key.
    let mallory = Keypair::generate_ed25519();
    let forged = OnionMessage::new(&net.sender.peer_id(), &mallory, b"trust me".to_vec()).unwrap();

    let destination_key = net.sender.host.peer_encryption_key(&destination).await.unwrap();
    let layer = forged.encapsulate(&destination, &destination_key).unwrap();
    let bytes = encode_message(&layer, net.destination.host.config().max_message_size).unwrap();

    let result = net.destination.host.handle_message(&bytes).await;
    assert!(matches!(
        result,
        Err(HostError::Onion(OnionError::InvalidSender(_)))
    ));
}

#[tokio::test]
async fn test_send_to_unpublished_peer_fails() {
    let net = setup(1).await;

    let result = net
        .sender
        .host
        .send_message(&PeerId::random(), b"nobody home".to_vec())
        .await;
    assert!(matches!(result, Err(HostError::Directory(_))));
}
