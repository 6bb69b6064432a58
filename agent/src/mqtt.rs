use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, PoisonError},
    time::Duration,
};

use iota_common::{
    shadow::{client_token_of, GetRequest},
    AgentConfig, PayloadError, Rejection, ShadowSnapshot, ShadowTopic, ShadowTopics, TokenGenerator,
    UpdateDocument,
};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, Outgoing, QoS};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::channel::{ShadowChannel, ShadowError, ShadowEvent};

const MAX_SHADOW_PAYLOAD_BYTES: usize = 8 * 1024;
const EVENT_QUEUE_DEPTH: usize = 32;

#[derive(Debug)]
enum Reply {
    Accepted(Vec<u8>),
    Rejected(Rejection),
}

type PendingMap = Arc<StdMutex<HashMap<String, oneshot::Sender<Reply>>>>;

/// Removes its request from the pending map when the caller stops waiting,
/// including when an outer timeout drops the request future.
struct PendingGuard {
    pending: PendingMap,
    token: String,
}

impl PendingGuard {
    fn register(pending: &PendingMap, token: String, reply: oneshot::Sender<Reply>) -> Self {
        lock(pending).insert(token.clone(), reply);
        Self {
            pending: Arc::clone(pending),
            token,
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        lock(&self.pending).remove(&self.token);
    }
}

fn lock(pending: &PendingMap) -> std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<Reply>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shadow channel over the reserved `$aws/things/<thing>/shadow/*` topics.
pub struct MqttShadow {
    client: AsyncClient,
    topics: ShadowTopics,
    tokens: StdMutex<TokenGenerator>,
    pending: PendingMap,
}

/// Receiving half of a session: inbound events plus the network task.
pub struct ShadowSession {
    pub events: mpsc::Receiver<ShadowEvent>,
    pub network: JoinHandle<()>,
}

impl MqttShadow {
    pub fn connect(config: &AgentConfig) -> (Arc<Self>, ShadowSession) {
        let network = &config.network;
        let mut options = MqttOptions::new(config.client_id(), network.mqtt_host.clone(), network.mqtt_port);
        options.set_keep_alive(Duration::from_secs(network.keep_alive_secs));
        if !network.mqtt_user.is_empty() {
            options.set_credentials(network.mqtt_user.clone(), network.mqtt_pass.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, 64);
        let (events_tx, events) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let shadow = Arc::new(Self {
            client: client.clone(),
            topics: ShadowTopics::new(&config.thing_name),
            tokens: StdMutex::new(TokenGenerator::new(config.client_id())),
            pending: Arc::new(StdMutex::new(HashMap::new())),
        });

        let network = tokio::spawn(run_event_loop(
            eventloop,
            client,
            shadow.topics.clone(),
            Arc::clone(&shadow.pending),
            events_tx,
        ));

        (shadow, ShadowSession { events, network })
    }

    pub async fn disconnect(&self) {
        if let Err(err) = self.client.disconnect().await {
            warn!("mqtt disconnect failed: {err}");
        }
    }

    fn next_token(&self) -> String {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_token()
    }

    async fn request(&self, topic: &str, token: String, body: Vec<u8>) -> Result<Vec<u8>, ShadowError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _guard = PendingGuard::register(&self.pending, token, reply_tx);

        self.client
            .publish(topic, QoS::AtLeastOnce, false, body)
            .await
            .map_err(|err| ShadowError::Transport(err.to_string()))?;

        match reply_rx.await {
            Ok(Reply::Accepted(payload)) => Ok(payload),
            Ok(Reply::Rejected(rejection)) => Err(ShadowError::Rejected {
                code: rejection.code,
                message: rejection.message,
            }),
            Err(_) => Err(ShadowError::Closed),
        }
    }
}

impl ShadowChannel for MqttShadow {
    async fn update(&self, document: UpdateDocument) -> Result<(), ShadowError> {
        let token = self.next_token();
        let body = document.with_client_token(token.clone()).to_vec()?;
        self.request(&self.topics.update, token, body).await?;
        Ok(())
    }

    async fn get(&self) -> Result<ShadowSnapshot, ShadowError> {
        let token = self.next_token();
        let body = serde_json::to_vec(&GetRequest {
            client_token: token.clone(),
        })
        .map_err(PayloadError::from)?;
        let payload = self.request(&self.topics.get, token, body).await?;
        Ok(ShadowSnapshot::parse(&payload)?)
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topics: ShadowTopics,
    pending: PendingMap,
    events: mpsc::Sender<ShadowEvent>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                info!("mqtt connected");
                for topic in topics.subscriptions() {
                    if let Err(err) = client.try_subscribe(topic, QoS::AtLeastOnce) {
                        warn!("failed to subscribe to {topic}: {err}");
                    }
                }
                if events.send(ShadowEvent::Connected).await.is_err() {
                    debug!("no listener for connection events");
                }
            }
            Ok(Event::Incoming(Incoming::Publish(message))) => {
                route_publish(&topics, &pending, &events, &message.topic, &message.payload).await;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("mqtt disconnected");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!("mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

async fn route_publish(
    topics: &ShadowTopics,
    pending: &PendingMap,
    events: &mpsc::Sender<ShadowEvent>,
    topic: &str,
    payload: &[u8],
) {
    if payload.len() > MAX_SHADOW_PAYLOAD_BYTES {
        warn!("dropping oversized payload on {topic} ({} bytes)", payload.len());
        return;
    }

    let Some(kind) = topics.classify(topic) else {
        debug!("ignoring publish on unexpected topic {topic}");
        return;
    };
    debug!("{topic}: {}", pretty(payload));

    match kind {
        ShadowTopic::UpdateDelta => {
            if events.send(ShadowEvent::Delta(payload.to_vec())).await.is_err() {
                debug!("no listener for delta notifications");
            }
        }
        ShadowTopic::UpdateAccepted | ShadowTopic::GetAccepted => {
            if let Some(token) = client_token_of(payload) {
                resolve(pending, &token, Reply::Accepted(payload.to_vec()));
            }
        }
        ShadowTopic::UpdateRejected | ShadowTopic::GetRejected => match Rejection::parse(payload) {
            Ok(rejection) => {
                if let Some(token) = rejection.client_token.clone() {
                    resolve(pending, &token, Reply::Rejected(rejection));
                }
            }
            Err(err) => warn!("unreadable rejection on {topic}: {err}"),
        },
    }
}

fn resolve(pending: &PendingMap, token: &str, reply: Reply) {
    match lock(pending).remove(token) {
        Some(waiter) => {
            let _ = waiter.send(reply);
        }
        None => debug!("response for unknown or expired token {token}"),
    }
}

fn pretty(payload: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(payload)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| String::from_utf8_lossy(payload).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> PendingMap {
        Arc::new(StdMutex::new(HashMap::new()))
    }

    #[tokio::test]
    async fn delta_publish_is_forwarded() {
        let topics = ShadowTopics::new("iota");
        let (events_tx, mut events_rx) = mpsc::channel(4);
        let body = br#"{"state":{"outlet1":"on"}}"#;

        route_publish(&topics, &pending(), &events_tx, &topics.update_delta, body).await;

        assert_eq!(events_rx.recv().await, Some(ShadowEvent::Delta(body.to_vec())));
    }

    #[tokio::test]
    async fn accepted_response_resolves_matching_token() {
        let topics = ShadowTopics::new("iota");
        let pending = pending();
        let (events_tx, _events_rx) = mpsc::channel(4);
        let (reply_tx, reply_rx) = oneshot::channel();
        let _guard = PendingGuard::register(&pending, "iota-1".to_string(), reply_tx);

        let body = br#"{"state":{"reported":{"outlet1":"on"}},"clientToken":"iota-1"}"#;
        route_publish(&topics, &pending, &events_tx, &topics.update_accepted, body).await;

        assert!(matches!(reply_rx.await, Ok(Reply::Accepted(payload)) if payload == body.to_vec()));
        assert!(lock(&pending).is_empty());
    }

    #[tokio::test]
    async fn rejected_response_carries_code() {
        let topics = ShadowTopics::new("iota");
        let pending = pending();
        let (events_tx, _events_rx) = mpsc::channel(4);
        let (reply_tx, reply_rx) = oneshot::channel();
        let _guard = PendingGuard::register(&pending, "iota-2".to_string(), reply_tx);

        let body = br#"{"code":404,"message":"No shadow exists with name: 'iota'","clientToken":"iota-2"}"#;
        route_publish(&topics, &pending, &events_tx, &topics.get_rejected, body).await;

        assert!(matches!(reply_rx.await, Ok(Reply::Rejected(rejection)) if rejection.code == 404));
    }

    #[tokio::test]
    async fn oversized_payload_is_dropped() {
        let topics = ShadowTopics::new("iota");
        let (events_tx, mut events_rx) = mpsc::channel(4);
        let body = vec![b' '; MAX_SHADOW_PAYLOAD_BYTES + 1];

        route_publish(&topics, &pending(), &events_tx, &topics.update_delta, &body).await;
        drop(events_tx);

        assert_eq!(events_rx.recv().await, None);
    }

    #[test]
    fn guard_clears_abandoned_request() {
        let pending = pending();
        let (reply_tx, _reply_rx) = oneshot::channel();
        let guard = PendingGuard::register(&pending, "iota-3".to_string(), reply_tx);
        assert_eq!(lock(&pending).len(), 1);

        drop(guard);
        assert!(lock(&pending).is_empty());
    }
}
