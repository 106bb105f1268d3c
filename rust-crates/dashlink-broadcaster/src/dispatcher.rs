//! Inbound request routing
//!
//! Client messages are decoded into a typed [`Request`] and applied to the
//! state store, the event bus or the mode controller. Malformed messages
//! are logged and dropped; nothing is ever sent back as an error.

use std::sync::Arc;

use dashlink_state::{EventBus, Mode, ModeController, StateEvent, StateStore};
use tracing::{debug, info, warn};

use crate::broadcaster::{DashboardBroadcaster, SELECTED_AUTO_KEY};
use crate::error::ProtocolError;
use crate::wire::WireMessage;

const AUTO_ORIGIN_KEY: &str = "ips_auto_origin";
const AUTO_DESTINATION_KEY: &str = "ips_auto_destination";
const AUTO_ACTION_KEY: &str = "ips_auto_action";

/// A single value override sent by a dashboard
#[derive(Debug, Clone, PartialEq)]
pub enum ValueChange {
    Numeric { name: String, value: f64 },
    Boolean { name: String, value: bool },
    /// Accepted but never applied
    Text { name: String },
    Vector { name: String, selected: String, value: f64 },
}

impl ValueChange {
    fn parse(message: &WireMessage) -> Result<Self, ProtocolError> {
        let kind = message.require("type")?;
        let name = message.require("name")?.to_string();

        match kind {
            "numeric" => Ok(ValueChange::Numeric {
                name,
                value: parse_number(message, "value")?,
            }),
            "boolean" => Ok(ValueChange::Boolean {
                name,
                value: message.require("value")?.eq_ignore_ascii_case("true"),
            }),
            "string" => Ok(ValueChange::Text { name }),
            "vector" => Ok(ValueChange::Vector {
                name,
                selected: message.require("selected")?.to_string(),
                value: parse_number(message, "value")?,
            }),
            other => Err(ProtocolError::UnknownValueType(other.to_string())),
        }
    }
}

fn parse_number(message: &WireMessage, field: &'static str) -> Result<f64, ProtocolError> {
    let raw = message.require(field)?;
    raw.trim().parse().map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

/// Client-to-server command
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    AllValues,
    AllMatchValues,
    ChangeValue(ValueChange),
    GetAutoData,
    SetAutoData {
        origin: String,
        destination: String,
        action: String,
    },
    SetFmsMode(Mode),
}

impl Request {
    pub fn parse(message: &WireMessage) -> Result<Self, ProtocolError> {
        let request = message.get("request").ok_or(ProtocolError::MissingRequest)?;

        match request {
            "all_values" => Ok(Request::AllValues),
            "all_match_values" => Ok(Request::AllMatchValues),
            "change_value" => Ok(Request::ChangeValue(ValueChange::parse(message)?)),
            "get_auto_data" => Ok(Request::GetAutoData),
            "set_auto_data" => Ok(Request::SetAutoData {
                origin: message.require("auto_origin")?.to_string(),
                destination: message.require("auto_destination")?.to_string(),
                action: message.require("auto_action")?.to_string(),
            }),
            "set_fms_mode" => {
                let mode = message.require("mode")?;
                let mode = mode
                    .parse::<Mode>()
                    .map_err(|_| ProtocolError::UnknownMode(mode.to_string()))?;
                Ok(Request::SetFmsMode(mode))
            }
            other => Err(ProtocolError::UnknownRequest(other.to_string())),
        }
    }
}

/// Routes decoded requests to their collaborators
pub struct RequestDispatcher {
    broadcaster: Arc<DashboardBroadcaster>,
    bus: Arc<dyn EventBus>,
    modes: Arc<dyn ModeController>,
}

impl RequestDispatcher {
    pub fn new(
        broadcaster: Arc<DashboardBroadcaster>,
        bus: Arc<dyn EventBus>,
        modes: Arc<dyn ModeController>,
    ) -> Self {
        Self {
            broadcaster,
            bus,
            modes,
        }
    }

    fn store(&self) -> &dyn StateStore {
        self.broadcaster.store().as_ref()
    }

    /// Handle one raw text frame. Protocol errors are logged and dropped.
    pub async fn handle(&self, raw: &str) {
        debug!("Received message: {}", raw);

        let message = WireMessage::decode(raw);
        let result = match Request::parse(&message) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!("Dropped dashboard message: {}", e);
            debug!("Dropped message detail: {:?}", e);
        }
    }

    pub async fn dispatch(&self, request: Request) -> Result<(), ProtocolError> {
        match request {
            Request::AllValues => self.broadcaster.clear_values_cache().await,
            Request::AllMatchValues => self.broadcaster.clear_match_cache().await,
            Request::ChangeValue(change) => self.change_value(change)?,
            Request::GetAutoData => self.broadcaster.send_auto_data().await,
            Request::SetAutoData {
                origin,
                destination,
                action,
            } => {
                let store = self.store();
                store.set_string(AUTO_ORIGIN_KEY, &origin);
                store.set_string(AUTO_DESTINATION_KEY, &destination);
                store.set_string(AUTO_ACTION_KEY, &action);

                let selected = format!("{}, {}, {}", origin, destination, action);
                info!("Selected auto: {}", selected);
                store.set_string(SELECTED_AUTO_KEY, &selected);
            }
            Request::SetFmsMode(mode) => self.modes.set_mode(mode),
        }
        Ok(())
    }

    fn change_value(&self, change: ValueChange) -> Result<(), ProtocolError> {
        let event = match change {
            ValueChange::Numeric { name, value } => StateEvent::NumericSet { name, value },
            ValueChange::Boolean { name, value } => StateEvent::BooleanSet { name, value },
            ValueChange::Text { name } => {
                debug!("Ignoring string change for {}", name);
                return Ok(());
            }
            ValueChange::Vector {
                name,
                selected,
                value,
            } => {
                let mut vector = self
                    .store()
                    .get_vector(&name)
                    .ok_or_else(|| ProtocolError::UnknownVector(name.clone()))?;
                vector.insert(selected, value);
                StateEvent::VectorSet { name, value: vector }
            }
        };

        self.bus.publish(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::registry::ConnectionRegistry;
    use crate::settings::DashboardSettings;
    use dashlink_state::{ChannelEventBus, InMemoryStore, SharedModeController, Vector};

    struct Fixture {
        dispatcher: RequestDispatcher,
        broadcaster: Arc<DashboardBroadcaster>,
        store: Arc<InMemoryStore>,
        bus: Arc<ChannelEventBus>,
        modes: Arc<SharedModeController>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let bus = Arc::new(ChannelEventBus::new());
        let modes = Arc::new(SharedModeController::default());
        let broadcaster = Arc::new(DashboardBroadcaster::new(
            Arc::new(ConnectionRegistry::new()),
            store.clone(),
            DashboardSettings::default(),
            Duration::from_millis(250),
        ));
        let dispatcher = RequestDispatcher::new(broadcaster.clone(), bus.clone(), modes.clone());

        Fixture {
            dispatcher,
            broadcaster,
            store,
            bus,
            modes,
        }
    }

    fn parse(raw: &str) -> Result<Request, ProtocolError> {
        Request::parse(&WireMessage::decode(raw))
    }

    #[test]
    fn test_parse_requests() {
        assert_eq!(parse("request=all_values"), Ok(Request::AllValues));
        assert_eq!(parse("request=all_match_values"), Ok(Request::AllMatchValues));
        assert_eq!(parse("request=get_auto_data"), Ok(Request::GetAutoData));
        assert_eq!(
            parse("request=set_fms_mode&mode=teleop"),
            Ok(Request::SetFmsMode(Mode::Teleop))
        );
        assert_eq!(
            parse("request=change_value&type=numeric&name=speed&value=2.5"),
            Ok(Request::ChangeValue(ValueChange::Numeric {
                name: "speed".to_string(),
                value: 2.5
            }))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("type=numeric"), Err(ProtocolError::MissingRequest));
        assert_eq!(
            parse("request=reboot"),
            Err(ProtocolError::UnknownRequest("reboot".to_string()))
        );
        assert_eq!(
            parse("request=change_value&name=speed"),
            Err(ProtocolError::MissingField("type"))
        );
        assert_eq!(
            parse("request=change_value&type=numeric&name=speed&value=fast"),
            Err(ProtocolError::InvalidNumber {
                field: "value",
                value: "fast".to_string()
            })
        );
        assert_eq!(
            parse("request=change_value&type=color&name=led"),
            Err(ProtocolError::UnknownValueType("color".to_string()))
        );
        assert_eq!(
            parse("request=set_fms_mode&mode=turbo"),
            Err(ProtocolError::UnknownMode("turbo".to_string()))
        );
    }

    #[test]
    fn test_boolean_parsing_is_lenient() {
        let value = |raw: &str| match parse(raw) {
            Ok(Request::ChangeValue(ValueChange::Boolean { value, .. })) => value,
            other => panic!("unexpected {:?}", other),
        };
        assert!(value("request=change_value&type=boolean&name=armed&value=TRUE"));
        assert!(!value("request=change_value&type=boolean&name=armed&value=yes"));
    }

    #[tokio::test]
    async fn test_numeric_change_publishes_event() {
        let f = fixture();
        let mut rx = f.bus.subscribe();

        f.dispatcher
            .handle("request=change_value&type=numeric&name=speed&value=2.5")
            .await;

        assert_eq!(
            rx.try_recv().unwrap(),
            StateEvent::NumericSet {
                name: "speed".to_string(),
                value: 2.5
            }
        );
    }

    #[tokio::test]
    async fn test_vector_change_merges_selected_component() {
        let f = fixture();
        let mut vector = Vector::new();
        vector.insert("a".to_string(), 1.0);
        vector.insert("b".to_string(), 2.0);
        f.store.set_vector("v", vector);
        let mut rx = f.bus.subscribe();

        f.dispatcher
            .handle("request=change_value&type=vector&name=v&selected=a&value=5")
            .await;

        let mut expected = Vector::new();
        expected.insert("a".to_string(), 5.0);
        expected.insert("b".to_string(), 2.0);
        assert_eq!(
            rx.try_recv().unwrap(),
            StateEvent::VectorSet {
                name: "v".to_string(),
                value: expected
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_vector_publishes_nothing() {
        let f = fixture();
        let mut rx = f.bus.subscribe();

        let change = ValueChange::Vector {
            name: "missing".to_string(),
            selected: "x".to_string(),
            value: 1.0,
        };
        assert_eq!(
            f.dispatcher.dispatch(Request::ChangeValue(change)).await,
            Err(ProtocolError::UnknownVector("missing".to_string()))
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_string_change_is_noop() {
        let f = fixture();
        let mut rx = f.bus.subscribe();

        f.dispatcher
            .handle("request=change_value&type=string&name=label&value=hi")
            .await;

        assert!(rx.try_recv().is_err());
        assert_eq!(f.store.get_string("label"), None);
    }

    #[tokio::test]
    async fn test_set_auto_data() {
        let f = fixture();
        f.dispatcher
            .handle("request=set_auto_data&auto_origin=Left&auto_destination=Scale&auto_action=Score")
            .await;

        assert_eq!(f.store.get_string("ips_auto_origin").as_deref(), Some("Left"));
        assert_eq!(f.store.get_string("ips_auto_destination").as_deref(), Some("Scale"));
        assert_eq!(f.store.get_string("ips_auto_action").as_deref(), Some("Score"));
        assert_eq!(
            f.store.get_string(SELECTED_AUTO_KEY).as_deref(),
            Some("Left, Scale, Score")
        );
    }

    #[tokio::test]
    async fn test_set_fms_mode() {
        let f = fixture();
        f.dispatcher.handle("request=set_fms_mode&mode=auto").await;
        assert_eq!(f.modes.mode(), Mode::Autonomous);

        // Unknown mode leaves the controller untouched
        f.dispatcher.handle("request=set_fms_mode&mode=warp").await;
        assert_eq!(f.modes.mode(), Mode::Autonomous);
    }

    #[tokio::test]
    async fn test_malformed_messages_are_dropped() {
        let f = fixture();
        f.dispatcher.handle("").await;
        f.dispatcher.handle("garbage").await;
        f.dispatcher.handle("request=unknown&x=1").await;
        assert_eq!(f.broadcaster.registry().connection_count().await, 0);
    }
}
