//! The fixed topic table.

use serde::{Deserialize, Serialize};

/// MQTT delivery guarantee requested for a publish or subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QoS {
    /// At most once (0).
    AtMostOnce,
    /// At least once (1).
    AtLeastOnce,
    /// Exactly once (2).
    ExactlyOnce,
}

impl QoS {
    /// The numeric level used on the wire.
    pub fn level(&self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

/// Every topic the bridge knows about.
///
/// The mapping from topic to behaviour is static. A topic name that does
/// not map to a variant is ignored by the router, never treated as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// Published: `<temperature> <device id>`.
    SensorReading,
    /// Subscribed: text for the display.
    DisplayCommand,
    /// Subscribed: `ON` or anything else for the LED.
    LedCommand,
}

impl Topic {
    /// All topics.
    pub const ALL: [Topic; 3] = [Topic::SensorReading, Topic::DisplayCommand, Topic::LedCommand];

    /// Topics subscribed on every transition into the connected state, in
    /// the order they are subscribed.
    pub const SUBSCRIPTIONS: [Topic; 2] = [Topic::LedCommand, Topic::DisplayCommand];

    /// The topic name on the broker.
    pub fn name(&self) -> &'static str {
        match self {
            Topic::SensorReading => "sensors/temp",
            Topic::DisplayCommand => "peripherals/lcd_display",
            Topic::LedCommand => "peripherals/led0",
        }
    }

    /// Look up a topic by its exact name.
    pub fn from_name(name: &str) -> Option<Topic> {
        Topic::ALL.into_iter().find(|topic| topic.name() == name)
    }

    /// QoS used for this topic.
    pub fn qos(&self) -> QoS {
        QoS::AtLeastOnce
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
