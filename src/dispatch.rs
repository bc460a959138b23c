//! Notification dispatcher: a consumer loop that classifies incoming
//! notifications by info-type and emits structured events.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::protocol::{split_function_byte, Button, Function, Gateway, InfoType, Notification};
use crate::STATE_LEN;

/// Structured event derived from one notification.
#[derive(Debug, Clone)]
pub enum Event {
    /// A transmitter button went down (or is being held).
    ButtonPressed {
        serial: Bytes,
        button: Button,
        /// Raw function bits from the function byte.
        function: u8,
    },
    ButtonReleased {
        serial: Bytes,
        button: Button,
    },
    LowBattery {
        serial: Bytes,
    },
    Sensor {
        serial: Bytes,
        data: Bytes,
    },
    StateChanged {
        serial: Bytes,
        mode: u8,
        state: [u8; STATE_LEN],
    },
    Learn {
        serial: Bytes,
        phase: LearnPhase,
    },
    /// Info-type outside the known set; raw bytes preserved.
    Unhandled {
        serial: Bytes,
        info_type: u8,
        additional: Bytes,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnPhase {
    Started,
    Completed,
    Failed,
}

/// Consumes notifications from a [`Gateway`] and emits [`Event`]s on a
/// channel.
pub struct Dispatcher {
    gateway: Arc<Gateway>,
    events: mpsc::UnboundedSender<Event>,
}

impl Dispatcher {
    pub fn new(gateway: Arc<Gateway>) -> (Dispatcher, mpsc::UnboundedReceiver<Event>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Dispatcher { gateway, events }, rx)
    }

    /// Runs until `cancel` fires (clean exit), the event receiver is
    /// dropped (clean exit), or the transport dies (error).
    ///
    /// Undecodable notifications and non-success statuses are reported via
    /// `log` and the loop continues.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            match self.gateway.receive_notification(cancel).await {
                Ok(n) => {
                    if !n.status.is_success() {
                        log::debug!("notification request ended with {:?}", n.status);
                        continue;
                    }
                    match classify(&n) {
                        Some(event) => {
                            if self.events.send(event).is_err() {
                                return Ok(());
                            }
                        }
                        None => log::warn!("notification with truncated payload dropped"),
                    }
                }
                Err(Error::Canceled) => return Ok(()),
                Err(Error::MalformedResponse(what)) => {
                    log::warn!("undecodable notification dropped: {what}");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Maps a successful full notification onto an event. `None` when the
/// additional data is too short for its info-type.
fn classify(n: &Notification) -> Option<Event> {
    let serial = n.serial.clone();
    Some(match n.info() {
        Some(InfoType::PushAndHold) => {
            let (button, function) = split_function_byte(*n.additional.first()?);
            if function == Function::LowBattery as u8 {
                Event::LowBattery { serial }
            } else {
                Event::ButtonPressed { serial, button, function }
            }
        }
        Some(InfoType::Release) => Event::ButtonReleased {
            serial,
            button: Button::from_bits(*n.additional.first()?),
        },
        Some(InfoType::Sensor) => Event::Sensor {
            serial,
            data: n.additional.clone(),
        },
        Some(InfoType::StateChange) => Event::StateChanged {
            serial,
            mode: *n.additional.first()?,
            state: n.additional.get(1..1 + STATE_LEN)?.try_into().ok()?,
        },
        Some(InfoType::LearnStart) => Event::Learn { serial, phase: LearnPhase::Started },
        Some(InfoType::LearnComplete) => Event::Learn { serial, phase: LearnPhase::Completed },
        Some(InfoType::LearnFail) => Event::Learn { serial, phase: LearnPhase::Failed },
        None => Event::Unhandled {
            serial,
            info_type: n.info_type,
            additional: n.additional.clone(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Status;

    fn notification(info_type: u8, additional: &[u8]) -> Notification {
        Notification {
            handle: 0,
            status: Status::Success,
            info_type,
            serial: Bytes::from_static(&[0xab; 16]),
            additional: Bytes::copy_from_slice(additional),
        }
    }

    #[test]
    fn push_and_hold_decodes_button_and_function() {
        let n = notification(0x01, &[0x15, 0, 0, 0, 0, 0, 0, 0]);
        match classify(&n) {
            Some(Event::ButtonPressed { button, function, .. }) => {
                assert_eq!(button, Button::B);
                assert_eq!(function, Function::EmulatedHold as u8);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn low_battery_function_is_its_own_event() {
        let raw = crate::function_byte(Button::C, Function::LowBattery);
        let n = notification(0x01, &[raw, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(classify(&n), Some(Event::LowBattery { .. })));
    }

    #[test]
    fn state_change_splits_mode_and_state() {
        let n = notification(0x03, &[0x02, 1, 2, 3, 4, 0, 0, 0]);
        match classify(&n) {
            Some(Event::StateChanged { mode, state, .. }) => {
                assert_eq!(mode, 0x02);
                assert_eq!(state, [1, 2, 3, 4]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_info_type_is_unhandled() {
        let n = notification(0x7f, &[0; 8]);
        match classify(&n) {
            Some(Event::Unhandled { info_type, .. }) => assert_eq!(info_type, 0x7f),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn truncated_additional_is_rejected() {
        let n = notification(0x01, &[]);
        assert!(classify(&n).is_none());
    }
}
