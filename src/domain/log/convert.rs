//! Wire → domain conversions.

use super::wire::{InboundMessage, WireEntry, WireMessage};
use super::LogEntry;

impl From<WireEntry> for LogEntry {
    fn from(w: WireEntry) -> Self {
        LogEntry {
            time: w.time,
            accumulated_value: w.accumulated_value,
        }
    }
}

impl From<WireMessage> for InboundMessage {
    fn from(msg: WireMessage) -> Self {
        match msg {
            WireMessage::Log(entries) => {
                InboundMessage::Snapshot(entries.into_iter().map(LogEntry::from).collect())
            }
            WireMessage::Wrapped(wrapped) => {
                InboundMessage::Snapshot(wrapped.log.into_iter().map(LogEntry::from).collect())
            }
            WireMessage::Entry(entry) => InboundMessage::Entry(entry.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_and_bare_convert_identically() {
        let entries = vec![
            WireEntry { time: 3, accumulated_value: 1.0 },
            WireEntry { time: 1, accumulated_value: 0.5 },
        ];
        let bare = InboundMessage::from(WireMessage::Log(entries.clone()));
        let wrapped = InboundMessage::from(WireMessage::Wrapped(super::super::wire::WrappedLog {
            log: entries,
        }));
        assert_eq!(bare, wrapped);
    }

    #[test]
    fn test_entry_preserves_values() {
        let entry = LogEntry::from(WireEntry { time: 7, accumulated_value: 3.25 });
        assert_eq!(entry, LogEntry::new(7, 3.25));
    }
}
