//! Notifier integration tests

mod test_event_stream;
mod test_reconciler;
