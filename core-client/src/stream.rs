//! Client side of the NDJSON sync stream.
//!
//! [`StreamConsumer`] turns body chunks into [`SyncEvent`]s, keeps the
//! [`RealTimeStats`] of the run and settles on exactly one [`SyncResult`]:
//! the server's terminal `result`, or a failure when the stream ends without
//! one.

use core_sync::{messages, LineDecoder, RealTimeStats, SyncEvent, SyncResult};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct StreamConsumer {
    decoder: LineDecoder,
    stats: RealTimeStats,
    total: Option<u64>,
    result: Option<SyncResult>,
    malformed: u64,
}

impl StreamConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> RealTimeStats {
        self.stats
    }

    /// Row count declared by the server's `start`.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Lines that could not be decoded and were skipped.
    pub fn malformed_lines(&self) -> u64 {
        self.malformed
    }

    pub fn is_settled(&self) -> bool {
        self.result.is_some()
    }

    /// Feed one body chunk and return the events it completed.
    ///
    /// Nothing is returned once the terminal `result` has been seen.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SyncEvent> {
        let decoded = self.decoder.push(chunk);
        let mut events = Vec::with_capacity(decoded.len());
        for item in decoded {
            match item {
                Ok(event) => {
                    if let Some(event) = self.accept(event) {
                        events.push(event);
                    }
                }
                Err(e) => {
                    self.malformed += 1;
                    warn!(error = %e, "Skipping malformed sync event");
                }
            }
        }
        events
    }

    fn accept(&mut self, event: SyncEvent) -> Option<SyncEvent> {
        if self.result.is_some() {
            debug!(kind = event.kind(), "Ignoring event after result");
            return None;
        }
        match &event {
            SyncEvent::Start { total } => {
                self.stats.reset();
                self.total = Some(*total);
            }
            SyncEvent::Progress { .. } => {
                self.stats.absorb(&event);
            }
            SyncEvent::Result(result) => {
                self.result = Some(result.clone());
            }
            _ => {}
        }
        Some(event)
    }

    /// Close the stream and return the run's outcome.
    pub fn finish(mut self) -> (SyncResult, Vec<SyncEvent>) {
        let mut events = Vec::new();
        match self.decoder.finish() {
            Some(Ok(event)) => {
                if let Some(event) = self.accept(event) {
                    events.push(event);
                }
            }
            Some(Err(e)) => {
                self.malformed += 1;
                warn!(error = %e, "Skipping malformed trailing sync event");
            }
            None => {}
        }

        let result = self.result.unwrap_or_else(|| {
            warn!(
                processed = self.stats.processed,
                "Sync stream ended without a result"
            );
            SyncResult::failure(messages::RESULT_MISSING)
        });
        (result, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_sync::encode_event;
    use core_sync::SyncDetails;

    fn line(event: &SyncEvent) -> Vec<u8> {
        encode_event(event).unwrap().to_vec()
    }

    fn progress(processed: u64) -> SyncEvent {
        SyncEvent::Progress {
            processed,
            inserted: processed,
            updated: 0,
            errors: 0,
            total: 20,
        }
    }

    #[test]
    fn test_stream_without_result_is_failure() {
        let mut consumer = StreamConsumer::new();
        consumer.push(&line(&SyncEvent::Start { total: 20 }));
        consumer.push(&line(&progress(10)));

        let (result, _) = consumer.finish();
        assert!(!result.success);
        assert_eq!(result.message, messages::RESULT_MISSING);
    }

    #[test]
    fn test_stats_follow_progress() {
        let mut consumer = StreamConsumer::new();
        let mut body = line(&SyncEvent::Start { total: 20 });
        body.extend(line(&progress(10)));
        body.extend(line(&progress(20)));

        // Split mid-line.
        let (a, b) = body.split_at(body.len() / 2 + 3);
        let mut events = consumer.push(a);
        events.extend(consumer.push(b));

        assert_eq!(events.len(), 3);
        assert_eq!(consumer.total(), Some(20));
        assert_eq!(consumer.stats().processed, 20);
    }

    #[test]
    fn test_events_after_result_are_dropped() {
        let details = SyncDetails {
            inserted: 1,
            processed: 1,
            total: 1,
            ..SyncDetails::default()
        };
        let mut body = line(&SyncEvent::Result(SyncResult::completed("ok", details)));
        body.extend(line(&SyncEvent::info("late")));

        let mut consumer = StreamConsumer::new();
        let events = consumer.push(&body);
        assert_eq!(events.len(), 1);

        let (result, trailing) = consumer.finish();
        assert!(result.success);
        assert!(trailing.is_empty());
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let mut body = b"{oops}\n".to_vec();
        body.extend(line(&SyncEvent::info("hello")));

        let mut consumer = StreamConsumer::new();
        let events = consumer.push(&body);
        assert_eq!(events, vec![SyncEvent::info("hello")]);
        assert_eq!(consumer.malformed_lines(), 1);
    }

    #[test]
    fn test_unterminated_result_is_accepted_on_finish() {
        let mut body = line(&SyncEvent::Result(SyncResult::failure("boom")));
        body.pop();

        let mut consumer = StreamConsumer::new();
        assert!(consumer.push(&body).is_empty());

        let (result, trailing) = consumer.finish();
        assert_eq!(result.message, "boom");
        assert_eq!(trailing.len(), 1);
    }
}
