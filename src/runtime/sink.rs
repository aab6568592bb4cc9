//! Annotation sinks
//!
//! The decoder hands every annotation to an [`AnnotationSink`] as soon as it
//! is produced.

use crate::nodes::decoders::Annotation;
use crate::{IcpError, Result};
use crossbeam_channel::{Receiver as CrossbeamReceiver, Sender as CrossbeamSender, bounded, unbounded};

/// Consumer of decoded annotations
pub trait AnnotationSink {
    fn put(&mut self, annotation: Annotation) -> Result<()>;
}

impl AnnotationSink for Vec<Annotation> {
    fn put(&mut self, annotation: Annotation) -> Result<()> {
        self.push(annotation);
        Ok(())
    }
}

impl<K: AnnotationSink + ?Sized> AnnotationSink for &mut K {
    fn put(&mut self, annotation: Annotation) -> Result<()> {
        (**self).put(annotation)
    }
}

/// Sink that forwards annotations over a crossbeam channel
///
/// Dropping the receiving side makes the next `put` fail with
/// [`IcpError::SinkClosed`], which stops the decoder.
#[derive(Clone)]
pub struct ChannelSink {
    sender: CrossbeamSender<Annotation>,
}

impl ChannelSink {
    pub fn new(sender: CrossbeamSender<Annotation>) -> Self {
        Self { sender }
    }

    /// Create a channel; `None` makes it unbounded
    pub fn channel(buffer_size: Option<usize>) -> (Self, CrossbeamReceiver<Annotation>) {
        let (tx, rx) = match buffer_size {
            Some(size) => bounded(size),
            None => unbounded(),
        };
        (Self::new(tx), rx)
    }
}

impl AnnotationSink for ChannelSink {
    fn put(&mut self, annotation: Annotation) -> Result<()> {
        self.sender
            .send(annotation)
            .map_err(|_| IcpError::SinkClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::decoders::AnnotationClass;

    #[test]
    fn test_vec_sink_collects() {
        let mut sink: Vec<Annotation> = Vec::new();
        sink.put(Annotation::new(0, 8, AnnotationClass::TdiData, ["@12"]))
            .unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].text(), "@12");
    }

    #[test]
    fn test_channel_sink_forwards() {
        let (mut sink, rx) = ChannelSink::channel(Some(2));
        sink.put(Annotation::new(3, 3, AnnotationClass::Sync, ["SYNC", "S"]))
            .unwrap();
        let received = rx.recv().unwrap();
        assert_eq!(received.class, AnnotationClass::Sync);
        assert_eq!(received.start, 3);
    }

    #[test]
    fn test_channel_sink_closed() {
        let (mut sink, rx) = ChannelSink::channel(None);
        drop(rx);
        let result = sink.put(Annotation::new(0, 0, AnnotationClass::Sync, ["SYNC"]));
        assert!(matches!(result, Err(IcpError::SinkClosed)));
    }
}
