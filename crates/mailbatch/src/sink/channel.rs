//! In-process sink backed by a bounded tokio channel.

use async_trait::async_trait;
use log::debug;
use tokio::sync::mpsc;

use crate::mailbox::MailboxRef;
use crate::partition::BatchWindow;
use crate::worker::WindowJob;

use super::{EnqueueReceipt, QueueSink, SinkError, SinkProvider};

/// Sink that forwards windows to an async consumer over an mpsc channel.
///
/// `enqueue` waits for channel capacity, never for the consumer to finish.
#[derive(Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<WindowJob>,
    mailbox: MailboxRef,
}

impl ChannelSink {
    /// Creates a sink and the receiving half of its queue.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(mailbox: MailboxRef, capacity: usize) -> (Self, mpsc::Receiver<WindowJob>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender, mailbox }, receiver)
    }

    /// Binds another sink to the same queue under a different mailbox identity.
    pub fn rebind(&self, mailbox: MailboxRef) -> Self {
        Self {
            sender: self.sender.clone(),
            mailbox,
        }
    }

    pub fn mailbox(&self) -> &MailboxRef {
        &self.mailbox
    }
}

#[async_trait]
impl QueueSink for ChannelSink {
    async fn enqueue(&self, window: BatchWindow) -> Result<EnqueueReceipt, SinkError> {
        let job = WindowJob::new(self.mailbox.clone(), window);
        let receipt = EnqueueReceipt::new(job.id.clone(), job.page_index());

        self.sender
            .send(job)
            .await
            .map_err(|_| SinkError::Closed)?;

        debug!(
            "Queued page {} for {} as job {}",
            receipt.page_index, self.mailbox, receipt.job_id
        );
        Ok(receipt)
    }
}

/// Every cycle's windows land on the same queue, tagged with that cycle's mailbox.
impl SinkProvider for ChannelSink {
    fn sink_for(&self, mailbox: &MailboxRef) -> Box<dyn QueueSink> {
        Box::new(self.rebind(mailbox.clone()))
    }
}
