//! In-memory collaborators for the coordinator and dispatcher.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mailbatch::partition::{BatchWindow, IdentifierSet, MessageId};
use mailbatch::sink::{EnqueueReceipt, QueueSink, SinkError, SinkProvider};
use mailbatch::source::{IdentifierSource, MailboxSnapshot, SourceError, SourceQuery};
use mailbatch::MailboxRef;

/// Sink that accepts every window except the listed pages and remembers what it saw.
#[derive(Default)]
pub struct RecordingSink {
    reject_pages: Mutex<HashSet<usize>>,
    accepted: Mutex<Vec<(Option<MailboxRef>, BatchWindow)>>,
    offered: Mutex<Vec<usize>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(pages: &[usize]) -> Self {
        let sink = Self::default();
        sink.reject_pages.lock().unwrap().extend(pages.iter().copied());
        sink
    }

    /// Lets previously rejected pages through from now on.
    pub fn accept_all(&self) {
        self.reject_pages.lock().unwrap().clear();
    }

    pub fn accepted_windows(&self) -> Vec<BatchWindow> {
        let mut windows: Vec<BatchWindow> = self
            .accepted
            .lock()
            .unwrap()
            .iter()
            .map(|(_, w)| w.clone())
            .collect();
        windows.sort_by_key(|w| w.page_index);
        windows
    }

    pub fn accepted_pages(&self) -> Vec<usize> {
        self.accepted_windows().iter().map(|w| w.page_index).collect()
    }

    pub fn accepted_ids(&self) -> Vec<MessageId> {
        self.accepted_windows()
            .into_iter()
            .flat_map(|w| w.member_ids)
            .collect()
    }

    pub fn mailboxes(&self) -> Vec<MailboxRef> {
        self.accepted
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(m, _)| m.clone())
            .collect()
    }

    pub fn offer_count(&self) -> usize {
        self.offered.lock().unwrap().len()
    }

    fn record(&self, mailbox: Option<MailboxRef>, window: BatchWindow) -> Result<EnqueueReceipt, SinkError> {
        let page_index = window.page_index;
        self.offered.lock().unwrap().push(page_index);

        if self.reject_pages.lock().unwrap().contains(&page_index) {
            return Err(SinkError::Rejected(format!("page {} refused", page_index)));
        }

        self.accepted.lock().unwrap().push((mailbox, window));
        Ok(EnqueueReceipt::new(format!("job-{}", page_index), page_index))
    }
}

#[async_trait]
impl QueueSink for RecordingSink {
    async fn enqueue(&self, window: BatchWindow) -> Result<EnqueueReceipt, SinkError> {
        self.record(None, window)
    }
}

/// Binds the shared [`RecordingSink`] to each cycle's mailbox.
pub struct RecordingProvider(pub Arc<RecordingSink>);

struct BoundSink {
    sink: Arc<RecordingSink>,
    mailbox: MailboxRef,
}

#[async_trait]
impl QueueSink for BoundSink {
    async fn enqueue(&self, window: BatchWindow) -> Result<EnqueueReceipt, SinkError> {
        self.sink.record(Some(self.mailbox.clone()), window)
    }
}

impl SinkProvider for RecordingProvider {
    fn sink_for(&self, mailbox: &MailboxRef) -> Box<dyn QueueSink> {
        Box::new(BoundSink {
            sink: Arc::clone(&self.0),
            mailbox: mailbox.clone(),
        })
    }
}

/// Folder state the fake source reports. Shared so tests can mutate it between cycles.
#[derive(Debug, Clone)]
pub struct FolderState {
    pub uidvalidity: u32,
    pub ids: Vec<MessageId>,
    pub unavailable: bool,
}

#[derive(Clone)]
pub struct FakeSource {
    state: Arc<Mutex<FolderState>>,
    queries: Arc<Mutex<Vec<SourceQuery>>>,
}

impl FakeSource {
    pub fn new(uidvalidity: u32, ids: impl IntoIterator<Item = MessageId>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FolderState {
                uidvalidity,
                ids: ids.into_iter().collect(),
                unavailable: false,
            })),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_ids(&self, ids: impl IntoIterator<Item = MessageId>) {
        self.state.lock().unwrap().ids = ids.into_iter().collect();
    }

    pub fn set_uidvalidity(&self, uidvalidity: u32) {
        self.state.lock().unwrap().uidvalidity = uidvalidity;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    pub fn queries(&self) -> Vec<SourceQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentifierSource for FakeSource {
    async fn snapshot(&mut self, query: &SourceQuery) -> Result<MailboxSnapshot, SourceError> {
        self.queries.lock().unwrap().push(query.clone());
        let state = self.state.lock().unwrap().clone();

        if state.unavailable {
            return Err(SourceError::Unavailable("server offline".to_string()));
        }

        Ok(MailboxSnapshot {
            folder: query.folder.clone(),
            uidvalidity: state.uidvalidity,
            identifiers: IdentifierSet::from_unsorted(state.ids),
        })
    }
}
