//! Per-session index slots and the session-scoped service.
//!
//! Each session holds at most one [`VectorIndex`] behind an `Arc`. Re-ingest
//! builds a complete new index off to the side and swaps the `Arc` under a
//! short write lock, so readers see either the old index or the new one.
//! Every session owns a [`CancellationToken`]; ending the session cancels
//! in-flight ingest and answer calls, which then commit nothing.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::document::Document;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::pipeline::{Answer, RagPipeline};

/// Identifier of one user session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// A fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A point-in-time view of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionInfo {
    /// The session identifier.
    pub id: SessionId,
    /// Identifier of the current index, if one has been built.
    pub index_id: Option<Uuid>,
    /// Number of segments in the current index.
    pub segment_count: usize,
    /// When the session was opened.
    pub created_at: DateTime<Utc>,
    /// Last ingest or answer.
    pub last_active: DateTime<Utc>,
}

#[derive(Debug)]
struct SessionSlot {
    index: Option<Arc<VectorIndex>>,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
    cancel: CancellationToken,
}

impl SessionSlot {
    fn new(cancel: CancellationToken) -> Self {
        let now = Utc::now();
        Self { index: None, created_at: now, last_active: now, cancel }
    }
}

/// What an ingest holds between starting and committing.
///
/// `existing` records whether the session was open when the ingest started.
/// A closed session cancels its token, so a live lease on an existing session
/// can only ever commit into that same slot.
#[derive(Debug, Clone)]
struct Lease {
    cancel: CancellationToken,
    existing: bool,
}

/// Process-wide map from session to its current index.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionSlot>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session with no index.
    pub async fn open(&self) -> SessionId {
        let id = SessionId::new();
        self.sessions.write().await.insert(id, SessionSlot::new(CancellationToken::new()));
        id
    }

    /// Start an ingest on `id` without creating the session.
    async fn lease(&self, id: SessionId) -> Lease {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(slot) => {
                slot.last_active = Utc::now();
                Lease { cancel: slot.cancel.clone(), existing: true }
            }
            None => Lease { cancel: CancellationToken::new(), existing: false },
        }
    }

    /// Store an index built under `lease`, opening the session if the ingest
    /// started on an unknown id.
    async fn commit(
        &self,
        id: SessionId,
        index: Arc<VectorIndex>,
        lease: &Lease,
    ) -> Result<Option<Arc<VectorIndex>>> {
        let mut sessions = self.sessions.write().await;
        if lease.cancel.is_cancelled() {
            return Err(ended_before_commit(id));
        }
        if let Some(slot) = sessions.get_mut(&id) {
            slot.last_active = Utc::now();
            return Ok(slot.index.replace(index));
        }
        if lease.existing {
            return Err(ended_before_commit(id));
        }

        let mut slot = SessionSlot::new(lease.cancel.clone());
        slot.index = Some(index);
        sessions.insert(id, slot);
        Ok(None)
    }

    /// The session's current index and cancellation token, marking it active.
    async fn snapshot(
        &self,
        id: SessionId,
    ) -> Option<(Option<Arc<VectorIndex>>, CancellationToken)> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(&id)?;
        slot.last_active = Utc::now();
        Some((slot.index.clone(), slot.cancel.clone()))
    }

    /// The session's current index, if any.
    pub async fn index(&self, id: SessionId) -> Option<Arc<VectorIndex>> {
        self.sessions.read().await.get(&id).and_then(|slot| slot.index.clone())
    }

    /// Swap in a fully built index, returning the one it replaced.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Cancelled`] if the session has ended.
    pub async fn replace_index(
        &self,
        id: SessionId,
        index: Arc<VectorIndex>,
    ) -> Result<Option<Arc<VectorIndex>>> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(slot) if !slot.cancel.is_cancelled() => {
                slot.last_active = Utc::now();
                Ok(slot.index.replace(index))
            }
            _ => Err(ended_before_commit(id)),
        }
    }

    /// Describe a session.
    pub async fn info(&self, id: SessionId) -> Option<SessionInfo> {
        self.sessions.read().await.get(&id).map(|slot| SessionInfo {
            id,
            index_id: slot.index.as_ref().map(|index| index.id()),
            segment_count: slot.index.as_ref().map_or(0, |index| index.len()),
            created_at: slot.created_at,
            last_active: slot.last_active,
        })
    }

    /// End a session, cancelling its in-flight work and dropping its index.
    ///
    /// Returns `false` if the session was not open.
    pub async fn close(&self, id: SessionId) -> bool {
        match self.sessions.write().await.remove(&id) {
            Some(slot) => {
                slot.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Close every session idle for at least `ttl`. Returns how many were closed.
    pub async fn expire_idle(&self, ttl: Duration) -> usize {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| {
            let keep = now.signed_duration_since(slot.last_active) < ttl;
            if !keep {
                slot.cancel.cancel();
            }
            keep
        });
        before - sessions.len()
    }

    /// Number of open sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is open.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

fn ended_before_commit(id: SessionId) -> RagError {
    RagError::Cancelled(format!("session {id} ended before the index was stored"))
}

/// Outcome of a successful ingest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    /// Identifier of the new index.
    pub index_id: Uuid,
    /// Number of segments indexed.
    pub segment_count: usize,
    /// Embedding dimension.
    pub dimensions: usize,
    /// Identifier of the index this one replaced, if any.
    pub replaced: Option<Uuid>,
}

/// Session-scoped front door: runs the pipeline and commits results to the
/// [`SessionStore`] only on success.
///
/// # Example
///
/// ```rust,ignore
/// let service = RagService::new(Arc::new(pipeline));
/// let session = service.open_session().await;
/// service.ingest(session, &document).await?;
/// let answer = service.answer(session, "What is this about?").await?;
/// ```
#[derive(Clone)]
pub struct RagService {
    pipeline: Arc<RagPipeline>,
    sessions: Arc<SessionStore>,
}

impl RagService {
    /// Create a service with its own session store.
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self::with_sessions(pipeline, Arc::new(SessionStore::new()))
    }

    /// Create a service over a shared session store.
    pub fn with_sessions(pipeline: Arc<RagPipeline>, sessions: Arc<SessionStore>) -> Self {
        Self { pipeline, sessions }
    }

    /// The underlying pipeline.
    pub fn pipeline(&self) -> &Arc<RagPipeline> {
        &self.pipeline
    }

    /// The session store.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Open a new session.
    pub async fn open_session(&self) -> SessionId {
        self.sessions.open().await
    }

    /// End a session, cancelling anything in flight.
    pub async fn end_session(&self, session: SessionId) -> bool {
        let closed = self.sessions.close(session).await;
        if closed {
            info!(session.id = %session, "session ended");
        }
        closed
    }

    /// Close sessions idle for longer than the configured TTL.
    pub async fn expire_idle(&self) -> usize {
        let expired = self.sessions.expire_idle(self.pipeline.config().session_ttl()).await;
        if expired > 0 {
            info!(expired, "expired idle sessions");
        }
        expired
    }

    /// Build an index for `document` and make it the session's index.
    ///
    /// An unknown `session` is opened only once the index is stored. On any
    /// failure the session keeps its previous index, and an unknown id stays
    /// unknown.
    ///
    /// # Errors
    ///
    /// Any [`RagPipeline::ingest`] error, or [`RagError::Cancelled`] if the
    /// session ends first.
    pub async fn ingest(&self, session: SessionId, document: &Document) -> Result<IngestReport> {
        let lease = self.sessions.lease(session).await;
        let span = info_span!(
            "rag.ingest",
            session.id = %session,
            source = document.source().unwrap_or("-")
        );
        self.ingest_and_commit(session, document, lease).instrument(span).await
    }

    async fn ingest_and_commit(
        &self,
        session: SessionId,
        document: &Document,
        lease: Lease,
    ) -> Result<IngestReport> {
        let index = tokio::select! {
            biased;
            () = lease.cancel.cancelled() => {
                warn!("ingest cancelled");
                return Err(RagError::Cancelled(format!("session {session} ended during ingest")));
            }
            result = self.pipeline.ingest(document) => result?,
        };

        let index = Arc::new(index);
        let replaced = self.sessions.commit(session, index.clone(), &lease).await?;
        let report = IngestReport {
            index_id: index.id(),
            segment_count: index.len(),
            dimensions: index.dimensions(),
            replaced: replaced.map(|old| old.id()),
        };
        info!(index.id = %report.index_id, replaced = ?report.replaced, "session index updated");
        Ok(report)
    }

    /// Answer `question` from the session's current index.
    ///
    /// Never mutates the session beyond its activity timestamp.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotReady`] if the session has no index
    /// - [`RagError::Cancelled`] if the session ends first
    /// - any [`RagPipeline::answer`] error
    pub async fn answer(&self, session: SessionId, question: &str) -> Result<Answer> {
        let span = info_span!("rag.answer", session.id = %session);

        async {
            let (index, cancel) = match self.sessions.snapshot(session).await {
                Some((Some(index), cancel)) => (index, cancel),
                _ => {
                    warn!("question asked before ingest");
                    return Err(RagError::IndexNotReady { session: session.to_string() });
                }
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    warn!("answer cancelled");
                    Err(RagError::Cancelled(format!("session {session} ended during answer")))
                }
                result = self.pipeline.answer(Some(&index), question) => result,
            }
        }
        .instrument(span)
        .await
    }
}
