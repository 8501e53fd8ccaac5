//! Editor orchestration — the compile cycle behind the resume editor.
//!
//! An `EditorSession` owns the LaTeX text being edited and decides when to
//! compile it: immediately on `compile_now`, or after a quiet period following
//! the last `edit` when auto-compile is on. Requests may overlap in flight;
//! each carries a sequence number and only the newest one may touch state.
//!
//! Sessions spawn their debounce timer on the ambient tokio runtime, so
//! `edit` must be called from within one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

pub mod client;

pub use client::{Artifact, CompileClient, CompileError, HttpCompileClient};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct EditorOptions {
    /// Quiet period after the last edit before an automatic compile.
    pub debounce: Duration,
    pub auto_compile: bool,
    /// Placeholder preview shown when a compile fails and nothing has ever
    /// compiled. Off unless set.
    pub fallback_artifact: Option<Artifact>,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            auto_compile: true,
            fallback_artifact: None,
        }
    }
}

/// Snapshot of what the editor shows.
///
/// `artifact` and `last_error` describe the latest completed compile and are
/// never both set. `preview` is what the PDF pane displays: the newest
/// artifact that ever compiled, kept across failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorState {
    pub source_text: String,
    pub artifact: Option<Artifact>,
    pub preview: Option<Artifact>,
    pub is_compiling: bool,
    pub last_error: Option<String>,
    pub auto_compile_enabled: bool,
}

struct Session {
    view: EditorState,
    /// Pending debounce timer and the generation it was scheduled under.
    debounce: Option<(u64, JoinHandle<()>)>,
    debounce_generation: u64,
    /// Sequence number of the most recently issued compile request.
    latest_request: u64,
    closed: bool,
}

impl Session {
    fn cancel_debounce(&mut self) {
        if let Some((_, handle)) = self.debounce.take() {
            handle.abort();
        }
    }
}

struct Inner<C> {
    client: C,
    options: EditorOptions,
    session: Mutex<Session>,
}

impl<C: CompileClient> Inner<C> {
    fn lock(&self) -> MutexGuard<'_, Session> {
        // State stays consistent across a panic elsewhere; keep going.
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issues a compile of the current text and applies the reply if it is
    /// still the newest request when it arrives.
    async fn compile_current(&self) {
        let (seq, source) = {
            let mut session = self.lock();
            session.latest_request += 1;
            session.view.is_compiling = true;
            (session.latest_request, session.view.source_text.clone())
        };

        let result = self.client.compile(&source).await;

        let mut session = self.lock();
        if seq != session.latest_request {
            debug!(seq, latest = session.latest_request, "Discarding superseded compile result");
            return;
        }

        let view = &mut session.view;
        view.is_compiling = false;
        match result {
            Ok(artifact) => {
                view.preview = Some(artifact.clone());
                view.artifact = Some(artifact);
                view.last_error = None;
            }
            Err(err) => {
                view.artifact = None;
                view.last_error = Some(err.message);
                if view.preview.is_none() {
                    view.preview = self.options.fallback_artifact.clone();
                }
            }
        }
    }
}

pub struct EditorSession<C> {
    inner: Arc<Inner<C>>,
}

impl<C: CompileClient + 'static> EditorSession<C> {
    pub fn new(client: C, source: impl Into<String>, options: EditorOptions) -> Self {
        let view = EditorState {
            source_text: source.into(),
            auto_compile_enabled: options.auto_compile,
            ..EditorState::default()
        };
        Self {
            inner: Arc::new(Inner {
                client,
                options,
                session: Mutex::new(Session {
                    view,
                    debounce: None,
                    debounce_generation: 0,
                    latest_request: 0,
                    closed: false,
                }),
            }),
        }
    }

    /// Opens a session and compiles the initial text right away, the way the
    /// editor page renders its first preview.
    pub async fn open_and_compile(
        client: C,
        source: impl Into<String>,
        options: EditorOptions,
    ) -> Self {
        let session = Self::new(client, source, options);
        session.compile_now().await;
        session
    }

    pub fn snapshot(&self) -> EditorState {
        self.inner.lock().view.clone()
    }

    /// Replaces the text. With auto-compile on, (re)starts the debounce timer.
    pub fn edit(&self, text: impl Into<String>) {
        let mut session = self.inner.lock();
        session.view.source_text = text.into();
        session.cancel_debounce();

        if !session.view.auto_compile_enabled || session.closed {
            return;
        }

        session.debounce_generation += 1;
        let generation = session.debounce_generation;
        let delay = self.inner.options.debounce;
        let weak: Weak<Inner<C>> = Arc::downgrade(&self.inner);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            {
                // Once the request starts it is no longer abortable: detach
                // from the session so a later edit cannot cancel it mid-flight.
                let mut session = inner.lock();
                let ours = matches!(&session.debounce, Some((g, _)) if *g == generation);
                if !ours {
                    return;
                }
                session.debounce = None;
            }
            inner.compile_current().await;
        });
        session.debounce = Some((generation, handle));
    }

    /// Compiles the current text now, cancelling any pending debounce.
    /// Returns the state after this request (or a newer one) has resolved.
    pub async fn compile_now(&self) -> EditorState {
        self.inner.lock().cancel_debounce();
        self.inner.compile_current().await;
        self.snapshot()
    }

    pub fn set_auto_compile(&self, enabled: bool) {
        let mut session = self.inner.lock();
        session.view.auto_compile_enabled = enabled;
        if !enabled {
            session.cancel_debounce();
        }
    }

    /// Ends the session: a pending debounce never fires and later edits do
    /// not schedule one.
    pub fn close(&self) {
        let mut session = self.inner.lock();
        session.closed = true;
        session.cancel_debounce();
    }
}

impl<C> Drop for EditorSession<C> {
    fn drop(&mut self) {
        let mut session = self
            .inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        session.closed = true;
        session.cancel_debounce();
    }
}
