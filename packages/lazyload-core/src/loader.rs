use crate::completion::{Completion, is_terminal_ready_state};
use crate::config::LoaderConfig;
use crate::env::EnvironmentInfo;
use crate::error::HostError;
use crate::host::{Host, Signal};
use crate::inject::NodeSpec;
use crate::progress::{Flow, Progress, ProgressSummary};
use crate::queue::{Callback, LoadGroup, ProgressHook, RequestQueue};
use crate::resource::ResourceType;
use futures::channel::oneshot;
use once_cell::unsync::OnceCell;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

new_key_type! {
    /// One injected node awaiting its finish signal.
    pub struct TicketId;
}

/// Anything that can be turned into an ordered URL list.
pub trait IntoUrls {
    fn into_urls(self) -> Vec<String>;
}

impl IntoUrls for &str {
    fn into_urls(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoUrls for String {
    fn into_urls(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoUrls for Vec<String> {
    fn into_urls(self) -> Vec<String> {
        self
    }
}

impl IntoUrls for Vec<&str> {
    fn into_urls(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoUrls for &[&str] {
    fn into_urls(self) -> Vec<String> {
        self.iter().map(|url| url.to_string()).collect()
    }
}

impl IntoUrls for &[String] {
    fn into_urls(self) -> Vec<String> {
        self.to_vec()
    }
}

impl<const N: usize> IntoUrls for [&str; N] {
    fn into_urls(self) -> Vec<String> {
        self.iter().map(|url| url.to_string()).collect()
    }
}

/// One call's worth of URLs plus everything that rides along with them.
pub struct LoadRequest<H: Host> {
    urls: Vec<String>,
    callback: Option<Callback<H>>,
    on_progress: Option<ProgressHook<H>>,
    payload: Option<Rc<dyn Any>>,
    context: Option<Rc<dyn Any>>,
    insert_at_front: bool,
}

impl<H: Host> LoadRequest<H> {
    pub fn new(urls: impl IntoUrls) -> Self {
        Self {
            urls: urls.into_urls(),
            callback: None,
            on_progress: None,
            payload: None,
            context: None,
            insert_at_front: false,
        }
    }

    /// Called once, after every URL of the request has finished.
    pub fn callback(
        mut self,
        f: impl FnMut(Option<&dyn Any>, &Progress<'_, H>) -> Flow + 'static,
    ) -> Self {
        self.callback = Some(Box::new(f));
        self
    }

    /// Called after each individual URL finishes.
    pub fn on_progress(mut self, f: impl Fn(&Progress<'_, H>) + 'static) -> Self {
        self.on_progress = Some(Rc::new(f));
        self
    }

    pub fn payload<T: Any>(mut self, payload: T) -> Self {
        self.payload = Some(Rc::new(payload));
        self
    }

    pub fn context<T: Any>(mut self, context: T) -> Self {
        self.context = Some(Rc::new(context));
        self
    }

    /// Queue ahead of everything already waiting, e.g. dependencies
    /// discovered by a resource that just loaded.
    pub fn insert_at_front(mut self, insert: bool) -> Self {
        self.insert_at_front = insert;
        self
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    fn into_group(self) -> (LoadGroup<H>, bool) {
        let group = LoadGroup {
            urls: self.urls.into_iter().collect(),
            callback: self.callback,
            on_progress: self.on_progress,
            payload: self.payload,
            context: self.context,
        };
        (group, self.insert_at_front)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinishReason {
    Signal(Signal),
    Delay,
    StylesheetMatched,
    PollTimeout,
    InjectFailed,
}

struct Ticket {
    url: String,
}

struct InFlight<H: Host> {
    group: LoadGroup<H>,
    remaining: SmallVec<[TicketId; 4]>,
}

struct Pipeline<H: Host> {
    queue: RequestQueue<H>,
    in_flight: Option<InFlight<H>>,
    /// Set while the group's callback runs, so re-entrant enqueues don't dispatch.
    completing: bool,
    polling: bool,
    done_count: u64,
    poll_count: u32,
}

impl<H: Host> Default for Pipeline<H> {
    fn default() -> Self {
        Self {
            queue: RequestQueue::new(),
            in_flight: None,
            completing: false,
            polling: false,
            done_count: 0,
            poll_count: 0,
        }
    }
}

impl<H: Host> Pipeline<H> {
    fn is_busy(&self) -> bool {
        self.in_flight.is_some() || self.completing
    }

    fn remaining(&self) -> usize {
        self.in_flight.as_ref().map_or(0, |f| f.remaining.len())
    }
}

struct State<H: Host> {
    pipelines: [Pipeline<H>; 2],
    tickets: SlotMap<TicketId, Ticket>,
}

struct Inner<H: Host> {
    host: H,
    config: LoaderConfig,
    env: OnceCell<EnvironmentInfo>,
    head: OnceCell<H::Node>,
    state: RefCell<State<H>>,
}

enum Step<H: Host> {
    Partial {
        hook: Option<ProgressHook<H>>,
        pending: usize,
        payload: Option<Rc<dyn Any>>,
        context: Option<Rc<dyn Any>>,
    },
    GroupDone(LoadGroup<H>),
}

/// Dependency-ordered CSS/JS loader bound to one host document.
///
/// Cloning is cheap and yields another handle to the same pipelines.
pub struct Loader<H: Host> {
    inner: Rc<Inner<H>>,
}

impl<H: Host> Clone for Loader<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H: Host> Loader<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, LoaderConfig::default())
    }

    pub fn with_config(host: H, config: LoaderConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                host,
                config,
                env: OnceCell::new(),
                head: OnceCell::new(),
                state: RefCell::new(State {
                    pipelines: [Pipeline::default(), Pipeline::default()],
                    tickets: SlotMap::with_key(),
                }),
            }),
        }
    }

    /// Pins the environment instead of probing the host.
    /// Returns false if it was already probed or pinned.
    pub fn set_environment(&self, env: EnvironmentInfo) -> bool {
        self.inner.env.set(env).is_ok()
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Probed on first use, then fixed for the lifetime of this loader.
    pub fn environment(&self) -> EnvironmentInfo {
        *self.inner.env.get_or_init(|| {
            let host = &self.inner.host;
            EnvironmentInfo::probe(&host.user_agent(), host.script_async_default())
        })
    }

    /// The document head, resolved once and cached.
    pub fn head(&self) -> Result<H::Node, HostError> {
        if let Some(head) = self.inner.head.get() {
            return Ok(head.clone());
        }
        let head = self.inner.host.head()?;
        let _ = self.inner.head.set(head.clone());
        Ok(head)
    }

    pub fn load_styles(&self, request: LoadRequest<H>) {
        self.load(ResourceType::Style, request);
    }

    pub fn load_scripts(&self, request: LoadRequest<H>) {
        self.load(ResourceType::Script, request);
    }

    /// Shorthand for `load_styles` without a callback.
    pub fn css(&self, urls: impl IntoUrls) {
        self.load_styles(LoadRequest::new(urls));
    }

    /// Shorthand for `load_scripts` without a callback.
    pub fn js(&self, urls: impl IntoUrls) {
        self.load_scripts(LoadRequest::new(urls));
    }

    /// Queues `request` and starts the pipeline if it is idle.
    ///
    /// Styles always travel as one group. Scripts do too when the engine can
    /// keep their execution order; otherwise each URL becomes its own group
    /// and they load strictly one after another.
    pub fn load(&self, ty: ResourceType, request: LoadRequest<H>) {
        let (group, insert_at_front) = request.into_group();
        if !group.is_empty() {
            let parallel = match ty {
                ResourceType::Style => true,
                ResourceType::Script => self.environment().parallel_scripts(),
            };
            let urls = group.len();
            let groups = if parallel { vec![group] } else { group.split() };
            tracing::debug!(
                %ty,
                urls,
                groups = groups.len(),
                insert_at_front,
                "queued load request"
            );
            self.pipeline_mut(ty, |p| p.queue.enqueue(groups, insert_at_front));
        }
        self.dispatch(ty);
    }

    /// Like [`load`](Self::load), but the request's callback is replaced by a
    /// future that resolves when it would have fired. Resolves to `Canceled`
    /// if the request had no URLs.
    pub fn load_future(
        &self,
        ty: ResourceType,
        request: LoadRequest<H>,
    ) -> oneshot::Receiver<ProgressSummary> {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        let request = request.callback(move |_, progress| {
            if let Some(tx) = tx.take() {
                let _ = tx.send(progress.summary());
            }
            Flow::Continue
        });
        self.load(ty, request);
        rx
    }

    pub fn styles_future(&self, urls: impl IntoUrls) -> oneshot::Receiver<ProgressSummary> {
        self.load_future(ResourceType::Style, LoadRequest::new(urls))
    }

    pub fn scripts_future(&self, urls: impl IntoUrls) -> oneshot::Receiver<ProgressSummary> {
        self.load_future(ResourceType::Script, LoadRequest::new(urls))
    }

    /// Restarts a pipeline whose last callback returned [`Flow::Suspend`].
    pub fn resume(&self, ty: ResourceType) {
        tracing::debug!(%ty, "resuming pipeline");
        self.dispatch(ty);
    }

    pub fn is_busy(&self, ty: ResourceType) -> bool {
        self.pipeline(ty, Pipeline::is_busy)
    }

    pub fn queued_urls(&self, ty: ResourceType) -> Vec<Vec<String>> {
        self.pipeline(ty, |p| p.queue.snapshot())
    }

    pub fn in_flight_urls(&self, ty: ResourceType) -> Vec<String> {
        let state = self.inner.state.borrow();
        in_flight_urls(&state, ty)
    }

    pub fn done_count(&self, ty: ResourceType) -> u64 {
        self.pipeline(ty, |p| p.done_count)
    }

    pub fn poll_count(&self, ty: ResourceType) -> u32 {
        self.pipeline(ty, |p| p.poll_count)
    }

    /// Queued plus in-flight URLs not yet finished.
    pub fn outstanding(&self, ty: ResourceType) -> usize {
        self.pipeline(ty, |p| p.queue.url_count() + p.remaining())
    }

    fn pipeline<R>(&self, ty: ResourceType, f: impl FnOnce(&Pipeline<H>) -> R) -> R {
        f(&self.inner.state.borrow().pipelines[ty.index()])
    }

    fn pipeline_mut<R>(&self, ty: ResourceType, f: impl FnOnce(&mut Pipeline<H>) -> R) -> R {
        f(&mut self.inner.state.borrow_mut().pipelines[ty.index()])
    }

    fn dispatch(&self, ty: ResourceType) {
        let issued: SmallVec<[(TicketId, String); 4]> = {
            let mut state = self.inner.state.borrow_mut();
            let State { pipelines, tickets } = &mut *state;
            let pipeline = &mut pipelines[ty.index()];
            if pipeline.is_busy() {
                return;
            }
            let Some(group) = pipeline.queue.pop_front() else {
                return;
            };
            let issued: SmallVec<[_; 4]> = group
                .urls
                .iter()
                .map(|url| (tickets.insert(Ticket { url: url.clone() }), url.clone()))
                .collect();
            pipeline.in_flight = Some(InFlight {
                remaining: issued.iter().map(|(id, _)| *id).collect(),
                group,
            });
            issued
        };

        let env = self.environment();
        let strategy = Completion::select(ty, &env, issued.len(), &self.inner.config);
        tracing::debug!(%ty, urls = issued.len(), ?strategy, "dispatching group");

        for (ticket, url) in &issued {
            self.inject(ty, *ticket, url, strategy, &env);
        }
        if strategy == Completion::StylesheetPoll {
            self.start_polling(ty);
        }
    }

    fn inject(
        &self,
        ty: ResourceType,
        ticket: TicketId,
        url: &str,
        strategy: Completion,
        env: &EnvironmentInfo,
    ) {
        let host = &self.inner.host;
        let spec = NodeSpec::for_resource(ty, url, env, &self.inner.config);
        let result = self.head().and_then(|head| {
            let node = spec.create(host)?;
            // Hooks go on before the node is live, or a fast load could be missed.
            self.attach(ty, ticket, &node, strategy);
            host.append_child(&head, &node)
        });

        if let Err(err) = result {
            tracing::warn!(%ty, url, %err, "failed to inject node, treating it as finished");
            host.schedule_microtask(Box::new(self.finisher(ty, ticket, FinishReason::InjectFailed)));
        }
    }

    fn attach(&self, ty: ResourceType, ticket: TicketId, node: &H::Node, strategy: Completion) {
        let host = &self.inner.host;
        match strategy {
            Completion::ReadyState => {
                let weak = Rc::downgrade(&self.inner);
                let node_handle = node.clone();
                host.listen(
                    node,
                    Signal::ReadyStateChange,
                    Box::new(move || {
                        let Some(loader) = upgrade(&weak) else {
                            return;
                        };
                        let state = loader.host().ready_state(&node_handle);
                        if state.as_deref().is_some_and(is_terminal_ready_state) {
                            loader.finish(ty, ticket, FinishReason::Signal(Signal::ReadyStateChange));
                        }
                    }),
                );
            }
            Completion::StylesheetPoll => {
                // Polling compares against resolved hrefs, so relative URLs must be resolved first.
                if let Some(href) = host.href(node) {
                    if let Some(t) = self.inner.state.borrow_mut().tickets.get_mut(ticket) {
                        t.url = href;
                    }
                }
            }
            Completion::FixedDelay { delay_ms } => {
                host.set_timeout(delay_ms, Box::new(self.finisher(ty, ticket, FinishReason::Delay)));
            }
            Completion::LoadOrError => {
                for signal in [Signal::Load, Signal::Error] {
                    let finish = self.finisher(ty, ticket, FinishReason::Signal(signal));
                    host.listen(node, signal, Box::new(finish));
                }
            }
        }
    }

    fn finisher(&self, ty: ResourceType, ticket: TicketId, reason: FinishReason) -> impl Fn() + 'static {
        let weak = Rc::downgrade(&self.inner);
        move || {
            if let Some(loader) = upgrade(&weak) {
                loader.finish(ty, ticket, reason);
            }
        }
    }

    fn start_polling(&self, ty: ResourceType) {
        let already = self.pipeline_mut(ty, |p| std::mem::replace(&mut p.polling, true));
        if !already {
            self.schedule_poll(ty);
        }
    }

    fn schedule_poll(&self, ty: ResourceType) {
        let weak = Rc::downgrade(&self.inner);
        self.inner.host.set_timeout(
            self.inner.config.poll_interval_ms,
            Box::new(move || {
                if let Some(loader) = upgrade(&weak) {
                    loader.poll(ty);
                }
            }),
        );
    }

    fn poll(&self, ty: ResourceType) {
        let sheets = self.inner.host.style_sheet_hrefs();
        let max_polls = self.inner.config.max_polls;

        let (matched, forced) = {
            let mut state = self.inner.state.borrow_mut();
            let State { pipelines, tickets } = &mut *state;
            let pipeline = &mut pipelines[ty.index()];
            let Some(flight) = &pipeline.in_flight else {
                pipeline.polling = false;
                return;
            };

            let matched: SmallVec<[TicketId; 4]> = flight
                .remaining
                .iter()
                .copied()
                .filter(|id| {
                    tickets
                        .get(*id)
                        .is_some_and(|t| sheets.iter().any(|href| *href == t.url))
                })
                .collect();

            // Running out of polls gives up on the whole group, not one URL.
            let mut forced = SmallVec::<[TicketId; 4]>::new();
            if matched.is_empty() {
                pipeline.poll_count += 1;
                if pipeline.poll_count >= max_polls {
                    forced.extend(flight.remaining.iter().copied());
                }
            }
            (matched, forced)
        };

        for ticket in matched {
            self.finish(ty, ticket, FinishReason::StylesheetMatched);
        }
        if !forced.is_empty() {
            tracing::warn!(
                %ty,
                polls = max_polls,
                urls = forced.len(),
                "stylesheets never appeared, finishing them anyway"
            );
            for ticket in forced {
                self.finish(ty, ticket, FinishReason::PollTimeout);
            }
        }

        let keep_polling = self.pipeline_mut(ty, |p| {
            p.polling = p.in_flight.is_some();
            p.polling
        });
        if keep_polling {
            self.schedule_poll(ty);
        } else {
            tracing::trace!(%ty, "polling stopped");
        }
    }

    fn finish(&self, ty: ResourceType, ticket: TicketId, reason: FinishReason) {
        let step = {
            let mut state = self.inner.state.borrow_mut();
            let State { pipelines, tickets } = &mut *state;
            let Some(finished) = tickets.remove(ticket) else {
                tracing::trace!(%ty, ?reason, "ignoring signal for a node that already finished");
                return;
            };
            let pipeline = &mut pipelines[ty.index()];
            let Some(flight) = pipeline.in_flight.as_mut() else {
                return;
            };
            let Some(pos) = flight.remaining.iter().position(|id| *id == ticket) else {
                return;
            };
            flight.remaining.remove(pos);
            pipeline.done_count += 1;
            pipeline.poll_count = 0;
            tracing::debug!(
                %ty,
                url = %finished.url,
                ?reason,
                remaining = flight.remaining.len(),
                "resource finished"
            );

            if flight.remaining.is_empty() {
                pipeline.completing = true;
                match pipeline.in_flight.take() {
                    Some(flight) => Step::GroupDone(flight.group),
                    None => return,
                }
            } else {
                Step::Partial {
                    hook: flight.group.on_progress.clone(),
                    pending: flight.remaining.len(),
                    payload: flight.group.payload.clone(),
                    context: flight.group.context.clone(),
                }
            }
        };

        match step {
            Step::Partial {
                hook,
                pending,
                payload,
                context,
            } => {
                if let Some(hook) = hook {
                    hook(&self.progress(ty, pending, payload, context));
                }
            }
            Step::GroupDone(group) => self.complete(ty, group),
        }
    }

    fn complete(&self, ty: ResourceType, group: LoadGroup<H>) {
        let LoadGroup {
            callback,
            on_progress,
            payload,
            context,
            ..
        } = group;

        if let Some(hook) = on_progress {
            hook(&self.progress(ty, 0, payload.clone(), context.clone()));
        }
        let flow = match callback {
            Some(mut callback) => {
                let progress = self.progress(ty, 0, payload.clone(), context);
                callback(payload.as_deref(), &progress)
            }
            None => Flow::Continue,
        };

        let outstanding = self.pipeline_mut(ty, |p| {
            p.completing = false;
            p.queue.url_count()
        });
        tracing::info!(%ty, ?flow, outstanding, "group finished");

        match flow {
            Flow::Continue => self.dispatch(ty),
            Flow::Suspend => tracing::debug!(%ty, "callback suspended the pipeline"),
        }
    }

    fn progress(
        &self,
        ty: ResourceType,
        pending_count: usize,
        payload: Option<Rc<dyn Any>>,
        context: Option<Rc<dyn Any>>,
    ) -> Progress<'_, H> {
        let state = self.inner.state.borrow();
        let pipeline = &state.pipelines[ty.index()];
        Progress {
            loader: self,
            resource_type: ty,
            todo_count: pipeline.queue.url_count() + pipeline.remaining(),
            pending_count,
            done_count: pipeline.done_count,
            poll_count: pipeline.poll_count,
            environment: self.environment(),
            document: self.inner.host.document(),
            head: self.inner.head.get().cloned(),
            queued: pipeline.queue.snapshot(),
            in_flight: in_flight_urls(&state, ty),
            payload,
            context,
        }
    }
}

fn upgrade<H: Host>(weak: &Weak<Inner<H>>) -> Option<Loader<H>> {
    weak.upgrade().map(|inner| Loader { inner })
}

fn in_flight_urls<H: Host>(state: &State<H>, ty: ResourceType) -> Vec<String> {
    state.pipelines[ty.index()]
        .in_flight
        .as_ref()
        .map(|flight| {
            flight
                .remaining
                .iter()
                .filter_map(|id| state.tickets.get(*id))
                .map(|t| t.url.clone())
                .collect()
        })
        .unwrap_or_default()
}
