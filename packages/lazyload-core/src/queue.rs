use crate::host::Host;
use crate::progress::{Flow, Progress};
use smallvec::SmallVec;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Completion callback: receives the payload and a progress snapshot.
pub type Callback<H> = Box<dyn FnMut(Option<&dyn Any>, &Progress<'_, H>) -> Flow>;

/// Per-URL observer, shared by every group one request was split into.
pub type ProgressHook<H> = Rc<dyn Fn(&Progress<'_, H>)>;

/// URLs that finish together, followed by one callback.
pub struct LoadGroup<H: Host> {
    pub urls: SmallVec<[String; 4]>,
    pub callback: Option<Callback<H>>,
    pub on_progress: Option<ProgressHook<H>>,
    pub payload: Option<Rc<dyn Any>>,
    pub context: Option<Rc<dyn Any>>,
}

impl<H: Host> LoadGroup<H> {
    pub fn new(urls: impl IntoIterator<Item = String>) -> Self {
        Self {
            urls: urls.into_iter().collect(),
            callback: None,
            on_progress: None,
            payload: None,
            context: None,
        }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// One singleton group per URL, in order. Only the last carries the
    /// callback, so it still fires once, after the whole request has
    /// finished. Payload and context go to every group for the progress hook.
    pub fn split(self) -> Vec<LoadGroup<H>> {
        let LoadGroup {
            urls,
            callback,
            on_progress,
            payload,
            context,
        } = self;
        let last = urls.len().saturating_sub(1);
        let mut callback = callback;

        urls.into_iter()
            .enumerate()
            .map(|(i, url)| {
                let mut group = LoadGroup::new([url]);
                group.on_progress = on_progress.clone();
                group.payload = payload.clone();
                group.context = context.clone();
                if i == last {
                    group.callback = callback.take();
                }
                group
            })
            .collect()
    }
}

impl<H: Host> fmt::Debug for LoadGroup<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadGroup")
            .field("urls", &self.urls)
            .field("callback", &self.callback.is_some())
            .field("payload", &self.payload.is_some())
            .finish()
    }
}

/// Groups of one resource type waiting for their turn.
pub struct RequestQueue<H: Host> {
    groups: VecDeque<LoadGroup<H>>,
}

impl<H: Host> Default for RequestQueue<H> {
    fn default() -> Self {
        Self {
            groups: VecDeque::new(),
        }
    }
}

impl<H: Host> RequestQueue<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `groups`, or splices them ahead of everything queued when
    /// `insert_at_front` is set. Their relative order is kept either way.
    pub fn enqueue(&mut self, groups: Vec<LoadGroup<H>>, insert_at_front: bool) {
        if insert_at_front {
            for group in groups.into_iter().rev() {
                self.groups.push_front(group);
            }
        } else {
            self.groups.extend(groups);
        }
    }

    pub fn pop_front(&mut self) -> Option<LoadGroup<H>> {
        self.groups.pop_front()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// URLs across all queued groups.
    pub fn url_count(&self) -> usize {
        self.groups.iter().map(LoadGroup::len).sum()
    }

    pub fn snapshot(&self) -> Vec<Vec<String>> {
        self.groups
            .iter()
            .map(|group| group.urls.to_vec())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimHost;

    fn group(urls: &[&str]) -> LoadGroup<SimHost> {
        LoadGroup::new(urls.iter().map(|u| u.to_string()))
    }

    #[test]
    fn test_insert_at_front_keeps_request_order() {
        let mut queue = RequestQueue::new();
        queue.enqueue(vec![group(&["a.js"]), group(&["b.js"])], false);
        queue.enqueue(group(&["c1.js", "c2.js"]).split(), true);

        assert_eq!(
            queue.snapshot(),
            vec![
                vec!["c1.js".to_string()],
                vec!["c2.js".to_string()],
                vec!["a.js".to_string()],
                vec!["b.js".to_string()],
            ]
        );
        assert_eq!(queue.url_count(), 4);
    }

    #[test]
    fn test_split_moves_callback_to_last_group() {
        let mut g = group(&["a.js", "b.js", "c.js"]);
        let callback: Callback<SimHost> =
            Box::new(|_: Option<&dyn Any>, _: &Progress<'_, SimHost>| Flow::Continue);
        g.callback = Some(callback);
        g.payload = Some(Rc::new(7u32));

        let groups = g.split();
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.len() == 1));
        assert!(groups[0].callback.is_none() && groups[1].callback.is_none());
        assert!(groups[2].callback.is_some());
        assert!(groups.iter().all(|g| g.payload.is_some()));
    }
}
