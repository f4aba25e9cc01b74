use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use tokio::sync::mpsc;
use tracing::debug;

use scribe_model::{TaskId, TaskStatus};

use crate::frame::JobReply;

struct Route {
    tx: mpsc::UnboundedSender<TaskStatus>,
    /// Link the request went out on; `None` until it is sent.
    link: Option<u64>,
}

type Routes = HashMap<TaskId, Route>;

/// Routes job replies to the monitor waiting on their correlation id.
#[derive(Default)]
pub struct Demux {
    routes: Mutex<Routes>,
    next_link: AtomicU64,
}

impl Demux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new link generation. Only routes bound to it are closed when it dies.
    pub fn open_link(self: &Arc<Self>) -> LinkRoutes {
        LinkRoutes {
            demux: Arc::clone(self),
            link: self.next_link.fetch_add(1, Ordering::Relaxed),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a route for `id`, replacing any previous one.
    pub fn register(&self, id: TaskId) -> mpsc::UnboundedReceiver<TaskStatus> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes().insert(id, Route { tx, link: None });
        rx
    }

    /// Tie the route for `id` to the link carrying its request.
    ///
    /// A link that already died closes the route at once.
    pub fn bind(&self, id: &TaskId, link: &LinkRoutes) {
        let mut routes = self.routes();
        if link.closed.load(Ordering::Relaxed) {
            routes.remove(id);
        } else if let Some(route) = routes.get_mut(id) {
            route.link = Some(link.link);
        }
    }

    /// Forget the route for `id`.
    pub fn release(&self, id: &TaskId) {
        self.routes().remove(id);
    }

    /// Deliver a reply. Returns `false` if nobody is waiting for it.
    pub fn route(&self, reply: JobReply) -> bool {
        let routes = self.routes();
        match routes.get(&reply.id) {
            Some(route) => route.tx.send(reply.status).is_ok(),
            None => {
                debug!(task_id = %reply.id, status = %reply.status, "reply for untracked task dropped");
                false
            }
        }
    }

    /// Drop every route so waiting monitors observe a closed link.
    pub fn disconnect(&self) {
        let mut routes = self.routes();
        if !routes.is_empty() {
            debug!(routes = routes.len(), "job client closed; dropping pending routes");
        }
        routes.clear();
    }

    fn disconnect_link(&self, link: &LinkRoutes) {
        let mut routes = self.routes();
        link.closed.store(true, Ordering::Relaxed);
        let before = routes.len();
        routes.retain(|_, route| route.link != Some(link.link));
        let closed = before - routes.len();
        if closed > 0 {
            debug!(link = link.link, routes = closed, "job link lost; closing its routes");
        }
    }

    pub fn len(&self) -> usize {
        self.routes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn routes(&self) -> MutexGuard<'_, Routes> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The slice of a [`Demux`] owned by one job link.
///
/// A dialer hands replies read from its link to [`route`](Self::route) and calls
/// [`disconnect`](Self::disconnect) when the link ends.
pub struct LinkRoutes {
    demux: Arc<Demux>,
    link: u64,
    closed: AtomicBool,
}

impl LinkRoutes {
    pub fn route(&self, reply: JobReply) -> bool {
        self.demux.route(reply)
    }

    /// Close the routes of requests sent on this link. Routes of other links are kept.
    pub fn disconnect(&self) {
        self.demux.disconnect_link(self);
    }

    pub fn id(&self) -> u64 {
        self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(id: &str, status: TaskStatus) -> JobReply {
        JobReply {
            id: TaskId::from(id),
            status,
        }
    }

    #[test]
    fn routes_by_correlation_id() {
        let demux = Demux::new();
        let mut a = demux.register(TaskId::from("a"));
        let mut b = demux.register(TaskId::from("b"));

        assert!(demux.route(reply("b", TaskStatus::Running)));
        assert!(demux.route(reply("a", TaskStatus::Completed)));

        assert_eq!(a.try_recv().unwrap(), TaskStatus::Completed);
        assert_eq!(b.try_recv().unwrap(), TaskStatus::Running);
        assert!(a.try_recv().is_err());
    }

    #[test]
    fn released_route_drops_replies() {
        let demux = Demux::new();
        let _rx = demux.register(TaskId::from("a"));
        demux.release(&TaskId::from("a"));

        assert!(!demux.route(reply("a", TaskStatus::Running)));
        assert!(demux.is_empty());
    }

    #[test]
    fn disconnect_closes_receivers() {
        let demux = Demux::new();
        let mut rx = demux.register(TaskId::from("a"));
        demux.disconnect();

        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn stale_link_keeps_routes_of_a_fresh_link() {
        let demux = Arc::new(Demux::new());
        let old = demux.open_link();
        let mut carried = demux.register(TaskId::from("a"));
        demux.bind(&TaskId::from("a"), &old);

        let fresh = demux.open_link();
        let mut redialed = demux.register(TaskId::from("b"));
        demux.bind(&TaskId::from("b"), &fresh);
        let mut unsent = demux.register(TaskId::from("c"));

        old.disconnect();

        assert!(matches!(
            carried.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert!(fresh.route(reply("b", TaskStatus::Running)));
        assert_eq!(redialed.try_recv().unwrap(), TaskStatus::Running);
        assert!(demux.route(reply("c", TaskStatus::Running)));
        assert_eq!(unsent.try_recv().unwrap(), TaskStatus::Running);
    }

    #[test]
    fn binding_to_a_dead_link_closes_the_route() {
        let demux = Arc::new(Demux::new());
        let link = demux.open_link();
        link.disconnect();

        let mut rx = demux.register(TaskId::from("a"));
        demux.bind(&TaskId::from("a"), &link);

        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert!(demux.is_empty());
    }
}
