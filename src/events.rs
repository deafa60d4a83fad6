//! Host notifications and the hovered-row event bus

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::table::filter::FilterState;
use crate::table::sort::SortState;

/// Callbacks that keep host state in sync with user-driven changes
pub trait GridListener {
    fn on_sort_change(&mut self, _sort: &SortState) {}
    fn on_filter_change(&mut self, _filters: &FilterState) {}
    fn on_column_resize(&mut self, _column: &str, _width: f32) {}
    fn on_page_change(&mut self, _page: usize) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DataHover,
    DataHoverClear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    /// A row (or a point in time) is hovered somewhere
    DataHover {
        source: String,
        row: Option<usize>,
        time: Option<i64>,
    },
    DataHoverClear {
        source: String,
    },
}

impl GridEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GridEvent::DataHover { .. } => EventKind::DataHover,
            GridEvent::DataHoverClear { .. } => EventKind::DataHoverClear,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            GridEvent::DataHover { source, .. } | GridEvent::DataHoverClear { source } => source,
        }
    }
}

pub type SubscriptionId = usize;
pub type Handler = Box<dyn Fn(&GridEvent)>;

/// Publish/subscribe bus shared between panels
pub trait EventBus {
    fn publish(&self, event: &GridEvent);
    fn subscribe(&self, kind: EventKind, handler: Handler) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Single-threaded in-process bus
#[derive(Default)]
pub struct LocalBus {
    handlers: RefCell<Vec<(SubscriptionId, EventKind, Rc<dyn Fn(&GridEvent)>)>>,
    next_id: Cell<SubscriptionId>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl EventBus for LocalBus {
    fn publish(&self, event: &GridEvent) {
        // handlers may publish or subscribe while running
        let targets: Vec<Rc<dyn Fn(&GridEvent)>> = self.handlers.borrow()
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind())
            .map(|(_, _, h)| h.clone())
            .collect();
        for handler in targets {
            handler(event);
        }
    }

    fn subscribe(&self, kind: EventKind, handler: Handler) -> SubscriptionId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.handlers.borrow_mut().push((id, kind, Rc::from(handler)));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.handlers.borrow_mut().retain(|(sid, _, _)| *sid != id);
    }
}

/// Hover synchronization for one grid: publishes this grid's hovers and
/// queues everyone else's until the grid drains them
pub struct HoverSync {
    bus: Rc<dyn EventBus>,
    source: String,
    inbox: Rc<RefCell<VecDeque<GridEvent>>>,
    subscriptions: Vec<SubscriptionId>,
}

impl HoverSync {
    pub fn new(bus: Rc<dyn EventBus>, source: &str) -> Self {
        let inbox = Rc::new(RefCell::new(VecDeque::new()));
        let mut subscriptions = Vec::new();
        for kind in [EventKind::DataHover, EventKind::DataHoverClear] {
            let queue = inbox.clone();
            let own = source.to_string();
            subscriptions.push(bus.subscribe(kind, Box::new(move |event: &GridEvent| {
                if event.source() != own {
                    queue.borrow_mut().push_back(event.clone());
                }
            })));
        }
        Self { bus, source: source.to_string(), inbox, subscriptions }
    }

    pub fn publish_hover(&self, row: Option<usize>, time: Option<i64>) {
        self.bus.publish(&GridEvent::DataHover { source: self.source.clone(), row, time });
    }

    pub fn publish_clear(&self) {
        self.bus.publish(&GridEvent::DataHoverClear { source: self.source.clone() });
    }

    /// Take every queued event from other sources
    pub fn drain(&self) -> Vec<GridEvent> {
        self.inbox.borrow_mut().drain(..).collect()
    }
}

impl Drop for HoverSync {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_routes_by_kind() {
        let bus = LocalBus::new();
        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        bus.subscribe(EventKind::DataHover, Box::new(move |_| counter.set(counter.get() + 1)));

        bus.publish(&GridEvent::DataHover { source: "a".to_string(), row: Some(1), time: None });
        bus.publish(&GridEvent::DataHoverClear { source: "a".to_string() });
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = LocalBus::new();
        let id = bus.subscribe(EventKind::DataHover, Box::new(|_| {}));
        assert_eq!(bus.subscriber_count(), 1);
        bus.unsubscribe(id);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_hover_sync_ignores_own_events() {
        let bus: Rc<dyn EventBus> = Rc::new(LocalBus::new());
        let left = HoverSync::new(bus.clone(), "left");
        let right = HoverSync::new(bus.clone(), "right");

        left.publish_hover(Some(3), Some(1000));
        assert!(left.drain().is_empty());
        assert_eq!(
            right.drain(),
            vec![GridEvent::DataHover { source: "left".to_string(), row: Some(3), time: Some(1000) }]
        );
        assert!(right.drain().is_empty());
    }

    #[test]
    fn test_hover_sync_unsubscribes_on_drop() {
        let bus = Rc::new(LocalBus::new());
        let shared: Rc<dyn EventBus> = bus.clone();
        {
            let _sync = HoverSync::new(shared, "a");
            assert_eq!(bus.subscriber_count(), 2);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }
}
