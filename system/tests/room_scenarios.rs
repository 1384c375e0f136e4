use coviewer_system::{
    ClientMessage, ConnectionHandle, Coordinator, CoordinatorOptions, DeliveryError, PageNumber,
    RoomId, ServerMessage,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Clone, Default)]
struct RecordingHandle {
    received: Rc<RefCell<Vec<ServerMessage>>>,
    broken: Rc<Cell<bool>>,
}

impl RecordingHandle {
    fn take(&self) -> Vec<ServerMessage> {
        self.received.borrow_mut().drain(..).collect()
    }

    fn break_link(&self) {
        self.broken.set(true);
    }
}

impl ConnectionHandle for RecordingHandle {
    fn deliver(&self, message: &ServerMessage) -> Result<(), DeliveryError> {
        if self.broken.get() {
            return Err(DeliveryError::Closed);
        }
        self.received.borrow_mut().push(message.clone());
        Ok(())
    }
}

fn page(n: u32) -> PageNumber {
    PageNumber::new(n).expect("")
}

fn page_change(n: u32) -> ClientMessage {
    ClientMessage::page_change(page(n))
}

#[test]
fn it_should_follow_presenter_through_a_session() {
    let mut coordinator = Coordinator::new(CoordinatorOptions::default());
    let r1 = RoomId::from("R1");

    let a = RecordingHandle::default();
    let a_id = coordinator.connect(&r1, a.clone());
    assert!(a.take().is_empty());

    coordinator.handle_message(&r1, &a_id, &ClientMessage::AdminConnect);
    assert_eq!(
        a.take(),
        vec![
            ServerMessage::AdminStatus {
                is_admin: true,
                current_page: page(1)
            },
            ServerMessage::ViewerCount { count: 1 },
        ]
    );
    assert_eq!(coordinator.rooms().get_presenter(&r1), Some(a_id));

    coordinator.handle_message(&r1, &a_id, &page_change(5));
    assert_eq!(coordinator.rooms().get_page(&r1), page(5));
    assert_eq!(
        a.take(),
        vec![
            ServerMessage::PageUpdate { page: page(5) },
            ServerMessage::ViewerCount { count: 1 },
        ]
    );

    let b = RecordingHandle::default();
    let b_id = coordinator.connect(&r1, b.clone());
    coordinator.handle_message(&r1, &b_id, &page_change(9));
    assert_eq!(coordinator.rooms().get_page(&r1), page(5));
    assert_eq!(a.take(), vec![ServerMessage::ViewerCount { count: 2 }]);
    assert_eq!(b.take(), vec![ServerMessage::ViewerCount { count: 2 }]);

    assert!(coordinator.disconnect(&r1, &a_id));
    assert_eq!(coordinator.rooms().get_presenter(&r1), None);
    assert_eq!(b.take(), vec![ServerMessage::ViewerCount { count: 1 }]);
    assert!(a.take().is_empty());

    coordinator.handle_message(&r1, &b_id, &page_change(2));
    assert_eq!(coordinator.rooms().get_page(&r1), page(5));
    assert_eq!(b.take(), vec![ServerMessage::ViewerCount { count: 1 }]);
}

#[test]
fn it_should_deliver_page_update_exactly_once_to_every_member() {
    let mut coordinator = Coordinator::new(CoordinatorOptions::default());
    let room = RoomId::from("lecture");

    let handles: Vec<RecordingHandle> = (0..4).map(|_| RecordingHandle::default()).collect();
    let ids: Vec<_> = handles
        .iter()
        .map(|h| coordinator.connect(&room, h.clone()))
        .collect();

    coordinator.handle_message(&room, &ids[2], &ClientMessage::AdminConnect);
    for h in &handles {
        h.take();
    }

    coordinator.handle_message(&room, &ids[2], &page_change(12));
    for h in &handles {
        let updates = h
            .take()
            .into_iter()
            .filter(|m| matches!(m, ServerMessage::PageUpdate { .. }))
            .collect::<Vec<_>>();
        assert_eq!(updates, vec![ServerMessage::PageUpdate { page: page(12) }]);
    }
}

#[test]
fn it_should_keep_count_equal_to_live_connections() {
    let mut coordinator = Coordinator::new(CoordinatorOptions::default());
    let room = RoomId::from("R1");
    let mut live = Vec::new();

    for step in 0..20 {
        if step % 3 == 2 {
            let id = live.remove(0);
            coordinator.disconnect(&room, &id);
            coordinator.disconnect(&room, &id);
        } else {
            live.push(coordinator.connect(&room, RecordingHandle::default()));
        }
        assert_eq!(coordinator.registry().count(&room), live.len());
        assert_eq!(coordinator.snapshot(&room).viewer_count, live.len());
    }
}

#[test]
fn it_should_isolate_rooms() {
    let mut coordinator = Coordinator::new(CoordinatorOptions::default());
    let r1 = RoomId::from("R1");
    let r2 = RoomId::from("R2");

    let a = RecordingHandle::default();
    let b = RecordingHandle::default();
    let a_id = coordinator.connect(&r1, a.clone());
    let b_id = coordinator.connect(&r2, b.clone());

    coordinator.handle_message(&r1, &a_id, &ClientMessage::AdminConnect);
    coordinator.handle_message(&r1, &a_id, &page_change(3));
    assert!(b.take().is_empty());
    assert_eq!(coordinator.rooms().get_page(&r2), page(1));

    // a presenter of R1 has no say in R2
    coordinator.handle_message(&r2, &b_id, &page_change(4));
    assert_eq!(coordinator.rooms().get_page(&r2), page(1));
    assert_eq!(coordinator.rooms().get_page(&r1), page(3));
}

#[test]
fn it_should_continue_broadcast_past_broken_links() {
    let mut coordinator = Coordinator::new(CoordinatorOptions::default());
    let room = RoomId::from("R1");

    let presenter = RecordingHandle::default();
    let broken = RecordingHandle::default();
    let viewer = RecordingHandle::default();
    let presenter_id = coordinator.connect(&room, presenter.clone());
    coordinator.connect(&room, broken.clone());
    coordinator.connect(&room, viewer.clone());
    broken.break_link();

    coordinator.handle_message(&room, &presenter_id, &ClientMessage::AdminConnect);
    coordinator.handle_message(&room, &presenter_id, &page_change(8));

    assert!(broken.take().is_empty());
    assert_eq!(
        viewer.take(),
        vec![
            ServerMessage::ViewerCount { count: 3 },
            ServerMessage::PageUpdate { page: page(8) },
            ServerMessage::ViewerCount { count: 3 },
        ]
    );
    assert_eq!(coordinator.rooms().get_page(&room), page(8));
}

#[test]
fn it_should_report_admin_status_with_current_page_on_reclaim() {
    let mut coordinator = Coordinator::new(CoordinatorOptions::default());
    let room = RoomId::from("R1");

    let a = RecordingHandle::default();
    let b = RecordingHandle::default();
    let a_id = coordinator.connect(&room, a.clone());
    let b_id = coordinator.connect(&room, b.clone());

    coordinator.handle_message(&room, &a_id, &ClientMessage::AdminConnect);
    coordinator.handle_message(&room, &a_id, &page_change(6));
    coordinator.handle_message(&room, &b_id, &ClientMessage::AdminConnect);
    a.take();

    assert_eq!(
        b.take(),
        vec![
            ServerMessage::ViewerCount { count: 2 },
            ServerMessage::PageUpdate { page: page(6) },
            ServerMessage::ViewerCount { count: 2 },
            ServerMessage::AdminStatus {
                is_admin: true,
                current_page: page(6)
            },
            ServerMessage::ViewerCount { count: 2 },
        ]
    );
    assert_eq!(coordinator.rooms().get_presenter(&room), Some(b_id));

    // the previous presenter lost the role
    coordinator.handle_message(&room, &a_id, &page_change(1));
    assert_eq!(coordinator.rooms().get_page(&room), page(6));
}
