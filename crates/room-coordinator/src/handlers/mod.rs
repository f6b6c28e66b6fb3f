//! HTTP request handlers for the Room Coordinator.

pub mod rooms;
pub mod ws;

pub use rooms::{
    create_room, get_room, get_tally, list_participants, post_event, transport_left,
    transport_seen,
};
pub use ws::room_socket;
