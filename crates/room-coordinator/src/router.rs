//! Event router.
//!
//! Validates sender authority against the roster and applies each inbound
//! event to the room state. Checks run in a fixed order:
//!
//! 1. payload shape (`InvalidPayload`)
//! 2. lifecycle gate (`RoomClosed`)
//! 3. roster membership, except for `join` (`NotAParticipant`)
//! 4. instructor-only events against the sender's roster role (`Unauthorized`)
//!
//! A rejected event leaves the room untouched and produces no deltas. An
//! accepted event yields an ack for the sender and the deltas the room
//! actor broadcasts.

use crate::errors::RcError;
use crate::events::{EventAck, LeaveReason, Reaction, RoomDelta, RoomEvent};
use crate::state::RoomState;
use common::types::{Caller, Role};
use tokio::time::Instant;

/// Outcome of an accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    pub ack: EventAck,
    pub deltas: Vec<RoomDelta>,
}

impl Routed {
    fn new(ack: EventAck, deltas: Vec<RoomDelta>) -> Self {
        Self { ack, deltas }
    }
}

impl RoomState {
    /// Apply one event from `sender`.
    ///
    /// # Errors
    ///
    /// Any `RcError`; the room is unchanged when an error is returned.
    pub fn route(&mut self, sender: &Caller, event: RoomEvent, now: Instant) -> Result<Routed, RcError> {
        self.lifecycle.admits(&event)?;
        event.validate()?;

        if let RoomEvent::Join { display_name } = &event {
            return self.join(sender, display_name, now);
        }

        let role = self
            .roster
            .role_of(&sender.identity)
            .ok_or(RcError::NotAParticipant)?;

        if event.is_instructor_only() && !role.is_instructor() {
            tracing::debug!(
                target: "rc.router",
                room_id = %self.room_id,
                identity = %sender.identity,
                event_type = event.event_type(),
                "Rejected instructor-only event"
            );
            return Err(RcError::instructor_only());
        }

        self.roster.touch(&sender.identity, now);
        let me = sender.identity.as_str();

        match event {
            RoomEvent::Join { .. } => Err(RcError::Internal("join routed twice".to_string())),

            RoomEvent::Leave => {
                let deltas = self.remove_with_reason(me, LeaveReason::Voluntary, now)?;
                Ok(Routed::new(EventAck::Left, deltas))
            }

            RoomEvent::RaiseHand => self.set_hand(me, true),
            RoomEvent::LowerHand => self.set_hand(me, false),

            RoomEvent::SendReaction { emoji } => {
                let reaction = Reaction::new(&emoji, me, self.settings.reaction_ttl_ms);
                let delta = RoomDelta::Reaction {
                    reaction: reaction.clone(),
                };
                Ok(Routed::new(EventAck::Reaction { reaction }, vec![delta]))
            }

            RoomEvent::CreatePoll { question, options } => {
                let poll = self.polls.create_poll(me, &question, &options)?.snapshot();
                let delta = RoomDelta::PollCreated { poll: poll.clone() };
                Ok(Routed::new(EventAck::Poll { poll }, vec![delta]))
            }

            RoomEvent::CastVote {
                poll_id,
                option_index,
            } => {
                let tally = self
                    .polls
                    .cast_vote(&self.roster, &poll_id, me, option_index)?;
                let delta = RoomDelta::TallyUpdated {
                    tally: tally.clone(),
                };
                Ok(Routed::new(EventAck::Tally { tally }, vec![delta]))
            }

            RoomEvent::ClosePoll { poll_id } => {
                let changed = self.polls.close_poll(&poll_id)?;
                let tally = self.polls.tally(&poll_id)?;
                let deltas = if changed {
                    vec![RoomDelta::PollClosed {
                        tally: tally.clone(),
                    }]
                } else {
                    Vec::new()
                };
                Ok(Routed::new(EventAck::Tally { tally }, deltas))
            }

            RoomEvent::SetPermission {
                target,
                can_publish,
            } => {
                let participant = self
                    .roster
                    .set_publish_permission(me, &target, can_publish)?;
                let delta = RoomDelta::PermissionChanged {
                    identity: participant.identity.clone(),
                    can_publish,
                };
                Ok(Routed::new(EventAck::Participant { participant }, vec![delta]))
            }

            RoomEvent::RemoveParticipant { target } => {
                let deltas = self.remove_with_reason(&target, LeaveReason::Removed, now)?;
                Ok(Routed::new(EventAck::Removed { identity: target }, deltas))
            }

            RoomEvent::EndRoom => {
                if !self.lifecycle.begin_ending(me, now) {
                    return Err(RcError::RoomClosed);
                }
                tracing::info!(
                    target: "rc.lifecycle",
                    room_id = %self.room_id,
                    ended_by = %me,
                    "Room ending"
                );
                let mut deltas = vec![RoomDelta::RoomEnding {
                    ended_by: me.to_string(),
                }];
                deltas.extend(self.after_roster_change(now));
                Ok(Routed::new(EventAck::RoomEnding, deltas))
            }
        }
    }

    fn set_hand(&mut self, identity: &str, raised: bool) -> Result<Routed, RcError> {
        let participant = self.roster.set_hand_raised(identity, identity, raised)?;
        let delta = RoomDelta::HandChanged {
            identity: participant.identity.clone(),
            raised,
        };
        Ok(Routed::new(EventAck::Participant { participant }, vec![delta]))
    }

    fn join(&mut self, sender: &Caller, display_name: &str, now: Instant) -> Result<Routed, RcError> {
        if !self.roster.contains(&sender.identity) && self.roster.len() >= self.settings.max_participants {
            return Err(RcError::CapacityExceeded("Room is full".to_string()));
        }

        // The owner always holds the instructor seat.
        let role = if sender.identity == self.lifecycle.owner() {
            Role::Instructor
        } else {
            sender.role
        };

        let outcome = self
            .roster
            .upsert_participant(&sender.identity, role, display_name.trim(), now);

        let participant = outcome.participant;
        let mut deltas = vec![if outcome.inserted {
            RoomDelta::ParticipantJoined {
                participant: participant.clone(),
            }
        } else {
            RoomDelta::ParticipantUpdated {
                participant: participant.clone(),
            }
        }];
        deltas.extend(self.after_roster_change(now));

        let ack = EventAck::Joined {
            participant,
            participants: self.participants(),
            polls: self.polls.list().iter().map(|p| p.snapshot()).collect(),
        };

        Ok(Routed::new(ack, deltas))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::RoomSettings;
    use crate::lifecycle::{CloseReason, LifecycleState};

    fn alice() -> Caller {
        Caller::instructor("alice").unwrap()
    }

    fn bob() -> Caller {
        Caller::student("bob").unwrap()
    }

    fn carol() -> Caller {
        Caller::student("carol").unwrap()
    }

    fn join(name: &str) -> RoomEvent {
        RoomEvent::Join {
            display_name: name.to_string(),
        }
    }

    fn room() -> RoomState {
        let (mut state, _) =
            RoomState::new("room-1", &alice(), "Alice", RoomSettings::default(), Instant::now());
        state.route(&bob(), join("Bob"), Instant::now()).unwrap();
        state.route(&carol(), join("Carol"), Instant::now()).unwrap();
        state
    }

    fn create_poll(state: &mut RoomState) -> String {
        let routed = state
            .route(
                &alice(),
                RoomEvent::CreatePoll {
                    question: "Best language?".to_string(),
                    options: vec!["Rust".to_string(), "Go".to_string()],
                },
                Instant::now(),
            )
            .unwrap();
        match routed.ack {
            EventAck::Poll { poll } => poll.poll_id,
            other => unreachable!("unexpected ack {other:?}"),
        }
    }

    #[test]
    fn test_join_broadcasts_and_acks_room_view() {
        let (mut state, _) =
            RoomState::new("room-1", &alice(), "Alice", RoomSettings::default(), Instant::now());

        let routed = state.route(&bob(), join("Bob"), Instant::now()).unwrap();

        assert!(matches!(
            routed.deltas.as_slice(),
            [RoomDelta::ParticipantJoined { participant }] if participant.identity == "bob"
        ));
        match routed.ack {
            EventAck::Joined {
                participant,
                participants,
                polls,
            } => {
                assert_eq!(participant.role, Role::Student);
                assert_eq!(participants.len(), 2);
                assert!(polls.is_empty());
            }
            other => unreachable!("unexpected ack {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_join_updates_record() {
        let mut state = room();

        let routed = state.route(&bob(), join("Robert"), Instant::now()).unwrap();

        assert!(matches!(
            routed.deltas.as_slice(),
            [RoomDelta::ParticipantUpdated { participant }] if participant.display_name == "Robert"
        ));
        assert_eq!(state.roster.len(), 3);
    }

    #[test]
    fn test_owner_rejoin_keeps_instructor_role() {
        let mut state = room();
        let owner_as_student = Caller::student("alice").unwrap();

        state.route(&owner_as_student, join("Alice"), Instant::now()).unwrap();
        assert_eq!(state.roster.role_of("alice"), Some(Role::Instructor));
    }

    #[test]
    fn test_non_member_is_rejected() {
        let mut state = room();
        let mallory = Caller::student("mallory").unwrap();

        for event in [
            RoomEvent::RaiseHand,
            RoomEvent::Leave,
            RoomEvent::SendReaction {
                emoji: "👋".to_string(),
            },
        ] {
            assert_eq!(
                state.route(&mallory, event, Instant::now()).unwrap_err(),
                RcError::NotAParticipant
            );
        }
    }

    #[test]
    fn test_student_control_events_are_unauthorized() {
        let mut state = room();
        let poll_id = create_poll(&mut state);

        let events = [
            RoomEvent::SetPermission {
                target: "carol".to_string(),
                can_publish: true,
            },
            RoomEvent::RemoveParticipant {
                target: "carol".to_string(),
            },
            RoomEvent::EndRoom,
            RoomEvent::CreatePoll {
                question: "Q?".to_string(),
                options: vec!["A".to_string(), "B".to_string()],
            },
            RoomEvent::ClosePoll {
                poll_id: poll_id.clone(),
            },
        ];

        for event in events {
            let err = state.route(&bob(), event, Instant::now()).unwrap_err();
            assert_eq!(err, RcError::instructor_only());
        }

        assert_eq!(state.roster.len(), 3);
        assert!(!state.roster.get("carol").unwrap().can_publish);
        assert_eq!(state.lifecycle.state(), LifecycleState::Open);
        assert_eq!(state.polls.len(), 1);
        assert!(state.polls.get(&poll_id).unwrap().active);
    }

    #[test]
    fn test_claimed_instructor_role_not_trusted_over_roster() {
        let mut state = room();
        // Same identity as a roster student, but claiming instructor.
        let impostor = Caller::instructor("bob").unwrap();

        let err = state
            .route(&impostor, RoomEvent::EndRoom, Instant::now())
            .unwrap_err();
        assert_eq!(err, RcError::instructor_only());
    }

    #[test]
    fn test_hand_raise_and_lower() {
        let mut state = room();

        let routed = state.route(&bob(), RoomEvent::RaiseHand, Instant::now()).unwrap();
        assert_eq!(
            routed.deltas,
            vec![RoomDelta::HandChanged {
                identity: "bob".to_string(),
                raised: true
            }]
        );
        assert!(state.roster.hand_raised("bob").unwrap());

        state.route(&bob(), RoomEvent::LowerHand, Instant::now()).unwrap();
        assert!(!state.roster.hand_raised("bob").unwrap());
    }

    #[test]
    fn test_reaction_is_broadcast_not_stored() {
        let mut state = room();

        let routed = state
            .route(
                &carol(),
                RoomEvent::SendReaction {
                    emoji: "🎉".to_string(),
                },
                Instant::now(),
            )
            .unwrap();

        match routed.deltas.as_slice() {
            [RoomDelta::Reaction { reaction }] => {
                assert_eq!(reaction.emoji, "🎉");
                assert_eq!(reaction.sender, "carol");
                assert_eq!(reaction.ttl_ms, RoomSettings::default().reaction_ttl_ms);
            }
            other => unreachable!("unexpected deltas {other:?}"),
        }
    }

    #[test]
    fn test_poll_flow_last_vote_counts() {
        let mut state = room();
        let poll_id = create_poll(&mut state);

        let vote = |index| RoomEvent::CastVote {
            poll_id: poll_id.clone(),
            option_index: index,
        };

        state.route(&bob(), vote(0), Instant::now()).unwrap();
        state.route(&carol(), vote(0), Instant::now()).unwrap();
        let routed = state.route(&bob(), vote(1), Instant::now()).unwrap();

        match routed.ack {
            EventAck::Tally { tally } => {
                assert_eq!(tally.count_for(0), 1);
                assert_eq!(tally.count_for(1), 1);
                assert_eq!(tally.total_votes, 2);
            }
            other => unreachable!("unexpected ack {other:?}"),
        }

        let closed = state
            .route(
                &alice(),
                RoomEvent::ClosePoll {
                    poll_id: poll_id.clone(),
                },
                Instant::now(),
            )
            .unwrap();
        assert!(matches!(
            closed.deltas.as_slice(),
            [RoomDelta::PollClosed { tally }] if !tally.active
        ));

        // Closing again is a quiet no-op.
        let again = state
            .route(
                &alice(),
                RoomEvent::ClosePoll {
                    poll_id: poll_id.clone(),
                },
                Instant::now(),
            )
            .unwrap();
        assert!(again.deltas.is_empty());

        assert_eq!(
            state.route(&carol(), vote(1), Instant::now()).unwrap_err(),
            RcError::PollInactive
        );
    }

    #[test]
    fn test_set_permission_and_remove() {
        let mut state = room();

        let routed = state
            .route(
                &alice(),
                RoomEvent::SetPermission {
                    target: "bob".to_string(),
                    can_publish: true,
                },
                Instant::now(),
            )
            .unwrap();
        assert_eq!(
            routed.deltas,
            vec![RoomDelta::PermissionChanged {
                identity: "bob".to_string(),
                can_publish: true
            }]
        );

        let routed = state
            .route(
                &alice(),
                RoomEvent::RemoveParticipant {
                    target: "bob".to_string(),
                },
                Instant::now(),
            )
            .unwrap();
        assert_eq!(
            routed.deltas,
            vec![RoomDelta::ParticipantLeft {
                identity: "bob".to_string(),
                reason: LeaveReason::Removed
            }]
        );

        let err = state
            .route(
                &alice(),
                RoomEvent::RemoveParticipant {
                    target: "bob".to_string(),
                },
                Instant::now(),
            )
            .unwrap_err();
        assert!(matches!(err, RcError::ParticipantNotFound(_)));
    }

    #[test]
    fn test_ending_accepts_only_leave_then_drains() {
        let mut state = room();

        let routed = state.route(&alice(), RoomEvent::EndRoom, Instant::now()).unwrap();
        assert_eq!(
            routed.deltas,
            vec![RoomDelta::RoomEnding {
                ended_by: "alice".to_string()
            }]
        );

        let dave = Caller::student("dave").unwrap();
        assert_eq!(
            state.route(&dave, join("Dave"), Instant::now()).unwrap_err(),
            RcError::RoomClosed
        );
        assert_eq!(
            state.route(&bob(), RoomEvent::RaiseHand, Instant::now()).unwrap_err(),
            RcError::RoomClosed
        );

        state.route(&bob(), RoomEvent::Leave, Instant::now()).unwrap();
        state.route(&carol(), RoomEvent::Leave, Instant::now()).unwrap();
        let last = state.route(&alice(), RoomEvent::Leave, Instant::now()).unwrap();

        assert_eq!(
            last.deltas,
            vec![
                RoomDelta::ParticipantLeft {
                    identity: "alice".to_string(),
                    reason: LeaveReason::Voluntary
                },
                RoomDelta::RoomClosed {
                    reason: CloseReason::Drained
                },
            ]
        );
        assert_eq!(state.lifecycle.state(), LifecycleState::Closed);
    }

    #[test]
    fn test_closed_room_rejects_everything_without_mutation() {
        let mut state = room();
        state.close_room(CloseReason::Shutdown, Instant::now());
        let before = state.participants();

        let events = [
            join("Dave"),
            RoomEvent::Leave,
            RoomEvent::RaiseHand,
            RoomEvent::SendReaction {
                emoji: "👍".to_string(),
            },
            RoomEvent::EndRoom,
            RoomEvent::RemoveParticipant {
                target: "bob".to_string(),
            },
        ];
        for event in events {
            assert_eq!(
                state.route(&alice(), event, Instant::now()).unwrap_err(),
                RcError::RoomClosed
            );
        }
        assert_eq!(state.participants(), before);
    }

    #[test]
    fn test_capacity_limit() {
        let settings = RoomSettings {
            max_participants: 2,
            ..RoomSettings::default()
        };
        let (mut state, _) = RoomState::new("room-1", &alice(), "Alice", settings, Instant::now());

        state.route(&bob(), join("Bob"), Instant::now()).unwrap();
        assert!(matches!(
            state.route(&carol(), join("Carol"), Instant::now()),
            Err(RcError::CapacityExceeded(_))
        ));
        // Re-join of an existing member is still fine at capacity.
        assert!(state.route(&bob(), join("Bob"), Instant::now()).is_ok());
    }

    #[test]
    fn test_closed_room_rejects_invalid_payload_as_closed() {
        let mut state = room();
        state.close_room(CloseReason::Shutdown, Instant::now());

        for event in [
            join("   "),
            RoomEvent::SendReaction {
                emoji: String::new(),
            },
            RoomEvent::RemoveParticipant {
                target: " ".to_string(),
            },
        ] {
            let err = state.route(&alice(), event, Instant::now()).unwrap_err();
            assert_eq!(err, RcError::RoomClosed);
        }
    }

    #[test]
    fn test_open_room_still_validates_payload() {
        let mut state = room();

        let err = state
            .route(
                &alice(),
                RoomEvent::SendReaction {
                    emoji: String::new(),
                },
                Instant::now(),
            )
            .unwrap_err();
        assert!(matches!(err, RcError::InvalidPayload(_)));
    }
}
