//! Participant roster for one room.
//!
//! Keyed by participant id. Everything handed out is a copy; the roster
//! keeps the only live entries.

use std::collections::HashMap;

use crate::participant::Participant;
use crate::protocol::{CommandMessage, SenderInfo};

#[derive(Debug, Default)]
pub struct Roster {
    participants: HashMap<String, Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.participants.clear();
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Insert or replace, returning a copy of the stored entry.
    pub fn upsert(&mut self, participant: Participant) -> Participant {
        self.participants
            .insert(participant.id.clone(), participant.clone());
        participant
    }

    /// Apply a `JoinSession` command. Fields the command leaves empty keep
    /// their previous values.
    pub fn join(&mut self, cmd: &CommandMessage) -> Participant {
        let previous = self.participants.get(&cmd.sender.participant_id);
        let keep = |new: &str, old: Option<&String>| -> String {
            if new.is_empty() {
                old.cloned().unwrap_or_default()
            } else {
                new.to_string()
            }
        };

        let participant = Participant {
            id: cmd.sender.participant_id.clone(),
            nickname: keep(&cmd.sender.nickname, previous.map(|p| &p.nickname)),
            avatar: keep(&cmd.sender.avatar, previous.map(|p| &p.avatar)),
            locale: keep(
                cmd.locale.as_deref().unwrap_or_default(),
                previous.map(|p| &p.locale),
            ),
            is_host: cmd.is_host,
            is_muted: cmd
                .is_muted
                .or(previous.map(|p| p.is_muted))
                .unwrap_or_default(),
            uses_tts: cmd
                .uses_tts
                .or(previous.map(|p| p.uses_tts))
                .unwrap_or_default(),
        };
        self.upsert(participant)
    }

    /// Apply a `LeaveSession` command. Returns the departed participant with
    /// the command's values layered over the last known entry, or `None` if
    /// the id was never in the roster.
    pub fn leave(&mut self, cmd: &CommandMessage) -> Option<Participant> {
        let mut participant = self.participants.remove(&cmd.sender.participant_id)?;
        if !cmd.sender.nickname.is_empty() {
            participant.nickname = cmd.sender.nickname.clone();
        }
        if !cmd.sender.avatar.is_empty() {
            participant.avatar = cmd.sender.avatar.clone();
        }
        if let Some(locale) = &cmd.locale {
            participant.locale = locale.clone();
        }
        if let Some(muted) = cmd.is_muted {
            participant.is_muted = muted;
        }
        if let Some(tts) = cmd.uses_tts {
            participant.uses_tts = tts;
        }
        participant.is_host = cmd.is_host;
        Some(participant)
    }

    /// Update one participant in place, creating a placeholder from the
    /// sender fields when the id is unknown. Returns a copy after `update`.
    pub fn update(
        &mut self,
        sender: &SenderInfo,
        update: impl FnOnce(&mut Participant),
    ) -> Participant {
        let entry = self
            .participants
            .entry(sender.participant_id.clone())
            .or_insert_with(|| Participant {
                id: sender.participant_id.clone(),
                nickname: sender.nickname.clone(),
                avatar: sender.avatar.clone(),
                ..Participant::default()
            });
        update(entry);
        entry.clone()
    }

    /// Set `is_muted` on every non-host participant. Returns copies of the
    /// affected entries.
    pub fn mute_all(&mut self, muted: bool) -> Vec<Participant> {
        let mut changed: Vec<Participant> = self
            .participants
            .values_mut()
            .filter(|p| !p.is_host)
            .map(|p| {
                p.is_muted = muted;
                p.clone()
            })
            .collect();
        changed.sort_by(|a, b| a.id.cmp(&b.id));
        changed
    }

    /// Copies of every participant, ordered by id.
    pub fn snapshot(&self) -> Vec<Participant> {
        let mut all: Vec<Participant> = self.participants.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}
